//! Job client metrics.
//!
//! Counters are labelled by endpoint name. No exporter is installed here;
//! the binary decides whether to record them.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Job submissions by endpoint and result.
    pub const SUBMISSIONS_TOTAL: &str = "reel_job_submissions_total";

    /// Status checks by endpoint and observed status.
    pub const POLLS_TOTAL: &str = "reel_job_polls_total";

    /// Finished poll loops by endpoint and outcome.
    pub const OUTCOMES_TOTAL: &str = "reel_job_outcomes_total";

    /// Status checks needed per finished job.
    pub const POLL_ATTEMPTS: &str = "reel_job_poll_attempts";
}

pub fn record_submission(endpoint: &str, accepted: bool) {
    counter!(
        names::SUBMISSIONS_TOTAL,
        "endpoint" => endpoint.to_string(),
        "result" => if accepted { "accepted" } else { "rejected" }
    )
    .increment(1);
}

pub fn record_poll(endpoint: &str, status: &str) {
    counter!(
        names::POLLS_TOTAL,
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record how a poll loop ended ("completed", "failed", "timeout", "cancelled").
pub fn record_outcome(endpoint: &str, outcome: &'static str, attempts: u32) {
    counter!(
        names::OUTCOMES_TOTAL,
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        names::POLL_ATTEMPTS,
        "endpoint" => endpoint.to_string()
    )
    .record(attempts as f64);
}
