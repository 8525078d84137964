//! Per-scene generation job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle of one scene's generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneJobStatus {
    /// Registered, not yet accepted by the remote service
    #[default]
    Pending,
    /// Accepted remotely and being polled
    Submitted,
    /// Finished with a result artifact
    Completed,
    /// Finished with an error
    Failed,
}

impl SceneJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneJobStatus::Pending => "pending",
            SceneJobStatus::Submitted => "submitted",
            SceneJobStatus::Completed => "completed",
            SceneJobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates without a retry).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SceneJobStatus::Completed | SceneJobStatus::Failed)
    }

    /// Forward transitions a status update may perform.
    ///
    /// `Failed -> Submitted` is not listed: it only happens through an
    /// explicit retry, which replaces the job record.
    pub fn can_advance_to(&self, next: SceneJobStatus) -> bool {
        matches!(
            (self, next),
            (SceneJobStatus::Pending, SceneJobStatus::Submitted)
                | (SceneJobStatus::Pending, SceneJobStatus::Failed)
                | (SceneJobStatus::Submitted, SceneJobStatus::Completed)
                | (SceneJobStatus::Submitted, SceneJobStatus::Failed)
        )
    }
}

impl std::fmt::Display for SceneJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The job record attached to a scene for one generation attempt.
///
/// `result_url` is set iff the status is `Completed` and `error` iff it is
/// `Failed`. Use the transition methods rather than writing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneJob {
    /// Opaque id assigned by the remote service once submitted
    pub job_id: Option<String>,
    pub status: SceneJobStatus,
    pub result_url: Option<String>,
    pub error: Option<String>,
    /// 1 for the first attempt, incremented on every supersession
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SceneJob {
    /// Create a fresh pending record.
    pub fn pending(attempt: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id: None,
            status: SceneJobStatus::Pending,
            result_url: None,
            error: None,
            attempt,
            created_at: now,
            updated_at: now,
        }
    }

    /// Superseding record for a retry, already submitted under `job_id`.
    pub fn superseding(&self, job_id: impl Into<String>) -> Self {
        let mut next = Self::pending(self.attempt + 1);
        next.job_id = Some(job_id.into());
        next.status = SceneJobStatus::Submitted;
        next
    }

    pub fn mark_submitted(&mut self, job_id: impl Into<String>) {
        self.job_id = Some(job_id.into());
        self.set_status(SceneJobStatus::Submitted);
    }

    pub fn mark_completed(&mut self, result_url: impl Into<String>) {
        self.result_url = Some(result_url.into());
        self.error = None;
        self.set_status(SceneJobStatus::Completed);
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.result_url = None;
        self.set_status(SceneJobStatus::Failed);
    }

    /// Whether `job_id` names this record's current remote job.
    pub fn is_current(&self, job_id: &str) -> bool {
        self.job_id.as_deref() == Some(job_id)
    }

    fn set_status(&mut self, status: SceneJobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use SceneJobStatus::*;
        assert!(Pending.can_advance_to(Submitted));
        assert!(Pending.can_advance_to(Failed));
        assert!(Submitted.can_advance_to(Completed));
        assert!(Submitted.can_advance_to(Failed));

        assert!(!Pending.can_advance_to(Completed));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Submitted));
        assert!(!Completed.can_advance_to(Submitted));
    }

    #[test]
    fn test_result_and_error_are_exclusive() {
        let mut job = SceneJob::pending(1);
        job.mark_submitted("job-1");
        job.mark_failed("boom");
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.result_url.is_none());
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_superseding_bumps_attempt() {
        let mut job = SceneJob::pending(1);
        job.mark_submitted("job-1");
        job.mark_failed("boom");

        let next = job.superseding("job-2");
        assert_eq!(next.attempt, 2);
        assert_eq!(next.status, SceneJobStatus::Submitted);
        assert!(next.is_current("job-2"));
        assert!(!next.is_current("job-1"));
        assert!(next.error.is_none());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&SceneJobStatus::Submitted).unwrap();
        assert_eq!(json, "\"submitted\"");
    }
}
