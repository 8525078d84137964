//! Job client error types.

use thiserror::Error;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Submission rejected by {endpoint} ({status}): {body}")]
    SubmitRejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Submission to {0} returned no job id")]
    MissingJobId(String),

    #[error("Status check failed ({status}): {body}")]
    PollRejected { status: u16, body: String },

    #[error("Unrecognized job status: {0}")]
    UnrecognizedStatus(String),

    #[error("Job {job_id} failed: {message}")]
    RemoteFailed { job_id: String, message: String },

    #[error("Job {job_id} completed without {expected}")]
    MissingOutput { job_id: String, expected: String },

    #[error("Job timeout: maximum polling attempts reached ({attempts})")]
    Timeout { attempts: u32 },

    #[error("Polling cancelled")]
    Cancelled,

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl JobError {
    pub fn submit_rejected(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::SubmitRejected {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    pub fn remote_failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteFailed {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    pub fn missing_output(job_id: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::MissingOutput {
            job_id: job_id.into(),
            expected: expected.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors a poll loop swallows and retries on its normal cadence.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            JobError::PollRejected { .. }
                | JobError::UnrecognizedStatus(_)
                | JobError::Decode(_)
                | JobError::Http(_)
        )
    }

    /// Check if this is a bounded-poll timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, JobError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(JobError::UnrecognizedStatus("WEIRD".into()).is_transient());
        assert!(JobError::PollRejected { status: 502, body: String::new() }.is_transient());
        assert!(!JobError::remote_failed("j", "oom").is_transient());
        assert!(!JobError::Timeout { attempts: 3 }.is_transient());
        assert!(!JobError::submit_rejected("video", 400, "bad").is_transient());
    }

    #[test]
    fn test_timeout_distinct_from_failure() {
        let timeout = JobError::Timeout { attempts: 60 };
        assert!(timeout.is_timeout());
        assert!(!JobError::remote_failed("j", "x").is_timeout());
        assert!(timeout.to_string().contains("maximum polling attempts"));
    }
}
