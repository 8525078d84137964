//! Remote job status parsing and output extraction.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{JobError, JobResult};

/// Status reported by a job service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
}

impl RemoteStatus {
    /// Parse the wire form. Unknown strings yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "IN_QUEUE" => Some(RemoteStatus::InQueue),
            "IN_PROGRESS" => Some(RemoteStatus::InProgress),
            "COMPLETED" => Some(RemoteStatus::Completed),
            "FAILED" => Some(RemoteStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::InQueue => "IN_QUEUE",
            RemoteStatus::InProgress => "IN_PROGRESS",
            RemoteStatus::Completed => "COMPLETED",
            RemoteStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Completed | RemoteStatus::Failed)
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of a submit response.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Body of a status response.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Queued or running
    Pending(RemoteStatus),
    /// Finished successfully
    Completed(JobOutput),
    /// Finished with the service's error text
    Failed(String),
}

impl PollOutcome {
    pub(crate) fn from_response(job_id: &str, response: StatusResponse) -> JobResult<Self> {
        let raw = response.status.unwrap_or_default();
        let status = RemoteStatus::parse(&raw).ok_or(JobError::UnrecognizedStatus(raw))?;

        Ok(match status {
            RemoteStatus::InQueue | RemoteStatus::InProgress => PollOutcome::Pending(status),
            RemoteStatus::Completed => PollOutcome::Completed(JobOutput::new(
                job_id,
                response.output.unwrap_or(Value::Null),
            )),
            RemoteStatus::Failed => PollOutcome::Failed(error_text(response.error)),
        })
    }

    pub fn status(&self) -> RemoteStatus {
        match self {
            PollOutcome::Pending(status) => *status,
            PollOutcome::Completed(_) => RemoteStatus::Completed,
            PollOutcome::Failed(_) => RemoteStatus::Failed,
        }
    }
}

fn error_text(error: Option<Value>) -> String {
    match error {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Null) | None => "Unknown error".to_string(),
        Some(Value::String(_)) => "Unknown error".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Output of a completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    job_id: String,
    raw: Value,
}

impl JobOutput {
    pub fn new(job_id: impl Into<String>, raw: Value) -> Self {
        Self {
            job_id: job_id.into(),
            raw,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Video URL from `result`, `video_url` or `gcs_url`, or a bare string output.
    pub fn video_url(&self) -> JobResult<String> {
        if let Value::String(url) = &self.raw {
            if !url.is_empty() {
                return Ok(url.clone());
            }
        }
        self.first_string(&["result", "video_url", "gcs_url"])
            .ok_or_else(|| JobError::missing_output(&self.job_id, "a video URL"))
    }

    /// Audio URL from `url`.
    pub fn audio_url(&self) -> JobResult<String> {
        self.first_string(&["url", "audio_url"])
            .ok_or_else(|| JobError::missing_output(&self.job_id, "an audio URL"))
    }

    /// Base64 image from `image_base64`.
    pub fn image_base64(&self) -> JobResult<String> {
        self.first_string(&["image_base64"])
            .ok_or_else(|| JobError::missing_output(&self.job_id, "an image"))
    }

    fn first_string(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.raw.get(key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> StatusResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_known_statuses() {
        assert_eq!(RemoteStatus::parse("IN_QUEUE"), Some(RemoteStatus::InQueue));
        assert_eq!(RemoteStatus::parse("COMPLETED"), Some(RemoteStatus::Completed));
        assert_eq!(RemoteStatus::parse("completed"), None);
        assert_eq!(RemoteStatus::parse("CANCELLED"), None);
    }

    #[test]
    fn test_unknown_status_is_transient_error() {
        let err = PollOutcome::from_response("j1", response(json!({"status": "WARMING"}))).unwrap_err();
        assert!(err.is_transient());

        let err = PollOutcome::from_response("j1", response(json!({}))).unwrap_err();
        assert!(matches!(err, JobError::UnrecognizedStatus(s) if s.is_empty()));
    }

    #[test]
    fn test_failed_carries_error_text() {
        let outcome =
            PollOutcome::from_response("j1", response(json!({"status": "FAILED", "error": "CUDA OOM"})))
                .unwrap();
        assert_eq!(outcome, PollOutcome::Failed("CUDA OOM".to_string()));

        let outcome = PollOutcome::from_response("j1", response(json!({"status": "FAILED"}))).unwrap();
        assert_eq!(outcome, PollOutcome::Failed("Unknown error".to_string()));
    }

    #[test]
    fn test_video_url_fallbacks() {
        let out = JobOutput::new("j", json!({"result": "https://cdn/a.mp4"}));
        assert_eq!(out.video_url().unwrap(), "https://cdn/a.mp4");

        let out = JobOutput::new("j", json!({"video_url": "https://cdn/b.mp4"}));
        assert_eq!(out.video_url().unwrap(), "https://cdn/b.mp4");

        let out = JobOutput::new("j", json!("https://cdn/c.mp4"));
        assert_eq!(out.video_url().unwrap(), "https://cdn/c.mp4");
    }

    #[test]
    fn test_missing_output_is_terminal() {
        let out = JobOutput::new("j", json!({"cost": 0.1}));
        let err = out.video_url().unwrap_err();
        assert!(matches!(err, JobError::MissingOutput { .. }));
        assert!(!err.is_transient());
    }
}
