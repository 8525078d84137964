//! Job service configuration.

use std::time::Duration;

use crate::error::{JobError, JobResult};

/// Connection settings shared by all job endpoints.
#[derive(Debug, Clone)]
pub struct JobServiceConfig {
    /// Base URL, endpoint ids are appended to it
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Consecutive poll failures logged before suppression
    pub max_logged_poll_failures: u32,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.runpod.ai/v2".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(60),
            max_logged_poll_failures: 3,
        }
    }
}

impl JobServiceConfig {
    /// Create config from environment variables.
    ///
    /// `RUNPOD_API_KEY` is required.
    pub fn from_env() -> JobResult<Self> {
        let api_key = std::env::var("RUNPOD_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| JobError::config("RUNPOD_API_KEY not set"))?;

        let defaults = Self::default();
        Ok(Self {
            base_url: std::env::var("RUNPOD_BASE_URL").unwrap_or(defaults.base_url),
            api_key,
            request_timeout: Duration::from_secs(
                std::env::var("RUNPOD_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_logged_poll_failures: std::env::var("RUNPOD_MAX_LOGGED_POLL_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_logged_poll_failures),
        })
    }
}

/// One remote job endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Short name for logs and metrics ("video", "speech", ...)
    pub name: String,
    /// Endpoint id appended to the base URL
    pub id: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    fn from_env(name: &str, var: &str, default_id: &str) -> Self {
        Self::new(name, std::env::var(var).unwrap_or_else(|_| default_id.to_string()))
    }
}

/// Endpoints for every generation backend.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub video: Endpoint,
    pub speech: Endpoint,
    pub image: Endpoint,
    pub composition: Endpoint,
    pub image_to_video: Endpoint,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            video: Endpoint::new("video", "wan-2-2-t2v-720"),
            speech: Endpoint::new("speech", "lew07dpd05v8gd"),
            image: Endpoint::new("image", "86zngifdc1ukdz"),
            composition: Endpoint::new("composition", "tob76lalk2ulxf"),
            image_to_video: Endpoint::new("image_to_video", "o2hasm8tmfewuw"),
        }
    }
}

impl ServiceEndpoints {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            video: Endpoint::from_env("video", "VIDEO_ENDPOINT_ID", &defaults.video.id),
            speech: Endpoint::from_env("speech", "TTS_ENDPOINT_ID", &defaults.speech.id),
            image: Endpoint::from_env("image", "IMAGE_ENDPOINT_ID", &defaults.image.id),
            composition: Endpoint::from_env(
                "composition",
                "COMPOSITION_ENDPOINT_ID",
                &defaults.composition.id,
            ),
            image_to_video: Endpoint::from_env(
                "image_to_video",
                "I2V_ENDPOINT_ID",
                &defaults.image_to_video.id,
            ),
        }
    }
}

/// How a poll loop paces itself and when it gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before each status check
    pub interval: Duration,
    /// `None` polls until a terminal status or cancellation
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    /// Poll forever at `interval`.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Poll at `interval`, raising a timeout after `max_attempts` checks.
    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    /// Whether `attempts` checks have used up the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    fn from_env(prefix: &str, default: PollPolicy) -> Self {
        let interval = std::env::var(format!("{prefix}_POLL_INTERVAL_SECS"))
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.interval);

        // "0" or "none" switch a bounded call site to unbounded.
        let max_attempts = match std::env::var(format!("{prefix}_POLL_MAX_ATTEMPTS")) {
            Ok(raw) if raw.eq_ignore_ascii_case("none") => None,
            Ok(raw) => match raw.parse::<u32>() {
                Ok(0) => None,
                Ok(n) => Some(n),
                Err(_) => default.max_attempts,
            },
            Err(_) => default.max_attempts,
        };

        Self {
            interval,
            max_attempts,
        }
    }
}

/// Poll policy per call site.
#[derive(Debug, Clone)]
pub struct PollPolicies {
    pub video: PollPolicy,
    pub speech: PollPolicy,
    pub image: PollPolicy,
    pub composition: PollPolicy,
    pub image_to_video: PollPolicy,
}

impl Default for PollPolicies {
    fn default() -> Self {
        Self {
            video: PollPolicy::unbounded(Duration::from_secs(5)),
            speech: PollPolicy::unbounded(Duration::from_secs(2)),
            image: PollPolicy::bounded(Duration::from_secs(2), 60),
            composition: PollPolicy::bounded(Duration::from_secs(2), 60),
            image_to_video: PollPolicy::bounded(Duration::from_secs(3), 120),
        }
    }
}

impl PollPolicies {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            video: PollPolicy::from_env("VIDEO", defaults.video),
            speech: PollPolicy::from_env("TTS", defaults.speech),
            image: PollPolicy::from_env("IMAGE", defaults.image),
            composition: PollPolicy::from_env("COMPOSITION", defaults.composition),
            image_to_video: PollPolicy::from_env("I2V", defaults.image_to_video),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_exhausts() {
        let policy = PollPolicy::unbounded(Duration::from_secs(5));
        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(u32::MAX));
    }

    #[test]
    fn test_bounded_exhausts_at_limit() {
        let policy = PollPolicy::bounded(Duration::from_secs(2), 3);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
    }

    #[test]
    fn test_default_policies() {
        let policies = PollPolicies::default();
        assert_eq!(policies.video.max_attempts, None);
        assert_eq!(policies.speech.max_attempts, None);
        assert_eq!(policies.image.max_attempts, Some(60));
    }
}
