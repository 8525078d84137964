//! Media service configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MediaServiceConfig {
    /// Base URL of the media service
    pub base_url: String,
    /// Timeout for merge calls, which download and re-encode on the server
    pub request_timeout: Duration,
}

impl Default for MediaServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            request_timeout: Duration::from_secs(600),
        }
    }
}

impl MediaServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("MEDIA_API_URL").unwrap_or(defaults.base_url),
            request_timeout: std::env::var("MEDIA_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}
