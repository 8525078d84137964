//! Media error types.

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("No videos to combine")]
    NoVideos,

    #[error("Media service unavailable at {0}")]
    ServiceUnavailable(String),

    #[error("Media service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Invalid response from media service: {0}")]
    InvalidResponse(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MediaError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn upload_rejected(msg: impl Into<String>) -> Self {
        Self::UploadRejected(msg.into())
    }

    /// Build a service error from a non-2xx body, preferring its `error` field.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("request failed with status {status}")
                } else {
                    body.to_string()
                }
            });
        Self::Service { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_prefers_error_field() {
        let err = MediaError::from_body(500, r#"{"error": "ffmpeg exited 1"}"#);
        assert!(matches!(err, MediaError::Service { status: 500, ref message } if message == "ffmpeg exited 1"));

        let err = MediaError::from_body(400, "");
        assert!(err.to_string().contains("status 400"));
    }
}
