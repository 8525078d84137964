//! Scene video concatenation and audio merging via the media service.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::MediaServiceConfig;
use crate::error::{MediaError, MediaResult};

/// Header the media service's tunnel expects on every call.
const TUNNEL_HEADER: (&str, &str) = ("ngrok-skip-browser-warning", "1");

/// A completed scene video tagged with its scene ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneVideo {
    pub ordinal: u32,
    pub url: String,
}

impl SceneVideo {
    pub fn new(ordinal: u32, url: impl Into<String>) -> Self {
        Self {
            ordinal,
            url: url.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MergeRequest<'a> {
    urls: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct VideoAudioRequest<'a> {
    video_url: &'a str,
    audio_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    #[serde(default)]
    output_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    ok: bool,
}

/// Client for the media service's merge endpoints.
#[derive(Debug, Clone)]
pub struct MediaAssembler {
    http: Client,
    base_url: String,
}

impl MediaAssembler {
    pub fn new(config: MediaServiceConfig) -> MediaResult<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> MediaResult<Self> {
        Self::new(MediaServiceConfig::from_env())
    }

    /// Whether the service answers its health check with `{"ok": true}`.
    pub async fn health(&self) -> bool {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .header(TUNNEL_HEADER.0, TUNNEL_HEADER.1)
            .send()
            .await;

        match response {
            Ok(r) => r.json::<HealthResponse>().await.map(|h| h.ok).unwrap_or(false),
            Err(e) => {
                warn!(base_url = %self.base_url, "Media service health check failed: {}", e);
                false
            }
        }
    }

    async fn ensure_available(&self) -> MediaResult<()> {
        if self.health().await {
            Ok(())
        } else {
            Err(MediaError::ServiceUnavailable(self.base_url.clone()))
        }
    }

    /// Concatenate scene videos into one timeline.
    ///
    /// Videos are ordered by scene ordinal, whatever order they arrive in.
    /// A single video is returned as-is without contacting the service.
    pub async fn combine_scene_videos<F>(&self, videos: &[SceneVideo], mut on_status: F) -> MediaResult<String>
    where
        F: FnMut(&str),
    {
        let mut ordered: Vec<&SceneVideo> = videos.iter().collect();
        ordered.sort_by_key(|v| v.ordinal);

        match ordered.as_slice() {
            [] => return Err(MediaError::NoVideos),
            [only] => {
                info!("Only one scene video, skipping merge");
                return Ok(only.url.clone());
            }
            _ => {}
        }

        on_status("Checking media service...");
        self.ensure_available().await?;

        on_status("Sending videos for merging...");
        let request = MergeRequest {
            urls: ordered.iter().map(|v| v.url.as_str()).collect(),
        };
        let output = self.post_for_output("api/merge", &request).await?;

        info!(videos = ordered.len(), output_url = %output, "Scene videos merged");
        on_status("Video merge complete!");
        Ok(output)
    }

    /// Lay an audio track over a video.
    pub async fn merge_video_with_audio<F>(&self, video_url: &str, audio_url: &str, mut on_status: F) -> MediaResult<String>
    where
        F: FnMut(&str),
    {
        on_status("Checking media service...");
        self.ensure_available().await?;

        on_status("Merging video with audio...");
        let request = VideoAudioRequest { video_url, audio_url };
        let output = self.post_for_output("api/video-audio", &request).await?;

        info!(output_url = %output, "Video and audio merged");
        on_status("Merge complete!");
        Ok(output)
    }

    async fn post_for_output<T: Serialize>(&self, route: &str, body: &T) -> MediaResult<String> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, route))
            .header(TUNNEL_HEADER.0, TUNNEL_HEADER.1)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::from_body(status.as_u16(), &text));
        }

        let body: MergeResponse = response
            .json()
            .await
            .map_err(|e| MediaError::invalid_response(e.to_string()))?;

        body.output_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| MediaError::invalid_response("missing output_url"))
    }
}
