//! Pipeline configuration.

use std::time::Duration;

/// Scene planning and narration settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Longest scene the video service renders
    pub max_scene_secs: u32,
    /// Floor on planned scene count
    pub min_scenes: u32,
    /// Plan `testing_scene_count` scenes regardless of duration
    pub testing_mode: bool,
    pub testing_scene_count: u32,
    /// Default speaker sample for narration, overridden by an uploaded sample
    pub speaker_url: Option<String>,
    /// Largest accepted voice sample
    pub max_voice_sample_bytes: usize,
    /// Sent with every scene video request when set
    pub negative_prompt: Option<String>,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_scene_secs: 8,
            min_scenes: 5,
            testing_mode: false,
            testing_scene_count: 2,
            speaker_url: None,
            max_voice_sample_bytes: 10 * 1024 * 1024,
            negative_prompt: None,
            event_buffer: 256,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_scene_secs: std::env::var("PIPELINE_MAX_SCENE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_scene_secs),
            min_scenes: std::env::var("PIPELINE_MIN_SCENES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_scenes),
            testing_mode: std::env::var("PIPELINE_TESTING_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            testing_scene_count: std::env::var("PIPELINE_TESTING_SCENES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.testing_scene_count),
            speaker_url: std::env::var("TTS_SPEAKER_URL").ok().filter(|s| !s.is_empty()),
            max_voice_sample_bytes: std::env::var("PIPELINE_MAX_VOICE_SAMPLE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_voice_sample_bytes),
            negative_prompt: std::env::var("VIDEO_NEGATIVE_PROMPT").ok().filter(|s| !s.is_empty()),
            event_buffer: defaults.event_buffer,
        }
    }
}

/// Chat-completion service settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            request_timeout: std::env::var("OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}
