//! Request payloads for each generation backend.
//!
//! Each type serializes to the object placed under `"input"` in a submit
//! request.

use reel_models::{normalize_duration, EmotionProfile};
use serde::Serialize;

/// Text-to-video request for one scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRequest {
    pub prompt: String,
    pub size: String,
    /// Always one of the allowed scene durations
    pub duration: u32,
    pub num_inference_steps: u32,
    pub guidance: f32,
    pub seed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub enable_safety_checker: bool,
    pub enable_prompt_optimization: bool,
}

impl VideoRequest {
    /// Build a request, snapping `duration_secs` to an allowed value.
    pub fn new(prompt: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            prompt: prompt.into(),
            size: "1280*720".to_string(),
            duration: normalize_duration(duration_secs),
            num_inference_steps: 30,
            guidance: 5.0,
            seed: -1,
            negative_prompt: None,
            enable_safety_checker: true,
            enable_prompt_optimization: false,
        }
    }

    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        self.negative_prompt = (!negative.trim().is_empty()).then_some(negative);
        self
    }
}

/// Text-to-image request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            width: 720,
            height: 1024,
            num_inference_steps: 28,
            guidance_scale: 4.5,
        }
    }
}

/// Image-to-video request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageToVideoRequest {
    pub prompt: String,
    pub image_base64: String,
    pub frame_num: u32,
    pub sampling_steps: u32,
}

impl ImageToVideoRequest {
    pub fn new(prompt: impl Into<String>, image_base64: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_base64: image_base64.into(),
            frame_num: 21,
            sampling_steps: 6,
        }
    }
}

/// Emotion-conditioned speech request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub task: &'static str,
    pub text: String,
    /// URL of the reference speaker sample
    pub spk_url: String,
    /// Emotion weights as CSV
    pub emo_vector: String,
    pub use_random: bool,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, speaker_url: impl Into<String>, emotion: &EmotionProfile) -> Self {
        Self {
            task: "tts_emotion_vector",
            text: text.into(),
            spk_url: speaker_url.into(),
            emo_vector: emotion.to_csv(),
            use_random: false,
        }
    }
}

/// Foreground-over-background composition request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionRequest {
    pub foreground_image: String,
    pub background_image: String,
    pub shrink_pixels: u32,
}

impl CompositionRequest {
    pub fn new(foreground_base64: impl Into<String>, background_base64: impl Into<String>) -> Self {
        Self {
            foreground_image: foreground_base64.into(),
            background_image: background_base64.into(),
            shrink_pixels: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_video_request_normalizes_duration() {
        assert_eq!(VideoRequest::new("p", 6).duration, 5);
        assert_eq!(VideoRequest::new("p", 12).duration, 8);
    }

    #[test]
    fn test_video_request_wire_shape() {
        let value = serde_json::to_value(VideoRequest::new("sunrise", 8)).unwrap();
        assert_eq!(value["size"], "1280*720");
        assert_eq!(value["num_inference_steps"], 30);
        assert_eq!(value["seed"], -1);
        assert!(value.get("negative_prompt").is_none());

        let value =
            serde_json::to_value(VideoRequest::new("sunrise", 8).with_negative_prompt("blur")).unwrap();
        assert_eq!(value["negative_prompt"], "blur");
    }

    #[test]
    fn test_speech_request_uses_csv_vector() {
        let request = SpeechRequest::new("Hello", "https://s/voice.wav", &EmotionProfile::DEFAULT);
        let value = serde_json::to_value(request).unwrap();
        assert_eq!(
            value,
            json!({
                "task": "tts_emotion_vector",
                "text": "Hello",
                "spk_url": "https://s/voice.wav",
                "emo_vector": "0.3,0.1,0.2,0.1,0,0.2,0.1,0.5",
                "use_random": false
            })
        );
    }
}
