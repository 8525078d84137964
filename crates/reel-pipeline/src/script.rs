//! Scene-script generation.
//!
//! The generator turns a brief into an ordered scene list. Model output is
//! treated as untrusted: the scene array may sit at the root or under
//! `scenes` / `data`, and every missing field gets a default.

use std::sync::Arc;

use async_trait::async_trait;
use reel_models::{Scene, SceneId, DEFAULT_TRANSITION_IN, DEFAULT_TRANSITION_OUT};
use serde_json::Value;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::llm::{strip_code_fence, ChatCompletion, ChatRequest};
use crate::transitions::harmonize_transitions;

/// Inputs for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRequest {
    pub idea: String,
    pub target_secs: u32,
    /// Display name of the narration tone
    pub tone_label: String,
    pub scene_count: u32,
    pub max_scene_secs: u32,
}

/// Produces scenes for a brief.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Generate scenes in narrative order. Ordinals are reassigned by the run.
    async fn generate(&self, request: &ScriptRequest) -> PipelineResult<Vec<Scene>>;
}

/// [`ScriptGenerator`] backed by a chat-completion model in JSON mode.
pub struct LlmScriptGenerator {
    chat: Arc<dyn ChatCompletion>,
}

impl LlmScriptGenerator {
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl ScriptGenerator for LlmScriptGenerator {
    async fn generate(&self, request: &ScriptRequest) -> PipelineResult<Vec<Scene>> {
        info!(
            scene_count = request.scene_count,
            target_secs = request.target_secs,
            tone = %request.tone_label,
            "Generating scene script"
        );

        let chat_request = ChatRequest::new(system_prompt(request), user_prompt(request))
            .temperature(0.8)
            .max_tokens(8000)
            .json();

        let content = self
            .chat
            .complete(chat_request)
            .await
            .map_err(|e| PipelineError::script_generation(e.to_string()))?;

        let scenes = parse_scenes(&content, request.max_scene_secs)?;
        Ok(harmonize_transitions(self.chat.as_ref(), scenes).await)
    }
}

fn system_prompt(request: &ScriptRequest) -> String {
    format!(
        "You are a cinematographer writing prompts for an AI video model. \
Break the story into exactly {count} scenes that play as one continuous film.

Rules:
1. Every scene lasts either 5 or 8 seconds; the total is about {target} seconds.
2. Characters, props, vehicles, location and color grading are described identically in every scene. \
Only expressions, body language, weather and time of day may progress.
3. Scene N's \"transitionOut\" and scene N+1's \"transitionIn\" describe the same motion, gaze or element \
with the same key phrases (direction, subject, speed).
4. \"detailedPrompt\" is sent verbatim to the video model: 250-350 words covering characters, environment, \
exact color palette, lighting setup, action, atmosphere and composition.
5. \"audioScript\" is voiceover text for speech synthesis in a {tone} tone: 2-4 short phrases, \
each followed by an ellipsis and placed on its own line.

Return ONLY a JSON object with a \"scenes\" array.",
        count = request.scene_count,
        target = request.target_secs,
        tone = request.tone_label,
    )
}

fn user_prompt(request: &ScriptRequest) -> String {
    format!(
        "Create {count} cinematic scenes for this story:\n\n\"{idea}\"\n\n\
Return JSON shaped like:\n\
{{\"scenes\": [{{\"sceneNumber\": 1, \"title\": \"...\", \"duration\": 5, \
\"visualDescription\": \"2-3 sentence overview\", \"detailedPrompt\": \"...\", \
\"transitionIn\": \"...\", \"transitionOut\": \"...\", \"cameraWork\": \"...\", \
\"lighting\": \"...\", \"colorGrading\": \"...\", \"audioScript\": \"...\"}}]}}",
        count = request.scene_count,
        idea = request.idea,
    )
}

/// Parse model output into scenes, defaulting every missing field.
pub fn parse_scenes(content: &str, max_scene_secs: u32) -> PipelineResult<Vec<Scene>> {
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| PipelineError::script_generation(format!("response is not JSON: {}", e)))?;

    let entries = scene_array(&value)
        .ok_or_else(|| PipelineError::script_generation("no scene array in response"))?;

    if entries.is_empty() {
        return Err(PipelineError::script_generation("response contained no scenes"));
    }

    let max_secs = max_scene_secs.max(1);
    let scenes = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| scene_from_value(entry, index, max_secs))
        .collect();
    Ok(scenes)
}

/// The scene array at the root, or under `scenes` or `data`.
pub(crate) fn scene_array(value: &Value) -> Option<&Vec<Value>> {
    value
        .as_array()
        .or_else(|| value.get("scenes").and_then(Value::as_array))
        .or_else(|| value.get("data").and_then(Value::as_array))
}

fn scene_from_value(entry: &Value, index: usize, max_secs: u32) -> Scene {
    let fallback_number = index as u32 + 1;
    let ordinal = entry
        .get("sceneNumber")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .map(|n| n as u32)
        .unwrap_or(fallback_number);

    let duration = entry
        .get("duration")
        .and_then(Value::as_f64)
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| (d.round() as u32).clamp(1, max_secs))
        .unwrap_or(max_secs);

    let title = first_text(entry, &["title"]).unwrap_or_else(|| format!("Scene {fallback_number}"));

    Scene {
        id: SceneId::new(),
        ordinal,
        title,
        duration_secs: duration,
        visual_description: first_text(entry, &["visualDescription"]).unwrap_or_default(),
        detailed_prompt: first_text(entry, &["detailedPrompt", "prompt"]).unwrap_or_default(),
        transition_in: first_text(entry, &["transitionIn"])
            .unwrap_or_else(|| DEFAULT_TRANSITION_IN.to_string()),
        transition_out: first_text(entry, &["transitionOut"])
            .unwrap_or_else(|| DEFAULT_TRANSITION_OUT.to_string()),
        camera_work: first_text(entry, &["cameraWork", "camera"]).unwrap_or_default(),
        lighting: first_text(entry, &["lighting"]).unwrap_or_default(),
        color_grading: first_text(entry, &["colorGrading", "colorPalette"]).unwrap_or_default(),
        narration_script: first_text(entry, &["audioScript", "voiceover", "narration"])
            .unwrap_or_default(),
        tone: String::new(),
    }
}

/// First non-empty string among `keys`.
pub(crate) fn first_text(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| entry.get(k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
