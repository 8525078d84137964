//! Narration emotion analysis.

use std::sync::Arc;

use reel_models::EmotionProfile;
use tracing::{info, warn};

use crate::llm::{ChatCompletion, ChatRequest};

const SYSTEM_PROMPT: &str = "You are a professional voice director and emotion analyst. \
Analyze narration scripts to create natural, authentic emotion profiles. \
Focus on 1-2 primary emotions that define the delivery style. \
Return ONLY 8 comma-separated decimal numbers (0.0 to 1.0) representing emotion intensities: \
[happy, angry, sad, afraid, disgusted, melancholic, surprised, calm]. No explanations.";

/// Derives an [`EmotionProfile`] for a narration script.
///
/// Analysis never blocks narration: every failure yields
/// [`EmotionProfile::DEFAULT`].
#[derive(Clone)]
pub struct EmotionAnalyzer {
    chat: Arc<dyn ChatCompletion>,
}

impl EmotionAnalyzer {
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat }
    }

    pub async fn infer(&self, script: &str, scene_context: Option<&str>) -> EmotionProfile {
        let request = ChatRequest::new(SYSTEM_PROMPT, build_prompt(script, scene_context))
            .temperature(0.7)
            .max_tokens(50);

        let reply = match self.chat.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Emotion analysis failed, using default profile: {}", e);
                return EmotionProfile::DEFAULT;
            }
        };

        match EmotionProfile::parse_csv(&reply) {
            Some(profile) => {
                info!(emotion = %profile, "Emotion profile derived");
                profile
            }
            None => {
                warn!(reply = %reply, "Malformed emotion vector, using default profile");
                EmotionProfile::DEFAULT
            }
        }
    }
}

fn build_prompt(script: &str, scene_context: Option<&str>) -> String {
    let context = scene_context
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("Context: {c}\n\n"))
        .unwrap_or_default();

    format!(
        "Analyze the following narration script to determine the PRIMARY emotional tone and delivery style. \
Consider the narrative context, pacing, and intended mood.

Emotion Vector Format: [happy, angry, sad, afraid, disgusted, melancholic, surprised, calm]

Guidelines:
- Natural narration should emphasize ONE or TWO primary emotions (0.5-0.8 range)
- Keep other emotions low (0.0-0.3) for authenticity
- For reflective/contemplative narration: emphasize calm (0.6-0.8) and melancholic (0.3-0.5)
- For exciting/energetic content: emphasize happy (0.5-0.7) and surprised (0.3-0.5)
- For serious/dramatic content: emphasize melancholic (0.5-0.7) and calm (0.4-0.6)
- Avoid mixing conflicting emotions (e.g., high happy + high sad)

{context}Script: {script}

Return ONLY 8 comma-separated numbers (0.0-1.0):"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, PipelineResult};
    use async_trait::async_trait;

    struct Canned(PipelineResult<String>);

    #[async_trait]
    impl ChatCompletion for Canned {
        async fn complete(&self, request: ChatRequest) -> PipelineResult<String> {
            assert_eq!(request.max_tokens, 50);
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(PipelineError::llm(e.to_string())),
            }
        }
    }

    fn analyzer(reply: PipelineResult<String>) -> EmotionAnalyzer {
        EmotionAnalyzer::new(Arc::new(Canned(reply)))
    }

    #[tokio::test]
    async fn test_valid_reply_is_used() {
        let profile = analyzer(Ok("0.6,0,0.1,0,0,0.4,0.1,0.7".into()))
            .infer("The mountains call", None)
            .await;
        assert_eq!(profile.weights()[0], 0.6);
        assert_eq!(profile.weights()[7], 0.7);
    }

    #[tokio::test]
    async fn test_wrong_count_falls_back() {
        let profile = analyzer(Ok("0.6,0.1,0.2".into())).infer("x", Some("ctx")).await;
        assert_eq!(profile, EmotionProfile::DEFAULT);
    }

    #[tokio::test]
    async fn test_non_numeric_falls_back() {
        let profile = analyzer(Ok("calm and happy".into())).infer("x", None).await;
        assert_eq!(profile, EmotionProfile::DEFAULT);
    }

    #[tokio::test]
    async fn test_request_failure_falls_back() {
        let profile = analyzer(Err(PipelineError::llm("timeout"))).infer("x", None).await;
        assert_eq!(profile.weights().len(), 8);
        assert_eq!(profile, EmotionProfile::DEFAULT);
    }

    #[test]
    fn test_prompt_includes_context_only_when_present() {
        assert!(build_prompt("s", Some("Scene 1: a - b")).contains("Context: Scene 1: a - b"));
        assert!(!build_prompt("s", None).contains("Context:"));
    }
}
