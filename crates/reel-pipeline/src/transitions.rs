//! Scene-to-scene transition continuity.
//!
//! Adjacent scenes should hand off on the same motion or gaze. Pairs whose
//! hints share no movement keyword are sent back to the model once; the
//! originals survive any failure of that repair call.

use reel_models::Scene;
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{strip_code_fence, ChatCompletion, ChatRequest};
use crate::script::{first_text, scene_array};

const MOVEMENT_KEYWORDS: [&str; 10] = [
    "forward", "left", "right", "up", "down", "zoom", "pan", "turn", "look", "gaze",
];

const REPAIR_SYSTEM_PROMPT: &str =
    "You are a professional video editor specializing in seamless scene transitions.";

/// A consecutive pair whose hints do not share a movement keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionGap {
    pub from_ordinal: u32,
    pub to_ordinal: u32,
}

/// Whether `transition_out` of one scene and `transition_in` of the next
/// mention a common movement keyword.
pub fn hints_connect(transition_out: &str, transition_in: &str) -> bool {
    let out = transition_out.to_lowercase();
    let inn = transition_in.to_lowercase();
    MOVEMENT_KEYWORDS
        .iter()
        .any(|kw| out.contains(kw) && inn.contains(kw))
}

/// Every adjacent pair whose hints fail [`hints_connect`].
pub fn find_gaps(scenes: &[Scene]) -> Vec<TransitionGap> {
    scenes
        .windows(2)
        .filter(|pair| !hints_connect(&pair[0].transition_out, &pair[1].transition_in))
        .map(|pair| TransitionGap {
            from_ordinal: pair[0].ordinal,
            to_ordinal: pair[1].ordinal,
        })
        .collect()
}

/// Repair disconnected transitions with one model call.
///
/// Returns the scenes unchanged when every pair already connects or when
/// the repair call fails.
pub async fn harmonize_transitions(chat: &dyn ChatCompletion, mut scenes: Vec<Scene>) -> Vec<Scene> {
    let gaps = find_gaps(&scenes);
    if gaps.is_empty() {
        return scenes;
    }

    info!(gaps = gaps.len(), "Repairing scene transitions");

    let request = ChatRequest::new(REPAIR_SYSTEM_PROMPT, repair_prompt(&scenes, &gaps))
        .temperature(0.7)
        .max_tokens(2000)
        .json();

    let reply = match chat.complete(request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Transition repair failed, keeping original hints: {}", e);
            return scenes;
        }
    };

    match serde_json::from_str::<Value>(strip_code_fence(&reply)) {
        Ok(value) => {
            let applied = apply_repairs(&mut scenes, &value);
            info!(applied, "Transition repairs applied");
        }
        Err(e) => warn!("Transition repair reply is not JSON: {}", e),
    }
    scenes
}

/// Overwrite hints from a repair reply, matched on `sceneNumber`.
/// Empty fields leave the existing hint in place. Returns how many scenes changed.
pub fn apply_repairs(scenes: &mut [Scene], reply: &Value) -> usize {
    let entries = reply
        .get("transitions")
        .and_then(Value::as_array)
        .or_else(|| scene_array(reply));
    let Some(entries) = entries else {
        return 0;
    };

    let mut changed = 0;
    for entry in entries {
        let Some(number) = entry.get("sceneNumber").and_then(Value::as_u64) else {
            continue;
        };
        let Some(scene) = scenes.iter_mut().find(|s| u64::from(s.ordinal) == number) else {
            continue;
        };
        let mut touched = false;
        if let Some(hint) = first_text(entry, &["transitionIn"]) {
            scene.transition_in = hint;
            touched = true;
        }
        if let Some(hint) = first_text(entry, &["transitionOut"]) {
            scene.transition_out = hint;
            touched = true;
        }
        if touched {
            changed += 1;
        }
    }
    changed
}

fn repair_prompt(scenes: &[Scene], gaps: &[TransitionGap]) -> String {
    let listing = scenes
        .iter()
        .map(|s| {
            format!(
                "Scene {}: {}\n  transitionIn: {}\n  transitionOut: {}",
                s.ordinal, s.title, s.transition_in, s.transition_out
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let broken = gaps
        .iter()
        .map(|g| format!("{} -> {}", g.from_ordinal, g.to_ordinal))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "These scenes play back to back. The hand-offs {broken} do not connect.\n\n{listing}\n\n\
Rewrite transitionOut of each earlier scene and transitionIn of the following scene so both \
describe the same camera movement, direction or gaze using identical key words \
(forward, left, right, up, down, zoom, pan, turn, look, gaze).\n\
Return JSON: {{\"transitions\": [{{\"sceneNumber\": 1, \"transitionIn\": \"...\", \"transitionOut\": \"...\"}}]}}"
    )
}
