//! Narration tone presets offered with the brief.

use serde::Serialize;

/// A named narration tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TonePreset {
    pub id: &'static str,
    /// Label sent to the script generator
    pub name: &'static str,
    /// Delivery description attached to every generated scene
    pub emotion: &'static str,
}

pub const TONE_PRESETS: [TonePreset; 4] = [
    TonePreset {
        id: "calm-inspiring",
        name: "Calm & Inspiring",
        emotion: "calm, warm, softly inspiring, reflective narrator mood, gentle encouragement",
    },
    TonePreset {
        id: "adventurous-energetic",
        name: "Adventurous & Energetic",
        emotion: "energetic, excited, adventurous spirit, dynamic pacing, uplifting motivation",
    },
    TonePreset {
        id: "reflective-emotional",
        name: "Reflective & Emotional",
        emotion: "deeply reflective, emotional depth, introspective tone, thoughtful pauses, heartfelt",
    },
    TonePreset {
        id: "neutral-documentary",
        name: "Neutral Documentary",
        emotion: "neutral, clear, informative, professional narrator, steady documentary style",
    },
];

impl TonePreset {
    /// Look up a preset by id, falling back to the first one.
    pub fn find(id: &str) -> TonePreset {
        TONE_PRESETS
            .iter()
            .copied()
            .find(|p| p.id == id)
            .unwrap_or(TONE_PRESETS[0])
    }
}
