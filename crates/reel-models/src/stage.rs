//! Pipeline stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Phase of a pipeline run. Ordered; a run only moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Brief collected, no scenes yet
    #[default]
    Idea,
    /// Scene list exists and is editable
    Storyboard,
    /// Scene videos are being generated
    VideoGeneration,
    /// Narration is being produced
    Audio,
    /// Final video assembled
    Final,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idea => "idea",
            Stage::Storyboard => "storyboard",
            Stage::VideoGeneration => "video_generation",
            Stage::Audio => "audio",
            Stage::Final => "final",
        }
    }

    /// The stage after this one, if any.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Idea => Some(Stage::Storyboard),
            Stage::Storyboard => Some(Stage::VideoGeneration),
            Stage::VideoGeneration => Some(Stage::Audio),
            Stage::Audio => Some(Stage::Final),
            Stage::Final => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Final)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
