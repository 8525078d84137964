//! Scene definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Transition-in hint used when the script generator supplies none.
pub const DEFAULT_TRANSITION_IN: &str = "Scene begins";

/// Transition-out hint used when the script generator supplies none.
pub const DEFAULT_TRANSITION_OUT: &str = "Scene ends";

/// Unique identifier for a scene. Stable across renumbering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    /// Generate a new random scene ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One narrative unit of a run, rendered as its own video clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Stable identifier
    pub id: SceneId,
    /// 1-based position in the run, dense
    pub ordinal: u32,
    pub title: String,
    /// Requested duration in seconds (normalized at submission)
    pub duration_secs: u32,
    /// Short description of what the viewer sees
    pub visual_description: String,
    /// Full prompt for the video model
    pub detailed_prompt: String,
    pub transition_in: String,
    pub transition_out: String,
    #[serde(default)]
    pub camera_work: String,
    #[serde(default)]
    pub lighting: String,
    #[serde(default)]
    pub color_grading: String,
    /// Narration spoken over this scene
    #[serde(default)]
    pub narration_script: String,
    /// Emotion/tone tag for narration delivery
    #[serde(default)]
    pub tone: String,
}

impl Scene {
    /// Create a scene with default transitions and empty notes.
    pub fn new(ordinal: u32, title: impl Into<String>, detailed_prompt: impl Into<String>) -> Self {
        Self {
            id: SceneId::new(),
            ordinal,
            title: title.into(),
            duration_secs: 8,
            visual_description: String::new(),
            detailed_prompt: detailed_prompt.into(),
            transition_in: DEFAULT_TRANSITION_IN.to_string(),
            transition_out: DEFAULT_TRANSITION_OUT.to_string(),
            camera_work: String::new(),
            lighting: String::new(),
            color_grading: String::new(),
            narration_script: String::new(),
            tone: String::new(),
        }
    }

    pub fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn with_transitions(mut self, transition_in: impl Into<String>, transition_out: impl Into<String>) -> Self {
        self.transition_in = transition_in.into();
        self.transition_out = transition_out.into();
        self
    }

    pub fn with_narration(mut self, script: impl Into<String>) -> Self {
        self.narration_script = script.into();
        self
    }

    /// Whether the transition-in hint carries information beyond the default.
    pub fn has_custom_transition_in(&self) -> bool {
        is_custom_hint(&self.transition_in, DEFAULT_TRANSITION_IN)
    }

    /// Whether the transition-out hint carries information beyond the default.
    pub fn has_custom_transition_out(&self) -> bool {
        is_custom_hint(&self.transition_out, DEFAULT_TRANSITION_OUT)
    }

    /// Copy of this scene under a fresh id, titled as a copy.
    pub fn duplicate(&self, ordinal: u32) -> Self {
        Self {
            id: SceneId::new(),
            ordinal,
            title: format!("{} (Copy)", self.title),
            ..self.clone()
        }
    }
}

fn is_custom_hint(hint: &str, default: &str) -> bool {
    let trimmed = hint.trim();
    !trimmed.is_empty() && trimmed != default
}
