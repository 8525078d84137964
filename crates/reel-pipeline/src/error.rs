//! Pipeline error types.

use reel_models::{SceneId, Stage};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage gate closed: {0}")]
    GateClosed(String),

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Operation requires stage {expected}, run is at {actual}")]
    WrongStage { expected: Stage, actual: Stage },

    #[error("Scene not found: {0}")]
    SceneNotFound(SceneId),

    #[error("Scene {scene_id} cannot {action} while {status}")]
    SceneState {
        scene_id: SceneId,
        action: &'static str,
        status: String,
    },

    #[error("Run has no scenes")]
    NoScenes,

    #[error("Script generation failed: {0}")]
    ScriptGeneration(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("Invalid voice sample: {0}")]
    InvalidVoiceSample(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Job error: {0}")]
    Job(#[from] reel_jobs::JobError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),
}

impl PipelineError {
    pub fn gate_closed(msg: impl Into<String>) -> Self {
        Self::GateClosed(msg.into())
    }

    pub fn script_generation(msg: impl Into<String>) -> Self {
        Self::ScriptGeneration(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn scene_state(scene_id: &SceneId, action: &'static str, status: impl ToString) -> Self {
        Self::SceneState {
            scene_id: scene_id.clone(),
            action,
            status: status.to_string(),
        }
    }

    /// Check if error is a closed gate (operator must finish earlier work).
    pub fn is_gate_closed(&self) -> bool {
        matches!(self, PipelineError::GateClosed(_))
    }

    /// Check if the run was abandoned while this operation was in flight.
    pub fn is_cancelled(&self) -> bool {
        match self {
            PipelineError::Cancelled => true,
            PipelineError::Job(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
