//! Events broadcast to pipeline observers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{SceneId, SceneJobStatus, Stage};

/// Pipeline event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Run moved to a new stage
    StageChanged { from: Stage, to: Stage },

    /// A scene's job record changed status
    SceneStatus {
        scene_id: SceneId,
        ordinal: u32,
        status: SceneJobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// One poll tick of a remote job
    JobProgress {
        /// Scene being generated, absent for run-level jobs (narration, images)
        #[serde(skip_serializing_if = "Option::is_none")]
        scene_id: Option<SceneId>,
        job_id: String,
        remote_status: String,
    },

    /// Free-form status line
    Log {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Operator-visible error
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Final video ready
    Done { output_url: String },
}

impl PipelineEvent {
    pub fn log(message: impl Into<String>) -> Self {
        PipelineEvent::Log {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PipelineEvent::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
