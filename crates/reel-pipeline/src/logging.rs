//! Structured scene logging.
//!
//! Every line carries the scene, its ordinal and the operation, plus the
//! job attempt and remote job id once they are known.

use reel_models::{Scene, SceneJob};
use tracing::{error, info, warn, Span};

const NO_JOB: &str = "-";

#[derive(Debug, Clone)]
pub struct SceneLogger {
    scene_id: String,
    ordinal: u32,
    operation: &'static str,
    attempt: u32,
    job_id: Option<String>,
}

impl SceneLogger {
    pub fn new(scene: &Scene, operation: &'static str) -> Self {
        Self {
            scene_id: scene.id.to_string(),
            ordinal: scene.ordinal,
            operation,
            attempt: 0,
            job_id: None,
        }
    }

    /// Attach the scene's current job record.
    pub fn with_job(mut self, job: &SceneJob) -> Self {
        self.attempt = job.attempt;
        self.job_id = job.job_id.clone();
        self
    }

    /// Record the remote id once a submission is accepted.
    pub fn set_job_id(&mut self, job_id: impl Into<String>) {
        self.job_id = Some(job_id.into());
    }

    fn job(&self) -> &str {
        self.job_id.as_deref().unwrap_or(NO_JOB)
    }

    pub fn log_start(&self, message: &str) {
        info!(
            scene = %self.scene_id,
            ordinal = self.ordinal,
            operation = self.operation,
            attempt = self.attempt,
            job_id = %self.job(),
            "Scene started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            scene = %self.scene_id,
            ordinal = self.ordinal,
            operation = self.operation,
            job_id = %self.job(),
            "Scene progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            scene = %self.scene_id,
            ordinal = self.ordinal,
            operation = self.operation,
            attempt = self.attempt,
            job_id = %self.job(),
            "Scene warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            scene = %self.scene_id,
            ordinal = self.ordinal,
            operation = self.operation,
            attempt = self.attempt,
            job_id = %self.job(),
            "Scene error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            scene = %self.scene_id,
            ordinal = self.ordinal,
            operation = self.operation,
            attempt = self.attempt,
            job_id = %self.job(),
            "Scene completed: {}", message
        );
    }

    /// Span for a poll task, so job client logs carry the scene.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "scene",
            scene = %self.scene_id,
            ordinal = self.ordinal,
            attempt = self.attempt,
            job_id = %self.job()
        )
    }
}
