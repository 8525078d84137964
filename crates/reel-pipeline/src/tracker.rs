//! Per-scene job bookkeeping.
//!
//! One [`SceneJob`] per scene, replaced on every new attempt. Poll tasks
//! report back through [`SceneJobTracker::set_status`] with the job id they
//! were started for; a report for any other job id is stale and dropped.

use std::collections::HashMap;

use reel_models::{Scene, SceneId, SceneJob, SceneJobStatus};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// A status report for a scene's current job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Submitted { job_id: String },
    Completed { job_id: String, result_url: String },
    /// `job_id` is `None` when submission itself failed.
    Failed { job_id: Option<String>, error: String },
}

impl JobUpdate {
    fn target_status(&self) -> SceneJobStatus {
        match self {
            JobUpdate::Submitted { .. } => SceneJobStatus::Submitted,
            JobUpdate::Completed { .. } => SceneJobStatus::Completed,
            JobUpdate::Failed { .. } => SceneJobStatus::Failed,
        }
    }

    /// Job id the report is about, if any.
    fn reported_job(&self) -> Option<&str> {
        match self {
            JobUpdate::Submitted { .. } => None,
            JobUpdate::Completed { job_id, .. } => Some(job_id.as_str()),
            JobUpdate::Failed { job_id, .. } => job_id.as_deref(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SceneJobTracker {
    jobs: HashMap<SceneId, SceneJob>,
}

impl SceneJobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh Pending job for `scene`, replacing any earlier record.
    pub fn register_scene(&mut self, scene: &Scene) -> &SceneJob {
        let attempt = self.jobs.get(&scene.id).map_or(1, |job| job.attempt + 1);
        self.jobs.insert(scene.id.clone(), SceneJob::pending(attempt));
        &self.jobs[&scene.id]
    }

    /// Apply a status report.
    ///
    /// Returns `Ok(false)` when the report names a job that is no longer
    /// the scene's current one.
    pub fn set_status(&mut self, scene_id: &SceneId, update: JobUpdate) -> PipelineResult<bool> {
        let job = self
            .jobs
            .get_mut(scene_id)
            .ok_or_else(|| PipelineError::SceneNotFound(scene_id.clone()))?;

        if let Some(reported) = update.reported_job() {
            if !job.is_current(reported) {
                debug!(scene = %scene_id, job_id = %reported, "Ignoring stale job update");
                return Ok(false);
            }
        }

        let next = update.target_status();
        if !job.status.can_advance_to(next) {
            return Err(PipelineError::scene_state(
                scene_id,
                transition_action(next),
                job.status,
            ));
        }

        match update {
            JobUpdate::Submitted { job_id } => job.mark_submitted(job_id),
            JobUpdate::Completed { result_url, .. } => job.mark_completed(result_url),
            JobUpdate::Failed { error, .. } => job.mark_failed(error),
        }
        Ok(true)
    }

    /// Supersede a Failed job with a newly submitted one.
    pub fn retry(&mut self, scene_id: &SceneId, new_job_id: impl Into<String>) -> PipelineResult<&SceneJob> {
        let job = self
            .jobs
            .get_mut(scene_id)
            .ok_or_else(|| PipelineError::SceneNotFound(scene_id.clone()))?;
        if job.status != SceneJobStatus::Failed {
            return Err(PipelineError::scene_state(scene_id, "retry", job.status));
        }
        *job = job.superseding(new_job_id);
        Ok(job)
    }

    /// Move a Failed scene back to Pending under its next attempt.
    ///
    /// Claiming the scene before its replacement job is submitted leaves
    /// exactly one caller holding the retry.
    pub fn reopen(&mut self, scene_id: &SceneId) -> PipelineResult<&SceneJob> {
        let job = self
            .jobs
            .get_mut(scene_id)
            .ok_or_else(|| PipelineError::SceneNotFound(scene_id.clone()))?;
        if job.status != SceneJobStatus::Failed {
            return Err(PipelineError::scene_state(scene_id, "retry", job.status));
        }
        *job = SceneJob::pending(job.attempt + 1);
        Ok(job)
    }

    pub fn remove(&mut self, scene_id: &SceneId) -> Option<SceneJob> {
        self.jobs.remove(scene_id)
    }

    pub fn get(&self, scene_id: &SceneId) -> Option<&SceneJob> {
        self.jobs.get(scene_id)
    }

    pub fn status(&self, scene_id: &SceneId) -> Option<SceneJobStatus> {
        self.jobs.get(scene_id).map(|job| job.status)
    }

    /// Result URL of a Completed scene.
    pub fn result_url(&self, scene_id: &SceneId) -> Option<&str> {
        self.jobs
            .get(scene_id)
            .filter(|job| job.status == SceneJobStatus::Completed)
            .and_then(|job| job.result_url.as_deref())
    }

    /// True iff at least one scene is tracked and all of them completed.
    pub fn all_terminal_and_successful(&self) -> bool {
        !self.jobs.is_empty()
            && self
                .jobs
                .values()
                .all(|job| job.status == SceneJobStatus::Completed)
    }

    /// `(completed, total)` over tracked scenes.
    pub fn progress(&self) -> (usize, usize) {
        let completed = self
            .jobs
            .values()
            .filter(|job| job.status == SceneJobStatus::Completed)
            .count();
        (completed, self.jobs.len())
    }

    /// Scenes whose current job has not reached a terminal status.
    pub fn in_flight(&self) -> Vec<(SceneId, Option<String>)> {
        self.jobs
            .iter()
            .filter(|(_, job)| !job.status.is_terminal())
            .map(|(id, job)| (id.clone(), job.job_id.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

fn transition_action(next: SceneJobStatus) -> &'static str {
    match next {
        SceneJobStatus::Pending => "reset",
        SceneJobStatus::Submitted => "submit",
        SceneJobStatus::Completed => "complete",
        SceneJobStatus::Failed => "fail",
    }
}
