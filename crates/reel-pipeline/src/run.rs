//! The pipeline run aggregate.
//!
//! Readers get `&self` accessors; every mutation is crate-internal and goes
//! through the stage controller.

use reel_models::{RunId, Scene, SceneId, Stage};

use crate::error::{PipelineError, PipelineResult};
use crate::storyboard::Brief;

/// Field-level edit of a scene. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneEdit {
    pub title: Option<String>,
    pub duration_secs: Option<u32>,
    pub visual_description: Option<String>,
    pub detailed_prompt: Option<String>,
    pub transition_in: Option<String>,
    pub transition_out: Option<String>,
    pub camera_work: Option<String>,
    pub lighting: Option<String>,
    pub color_grading: Option<String>,
    pub narration_script: Option<String>,
}

impl SceneEdit {
    fn apply(self, scene: &mut Scene) {
        if let Some(v) = self.title {
            scene.title = v;
        }
        if let Some(v) = self.duration_secs {
            scene.duration_secs = v;
        }
        if let Some(v) = self.visual_description {
            scene.visual_description = v;
        }
        if let Some(v) = self.detailed_prompt {
            scene.detailed_prompt = v;
        }
        if let Some(v) = self.transition_in {
            scene.transition_in = v;
        }
        if let Some(v) = self.transition_out {
            scene.transition_out = v;
        }
        if let Some(v) = self.camera_work {
            scene.camera_work = v;
        }
        if let Some(v) = self.lighting {
            scene.lighting = v;
        }
        if let Some(v) = self.color_grading {
            scene.color_grading = v;
        }
        if let Some(v) = self.narration_script {
            scene.narration_script = v;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    id: RunId,
    brief: Option<Brief>,
    scenes: Vec<Scene>,
    stage: Stage,
    combined_video: Option<String>,
    narration_audio: Option<String>,
    speaker_url: Option<String>,
    final_video: Option<String>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn brief(&self) -> Option<&Brief> {
        self.brief.as_ref()
    }

    /// Scenes in ordinal order.
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, scene_id: &SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| &s.id == scene_id)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn combined_video(&self) -> Option<&str> {
        self.combined_video.as_deref()
    }

    pub fn narration_audio(&self) -> Option<&str> {
        self.narration_audio.as_deref()
    }

    /// Uploaded speaker sample, if the operator provided one.
    pub fn speaker_url(&self) -> Option<&str> {
        self.speaker_url.as_deref()
    }

    pub fn final_video(&self) -> Option<&str> {
        self.final_video.as_deref()
    }

    pub(crate) fn require_stage(&self, expected: Stage) -> PipelineResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(PipelineError::WrongStage {
                expected,
                actual: self.stage,
            })
        }
    }

    /// Move one stage forward. Returns the stage left behind.
    pub(crate) fn advance_to(&mut self, next: Stage) -> PipelineResult<Stage> {
        if self.stage.next() != Some(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        let previous = self.stage;
        self.stage = next;
        Ok(previous)
    }

    pub(crate) fn set_brief(&mut self, brief: Brief) {
        self.brief = Some(brief);
    }

    /// Replace all scenes, assigning ordinals `1..=N` in the given order.
    pub(crate) fn set_scenes(&mut self, scenes: Vec<Scene>) {
        self.scenes = scenes;
        self.renumber();
    }

    pub(crate) fn edit_scene(&mut self, scene_id: &SceneId, edit: SceneEdit) -> PipelineResult<&Scene> {
        let scene = self.scene_mut(scene_id)?;
        edit.apply(scene);
        Ok(scene)
    }

    /// Swap in new content for a scene, keeping its id, ordinal and tone.
    pub(crate) fn replace_scene(&mut self, scene_id: &SceneId, mut replacement: Scene) -> PipelineResult<&Scene> {
        let scene = self.scene_mut(scene_id)?;
        replacement.id = scene.id.clone();
        replacement.ordinal = scene.ordinal;
        replacement.tone = std::mem::take(&mut scene.tone);
        if replacement.narration_script.trim().is_empty() {
            replacement.narration_script = std::mem::take(&mut scene.narration_script);
        }
        *scene = replacement;
        Ok(scene)
    }

    /// Append a copy of a scene with the next ordinal.
    pub(crate) fn duplicate_scene(&mut self, scene_id: &SceneId) -> PipelineResult<&Scene> {
        let next_ordinal = self.scenes.len() as u32 + 1;
        let copy = self
            .scene(scene_id)
            .ok_or_else(|| PipelineError::SceneNotFound(scene_id.clone()))?
            .duplicate(next_ordinal);
        self.scenes.push(copy);
        Ok(&self.scenes[self.scenes.len() - 1])
    }

    /// Remove a scene and close the ordinal gap.
    pub(crate) fn remove_scene(&mut self, scene_id: &SceneId) -> PipelineResult<Scene> {
        let index = self
            .scenes
            .iter()
            .position(|s| &s.id == scene_id)
            .ok_or_else(|| PipelineError::SceneNotFound(scene_id.clone()))?;
        let removed = self.scenes.remove(index);
        self.renumber();
        Ok(removed)
    }

    pub(crate) fn set_combined_video(&mut self, url: impl Into<String>) {
        self.combined_video = Some(url.into());
    }

    pub(crate) fn set_narration_audio(&mut self, url: impl Into<String>) {
        self.narration_audio = Some(url.into());
    }

    pub(crate) fn set_speaker_url(&mut self, url: impl Into<String>) {
        self.speaker_url = Some(url.into());
    }

    pub(crate) fn set_final_video(&mut self, url: impl Into<String>) {
        self.final_video = Some(url.into());
    }

    fn scene_mut(&mut self, scene_id: &SceneId) -> PipelineResult<&mut Scene> {
        self.scenes
            .iter_mut()
            .find(|s| &s.id == scene_id)
            .ok_or_else(|| PipelineError::SceneNotFound(scene_id.clone()))
    }

    fn renumber(&mut self) {
        for (index, scene) in self.scenes.iter_mut().enumerate() {
            scene.ordinal = index as u32 + 1;
        }
    }
}
