//! Stage controller for a pipeline run.
//!
//! The controller owns the run aggregate and the scene job tracker and is
//! the only writer of either. Scene videos are submitted one at a time in
//! ordinal order; each submitted job then gets its own poll task, tied to
//! the run's cancellation token through a child token.
//!
//! Lock order is run before tracker. Poll tasks never hold both.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use reel_jobs::{
    CancellationToken, JobClient, PollPolicies, RemoteStatus, ServiceEndpoints, SpeechRequest,
    VideoRequest,
};
use reel_media::{MediaAssembler, ObjectStorageClient, SceneVideo};
use reel_models::{PipelineEvent, Scene, SceneId, SceneJob, SceneJobStatus, Stage};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::compose::{ComposedImage, ImageComposer};
use crate::config::{LlmConfig, PipelineConfig};
use crate::emotion::EmotionAnalyzer;
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{ChatCompletion, OpenAiChatClient};
use crate::logging::SceneLogger;
use crate::prompt::{CharacterTraits, EnvironmentTraits, PromptCompiler};
use crate::run::{PipelineRun, SceneEdit};
use crate::script::{LlmScriptGenerator, ScriptGenerator, ScriptRequest};
use crate::storyboard::{plan_scene_count, Brief};
use crate::tracker::{JobUpdate, SceneJobTracker};

/// External collaborators of a run.
pub struct PipelineServices {
    pub jobs: JobClient,
    pub endpoints: ServiceEndpoints,
    pub policies: PollPolicies,
    pub scripts: Arc<dyn ScriptGenerator>,
    pub emotion: EmotionAnalyzer,
    pub media: MediaAssembler,
    pub storage: ObjectStorageClient,
}

impl PipelineServices {
    /// Build every client from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        let chat: Arc<dyn ChatCompletion> = Arc::new(OpenAiChatClient::new(LlmConfig::from_env())?);
        Ok(Self {
            jobs: JobClient::from_env()?,
            endpoints: ServiceEndpoints::from_env(),
            policies: PollPolicies::from_env(),
            scripts: Arc::new(LlmScriptGenerator::new(Arc::clone(&chat))),
            emotion: EmotionAnalyzer::new(chat),
            media: MediaAssembler::from_env()?,
            storage: ObjectStorageClient::from_env()?,
        })
    }

    pub fn image_composer(&self) -> ImageComposer {
        ImageComposer::new(
            self.jobs.clone(),
            self.endpoints.clone(),
            self.policies.clone(),
            self.storage.clone(),
        )
    }
}

/// State shared with poll tasks.
struct Shared {
    run: Mutex<PipelineRun>,
    tracker: Mutex<SceneJobTracker>,
    events: broadcast::Sender<PipelineEvent>,
}

impl Shared {
    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Apply a job update and announce the scene's new status.
    async fn record(&self, scene_id: &SceneId, update: JobUpdate) -> PipelineResult<bool> {
        let job = {
            let mut tracker = self.tracker.lock().await;
            if !tracker.set_status(scene_id, update)? {
                return Ok(false);
            }
            tracker.get(scene_id).cloned()
        };
        if let Some(job) = job {
            self.announce(scene_id, &job).await;
        }
        Ok(true)
    }

    async fn announce(&self, scene_id: &SceneId, job: &SceneJob) {
        let ordinal = self
            .run
            .lock()
            .await
            .scene(scene_id)
            .map_or(0, |scene| scene.ordinal);
        let detail = match job.status {
            SceneJobStatus::Completed => job.result_url.clone(),
            SceneJobStatus::Failed => job.error.clone(),
            _ => None,
        };
        self.emit(PipelineEvent::SceneStatus {
            scene_id: scene_id.clone(),
            ordinal,
            status: job.status,
            job_id: job.job_id.clone(),
            detail,
        });
    }
}

/// How a scene's job record is opened before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    /// First submission of a scene in the video stage
    Initial,
    /// A Failed scene, operator-triggered
    Retry,
    /// Any scene without a job in flight
    Resubmit,
}

struct ScenePoll {
    cancel: CancellationToken,
    /// Taken by whoever waits on the task
    handle: Option<JoinHandle<()>>,
}

pub struct PipelineStageController {
    services: Arc<PipelineServices>,
    config: PipelineConfig,
    shared: Arc<Shared>,
    root: Mutex<CancellationToken>,
    polls: Mutex<HashMap<SceneId, ScenePoll>>,
}

impl PipelineStageController {
    pub fn new(services: PipelineServices, config: PipelineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            services: Arc::new(services),
            config,
            shared: Arc::new(Shared {
                run: Mutex::new(PipelineRun::new()),
                tracker: Mutex::new(SceneJobTracker::new()),
                events,
            }),
            root: Mutex::new(CancellationToken::new()),
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    /// Copy of the run as it stands.
    pub async fn snapshot(&self) -> PipelineRun {
        self.shared.run.lock().await.clone()
    }

    pub async fn stage(&self) -> Stage {
        self.shared.run.lock().await.stage()
    }

    pub async fn scene_job(&self, scene_id: &SceneId) -> Option<SceneJob> {
        self.shared.tracker.lock().await.get(scene_id).cloned()
    }

    // ========================================================================
    // Storyboard
    // ========================================================================

    /// Plan and generate scenes for a brief. Idea → Storyboard.
    pub async fn generate_storyboard(&self, brief: Brief) -> PipelineResult<Vec<Scene>> {
        self.shared.run.lock().await.require_stage(Stage::Idea)?;

        let scene_count = plan_scene_count(brief.target_secs, &self.config);
        let request = ScriptRequest {
            idea: brief.idea.clone(),
            target_secs: brief.target_secs,
            tone_label: brief.tone.name.to_string(),
            scene_count,
            max_scene_secs: self.config.max_scene_secs,
        };
        self.shared.emit(PipelineEvent::log(format!(
            "Generating {} scenes for a {}s video",
            scene_count, brief.target_secs
        )));

        let mut scenes = self.generate_script(&request).await?;
        if scenes.is_empty() {
            return Err(PipelineError::NoScenes);
        }
        scenes.sort_by_key(|scene| scene.ordinal);
        let max_secs = self.config.max_scene_secs.max(1);
        for scene in &mut scenes {
            scene.tone = brief.tone.emotion.to_string();
            scene.duration_secs = match scene.duration_secs {
                0 => max_secs,
                secs => secs.min(max_secs),
            };
        }

        let mut run = self.shared.run.lock().await;
        run.require_stage(Stage::Idea)?;
        run.set_brief(brief);
        run.set_scenes(scenes);
        self.advance(&mut run, Stage::Storyboard)?;
        info!(run = %run.id(), scenes = run.scenes().len(), "Storyboard ready");
        Ok(run.scenes().to_vec())
    }

    pub async fn edit_scene(&self, scene_id: &SceneId, edit: SceneEdit) -> PipelineResult<Scene> {
        let mut run = self.shared.run.lock().await;
        require_editable(&run)?;
        Ok(run.edit_scene(scene_id, edit)?.clone())
    }

    /// Ask the script generator for a different take on one scene.
    ///
    /// The scene keeps its id, ordinal and tone. Its job record is left
    /// alone; resubmit the scene to render the new version.
    pub async fn regenerate_scene(&self, scene_id: &SceneId) -> PipelineResult<Scene> {
        let request = {
            let run = self.shared.run.lock().await;
            require_editable(&run)?;
            let scene = run
                .scene(scene_id)
                .ok_or_else(|| PipelineError::SceneNotFound(scene_id.clone()))?;
            let tone_label = run
                .brief()
                .map(|brief| brief.tone.name)
                .unwrap_or(reel_models::TONE_PRESETS[0].name);
            ScriptRequest {
                idea: format!(
                    "Regenerate this scene with a different approach: {}. Context: {}",
                    scene.title, scene.visual_description
                ),
                target_secs: scene.duration_secs,
                tone_label: tone_label.to_string(),
                scene_count: 1,
                max_scene_secs: self.config.max_scene_secs,
            }
        };

        let replacement = self
            .generate_script(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::script_generation("no replacement scene returned"))?;

        let mut run = self.shared.run.lock().await;
        require_editable(&run)?;
        let scene = run.replace_scene(scene_id, replacement)?.clone();
        self.shared
            .emit(PipelineEvent::log(format!("Scene {} regenerated", scene.ordinal)));
        Ok(scene)
    }

    pub async fn duplicate_scene(&self, scene_id: &SceneId) -> PipelineResult<Scene> {
        let mut run = self.shared.run.lock().await;
        require_editable(&run)?;
        Ok(run.duplicate_scene(scene_id)?.clone())
    }

    /// Remove a scene, renumber the rest and stop its poll task.
    pub async fn delete_scene(&self, scene_id: &SceneId) -> PipelineResult<Scene> {
        let removed = {
            let mut run = self.shared.run.lock().await;
            require_editable(&run)?;
            let removed = run.remove_scene(scene_id)?;
            self.shared.tracker.lock().await.remove(scene_id);
            removed
        };
        self.stop_poll(scene_id).await;
        self.shared
            .emit(PipelineEvent::log(format!("Scene \"{}\" deleted", removed.title)));
        Ok(removed)
    }

    // ========================================================================
    // Video generation
    // ========================================================================

    /// Storyboard → VideoGeneration, then submit every scene in ordinal order.
    ///
    /// Each scene is read from the run again just before it is submitted,
    /// so scenes deleted meanwhile are skipped and edits are picked up. A
    /// rejected submission fails only its own scene.
    pub async fn begin_video_generation(&self) -> PipelineResult<()> {
        let scene_ids: Vec<SceneId> = {
            let mut run = self.shared.run.lock().await;
            run.require_stage(Stage::Storyboard)?;
            if run.scenes().is_empty() {
                return Err(PipelineError::NoScenes);
            }
            self.advance(&mut run, Stage::VideoGeneration)?;
            run.scenes().iter().map(|scene| scene.id.clone()).collect()
        };

        let token = self.token().await;
        for scene_id in &scene_ids {
            if token.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let (scene, job) = match self.claim_scene(scene_id, Claim::Initial).await {
                Ok(claimed) => claimed,
                Err(PipelineError::SceneNotFound(_)) => {
                    debug!(scene = %scene_id, "Scene deleted before submission");
                    continue;
                }
                Err(PipelineError::SceneState { status, .. }) => {
                    debug!(scene = %scene_id, status = %status, "Scene already submitted");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self.submit_claimed(&scene, &job, &token).await {
                Err(e) if e.is_cancelled() => return Err(e),
                // Other failures are recorded on the scene.
                _ => {}
            }
        }
        Ok(())
    }

    /// Submit a Failed scene again under a new job.
    ///
    /// A rejected submission leaves the scene Failed with the new error.
    pub async fn retry_scene(&self, scene_id: &SceneId) -> PipelineResult<()> {
        let (scene, job) = self.claim_scene(scene_id, Claim::Retry).await?;
        let token = self.token().await;
        self.submit_claimed(&scene, &job, &token).await
    }

    /// Submit a scene that has no job in flight: a fresh duplicate, or a
    /// Completed or Failed scene after edits. The previous result is dropped.
    pub async fn resubmit_scene(&self, scene_id: &SceneId) -> PipelineResult<()> {
        let (scene, job) = self.claim_scene(scene_id, Claim::Resubmit).await?;
        self.stop_poll(scene_id).await;
        let token = self.token().await;
        self.submit_claimed(&scene, &job, &token).await
    }

    /// Wait for every running poll task, including ones started while waiting.
    pub async fn wait_for_videos(&self) -> (usize, usize) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut polls = self.polls.lock().await;
                polls.values_mut().filter_map(|poll| poll.handle.take()).collect()
            };
            if handles.is_empty() {
                break;
            }
            for result in join_all(handles).await {
                if let Err(e) = result {
                    if e.is_panic() {
                        warn!("Scene poll task panicked: {}", e);
                    }
                }
            }
        }
        self.video_progress().await
    }

    /// `(completed, total)` scene videos.
    pub async fn video_progress(&self) -> (usize, usize) {
        self.shared.tracker.lock().await.progress()
    }

    /// VideoGeneration → Audio, once every scene video completed.
    pub async fn advance_to_audio(&self) -> PipelineResult<()> {
        let mut run = self.shared.run.lock().await;
        run.require_stage(Stage::VideoGeneration)?;
        self.completed_videos(&run).await?;
        self.advance(&mut run, Stage::Audio)
    }

    /// Concatenate scene videos in ordinal order.
    pub async fn combine_videos(&self) -> PipelineResult<String> {
        let videos = {
            let run = self.shared.run.lock().await;
            if run.stage() < Stage::VideoGeneration {
                return Err(PipelineError::WrongStage {
                    expected: Stage::VideoGeneration,
                    actual: run.stage(),
                });
            }
            self.completed_videos(&run).await?
        };

        let shared = Arc::clone(&self.shared);
        let token = self.token().await;
        let url = tokio::select! {
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
            result = self.services.media.combine_scene_videos(&videos, |status| {
                shared.emit(PipelineEvent::log(status));
            }) => result?,
        };

        self.shared.run.lock().await.set_combined_video(url.clone());
        info!(url = %url, scenes = videos.len(), "Scene videos combined");
        Ok(url)
    }

    // ========================================================================
    // Audio
    // ========================================================================

    /// Scene narration scripts in ordinal order, joined by a space.
    pub async fn narration_script(&self) -> String {
        PromptCompiler::narration_script(self.shared.run.lock().await.scenes())
    }

    /// Store a reference voice for narration. Returns its public URL.
    pub async fn upload_voice_sample(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> PipelineResult<String> {
        if bytes.is_empty() {
            return Err(PipelineError::InvalidVoiceSample("file is empty".to_string()));
        }
        if bytes.len() > self.config.max_voice_sample_bytes {
            return Err(PipelineError::InvalidVoiceSample(format!(
                "{} bytes exceeds the {} byte limit",
                bytes.len(),
                self.config.max_voice_sample_bytes
            )));
        }
        if !mime_type.starts_with("audio/") {
            return Err(PipelineError::InvalidVoiceSample(format!(
                "unsupported content type {}",
                mime_type
            )));
        }

        let uploaded = self.services.storage.upload(bytes, filename, mime_type).await?;
        self.shared.run.lock().await.set_speaker_url(uploaded.url.clone());
        self.shared
            .emit(PipelineEvent::log(format!("Voice sample uploaded: {}", uploaded.url)));
        Ok(uploaded.url)
    }

    /// Synthesize the narration track. `script` overrides the joined scene scripts.
    pub async fn generate_narration(&self, script: Option<String>) -> PipelineResult<String> {
        let (script, context, speaker) = {
            let run = self.shared.run.lock().await;
            run.require_stage(Stage::Audio)?;
            let script = script
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| PromptCompiler::narration_script(run.scenes()));
            if script.trim().is_empty() {
                return Err(PipelineError::gate_closed("narration script is empty"));
            }
            let speaker = run
                .speaker_url()
                .map(str::to_string)
                .or_else(|| self.config.speaker_url.clone())
                .ok_or_else(|| {
                    PipelineError::config("no speaker sample: upload one or set TTS_SPEAKER_URL")
                })?;
            (script, PromptCompiler::scene_context(run.scenes()), speaker)
        };

        let token = self.token().await;
        let profile = tokio::select! {
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
            profile = self.services.emotion.infer(&script, Some(&context)) => profile,
        };
        self.shared
            .emit(PipelineEvent::log(format!("Narration emotion: {}", profile)));

        let request = SpeechRequest::new(script, speaker, &profile);
        let endpoint = &self.services.endpoints.speech;
        let job_id = tokio::select! {
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
            job_id = self.services.jobs.submit(endpoint, &request) => job_id?,
        };

        let events = self.shared.events.clone();
        let output = self
            .services
            .jobs
            .poll_until_done(
                endpoint,
                &job_id,
                &self.services.policies.speech,
                |status: RemoteStatus| {
                    let _ = events.send(PipelineEvent::JobProgress {
                        scene_id: None,
                        job_id: job_id.clone(),
                        remote_status: status.as_str().to_string(),
                    });
                },
                &token,
            )
            .await?;
        let url = output.audio_url()?;

        self.shared.run.lock().await.set_narration_audio(url.clone());
        self.shared
            .emit(PipelineEvent::log(format!("Narration ready: {}", url)));
        Ok(url)
    }

    /// Audio → Final, once narration audio exists.
    pub async fn advance_to_final(&self) -> PipelineResult<()> {
        let mut run = self.shared.run.lock().await;
        run.require_stage(Stage::Audio)?;
        if run.narration_audio().is_none() {
            return Err(PipelineError::gate_closed("narration audio has not been generated"));
        }
        self.advance(&mut run, Stage::Final)
    }

    // ========================================================================
    // Final
    // ========================================================================

    /// Lay the narration over the combined video, combining first if needed.
    pub async fn merge_final_video(&self) -> PipelineResult<String> {
        let (combined, audio) = {
            let run = self.shared.run.lock().await;
            run.require_stage(Stage::Final)?;
            let audio = run
                .narration_audio()
                .map(str::to_string)
                .ok_or_else(|| PipelineError::gate_closed("narration audio has not been generated"))?;
            (run.combined_video().map(str::to_string), audio)
        };
        let video = match combined {
            Some(url) => url,
            None => self.combine_videos().await?,
        };

        let shared = Arc::clone(&self.shared);
        let token = self.token().await;
        let url = tokio::select! {
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
            result = self.services.media.merge_video_with_audio(&video, &audio, |status| {
                shared.emit(PipelineEvent::log(status));
            }) => result?,
        };

        self.shared.run.lock().await.set_final_video(url.clone());
        self.shared.emit(PipelineEvent::Done {
            output_url: url.clone(),
        });
        info!(url = %url, "Final video ready");
        Ok(url)
    }

    /// Character-over-environment still, uploaded. Usable at any stage.
    pub async fn compose_image(
        &self,
        character: &CharacterTraits,
        environment: &EnvironmentTraits,
    ) -> PipelineResult<ComposedImage> {
        let token = self.token().await;
        self.services
            .image_composer()
            .compose(character, environment, &token)
            .await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Cancel all in-flight work. Scenes still waiting on a job are marked
    /// Failed so they can be retried.
    pub async fn abandon(&self) {
        self.cancel_all().await;

        let in_flight = self.shared.tracker.lock().await.in_flight();
        for (scene_id, job_id) in in_flight {
            let update = JobUpdate::Failed {
                job_id,
                error: "cancelled".to_string(),
            };
            if let Err(e) = self.shared.record(&scene_id, update).await {
                warn!(scene = %scene_id, "Could not mark scene cancelled: {}", e);
            }
        }
        self.shared.emit(PipelineEvent::log("Run abandoned"));
    }

    /// Cancel everything and start over at Idea.
    pub async fn start_new_project(&self) {
        self.cancel_all().await;

        let previous = {
            let mut run = self.shared.run.lock().await;
            let previous = run.stage();
            *run = PipelineRun::new();
            self.shared.tracker.lock().await.clear();
            previous
        };
        if previous != Stage::Idea {
            self.shared.emit(PipelineEvent::StageChanged {
                from: previous,
                to: Stage::Idea,
            });
        }
        self.shared.emit(PipelineEvent::log("Started new project"));
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn token(&self) -> CancellationToken {
        self.root.lock().await.clone()
    }

    fn advance(&self, run: &mut PipelineRun, next: Stage) -> PipelineResult<()> {
        let from = run.advance_to(next)?;
        info!(run = %run.id(), from = %from, to = %next, "Stage changed");
        self.shared
            .emit(PipelineEvent::StageChanged { from, to: next });
        Ok(())
    }

    async fn generate_script(&self, request: &ScriptRequest) -> PipelineResult<Vec<Scene>> {
        let token = self.token().await;
        tokio::select! {
            _ = token.cancelled() => Err(PipelineError::Cancelled),
            result = self.services.scripts.generate(request) => result,
        }
    }

    /// Read a scene from the run and open a Pending job for it.
    ///
    /// The run lock is held until the tracker is written, so a deleted
    /// scene is never registered and a scene is claimed by one caller.
    async fn claim_scene(&self, scene_id: &SceneId, claim: Claim) -> PipelineResult<(Scene, SceneJob)> {
        let run = self.shared.run.lock().await;
        run.require_stage(Stage::VideoGeneration)?;
        let scene = run
            .scene(scene_id)
            .cloned()
            .ok_or_else(|| PipelineError::SceneNotFound(scene_id.clone()))?;

        let mut tracker = self.shared.tracker.lock().await;
        let job = match (claim, tracker.status(scene_id)) {
            (Claim::Retry, _) => tracker.reopen(scene_id)?.clone(),
            (Claim::Initial, Some(status)) => {
                return Err(PipelineError::scene_state(scene_id, "submit", status));
            }
            (Claim::Resubmit, Some(status)) if !status.is_terminal() => {
                return Err(PipelineError::scene_state(scene_id, "resubmit", status));
            }
            _ => tracker.register_scene(&scene).clone(),
        };
        Ok((scene, job))
    }

    /// Every scene's video, or a closed gate naming how many are done.
    async fn completed_videos(&self, run: &PipelineRun) -> PipelineResult<Vec<SceneVideo>> {
        let tracker = self.shared.tracker.lock().await;
        let videos: Vec<SceneVideo> = run
            .scenes()
            .iter()
            .filter_map(|scene| {
                tracker
                    .result_url(&scene.id)
                    .map(|url| SceneVideo::new(scene.ordinal, url))
            })
            .collect();

        let ready = !run.scenes().is_empty()
            && videos.len() == run.scenes().len()
            && tracker.all_terminal_and_successful();
        if !ready {
            return Err(PipelineError::gate_closed(format!(
                "{} of {} scene videos completed",
                videos.len(),
                run.scenes().len()
            )));
        }
        Ok(videos)
    }

    async fn submit_video(&self, scene: &Scene, token: &CancellationToken) -> PipelineResult<String> {
        let prompt = PromptCompiler::scene_video_prompt(scene);
        let mut request = VideoRequest::new(prompt, scene.duration_secs);
        if let Some(negative) = &self.config.negative_prompt {
            request = request.with_negative_prompt(negative.clone());
        }
        tokio::select! {
            _ = token.cancelled() => Err(PipelineError::Cancelled),
            result = self.services.jobs.submit(&self.services.endpoints.video, &request) => Ok(result?),
        }
    }

    /// Submit a claimed scene and start polling it.
    ///
    /// A failed submission marks the scene Failed with that error and is
    /// returned to the caller.
    async fn submit_claimed(
        &self,
        scene: &Scene,
        job: &SceneJob,
        token: &CancellationToken,
    ) -> PipelineResult<()> {
        let mut logger = SceneLogger::new(scene, "submit_video").with_job(job);
        self.shared.announce(&scene.id, job).await;

        let job_id = match self.submit_video(scene, token).await {
            Ok(job_id) => job_id,
            Err(e) => {
                logger.log_error(&e.to_string());
                self.shared.emit(PipelineEvent::error(format!(
                    "Scene {} submission failed: {}",
                    scene.ordinal, e
                )));
                let failed = JobUpdate::Failed {
                    job_id: None,
                    error: e.to_string(),
                };
                if let Err(record_err) = self.shared.record(&scene.id, failed).await {
                    logger.log_warning(&format!("failure not tracked: {}", record_err));
                }
                return Err(e);
            }
        };

        logger.set_job_id(job_id.clone());
        let recorded = self
            .shared
            .record(&scene.id, JobUpdate::Submitted { job_id: job_id.clone() })
            .await;
        if let Err(e) = recorded {
            // Deleted or abandoned while the submission was in flight.
            logger.log_warning(&format!("job not tracked: {}", e));
            return Ok(());
        }
        logger.log_start("submitted");
        self.spawn_poll(scene, job_id, token).await;
        Ok(())
    }

    async fn spawn_poll(&self, scene: &Scene, job_id: String, token: &CancellationToken) {
        // Held across the check so a concurrent delete either sees this
        // task in `polls` or this check sees the scene gone.
        let mut polls = self.polls.lock().await;
        let current = self
            .shared
            .tracker
            .lock()
            .await
            .get(&scene.id)
            .filter(|job| job.is_current(&job_id))
            .cloned();
        let Some(job) = current else {
            debug!(scene = %scene.id, job_id = %job_id, "Job superseded before polling started");
            return;
        };

        let cancel = token.child_token();
        let logger = SceneLogger::new(scene, "poll_video").with_job(&job);
        let span = logger.create_span();
        let task = poll_scene(
            Arc::clone(&self.services),
            Arc::clone(&self.shared),
            scene.id.clone(),
            job_id,
            logger,
            cancel.clone(),
        );
        let handle = tokio::spawn(task.instrument(span));

        let previous = polls.insert(
            scene.id.clone(),
            ScenePoll {
                cancel,
                handle: Some(handle),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    async fn stop_poll(&self, scene_id: &SceneId) {
        if let Some(poll) = self.polls.lock().await.remove(scene_id) {
            poll.cancel.cancel();
        }
    }

    /// Cancel the run token, wait for poll tasks to exit and issue a fresh token.
    async fn cancel_all(&self) {
        {
            let mut root = self.root.lock().await;
            root.cancel();
            *root = CancellationToken::new();
        }
        let handles: Vec<JoinHandle<()>> = self
            .polls
            .lock()
            .await
            .drain()
            .filter_map(|(_, poll)| {
                poll.cancel.cancel();
                poll.handle
            })
            .collect();
        join_all(handles).await;
    }
}

fn require_editable(run: &PipelineRun) -> PipelineResult<()> {
    match run.stage() {
        Stage::Storyboard | Stage::VideoGeneration => Ok(()),
        actual => Err(PipelineError::WrongStage {
            expected: Stage::Storyboard,
            actual,
        }),
    }
}

/// Poll one scene's video job to completion and record the result.
async fn poll_scene(
    services: Arc<PipelineServices>,
    shared: Arc<Shared>,
    scene_id: SceneId,
    job_id: String,
    logger: SceneLogger,
    cancel: CancellationToken,
) {
    let events = shared.events.clone();
    let result = services
        .jobs
        .poll_until_done(
            &services.endpoints.video,
            &job_id,
            &services.policies.video,
            |status: RemoteStatus| {
                let _ = events.send(PipelineEvent::JobProgress {
                    scene_id: Some(scene_id.clone()),
                    job_id: job_id.clone(),
                    remote_status: status.as_str().to_string(),
                });
            },
            &cancel,
        )
        .await;

    let update = match result.and_then(|output| output.video_url()) {
        Ok(url) => {
            logger.log_completion(&url);
            JobUpdate::Completed {
                job_id,
                result_url: url,
            }
        }
        Err(e) if e.is_cancelled() => {
            logger.log_progress("polling stopped");
            return;
        }
        Err(e) => {
            logger.log_error(&e.to_string());
            shared.emit(PipelineEvent::error(format!("Scene video failed: {}", e)));
            JobUpdate::Failed {
                job_id: Some(job_id),
                error: e.to_string(),
            }
        }
    };

    match shared.record(&scene_id, update).await {
        Ok(true) => {}
        Ok(false) => logger.log_warning("result superseded by a newer job"),
        Err(e) => logger.log_warning(&format!("result dropped: {}", e)),
    }
}
