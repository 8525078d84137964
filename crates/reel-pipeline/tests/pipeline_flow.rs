//! End-to-end controller scenarios against mocked job and media services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reel_jobs::{
    Endpoint, JobClient, JobError, JobServiceConfig, PollPolicies, PollPolicy, ServiceEndpoints,
};
use reel_media::{MediaAssembler, MediaServiceConfig, ObjectStorageClient};
use reel_models::{PipelineEvent, Scene, SceneJobStatus, Stage};
use reel_pipeline::{
    Brief, ChatCompletion, ChatRequest, EmotionAnalyzer, PipelineConfig, PipelineError,
    PipelineResult, PipelineServices, PipelineStageController, SceneEdit, ScriptGenerator,
    ScriptRequest,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// One scene per requested slot, each with a narration line.
struct NumberedScenes;

#[async_trait]
impl ScriptGenerator for NumberedScenes {
    async fn generate(&self, request: &ScriptRequest) -> PipelineResult<Vec<Scene>> {
        Ok((1..=request.scene_count)
            .map(|i| {
                Scene::new(i, format!("Scene {i}"), format!("prompt {i}"))
                    .with_duration(request.max_scene_secs)
                    .with_narration(format!("Line {i}…"))
            })
            .collect())
    }
}

struct FixedEmotion;

#[async_trait]
impl ChatCompletion for FixedEmotion {
    async fn complete(&self, _request: ChatRequest) -> PipelineResult<String> {
        Ok("0.1,0,0,0,0,0.2,0,0.8".to_string())
    }
}

/// Hands out `{prefix}-1`, `{prefix}-2`, ... in submission order.
struct SequentialIds {
    prefix: &'static str,
    next: AtomicUsize,
}

impl SequentialIds {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicUsize::new(0),
        }
    }
}

impl Respond for SequentialIds {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("{}-{}", self.prefix, n),
            "status": "IN_QUEUE"
        }))
    }
}

struct Harness {
    jobs: MockServer,
    media: MockServer,
    controller: PipelineStageController,
}

async fn harness(config: PipelineConfig) -> Harness {
    let jobs = MockServer::start().await;
    let media = MockServer::start().await;

    let client = JobClient::new(JobServiceConfig {
        base_url: jobs.uri(),
        api_key: "test-key".into(),
        request_timeout: Duration::from_secs(5),
        max_logged_poll_failures: 3,
    })
    .unwrap();

    let fast = Duration::from_millis(10);
    let policies = PollPolicies {
        video: PollPolicy::unbounded(fast),
        speech: PollPolicy::unbounded(fast),
        image: PollPolicy::bounded(fast, 10),
        composition: PollPolicy::bounded(fast, 10),
        image_to_video: PollPolicy::bounded(fast, 10),
    };
    let endpoints = ServiceEndpoints {
        video: Endpoint::new("video", "vid"),
        speech: Endpoint::new("speech", "tts"),
        ..ServiceEndpoints::default()
    };
    let media_config = MediaServiceConfig {
        base_url: media.uri(),
        request_timeout: Duration::from_secs(5),
    };

    let services = PipelineServices {
        jobs: client,
        endpoints,
        policies,
        scripts: Arc::new(NumberedScenes),
        emotion: EmotionAnalyzer::new(Arc::new(FixedEmotion)),
        media: MediaAssembler::new(media_config.clone()).unwrap(),
        storage: ObjectStorageClient::new(media_config).unwrap(),
    };

    Harness {
        jobs,
        media,
        controller: PipelineStageController::new(services, config),
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        speaker_url: Some("https://cdn/speaker.wav".into()),
        event_buffer: 4096,
        ..PipelineConfig::default()
    }
}

fn testing_config(scenes: u32) -> PipelineConfig {
    PipelineConfig {
        testing_mode: true,
        testing_scene_count: scenes,
        ..config()
    }
}

async fn mount_submissions(server: &MockServer, endpoint: &str, prefix: &'static str) {
    Mock::given(method("POST"))
        .and(path(format!("/{endpoint}/run")))
        .respond_with(SequentialIds::new(prefix))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, endpoint: &str, job_id: &str, body: Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/{endpoint}/status/{job_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

async fn mount_video_done(server: &MockServer, job_id: &str, url: &str) {
    mount_status(
        server,
        "vid",
        job_id,
        json!({"status": "COMPLETED", "output": {"result": url}}),
        None,
    )
    .await;
}

/// Answer one video submission with a fixed job id, after `delay`.
async fn mount_one_submission(server: &MockServer, job_id: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/vid/run"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": job_id}))
                .set_delay(delay),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn forty_second_brief_runs_to_final_video() {
    let h = harness(config()).await;
    let mut events = h.controller.subscribe();

    mount_submissions(&h.jobs, "vid", "job").await;
    // Scene 1 finishes last.
    mount_status(&h.jobs, "vid", "job-1", json!({"status": "IN_PROGRESS"}), Some(4)).await;
    for n in 1..=5 {
        mount_video_done(&h.jobs, &format!("job-{n}"), &format!("https://cdn/scene-{n}.mp4")).await;
    }

    mount_health(&h.media).await;
    Mock::given(method("POST"))
        .and(path("/api/merge"))
        .and(body_json(json!({"urls": [
            "https://cdn/scene-1.mp4",
            "https://cdn/scene-2.mp4",
            "https://cdn/scene-3.mp4",
            "https://cdn/scene-4.mp4",
            "https://cdn/scene-5.mp4"
        ]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output_url": "https://cdn/combined.mp4"})))
        .expect(1)
        .mount(&h.media)
        .await;

    Mock::given(method("POST"))
        .and(path("/tts/run"))
        .and(body_partial_json(json!({"input": {
            "task": "tts_emotion_vector",
            "text": "Line 1… Line 2… Line 3… Line 4… Line 5…",
            "spk_url": "https://cdn/speaker.wav",
            "emo_vector": "0.1,0,0,0,0,0.2,0,0.8"
        }})))
        .respond_with(SequentialIds::new("tts"))
        .expect(1)
        .mount(&h.jobs)
        .await;
    mount_status(
        &h.jobs,
        "tts",
        "tts-1",
        json!({"status": "COMPLETED", "output": {"url": "https://cdn/narration.wav"}}),
        None,
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/api/video-audio"))
        .and(body_json(json!({
            "video_url": "https://cdn/combined.mp4",
            "audio_url": "https://cdn/narration.wav"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output_url": "https://cdn/final.mp4"})))
        .expect(1)
        .mount(&h.media)
        .await;

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("calm mountain sunrise ride", 40, "calm-inspiring"))
        .await
        .unwrap();
    assert_eq!(scenes.len(), 5);
    assert_eq!(
        scenes.iter().map(|s| s.ordinal).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert!(scenes.iter().all(|s| s.duration_secs == 8));
    assert_eq!(h.controller.stage().await, Stage::Storyboard);

    h.controller.begin_video_generation().await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (5, 5));

    h.controller.advance_to_audio().await.unwrap();
    assert_eq!(h.controller.combine_videos().await.unwrap(), "https://cdn/combined.mp4");
    assert_eq!(
        h.controller.generate_narration(None).await.unwrap(),
        "https://cdn/narration.wav"
    );
    h.controller.advance_to_final().await.unwrap();
    assert_eq!(h.controller.merge_final_video().await.unwrap(), "https://cdn/final.mp4");

    let run = h.controller.snapshot().await;
    assert_eq!(run.stage(), Stage::Final);
    assert_eq!(run.final_video(), Some("https://cdn/final.mp4"));

    let mut saw_progress = false;
    let mut saw_done = false;
    while let Ok(event) = events.try_recv() {
        match event {
            PipelineEvent::JobProgress { remote_status, .. } if remote_status == "IN_PROGRESS" => {
                saw_progress = true
            }
            PipelineEvent::Done { output_url } => {
                assert_eq!(output_url, "https://cdn/final.mp4");
                saw_done = true;
            }
            _ => {}
        }
    }
    assert!(saw_progress);
    assert!(saw_done);
}

#[tokio::test]
async fn failed_scene_closes_gate_until_retried() {
    let h = harness(testing_config(4)).await;

    mount_submissions(&h.jobs, "vid", "job").await;
    for n in 1..=3 {
        mount_video_done(&h.jobs, &format!("job-{n}"), &format!("https://cdn/scene-{n}.mp4")).await;
    }
    mount_status(
        &h.jobs,
        "vid",
        "job-4",
        json!({"status": "FAILED", "error": "CUDA out of memory"}),
        None,
    )
    .await;
    mount_video_done(&h.jobs, "job-5", "https://cdn/scene-4-retry.mp4").await;

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("harbor at dusk", 40, "neutral-documentary"))
        .await
        .unwrap();
    assert_eq!(scenes.len(), 4);

    h.controller.begin_video_generation().await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (3, 4));

    let failed = h.controller.scene_job(&scenes[3].id).await.unwrap();
    assert_eq!(failed.status, SceneJobStatus::Failed);
    assert!(failed.error.unwrap().contains("CUDA out of memory"));

    let err = h.controller.advance_to_audio().await.unwrap_err();
    assert!(err.is_gate_closed());
    assert_eq!(h.controller.stage().await, Stage::VideoGeneration);

    // Completed scenes cannot be retried.
    let err = h.controller.retry_scene(&scenes[0].id).await.unwrap_err();
    assert!(matches!(err, PipelineError::SceneState { action: "retry", .. }));

    let before = h.controller.scene_job(&scenes[0].id).await;
    h.controller.retry_scene(&scenes[3].id).await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (4, 4));
    assert_eq!(h.controller.scene_job(&scenes[0].id).await, before);

    let retried = h.controller.scene_job(&scenes[3].id).await.unwrap();
    assert_eq!(retried.attempt, 2);
    assert_eq!(retried.result_url.as_deref(), Some("https://cdn/scene-4-retry.mp4"));

    h.controller.advance_to_audio().await.unwrap();
    assert_eq!(h.controller.stage().await, Stage::Audio);
}

#[tokio::test]
async fn rejected_submission_fails_only_that_scene() {
    let h = harness(testing_config(3)).await;

    Mock::given(method("POST"))
        .and(path("/vid/run"))
        .and(body_partial_json(json!({"input": {"prompt": "prompt 2"}})))
        .respond_with(ResponseTemplate::new(500).set_body_string("worker pool exhausted"))
        .mount(&h.jobs)
        .await;
    mount_submissions(&h.jobs, "vid", "job").await;
    mount_video_done(&h.jobs, "job-1", "https://cdn/scene-1.mp4").await;
    mount_video_done(&h.jobs, "job-2", "https://cdn/scene-3.mp4").await;

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("city lights", 30, "adventurous-energetic"))
        .await
        .unwrap();
    h.controller.begin_video_generation().await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (2, 3));

    let rejected = h.controller.scene_job(&scenes[1].id).await.unwrap();
    assert_eq!(rejected.status, SceneJobStatus::Failed);
    assert!(rejected.job_id.is_none());
}

#[tokio::test]
async fn delete_renumbers_and_drops_job() {
    let h = harness(testing_config(3)).await;
    mount_submissions(&h.jobs, "vid", "job").await;
    for n in 1..=3 {
        mount_video_done(&h.jobs, &format!("job-{n}"), &format!("https://cdn/scene-{n}.mp4")).await;
    }

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("forest trail", 30, "calm-inspiring"))
        .await
        .unwrap();

    let copy = h.controller.duplicate_scene(&scenes[0].id).await.unwrap();
    assert_eq!(copy.ordinal, 4);
    assert_eq!(copy.title, "Scene 1 (Copy)");

    h.controller.delete_scene(&scenes[1].id).await.unwrap();
    let run = h.controller.snapshot().await;
    assert_eq!(
        run.scenes()
            .iter()
            .map(|s| (s.ordinal, s.title.as_str()))
            .collect::<Vec<_>>(),
        vec![(1, "Scene 1"), (2, "Scene 3"), (3, "Scene 1 (Copy)")]
    );

    h.controller.begin_video_generation().await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (3, 3));
    assert!(h.controller.scene_job(&scenes[1].id).await.is_none());
}

#[tokio::test]
async fn delete_and_edit_during_submission_are_honored() {
    let h = harness(testing_config(3)).await;

    // Scene 1 submits slowly; the operator works on later scenes meanwhile.
    Mock::given(method("POST"))
        .and(path("/vid/run"))
        .and(body_partial_json(json!({"input": {"prompt": "prompt 1"}})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "job-1"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&h.jobs)
        .await;
    Mock::given(method("POST"))
        .and(path("/vid/run"))
        .and(body_partial_json(json!({"input": {"prompt": "prompt 2 at golden hour"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "job-2"})))
        .expect(1)
        .mount(&h.jobs)
        .await;
    // The unedited scene 2 prompt and the deleted scene 3 must never be sent.
    Mock::given(method("POST"))
        .and(path("/vid/run"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.jobs)
        .await;
    mount_video_done(&h.jobs, "job-1", "https://cdn/scene-1.mp4").await;
    mount_video_done(&h.jobs, "job-2", "https://cdn/scene-2.mp4").await;

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("lighthouse keeper", 30, "calm-inspiring"))
        .await
        .unwrap();

    let operator = async {
        while h.controller.stage().await != Stage::VideoGeneration {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        h.controller.delete_scene(&scenes[2].id).await.unwrap();
        h.controller
            .edit_scene(
                &scenes[1].id,
                SceneEdit {
                    detailed_prompt: Some("prompt 2 at golden hour".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    };
    let (submitted, ()) = tokio::join!(h.controller.begin_video_generation(), operator);
    submitted.unwrap();

    assert_eq!(h.controller.wait_for_videos().await, (2, 2));
    assert_eq!(h.controller.snapshot().await.scenes().len(), 2);
    assert!(h.controller.scene_job(&scenes[2].id).await.is_none());
    h.controller.advance_to_audio().await.unwrap();
}

#[tokio::test]
async fn concurrent_retries_of_a_scene_submit_once() {
    let h = harness(testing_config(1)).await;
    mount_one_submission(&h.jobs, "job-1", Duration::ZERO).await;
    mount_one_submission(&h.jobs, "job-2", Duration::from_millis(100)).await;
    mount_status(
        &h.jobs,
        "vid",
        "job-1",
        json!({"status": "FAILED", "error": "worker lost"}),
        None,
    )
    .await;
    mount_video_done(&h.jobs, "job-2", "https://cdn/scene-1-retry.mp4").await;

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("glacier calving", 10, "calm-inspiring"))
        .await
        .unwrap();
    h.controller.begin_video_generation().await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (0, 1));

    let (first, second) = tokio::join!(
        h.controller.retry_scene(&scenes[0].id),
        h.controller.retry_scene(&scenes[0].id)
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(PipelineError::SceneState { action: "retry", .. }))));

    assert_eq!(h.controller.wait_for_videos().await, (1, 1));
    let job = h.controller.scene_job(&scenes[0].id).await.unwrap();
    assert_eq!(job.attempt, 2);
    assert_eq!(job.result_url.as_deref(), Some("https://cdn/scene-1-retry.mp4"));
}

#[tokio::test]
async fn rejected_retry_records_the_new_error() {
    let h = harness(testing_config(1)).await;
    let mut events = h.controller.subscribe();
    mount_one_submission(&h.jobs, "job-1", Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(path("/vid/run"))
        .respond_with(ResponseTemplate::new(503).set_body_string("no capacity"))
        .mount(&h.jobs)
        .await;
    mount_status(
        &h.jobs,
        "vid",
        "job-1",
        json!({"status": "FAILED", "error": "CUDA out of memory"}),
        None,
    )
    .await;

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("rain on tin roof", 10, "calm-inspiring"))
        .await
        .unwrap();
    h.controller.begin_video_generation().await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (0, 1));

    let err = h.controller.retry_scene(&scenes[0].id).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Job(JobError::SubmitRejected { status: 503, .. })
    ));

    let job = h.controller.scene_job(&scenes[0].id).await.unwrap();
    assert_eq!(job.status, SceneJobStatus::Failed);
    assert_eq!(job.attempt, 2);
    assert!(job.job_id.is_none());
    assert!(job.error.unwrap().contains("no capacity"));

    let mut reported = false;
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::Error { message, .. } = event {
            reported |= message.contains("submission failed");
        }
    }
    assert!(reported);
}

#[tokio::test]
async fn resubmit_renders_duplicates_and_edited_scenes() {
    let h = harness(testing_config(1)).await;
    mount_submissions(&h.jobs, "vid", "job").await;
    mount_video_done(&h.jobs, "job-1", "https://cdn/scene-1.mp4").await;
    mount_video_done(&h.jobs, "job-2", "https://cdn/copy.mp4").await;
    mount_video_done(&h.jobs, "job-3", "https://cdn/scene-1-v2.mp4").await;

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("night market", 10, "calm-inspiring"))
        .await
        .unwrap();
    h.controller.begin_video_generation().await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (1, 1));

    let copy = h.controller.duplicate_scene(&scenes[0].id).await.unwrap();
    assert!(h.controller.scene_job(&copy.id).await.is_none());
    assert!(h.controller.advance_to_audio().await.unwrap_err().is_gate_closed());

    h.controller.resubmit_scene(&copy.id).await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (2, 2));

    h.controller
        .edit_scene(
            &scenes[0].id,
            SceneEdit {
                title: Some("Lanterns".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.controller.resubmit_scene(&scenes[0].id).await.unwrap();
    assert_eq!(h.controller.wait_for_videos().await, (2, 2));

    let job = h.controller.scene_job(&scenes[0].id).await.unwrap();
    assert_eq!(job.attempt, 2);
    assert_eq!(job.result_url.as_deref(), Some("https://cdn/scene-1-v2.mp4"));
    h.controller.advance_to_audio().await.unwrap();
}

#[tokio::test]
async fn abandon_stops_polling_and_new_project_resets() {
    let h = harness(testing_config(2)).await;
    mount_submissions(&h.jobs, "vid", "job").await;
    mount_status(&h.jobs, "vid", "job-1", json!({"status": "IN_QUEUE"}), None).await;
    mount_status(&h.jobs, "vid", "job-2", json!({"status": "IN_QUEUE"}), None).await;

    let scenes = h
        .controller
        .generate_storyboard(Brief::new("desert road", 20, "calm-inspiring"))
        .await
        .unwrap();
    h.controller.begin_video_generation().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(2), h.controller.abandon())
        .await
        .expect("abandon should not hang");
    assert_eq!(h.controller.wait_for_videos().await, (0, 2));

    let job = h.controller.scene_job(&scenes[0].id).await.unwrap();
    assert_eq!(job.status, SceneJobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("cancelled"));

    h.controller.start_new_project().await;
    assert_eq!(h.controller.stage().await, Stage::Idea);
    assert!(h.controller.snapshot().await.scenes().is_empty());
    assert_eq!(h.controller.video_progress().await, (0, 0));
}

#[tokio::test]
async fn stage_order_is_enforced() {
    let h = harness(config()).await;

    let err = h.controller.begin_video_generation().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::WrongStage {
            expected: Stage::Storyboard,
            actual: Stage::Idea
        }
    ));
    assert!(h.controller.generate_narration(None).await.is_err());
    assert!(h.controller.merge_final_video().await.is_err());
}

#[tokio::test]
async fn voice_sample_is_validated_and_becomes_speaker() {
    let h = harness(config()).await;
    Mock::given(method("POST"))
        .and(path("/api/upload-audio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "url": "https://cdn/voice.wav",
            "filename": "voice.wav"
        })))
        .expect(1)
        .mount(&h.media)
        .await;

    let err = h
        .controller
        .upload_voice_sample(Vec::new(), "voice.wav", "audio/wav")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidVoiceSample(_)));

    let err = h
        .controller
        .upload_voice_sample(vec![0; 16], "notes.txt", "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidVoiceSample(_)));

    let url = h
        .controller
        .upload_voice_sample(vec![1; 1024], "voice.wav", "audio/wav")
        .await
        .unwrap();
    assert_eq!(url, "https://cdn/voice.wav");
    assert_eq!(h.controller.snapshot().await.speaker_url(), Some("https://cdn/voice.wav"));
}
