//! Pipeline runner binary.
//!
//! Usage: `reelsmith "<idea>" [duration] [tone]`, where duration is a label
//! such as `30`, `60` or `40-50` and tone is a preset id.

use anyhow::{bail, Context};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::{PipelineEvent, SceneJobStatus};
use reel_pipeline::{
    parse_target_duration, Brief, PipelineConfig, PipelineServices, PipelineStageController,
};

/// Rounds of retrying failed scenes before giving up.
const MAX_RETRY_ROUNDS: usize = 2;

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reel=info".parse().unwrap())
        .add_directive("reelsmith=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let mut args = std::env::args().skip(1);
    let Some(idea) = args.next() else {
        error!("Usage: reelsmith \"<idea>\" [duration] [tone]");
        std::process::exit(2);
    };
    let target_secs = args.next().map_or(reel_pipeline::DEFAULT_TARGET_SECS, |label| {
        parse_target_duration(&label)
    });
    let tone = args.next().unwrap_or_default();
    let brief = Brief::new(idea, target_secs, &tone);

    info!("Starting reelsmith");

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let services = match PipelineServices::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create pipeline services: {}", e);
            std::process::exit(1);
        }
    };
    let controller = PipelineStageController::new(services, config);

    let mut events = controller.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = tokio::select! {
        result = run(&controller, brief) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            controller.abandon().await;
            Err(anyhow::anyhow!("interrupted"))
        }
    };

    drop(controller);
    event_log.await.ok();

    match outcome {
        Ok(url) => info!(url = %url, "Pipeline complete"),
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(controller: &PipelineStageController, brief: Brief) -> anyhow::Result<String> {
    controller
        .generate_storyboard(brief)
        .await
        .context("storyboard generation")?;

    controller
        .begin_video_generation()
        .await
        .context("scene video submission")?;

    let mut rounds = 0;
    loop {
        let (done, total) = controller.wait_for_videos().await;
        info!(done, total, "Scene videos settled");
        if done == total {
            break;
        }
        if rounds == MAX_RETRY_ROUNDS {
            bail!("{} of {} scene videos failed after {} retry rounds", total - done, total, rounds);
        }
        rounds += 1;

        let run = controller.snapshot().await;
        for scene in run.scenes() {
            let failed = controller
                .scene_job(&scene.id)
                .await
                .is_some_and(|job| job.status == SceneJobStatus::Failed);
            if failed {
                if let Err(e) = controller.retry_scene(&scene.id).await {
                    warn!(scene = %scene.id, "Retry submission failed: {}", e);
                }
            }
        }
    }

    controller.advance_to_audio().await.context("video gate")?;
    controller.combine_videos().await.context("combining scene videos")?;
    controller
        .generate_narration(None)
        .await
        .context("narration")?;
    controller.advance_to_final().await.context("audio gate")?;
    let url = controller
        .merge_final_video()
        .await
        .context("final merge")?;
    Ok(url)
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StageChanged { from, to } => info!(from = %from, to = %to, "Stage changed"),
        PipelineEvent::SceneStatus {
            ordinal,
            status,
            detail,
            ..
        } => info!(
            scene = *ordinal,
            status = %status,
            detail = detail.as_deref().unwrap_or(""),
            "Scene status"
        ),
        PipelineEvent::JobProgress {
            job_id,
            remote_status,
            ..
        } => tracing::debug!(job_id = %job_id, status = %remote_status, "Job progress"),
        PipelineEvent::Log { message, .. } => info!("{}", message),
        PipelineEvent::Error { message, .. } => warn!("{}", message),
        PipelineEvent::Done { output_url } => info!(url = %output_url, "Done"),
    }
}
