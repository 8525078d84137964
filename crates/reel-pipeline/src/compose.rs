//! Character-over-environment image composition.
//!
//! Two text-to-image jobs, one composition job, then an upload. Every job
//! here runs under a bounded poll policy, so a stuck backend surfaces as
//! [`reel_jobs::JobError::Timeout`] instead of hanging the caller.

use chrono::Utc;
use reel_jobs::{
    CancellationToken, CompositionRequest, Endpoint, ImageRequest, ImageToVideoRequest, JobClient,
    PollPolicies, PollPolicy, RemoteStatus, ServiceEndpoints,
};
use reel_media::ObjectStorageClient;
use tracing::{debug, info};

use crate::error::PipelineResult;
use crate::prompt::{CharacterTraits, EnvironmentTraits, PromptCompiler};

/// A composed image, uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedImage {
    /// Public URL of the uploaded PNG
    pub url: String,
    /// The composed image, for image-to-video
    pub image_base64: String,
}

#[derive(Debug, Clone)]
pub struct ImageComposer {
    jobs: JobClient,
    endpoints: ServiceEndpoints,
    policies: PollPolicies,
    storage: ObjectStorageClient,
}

impl ImageComposer {
    pub fn new(
        jobs: JobClient,
        endpoints: ServiceEndpoints,
        policies: PollPolicies,
        storage: ObjectStorageClient,
    ) -> Self {
        Self {
            jobs,
            endpoints,
            policies,
            storage,
        }
    }

    /// Generate one image and return it base64-encoded.
    pub async fn generate_image(&self, prompt: &str, cancel: &CancellationToken) -> PipelineResult<String> {
        let request = ImageRequest::new(prompt);
        let output = self
            .run_job(&self.endpoints.image, &request, &self.policies.image, cancel)
            .await?;
        Ok(output.image_base64()?)
    }

    /// Render a character and an environment, composite them and upload the result.
    pub async fn compose(
        &self,
        character: &CharacterTraits,
        environment: &EnvironmentTraits,
        cancel: &CancellationToken,
    ) -> PipelineResult<ComposedImage> {
        let character_prompt = PromptCompiler::character_prompt(character);
        let environment_prompt = PromptCompiler::environment_prompt(environment);

        info!("Generating character image");
        let foreground = self.generate_image(&character_prompt, cancel).await?;
        info!("Generating environment image");
        let background = self.generate_image(&environment_prompt, cancel).await?;

        let request = CompositionRequest::new(foreground, background);
        let composed = self
            .run_job(
                &self.endpoints.composition,
                &request,
                &self.policies.composition,
                cancel,
            )
            .await?
            .image_base64()?;

        let filename = format!("composition-{}.png", Utc::now().timestamp_millis());
        let uploaded = self.storage.upload_image_base64(&composed, &filename).await?;
        info!(url = %uploaded.url, "Composed image uploaded");

        Ok(ComposedImage {
            url: uploaded.url,
            image_base64: composed,
        })
    }

    /// Animate a still image into a short clip. Returns the video URL.
    pub async fn animate(
        &self,
        image_base64: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<String> {
        let request = ImageToVideoRequest::new(prompt, image_base64);
        let output = self
            .run_job(
                &self.endpoints.image_to_video,
                &request,
                &self.policies.image_to_video,
                cancel,
            )
            .await?;
        Ok(output.video_url()?)
    }

    async fn run_job<T: serde::Serialize>(
        &self,
        endpoint: &Endpoint,
        request: &T,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> PipelineResult<reel_jobs::JobOutput> {
        let name = endpoint.name.clone();
        let output = self
            .jobs
            .generate_until_done(
                endpoint,
                request,
                policy,
                |status: RemoteStatus| debug!(endpoint = %name, status = %status.as_str(), "Job status"),
                cancel,
            )
            .await?;
        Ok(output)
    }
}
