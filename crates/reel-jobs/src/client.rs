//! Submit/poll client for asynchronous job services.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Endpoint, JobServiceConfig, PollPolicy};
use crate::error::{JobError, JobResult};
use crate::metrics;
use crate::retry::FailureTracker;
use crate::status::{JobOutput, PollOutcome, RemoteStatus, StatusResponse, SubmitResponse};

/// Client for one family of job endpoints sharing a base URL and key.
///
/// Holds no per-job state; every call is independent.
#[derive(Debug, Clone)]
pub struct JobClient {
    http: Client,
    base_url: String,
    api_key: String,
    max_logged_poll_failures: u32,
}

impl JobClient {
    /// Create a new job client.
    pub fn new(config: JobServiceConfig) -> JobResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            max_logged_poll_failures: config.max_logged_poll_failures,
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> JobResult<Self> {
        Self::new(JobServiceConfig::from_env()?)
    }

    fn run_url(&self, endpoint: &Endpoint) -> String {
        format!("{}/{}/run", self.base_url, endpoint.id)
    }

    fn status_url(&self, endpoint: &Endpoint, job_id: &str) -> String {
        format!("{}/{}/status/{}", self.base_url, endpoint.id, job_id)
    }

    /// Submit a job and return the id the service assigned.
    ///
    /// A non-2xx response or a body without an id is an error; nothing is
    /// retried here.
    pub async fn submit<T: Serialize + ?Sized>(&self, endpoint: &Endpoint, input: &T) -> JobResult<String> {
        let response = self
            .http
            .post(self.run_url(endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": input }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            metrics::record_submission(&endpoint.name, false);
            warn!(endpoint = %endpoint.name, status = status.as_u16(), "Job submission rejected");
            return Err(JobError::submit_rejected(&endpoint.name, status.as_u16(), body));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| JobError::Decode(e.to_string()))?;

        let job_id = body
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| JobError::MissingJobId(endpoint.name.clone()))?;

        metrics::record_submission(&endpoint.name, true);
        info!(endpoint = %endpoint.name, job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    /// Check a job's status once.
    ///
    /// Every error returned here is transient (see [`JobError::is_transient`]).
    pub async fn poll(&self, endpoint: &Endpoint, job_id: &str) -> JobResult<PollOutcome> {
        let response = self
            .http
            .get(self.status_url(endpoint, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            metrics::record_poll(&endpoint.name, "http_error");
            return Err(JobError::PollRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| JobError::Decode(e.to_string()))?;

        let outcome = PollOutcome::from_response(job_id, body);
        let label = match &outcome {
            Ok(o) => o.status().as_str(),
            Err(_) => "unrecognized",
        };
        metrics::record_poll(&endpoint.name, label);
        outcome
    }

    /// Poll a submitted job until it reaches a terminal status.
    ///
    /// Waits `policy.interval` before every check. `on_progress` sees the
    /// status of every successful check, repeated pending ticks included.
    /// Transient errors are logged and retried on the same cadence; they
    /// still count as attempts toward `policy.max_attempts`.
    pub async fn poll_until_done<F>(
        &self,
        endpoint: &Endpoint,
        job_id: &str,
        policy: &PollPolicy,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> JobResult<JobOutput>
    where
        F: FnMut(RemoteStatus),
    {
        let mut attempts = 0u32;
        let mut failures = FailureTracker::new(self.max_logged_poll_failures);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    metrics::record_outcome(&endpoint.name, "cancelled", attempts);
                    debug!(endpoint = %endpoint.name, job_id = %job_id, "Polling cancelled");
                    return Err(JobError::Cancelled);
                }
                _ = tokio::time::sleep(policy.interval) => {}
            }

            attempts += 1;
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    metrics::record_outcome(&endpoint.name, "cancelled", attempts);
                    return Err(JobError::Cancelled);
                }
                result = self.poll(endpoint, job_id) => result,
            };

            match result {
                Ok(PollOutcome::Completed(output)) => {
                    failures.record_success(job_id);
                    on_progress(RemoteStatus::Completed);
                    metrics::record_outcome(&endpoint.name, "completed", attempts);
                    info!(endpoint = %endpoint.name, job_id = %job_id, attempts, "Job completed");
                    return Ok(output);
                }
                Ok(PollOutcome::Failed(message)) => {
                    failures.record_success(job_id);
                    on_progress(RemoteStatus::Failed);
                    metrics::record_outcome(&endpoint.name, "failed", attempts);
                    warn!(endpoint = %endpoint.name, job_id = %job_id, error = %message, "Job failed");
                    return Err(JobError::remote_failed(job_id, message));
                }
                Ok(PollOutcome::Pending(status)) => {
                    failures.record_success(job_id);
                    on_progress(status);
                }
                Err(e) if e.is_transient() => {
                    if failures.record_failure(job_id) {
                        warn!(
                            endpoint = %endpoint.name,
                            job_id = %job_id,
                            attempt = attempts,
                            "Status check failed, will retry: {}", e
                        );
                    }
                }
                Err(e) => return Err(e),
            }

            if policy.is_exhausted(attempts) {
                metrics::record_outcome(&endpoint.name, "timeout", attempts);
                warn!(endpoint = %endpoint.name, job_id = %job_id, attempts, "Job polling timed out");
                return Err(JobError::Timeout { attempts });
            }
        }
    }

    /// Submit once, then poll until done.
    pub async fn generate_until_done<T, F>(
        &self,
        endpoint: &Endpoint,
        input: &T,
        policy: &PollPolicy,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> JobResult<JobOutput>
    where
        T: Serialize + ?Sized,
        F: FnMut(RemoteStatus),
    {
        let job_id = tokio::select! {
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            job_id = self.submit(endpoint, input) => job_id?,
        };
        self.poll_until_done(endpoint, &job_id, policy, on_progress, cancel)
            .await
    }
}
