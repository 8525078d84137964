//! Client for asynchronous generation job services.
//!
//! Every generation backend (image, video, speech, composition) exposes the
//! same two calls: `POST {base}/{endpoint}/run` returning a job id, and
//! `GET {base}/{endpoint}/status/{id}` returning the job state. This crate
//! provides:
//! - [`JobClient`] for submitting and polling those jobs
//! - [`PollPolicy`] to configure poll cadence and optional attempt bounds
//! - Typed request payloads for each backend
//! - Output extraction helpers for completed jobs
//! - Metrics for submissions, polls and outcomes

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod requests;
pub mod retry;
pub mod status;

pub use client::JobClient;
pub use config::{Endpoint, JobServiceConfig, PollPolicies, PollPolicy, ServiceEndpoints};
pub use error::{JobError, JobResult};
pub use requests::{
    CompositionRequest, ImageRequest, ImageToVideoRequest, SpeechRequest, VideoRequest,
};
pub use retry::FailureTracker;
pub use status::{JobOutput, PollOutcome, RemoteStatus};

/// Re-exported so callers can cancel polling without a direct dependency.
pub use tokio_util::sync::CancellationToken;
