//! Shared data models for the reelsmith pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scenes and their generation jobs
//! - Pipeline stages and run identifiers
//! - Narration emotion profiles and tone presets
//! - Allowed scene durations
//! - Pipeline event schemas

pub mod duration;
pub mod emotion;
pub mod event;
pub mod job;
pub mod scene;
pub mod stage;
pub mod tone;

// Re-export common types
pub use duration::{normalize_duration, ALLOWED_SCENE_DURATIONS};
pub use emotion::EmotionProfile;
pub use event::PipelineEvent;
pub use job::{SceneJob, SceneJobStatus};
pub use scene::{RunId, Scene, SceneId, DEFAULT_TRANSITION_IN, DEFAULT_TRANSITION_OUT};
pub use stage::Stage;
pub use tone::{TonePreset, TONE_PRESETS};
