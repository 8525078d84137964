//! Staged orchestration of multi-scene video generation.
//!
//! This crate drives a creative brief through to a finished video:
//! - Scene planning via a chat-completion script generator
//! - Per-scene video jobs with a tracker gating the next stage
//! - Emotion-aware narration and final muxing
//! - Character/environment image composition

pub mod compose;
pub mod config;
pub mod controller;
pub mod emotion;
pub mod error;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod run;
pub mod script;
pub mod storyboard;
pub mod tracker;
pub mod transitions;

pub use compose::{ComposedImage, ImageComposer};
pub use config::{LlmConfig, PipelineConfig};
pub use controller::{PipelineServices, PipelineStageController};
pub use emotion::EmotionAnalyzer;
pub use error::{PipelineError, PipelineResult};
pub use llm::{ChatCompletion, ChatRequest, OpenAiChatClient};
pub use logging::SceneLogger;
pub use prompt::{CharacterTraits, EnvironmentTraits, PromptCompiler};
pub use run::{PipelineRun, SceneEdit};
pub use script::{LlmScriptGenerator, ScriptGenerator, ScriptRequest};
pub use storyboard::{parse_target_duration, plan_scene_count, Brief, DEFAULT_TARGET_SECS};
pub use tracker::{JobUpdate, SceneJobTracker};
