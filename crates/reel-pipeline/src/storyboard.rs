//! Creative brief and scene-count planning.

use reel_models::TonePreset;

use crate::config::PipelineConfig;

/// Total duration assumed when a brief's label cannot be parsed.
pub const DEFAULT_TARGET_SECS: u32 = 40;

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Brief {
    pub idea: String,
    /// Desired total video length in seconds
    pub target_secs: u32,
    pub tone: TonePreset,
}

impl Brief {
    pub fn new(idea: impl Into<String>, target_secs: u32, tone_id: &str) -> Self {
        Self {
            idea: idea.into(),
            target_secs,
            tone: TonePreset::find(tone_id),
        }
    }
}

/// Parse a duration label: `"30"`, `"60"`, or a range like `"40-50"`
/// (upper bound wins). Anything else yields [`DEFAULT_TARGET_SECS`].
pub fn parse_target_duration(label: &str) -> u32 {
    let label = label.trim();
    let candidate = match label.split_once('-') {
        Some((_, upper)) => upper.trim(),
        None => label,
    };
    candidate
        .trim_end_matches('s')
        .parse::<u32>()
        .ok()
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TARGET_SECS)
}

/// Number of scenes to request for `target_secs`.
///
/// `max(ceil(target / max_scene_secs), min_scenes)`, or the fixed testing
/// count when testing mode is on.
pub fn plan_scene_count(target_secs: u32, config: &PipelineConfig) -> u32 {
    if config.testing_mode {
        return config.testing_scene_count.max(1);
    }
    let per_scene = config.max_scene_secs.max(1);
    target_secs.div_ceil(per_scene).max(config.min_scenes).max(1)
}
