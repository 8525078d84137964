//! Narration emotion profiles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of weights in a profile.
pub const EMOTION_COUNT: usize = 8;

/// Weight names in wire order.
pub const EMOTION_LABELS: [&str; EMOTION_COUNT] = [
    "happy",
    "angry",
    "sad",
    "afraid",
    "disgusted",
    "melancholic",
    "surprised",
    "calm",
];

/// Eight non-negative weights describing narration delivery.
///
/// A profile is a snapshot for one script/context pair and travels with the
/// speech job that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmotionProfile {
    weights: [f32; EMOTION_COUNT],
}

impl EmotionProfile {
    /// Profile used whenever analysis cannot produce one.
    pub const DEFAULT: EmotionProfile = EmotionProfile {
        weights: [0.3, 0.1, 0.2, 0.1, 0.0, 0.2, 0.1, 0.5],
    };

    /// Build a profile, rejecting negative or non-finite weights.
    pub fn new(weights: [f32; EMOTION_COUNT]) -> Option<Self> {
        if weights.iter().all(|w| w.is_finite() && *w >= 0.0) {
            Some(Self { weights })
        } else {
            None
        }
    }

    /// Parse `"0.3,0.1,..."`. Exactly eight numeric, non-negative tokens.
    pub fn parse_csv(raw: &str) -> Option<Self> {
        let tokens: Vec<&str> = raw.trim().split(',').map(str::trim).collect();
        if tokens.len() != EMOTION_COUNT {
            return None;
        }

        let mut weights = [0.0f32; EMOTION_COUNT];
        for (slot, token) in weights.iter_mut().zip(tokens) {
            *slot = token.parse().ok()?;
        }
        Self::new(weights)
    }

    pub fn weights(&self) -> &[f32; EMOTION_COUNT] {
        &self.weights
    }

    /// Comma-separated form expected by the speech service.
    pub fn to_csv(&self) -> String {
        self.weights
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for EmotionProfile {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for EmotionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_csv())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_csv() {
        let profile = EmotionProfile::parse_csv(" 0.1, 0, 0.2,0.1,0.0,0.3,0.2,0.9 ").unwrap();
        assert_eq!(profile.weights()[7], 0.9);
        assert_eq!(profile.weights()[1], 0.0);
    }

    #[test]
    fn test_parse_rejects_wrong_count() {
        assert!(EmotionProfile::parse_csv("0.1,0.2,0.3").is_none());
        assert!(EmotionProfile::parse_csv("0.1,0.2,0.3,0.4,0.5,0.6,0.7,0.8,0.9").is_none());
        assert!(EmotionProfile::parse_csv("").is_none());
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert!(EmotionProfile::parse_csv("0.1,x,0.3,0.4,0.5,0.6,0.7,0.8").is_none());
        assert!(EmotionProfile::parse_csv("0.1,-0.2,0.3,0.4,0.5,0.6,0.7,0.8").is_none());
        assert!(EmotionProfile::parse_csv("0.1,NaN,0.3,0.4,0.5,0.6,0.7,0.8").is_none());
    }

    #[test]
    fn test_default_csv() {
        assert_eq!(EmotionProfile::DEFAULT.to_csv(), "0.3,0.1,0.2,0.1,0,0.2,0.1,0.5");
    }
}
