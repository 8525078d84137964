//! Deterministic prompt construction.
//!
//! Everything here is pure string formatting over structured data.

use reel_models::Scene;

/// Longest image prompt the image service accepts well.
const MAX_IMAGE_PROMPT_CHARS: usize = 900;

/// Character traits for a portrait prompt. Empty fields are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterTraits {
    pub age: Option<u32>,
    pub gender: String,
    pub ethnicity: String,
    pub skin_color: String,
    pub undertone: String,
    pub eye_shape: String,
    pub eye_color: String,
    pub expression: String,
    pub hair_length: String,
    pub hair_color: String,
    pub hairstyle: String,
    pub accessories: Vec<String>,
    pub height_cm: Option<u32>,
    pub body_type: String,
    pub outfit_style: String,
    pub outfit_colors: Vec<String>,
    pub footwear: String,
    pub pose: String,
    pub camera: String,
    pub framing: String,
    pub lighting: String,
    pub background: String,
    pub style_hints: Vec<String>,
    pub extra_notes: String,
    pub negative_prompts: Vec<String>,
}

/// Environment traits for a background prompt. Empty fields are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentTraits {
    pub location: String,
    pub time_of_day: String,
    pub weather: String,
    pub season: String,
    pub mood: String,
    pub era: String,
    pub subject_focus: String,
    pub foreground: Vec<String>,
    pub midground: Vec<String>,
    pub background: Vec<String>,
    pub camera: String,
    pub lighting: String,
    pub color_palette: Vec<String>,
    pub realism: String,
    pub style_lineage: Vec<String>,
    pub style_hints: Vec<String>,
    pub extra_notes: String,
    pub negative_prompts: Vec<String>,
}

/// Turns scenes and trait sheets into service prompts.
pub struct PromptCompiler;

impl PromptCompiler {
    /// Video prompt for a scene: the detailed prompt, prefixed with
    /// `[START: ...]` / `[END: ...]` for every non-default transition hint.
    pub fn scene_video_prompt(scene: &Scene) -> String {
        let mut hints = Vec::with_capacity(2);
        if scene.has_custom_transition_in() {
            hints.push(format!("[START: {}]", scene.transition_in.trim()));
        }
        if scene.has_custom_transition_out() {
            hints.push(format!("[END: {}]", scene.transition_out.trim()));
        }

        if hints.is_empty() {
            scene.detailed_prompt.clone()
        } else {
            format!("{} {}", hints.join(" "), scene.detailed_prompt)
        }
    }

    /// Narration for the whole run: scene scripts in ordinal order.
    pub fn narration_script(scenes: &[Scene]) -> String {
        Self::by_ordinal(scenes)
            .iter()
            .map(|s| s.narration_script.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One `Scene N: <visual> - <script>` line per scene, for emotion analysis.
    pub fn scene_context(scenes: &[Scene]) -> String {
        Self::by_ordinal(scenes)
            .iter()
            .map(|s| format!("Scene {}: {} - {}", s.ordinal, s.visual_description, s.narration_script))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn character_prompt(traits: &CharacterTraits) -> String {
        let mut physical = Vec::new();
        if let Some(age) = traits.age.filter(|a| *a > 0) {
            physical.push(format!("{age} years old"));
        }
        if !traits.gender.is_empty() && traits.gender != "unspecified" {
            physical.push(traits.gender.clone());
        }
        push_suffixed(&mut physical, &traits.ethnicity, "descent");
        if !traits.skin_color.is_empty() {
            let undertone = if traits.undertone.is_empty() { "neutral" } else { traits.undertone.as_str() };
            physical.push(format!("{} {} skin", undertone, traits.skin_color));
        }
        if !traits.eye_shape.is_empty() && !traits.eye_color.is_empty() {
            physical.push(format!("{} {} eyes", traits.eye_shape, traits.eye_color));
        }
        push_suffixed(&mut physical, &traits.expression, "expression");
        let hair = join_words(&[&traits.hair_length, &traits.hair_color, &traits.hairstyle]);
        if !hair.is_empty() {
            physical.push(format!("{hair} hair"));
        }
        if !traits.accessories.is_empty() {
            physical.push(format!("wearing {}", join_commas(&traits.accessories)));
        }

        let mut body = Vec::new();
        if let Some(height) = traits.height_cm.filter(|h| *h > 0) {
            body.push(format!("{height}cm tall"));
        }
        push_suffixed(&mut body, &traits.body_type, "build");

        let mut clothing = Vec::new();
        push_suffixed(&mut clothing, &traits.outfit_style, "outfit");
        if !traits.outfit_colors.is_empty() {
            clothing.push(format!("in {}", join_commas(&traits.outfit_colors)));
        }
        push_prefixed(&mut clothing, "with", &traits.footwear);

        let mut staging = Vec::new();
        if !traits.pose.is_empty() {
            staging.push(format!("in {} pose", traits.pose));
        }
        push_prefixed(&mut staging, "shot with", &traits.camera);
        push_suffixed(&mut staging, &traits.framing, "framing");
        push_suffixed(&mut staging, &traits.lighting, "lighting");
        if !traits.background.is_empty() {
            staging.push(format!("against {} background", traits.background));
        }

        let groups = [physical, body, clothing, staging];
        finish_image_prompt(
            "Create Character with:",
            &groups,
            &traits.style_hints,
            &traits.extra_notes,
            &traits.negative_prompts,
        )
    }

    pub fn environment_prompt(traits: &EnvironmentTraits) -> String {
        let mut setting = Vec::new();
        if !traits.location.is_empty() {
            setting.push(traits.location.clone());
        }
        push_prefixed(&mut setting, "during", &traits.time_of_day);
        push_suffixed(&mut setting, &traits.weather, "weather");
        push_suffixed(&mut setting, &traits.season, "season");
        push_suffixed(&mut setting, &traits.mood, "mood");
        push_suffixed(&mut setting, &traits.era, "era");

        let mut composition = Vec::new();
        push_prefixed(&mut composition, "focusing on", &traits.subject_focus);
        if !traits.foreground.is_empty() {
            composition.push(format!("foreground featuring {}", join_commas(&traits.foreground)));
        }
        if !traits.midground.is_empty() {
            composition.push(format!("midground with {}", join_commas(&traits.midground)));
        }
        if !traits.background.is_empty() {
            composition.push(format!("background showing {}", join_commas(&traits.background)));
        }

        let mut technical = Vec::new();
        push_prefixed(&mut technical, "captured with", &traits.camera);
        push_suffixed(&mut technical, &traits.lighting, "lighting");

        let mut look = Vec::new();
        if !traits.color_palette.is_empty() {
            look.push(format!("color palette of {}", join_commas(&traits.color_palette)));
        }
        push_suffixed(&mut look, &traits.realism, "style");
        if !traits.style_lineage.is_empty() {
            look.push(format!("inspired by {}", join_commas(&traits.style_lineage)));
        }

        let groups = [setting, composition, technical, look];
        finish_image_prompt(
            "Create Environment with:",
            &groups,
            &traits.style_hints,
            &traits.extra_notes,
            &traits.negative_prompts,
        )
    }

    fn by_ordinal(scenes: &[Scene]) -> Vec<&Scene> {
        let mut ordered: Vec<&Scene> = scenes.iter().collect();
        ordered.sort_by_key(|s| s.ordinal);
        ordered
    }
}

fn push_suffixed(parts: &mut Vec<String>, value: &str, suffix: &str) {
    if !value.is_empty() {
        parts.push(format!("{value} {suffix}"));
    }
}

fn push_prefixed(parts: &mut Vec<String>, prefix: &str, value: &str) {
    if !value.is_empty() {
        parts.push(format!("{prefix} {value}"));
    }
}

fn join_words(words: &[&String]) -> String {
    words
        .iter()
        .filter(|w| !w.is_empty())
        .map(|w| w.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_commas(items: &[String]) -> String {
    items
        .iter()
        .filter(|s| !s.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn finish_image_prompt(
    prefix: &str,
    groups: &[Vec<String>],
    style_hints: &[String],
    extra_notes: &str,
    negative: &[String],
) -> String {
    let mut parts: Vec<String> = groups
        .iter()
        .filter(|g| !g.is_empty())
        .map(|g| g.join(", "))
        .collect();
    if !style_hints.is_empty() {
        parts.push(format!("Style: {}", join_commas(style_hints)));
    }
    if !extra_notes.trim().is_empty() {
        parts.push(normalize_whitespace(extra_notes));
    }
    if !negative.is_empty() {
        parts.push(format!("Avoid: {}", join_commas(negative)));
    }

    let body = parts.join(". ").replace("..", ".");
    let prompt = normalize_whitespace(&format!("{prefix} {body}"));
    if prompt.chars().count() > MAX_IMAGE_PROMPT_CHARS {
        let truncated: String = prompt.chars().take(MAX_IMAGE_PROMPT_CHARS - 3).collect();
        format!("{}...", truncated.trim_end())
    } else {
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(ordinal: u32, visual: &str, script: &str) -> Scene {
        let mut s = Scene::new(ordinal, format!("Scene {ordinal}"), "prompt").with_narration(script);
        s.visual_description = visual.to_string();
        s
    }

    #[test]
    fn test_scene_prompt_skips_default_transitions() {
        let plain = Scene::new(1, "Dawn", "Golden light over peaks");
        assert_eq!(PromptCompiler::scene_video_prompt(&plain), "Golden light over peaks");

        let out_only = plain.clone().with_transitions("Scene begins", "camera pans right");
        assert_eq!(
            PromptCompiler::scene_video_prompt(&out_only),
            "[END: camera pans right] Golden light over peaks"
        );

        let both = plain.with_transitions("continuing the rightward pan", "rider turns left");
        assert_eq!(
            PromptCompiler::scene_video_prompt(&both),
            "[START: continuing the rightward pan] [END: rider turns left] Golden light over peaks"
        );
    }

    #[test]
    fn test_narration_follows_ordinal_order() {
        let scenes = vec![scene(2, "b", "Second."), scene(1, "a", "First."), scene(3, "c", "")];
        assert_eq!(PromptCompiler::narration_script(&scenes), "First. Second.");
        assert_eq!(
            PromptCompiler::scene_context(&scenes),
            "Scene 1: a - First.\nScene 2: b - Second.\nScene 3: c - "
        );
    }

    #[test]
    fn test_character_prompt_groups() {
        let traits = CharacterTraits {
            age: Some(32),
            gender: "woman".into(),
            hair_color: "auburn".into(),
            hairstyle: "messy bun".into(),
            outfit_style: "casual".into(),
            outfit_colors: vec!["cream".into(), "sage".into()],
            style_hints: vec!["cinematic".into()],
            negative_prompts: vec!["blur".into()],
            ..Default::default()
        };
        assert_eq!(
            PromptCompiler::character_prompt(&traits),
            "Create Character with: 32 years old, woman, auburn messy bun hair. casual outfit, in cream, sage. Style: cinematic. Avoid: blur"
        );
    }

    #[test]
    fn test_environment_prompt_is_capped() {
        let traits = EnvironmentTraits {
            location: "alpine meadow".into(),
            extra_notes: "wildflowers ".repeat(200),
            ..Default::default()
        };
        let prompt = PromptCompiler::environment_prompt(&traits);
        assert!(prompt.starts_with("Create Environment with: alpine meadow. wildflowers"));
        assert!(prompt.chars().count() <= MAX_IMAGE_PROMPT_CHARS);
        assert!(prompt.ends_with("..."));
    }
}
