//! Design enhancement ("design prism").
//!
//! A bounded set of additive style rules for effect-driven artifacts. Rules
//! only ever add a declaration an element does not already have, so running
//! the pass over its own output changes nothing.

use oxc_allocator::Allocator;
use serde::Serialize;

use crate::artifact::Dialect;
use crate::classify::{Category, ClassificationProfile};
use crate::config::TransformOptions;
use crate::edits::EditBuffer;
use crate::emit::JsExpr;
use crate::parse::parse_artifact;
use crate::style::{collect_elements, emit, normalize, StylePlans};

pub const TYPOGRAPHY_SCALE: &str = "typography-scale";
pub const SPACING_RHYTHM: &str = "spacing-rhythm";
pub const SHADOW_DEPTH: &str = "shadow-depth";
pub const GRADIENT_DEFAULT: &str = "gradient-default";

const ROOT_FONT: &str = "Inter, system-ui, -apple-system, sans-serif";
const CARD_SHADOW: &str = "0 10px 30px rgba(0, 0, 0, 0.25)";
const DARK_GRADIENT: &str = "linear-gradient(135deg, #0f172a 0%, #1e293b 100%)";
const BACKGROUND_PROPERTIES: [&str; 3] = ["background", "backgroundColor", "backgroundImage"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhanceSettings {
    pub enabled: bool,
    pub threshold: u8,
}

impl EnhanceSettings {
    pub fn from_options(options: &TransformOptions) -> Self {
        EnhanceSettings {
            enabled: options.enable_enhancement,
            threshold: options.enhancement_threshold,
        }
    }

    pub fn permits(&self, profile: &ClassificationProfile) -> bool {
        self.enabled
            && profile.primary_category != Category::ContentDominant
            && profile.confidence_score >= self.threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedEnhancement {
    pub rule: String,
    pub element: String,
    pub property: String,
    pub line: u32,
}

/// Runs every rule over `plans` in a fixed order and returns the firings.
#[tracing::instrument(skip_all, target = "framecast", fields(category = profile.primary_category.name()))]
pub fn apply_rules(
    plans: &mut StylePlans,
    profile: &ClassificationProfile,
    settings: &EnhanceSettings,
) -> Vec<AppliedEnhancement> {
    if !settings.permits(profile) {
        tracing::debug!(
            target: "framecast",
            confidence = profile.confidence_score,
            threshold = settings.threshold,
            "enhancement skipped"
        );
        return Vec::new();
    }

    let mut applied = Vec::new();
    typography_scale(plans, &mut applied);
    if profile.primary_category != Category::Mixed {
        spacing_rhythm(plans, &mut applied);
    }
    shadow_depth(plans, &mut applied);
    gradient_default(plans, &mut applied);
    tracing::debug!(target: "framecast", fired = applied.len(), "enhancement rules applied");
    applied
}

fn fire(
    plans: &mut StylePlans,
    applied: &mut Vec<AppliedEnhancement>,
    rule: &str,
    idx: usize,
    property: &str,
    value: JsExpr,
) {
    if plans.add(idx, property, value) {
        let element = &plans.elements[idx];
        applied.push(AppliedEnhancement {
            rule: rule.to_string(),
            element: element.tag.clone(),
            property: property.to_string(),
            line: element.position.line,
        });
    }
}

fn typography_scale(plans: &mut StylePlans, applied: &mut Vec<AppliedEnhancement>) {
    for idx in 0..plans.len() {
        if plans.elements[idx].root {
            fire(plans, applied, TYPOGRAPHY_SCALE, idx, "fontFamily", JsExpr::str(ROOT_FONT));
        }
        let size = match plans.elements[idx].tag.as_str() {
            "h1" => 48.0,
            "h2" => 36.0,
            "h3" => 28.0,
            _ => continue,
        };
        fire(plans, applied, TYPOGRAPHY_SCALE, idx, "fontSize", JsExpr::Number(size));
    }
}

fn spacing_rhythm(plans: &mut StylePlans, applied: &mut Vec<AppliedEnhancement>) {
    for idx in 0..plans.len() {
        let container = matches!(
            plans.string_value(idx, "display").as_deref(),
            Some("flex" | "inline-flex" | "grid" | "inline-grid")
        );
        if container {
            fire(plans, applied, SPACING_RHYTHM, idx, "gap", JsExpr::Number(16.0));
        }
    }
}

fn shadow_depth(plans: &mut StylePlans, applied: &mut Vec<AppliedEnhancement>) {
    for idx in 0..plans.len() {
        let rounded = plans.has_property(idx, "borderRadius");
        let filled = BACKGROUND_PROPERTIES.iter().any(|p| plans.has_property(idx, p));
        if rounded && filled {
            fire(plans, applied, SHADOW_DEPTH, idx, "boxShadow", JsExpr::str(CARD_SHADOW));
        }
    }
}

fn gradient_default(plans: &mut StylePlans, applied: &mut Vec<AppliedEnhancement>) {
    for idx in 0..plans.len() {
        let bare = !BACKGROUND_PROPERTIES.iter().any(|p| plans.has_property(idx, p));
        if plans.elements[idx].root && bare {
            fire(plans, applied, GRADIENT_DEFAULT, idx, "background", JsExpr::str(DARK_GRADIENT));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceOutcome {
    pub text: String,
    pub applied: Vec<AppliedEnhancement>,
}

/// Normalizes and enhances `text` on its own. Text that does not parse is
/// returned unchanged.
pub fn enhance(text: &str, profile: &ClassificationProfile, options: &TransformOptions) -> EnhanceOutcome {
    let dialect = options.dialect.unwrap_or_else(|| Dialect::sniff(text));
    let unchanged = || EnhanceOutcome {
        text: text.to_string(),
        applied: Vec::new(),
    };
    if !dialect.is_transformable() {
        return unchanged();
    }
    let allocator = Allocator::default();
    let Ok(tree) = parse_artifact(&allocator, text, dialect) else {
        return unchanged();
    };

    let mut plans = normalize(&collect_elements(&tree));
    let applied = apply_rules(&mut plans, profile, &EnhanceSettings::from_options(options));
    let mut edits = EditBuffer::new();
    let conflicts = emit(&plans, text, &mut edits);
    if !conflicts.is_empty() {
        return unchanged();
    }
    EnhanceOutcome {
        text: edits.apply(text),
        applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"export default function Scene() {
  return (
    <div className="flex items-center">
      <h1>Title</h1>
      <div className="rounded-lg bg-slate-800 p-4">card</div>
    </div>
  );
}
"#;

    fn effect_profile() -> ClassificationProfile {
        ClassificationProfile::forced(Category::EffectDominant)
    }

    #[test]
    fn rules_fire_in_order() {
        let outcome = enhance(CARD, &effect_profile(), &TransformOptions::default());
        let fired: Vec<(&str, &str)> = outcome
            .applied
            .iter()
            .map(|a| (a.rule.as_str(), a.property.as_str()))
            .collect();
        assert_eq!(
            fired,
            vec![
                (TYPOGRAPHY_SCALE, "fontFamily"),
                (TYPOGRAPHY_SCALE, "fontSize"),
                (SPACING_RHYTHM, "gap"),
                (SHADOW_DEPTH, "boxShadow"),
                (GRADIENT_DEFAULT, "background"),
            ]
        );
        assert_eq!(outcome.applied[1].element, "h1");
        assert_eq!(outcome.applied[1].line, 4);
        assert!(outcome.text.contains("<h1 style={{ fontSize: 48 }}>Title</h1>"), "{}", outcome.text);
    }

    #[test]
    fn enhancement_is_idempotent() {
        let options = TransformOptions::default();
        let once = enhance(CARD, &effect_profile(), &options);
        let twice = enhance(&once.text, &effect_profile(), &options);
        assert_eq!(twice.text, once.text);
        assert!(twice.applied.is_empty());
    }

    #[test]
    fn content_and_low_confidence_are_untouched() {
        let options = TransformOptions::default();
        let content = enhance(CARD, &ClassificationProfile::forced(Category::ContentDominant), &options);
        assert!(content.applied.is_empty());

        let mut weak = effect_profile();
        weak.confidence_score = 40;
        assert!(enhance(CARD, &weak, &options).applied.is_empty());

        let disabled = options.with_enhancement(false);
        assert!(enhance(CARD, &effect_profile(), &disabled).applied.is_empty());
    }

    #[test]
    fn mixed_mode_skips_spacing() {
        let outcome = enhance(CARD, &ClassificationProfile::forced(Category::Mixed), &TransformOptions::default());
        assert!(outcome.applied.iter().all(|a| a.rule != SPACING_RHYTHM));
        assert!(!outcome.applied.is_empty());
    }
}
