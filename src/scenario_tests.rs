//! End-to-end runs of `transform` over representative artifacts.

use crate::classify::Category;
use crate::config::TransformOptions;
use crate::diagnostics::*;
use crate::guard::inspect;
use crate::pipeline::{transform, Stage};
use crate::rewrite::Fidelity;

pub(crate) const PARTICLE_FIELD: &str = r#"import React, { useEffect, useState } from 'react';

const COLORS = ['#f472b6', '#60a5fa', '#34d399'];

export default function ParticleField() {
  const [particles, setParticles] = useState(() =>
    Array.from({ length: 50 }, (_, i) => ({
      id: i,
      x: Math.random() * 800,
      y: Math.random() * 600,
      vx: Math.random() * 2 - 1,
      vy: Math.random() * 2 - 1,
      size: 2 + Math.random() * 4,
      color: COLORS[i % COLORS.length],
      phase: Math.random() * Math.PI * 2,
    }))
  );

  useEffect(() => {
    const id = setInterval(() => {
      setParticles(prev => prev.map(p => ({ ...p, x: p.x + p.vx, y: p.y + p.vy })));
    }, 16);
    return () => clearInterval(id);
  }, []);

  return (
    <svg width={800} height={600}>
      {particles.map(p => (
        <circle key={p.id} cx={p.x} cy={p.y} r={p.size} fill={p.color} opacity={0.5 + Math.sin(p.phase) / 2} />
      ))}
    </svg>
  );
}
"#;

pub(crate) const SLIDES: &str = r#"const slides = [
  { title: 'Plan the launch', body: 'Gather the team and agree on the goals for the quarter.' },
  { title: 'Build the product', body: 'Ship small increments and listen to every piece of feedback.' },
  { title: 'Tell the story', body: 'Write clear notes that explain why the work matters to people.' },
  { title: 'Measure the results', body: 'Review what worked and share the lessons with everyone involved.' },
];"#;

pub(crate) fn carousel() -> String {
    format!(
        r#"import {{ useState }} from 'react';

{}

export default function Carousel() {{
  const [index, setIndex] = useState(0);
  const slide = slides[index];
  return (
    <section>
      <h2>{{slide.title}}</h2>
      <p>{{slide.body}}</p>
      <button onClick={{() => setIndex(i => (i + 1) % slides.length)}}>Next slide</button>
    </section>
  );
}}
"#,
        SLIDES
    )
}

pub(crate) const DAMAGED_FONT: &str = r#"const styles = { fontFamily: 'Foo'", bar', color: 'white' };

export default function Banner() {
  return <div style={styles}>Hello there, friend of the show.</div>;
}
"#;

#[test]
fn particle_field_becomes_frame_driven() {
    let result = transform(PARTICLE_FIELD, &TransformOptions::default());
    assert!(!result.used_fallback, "{:?}", result.fallback_reason);
    let output = &result.output_text;

    assert!(!output.contains("setInterval"), "{}", output);
    assert!(!output.contains("clearInterval"));
    assert!(!output.contains("Math.random"));
    assert!(output.contains("__seededRandom((i * 1009)"), "{}", output);
    assert!(output.contains("const frame = useCurrentFrame();"));
    assert!(output.contains("x: __item.x + (__item.vx * Math.floor(frame / 0.48))"), "{}", output);
    assert!(output.contains("y: __item.y + (__item.vy * Math.floor(frame / 0.48))"), "{}", output);
    assert!(output.contains("...__item"));

    let particles = result
        .bindings
        .iter()
        .find(|b| b.name == "particles")
        .expect("particles binding");
    assert_ne!(particles.fidelity, Fidelity::Untouched);
    for property in ["id", "x", "y", "vx", "vy", "size", "color", "phase"] {
        assert!(
            particles.derived_properties.iter().any(|p| p == property),
            "{} missing from {:?}",
            property,
            particles.derived_properties
        );
    }
    assert!(particles.defaulted_properties.is_empty());
    for used in &particles.used_properties {
        assert!(particles.derived_properties.contains(used));
    }

    let profile = result.classification.as_ref().expect("classified");
    assert_eq!(profile.primary_category, Category::EffectDominant);
}

#[test]
fn click_carousel_steps_on_frames() {
    let input = carousel();
    let result = transform(&input, &TransformOptions::default());
    assert!(!result.used_fallback, "{:?}", result.fallback_reason);
    let output = &result.output_text;

    let profile = result.classification.as_ref().expect("classified");
    assert_eq!(profile.primary_category, Category::ContentDominant);
    assert!(
        output.contains("const index = Math.floor(frame / 90) % slides.length;"),
        "{}",
        output
    );
    assert!(output.contains(SLIDES));
    assert!(output.contains("<h2>{slide.title}</h2>"));
    assert!(output.contains("<p>{slide.body}</p>"));
    assert!(output.contains("<button>Next slide</button>"), "{}", output);
    assert!(result.applied_enhancements.is_empty());
}

#[test]
fn step_length_follows_options() {
    let options = TransformOptions {
        step_frames: Some(45),
        ..TransformOptions::default()
    };
    let result = transform(&carousel(), &options);
    assert!(result
        .output_text
        .contains("const index = Math.floor(frame / 45) % slides.length;"));
}

#[test]
fn quoted_font_corruption_is_repaired() {
    assert!(!inspect(DAMAGED_FONT).balanced);
    let result = transform(DAMAGED_FONT, &TransformOptions::default());
    assert!(!result.used_fallback, "{:?}", result.fallback_reason);
    assert!(result.output_text.contains("fontFamily: 'Foo, bar'"), "{}", result.output_text);
    assert!(result.stages.contains(&Stage::Repairing));

    let repaired = result
        .corruption_findings
        .iter()
        .find(|f| f.code == FC_CORRUPTION_REPAIRED)
        .expect("repair finding");
    assert!(repaired.resolved);
    assert_eq!(repaired.line, 1);
    assert!(result.findings.iter().any(|f| f.code == FC_PARSE_FAILURE));
}

#[test]
fn repair_disabled_falls_back() {
    let options = TransformOptions::default().with_max_repair_attempts(0);
    let result = transform(DAMAGED_FONT, &options);
    assert!(result.used_fallback);
    assert_eq!(result.output_text, DAMAGED_FONT);
}

#[test]
fn truncated_input_is_returned_verbatim() {
    let truncated = &PARTICLE_FIELD[..PARTICLE_FIELD.find("return (").unwrap_or(200) + 12];
    let result = transform(truncated, &TransformOptions::default());
    assert!(result.used_fallback);
    assert_eq!(result.output_text, truncated);
    assert!(result.fallback_reason.is_some());
    assert!(result.classification.is_none());
    assert!(result.bindings.is_empty());
}

#[test]
fn forced_category_overrides_classifier() {
    let options = TransformOptions::default().with_category(Category::EffectDominant);
    let result = transform(&carousel(), &options);
    let profile = result.classification.as_ref().expect("classified");
    assert_eq!(profile.primary_category, Category::EffectDominant);
    assert_eq!(profile.confidence_score, 100);
    assert!(!result.applied_enhancements.is_empty());
}

#[test]
fn result_serializes_in_camel_case() {
    let result = transform(&carousel(), &TransformOptions::default());
    let json = serde_json::to_value(&result).expect("serializable");
    assert_eq!(json["usedFallback"], serde_json::Value::Bool(false));
    assert!(json["outputText"].as_str().is_some());
    assert_eq!(json["stages"][0], "parsing");
    assert_eq!(json["classification"]["primaryCategory"], "content-dominant");
}
