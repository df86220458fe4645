//! Properties that must hold for every artifact, checked over a fixture set.

use crate::artifact::SourceArtifact;
use crate::classify::Category;
use crate::config::TransformOptions;
use crate::enhance::enhance;
use crate::guard::inspect;
use crate::pipeline::{classify_text, transform, transform_batch};
use crate::rewrite::Fidelity;
use crate::scenario_tests::{carousel, DAMAGED_FONT, PARTICLE_FIELD};

const COUNTER: &str = r#"import { useEffect, useState } from 'react';

export default function Counter() {
  const [count, setCount] = useState(0);
  const [angle, setAngle] = useState(0);
  useEffect(() => {
    const id = setInterval(() => setCount(c => c + 1), 1000);
    return () => clearInterval(id);
  }, []);
  useEffect(() => {
    let raf = requestAnimationFrame(function spin() {
      setAngle(a => (a + 6) % 360);
      raf = requestAnimationFrame(spin);
    });
    return () => cancelAnimationFrame(raf);
  }, []);
  return (
    <div className="flex items-center justify-center bg-slate-900 rounded-xl p-8">
      <h1 className="text-4xl font-bold text-white">{count}</h1>
      <div style={{ transform: `rotate(${angle}deg)`, width: 40, height: 40 }} />
    </div>
  );
}
"#;

const BALL: &str = r#"function Ball() {
  const [ball, setBall] = useState({ x: 0, y: 20, vx: 3 });
  useEffect(() => {
    const id = requestAnimationFrame(function step() {
      setBall(b => ({ ...b, x: b.x > 300 ? 0 : b.x + b.vx }));
    });
    return () => cancelAnimationFrame(id);
  }, []);
  return <div className="rounded-full bg-red-500" style={{ left: ball.x, top: ball.y }} />;
}
"#;

const CARD: &str = r#"export default function Card() {
  return (
    <article className="grid gap-4 rounded-lg bg-white shadow-md">
      <h2>Quarterly notes</h2>
      <p>Everything we learned this season, written down for the next team.</p>
    </article>
  );
}
"#;

const BROKEN: &[&str] = &[
    "export default function A() { return <div>",
    "const a = ;",
    "function B() { const [x, setX] = useState(0) return <p>{x}</p> }",
    "<<<>>>",
    "export default () => <div className=\"a\"></span>;",
];

fn fixtures() -> Vec<String> {
    vec![
        PARTICLE_FIELD.to_string(),
        carousel(),
        COUNTER.to_string(),
        BALL.to_string(),
        CARD.to_string(),
    ]
}

#[test]
fn enhancement_is_idempotent() {
    let options = TransformOptions::default();
    for category in [Category::EffectDominant, Category::Mixed] {
        let profile = crate::classify::ClassificationProfile::forced(category);
        for fixture in fixtures() {
            let once = enhance(&fixture, &profile, &options);
            let twice = enhance(&once.text, &profile, &options);
            assert_eq!(twice.text, once.text, "not idempotent for\n{}", fixture);
            assert!(twice.applied.is_empty());
        }
    }
}

#[test]
fn rewritten_bindings_cover_their_reads() {
    for fixture in fixtures() {
        let result = transform(&fixture, &TransformOptions::default());
        for binding in result.bindings.iter().filter(|b| b.fidelity != Fidelity::Untouched) {
            for used in &binding.used_properties {
                assert!(
                    binding.derived_properties.contains(used),
                    "`{}.{}` is read but not derived",
                    binding.name,
                    used
                );
            }
        }
    }
}

#[test]
fn unparseable_inputs_fall_back_verbatim() {
    for input in BROKEN {
        let result = transform(input, &TransformOptions::default());
        assert!(result.used_fallback, "expected fallback for {:?}", input);
        assert_eq!(result.output_text, *input);
        assert_eq!(result.input_digest, result.output_digest);
    }
}

#[test]
fn transforms_are_deterministic() {
    let options = TransformOptions::default();
    let inputs: Vec<String> = fixtures().into_iter().chain([DAMAGED_FONT.to_string()]).collect();
    let artifacts: Vec<SourceArtifact> = inputs.iter().map(SourceArtifact::new).collect();
    let batch = transform_batch(&artifacts, &options);

    for (input, batched) in inputs.iter().zip(&batch) {
        let first = transform(input, &options);
        let second = transform(input, &options);
        assert_eq!(first.output_text, second.output_text);
        assert_eq!(first.output_digest, second.output_digest);
        assert_eq!(first.output_text, batched.output_text);
        assert_eq!(first.findings, second.findings);
    }
}

#[test]
fn balanced_input_stays_balanced() {
    for fixture in fixtures() {
        assert!(inspect(&fixture).balanced, "fixture should scan clean:\n{}", fixture);
        let result = transform(&fixture, &TransformOptions::default());
        let after = inspect(&result.output_text);
        assert!(after.balanced, "{:?}\n{}", after.issues, result.output_text);
        assert_eq!(after.unresolved, 0);
    }
}

#[test]
fn classification_ignores_whitespace() {
    for fixture in fixtures() {
        let reformatted = fixture.replace('\n', "\n\n").replace("  ", "    ");
        let original = classify_text(&fixture, None).expect("fixture parses");
        let spaced = classify_text(&reformatted, None).expect("reformatted fixture parses");
        assert_eq!(original.primary_category, spaced.primary_category);
        assert_eq!(original.confidence_score, spaced.confidence_score);
        assert_eq!(original.signals, spaced.signals);
    }
}
