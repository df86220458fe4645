//! Pattern classifier.
//!
//! Scores a tree on a handful of structural signals and picks the category
//! that drives the rest of the pipeline. Only node kinds are counted, never
//! byte positions, so reformatting an artifact cannot change its category.

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::parse::SyntaxTree;
use crate::syntax::{
    argument_expression, attribute_name, binding_name, callee_path, collect_local_functions,
    is_hook_call, numeric_value, static_key_name, strip_parens, timer_kind, FunctionParts,
    TimerKind,
};

/// Score difference at or below which the artifact counts as content.
pub const TIE_MARGIN: u32 = 10;
/// Both scores at or above this make an artifact mixed.
pub const MIXED_FLOOR: u32 = 40;
/// Trees smaller than this cannot earn more than half confidence.
pub const MIN_NODES: u32 = 8;

const GEOMETRIC_NAMES: &[&str] = &[
    "x", "y", "z", "vx", "vy", "vz", "dx", "dy", "angle", "rotation", "rotate", "radius", "size",
    "scale", "speed", "velocity", "phase", "orbit", "offset", "progress", "hue", "position", "pos",
    "theta", "amplitude", "frequency",
];

const TEXT_ATTRIBUTES: &[&str] = &["className", "class", "style", "id", "key", "src", "href", "type"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ContentDominant,
    EffectDominant,
    Mixed,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::ContentDominant => "content-dominant",
            Category::EffectDominant => "effect-dominant",
            Category::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signals {
    pub periodic_updates: u32,
    pub prose_words: u32,
    pub text_nodes: u32,
    pub geometric_bindings: u32,
    pub node_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationProfile {
    pub primary_category: Category,
    pub confidence_score: u8,
    pub matched_signals: Vec<String>,
    pub effect_score: u32,
    pub content_score: u32,
    pub signals: Signals,
}

impl ClassificationProfile {
    /// Profile for a caller-forced category.
    pub fn forced(category: Category) -> Self {
        ClassificationProfile {
            primary_category: category,
            confidence_score: 100,
            matched_signals: vec![format!("forced:{}", category.name())],
            effect_score: 0,
            content_score: 0,
            signals: Signals::default(),
        }
    }
}

#[tracing::instrument(skip_all, fields(dialect = ?tree.dialect))]
pub fn classify(tree: &SyntaxTree) -> ClassificationProfile {
    let functions = collect_local_functions(&tree.program);
    let mut collector = SignalCollector {
        signals: Signals::default(),
        matched: BTreeSet::new(),
        functions: &functions,
    };
    collector.visit_program(&tree.program);
    let profile = score(collector.signals, collector.matched);
    tracing::debug!(
        target: "framecast",
        category = profile.primary_category.name(),
        confidence = profile.confidence_score,
        effect = profile.effect_score,
        content = profile.content_score,
        "classified artifact"
    );
    profile
}

/// Weighted scoring over collected signals.
pub fn score(signals: Signals, matched: BTreeSet<String>) -> ClassificationProfile {
    let effect = (35 * signals.periodic_updates.min(3) + 25 * signals.geometric_bindings.min(3)).min(100);
    let content = (signals.prose_words.min(120) * 2 / 3 + 2 * signals.text_nodes.min(15)).min(100);
    let diff = effect.abs_diff(content);

    let (category, mut confidence) = if diff <= TIE_MARGIN {
        (Category::ContentDominant, ratio(diff, effect + content))
    } else if effect >= MIXED_FLOOR && content >= MIXED_FLOOR {
        (Category::Mixed, ratio(effect.min(content), effect.max(content)))
    } else if effect > content {
        (Category::EffectDominant, ratio(diff, effect + content))
    } else {
        (Category::ContentDominant, ratio(diff, effect + content))
    };
    if signals.node_count < MIN_NODES {
        confidence = confidence.min(50);
    }

    let mut matched_signals: Vec<String> = matched.into_iter().collect();
    matched_signals.push(format!("prose-words:{}", signals.prose_words));
    matched_signals.push(format!("nodes:{}", signals.node_count));

    ClassificationProfile {
        primary_category: category,
        confidence_score: confidence as u8,
        matched_signals,
        effect_score: effect,
        content_score: content,
        signals,
    }
}

fn ratio(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        0
    } else {
        (part * 100 / whole).min(100)
    }
}

struct SignalCollector<'f, 'b, 'a> {
    signals: Signals,
    matched: BTreeSet<String>,
    functions: &'f HashMap<String, FunctionParts<'b, 'a>>,
}

impl<'f, 'b, 'a> SignalCollector<'f, 'b, 'a> {
    fn inspect_state(&mut self, declarator: &VariableDeclarator<'a>) {
        let Some(Expression::CallExpression(call)) = declarator.init.as_ref().map(strip_parens) else {
            return;
        };
        if !is_hook_call(call, "useState") {
            return;
        }
        let BindingPattern::ArrayPattern(pattern) = &declarator.id else { return };
        let Some(name) = pattern
            .elements
            .first()
            .and_then(|el| el.as_ref())
            .and_then(binding_name)
        else {
            return;
        };

        let init = argument_expression(call, 0);
        let numeric_init = init.and_then(numeric_value).is_some();
        let mut keys = KeyCollector::default();
        if let Some(init) = init {
            keys.visit_expression(init);
            if let Expression::CallExpression(inner) = strip_parens(init) {
                if let Some(parts) = callee_path(inner).and_then(|path| self.functions.get(&path)) {
                    for stmt in parts.statements() {
                        keys.visit_statement(stmt);
                    }
                }
            }
        }

        let geometric_key = keys.keys.iter().any(|k| is_geometric(k));
        let geometric_name = numeric_init && is_geometric(&name.to_ascii_lowercase());
        if geometric_key || geometric_name || keys.max_length >= 10 {
            self.signals.geometric_bindings += 1;
            self.matched.insert(format!("geometric-binding:{}", name));
        }
    }
}

fn is_geometric(name: &str) -> bool {
    GEOMETRIC_NAMES.contains(&name)
        || GEOMETRIC_NAMES
            .iter()
            .any(|g| g.len() > 2 && name.to_ascii_lowercase().ends_with(g))
}

impl<'f, 'b, 'a> Visit<'a> for SignalCollector<'f, 'b, 'a> {
    fn visit_statement(&mut self, stmt: &Statement<'a>) {
        self.signals.node_count += 1;
        walk::walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &Expression<'a>) {
        self.signals.node_count += 1;
        walk::walk_expression(self, expr);
    }

    fn visit_jsx_element(&mut self, element: &JSXElement<'a>) {
        self.signals.node_count += 1;
        walk::walk_jsx_element(self, element);
    }

    fn visit_import_declaration(&mut self, _decl: &ImportDeclaration<'a>) {}

    fn visit_variable_declarator(&mut self, declarator: &VariableDeclarator<'a>) {
        self.inspect_state(declarator);
        walk::walk_variable_declarator(self, declarator);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Some(kind) = timer_kind(call) {
            self.signals.periodic_updates += 1;
            let label = match kind {
                TimerKind::Interval => "setInterval",
                TimerKind::Timeout => "setTimeout",
                TimerKind::AnimationFrame => "requestAnimationFrame",
            };
            self.matched.insert(format!("periodic-update:{}", label));
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_jsx_text(&mut self, text: &JSXText<'a>) {
        let words = prose_words(text.value.as_str());
        if words > 0 {
            self.signals.text_nodes += 1;
            self.signals.prose_words += words;
        }
    }

    fn visit_jsx_attribute(&mut self, attr: &JSXAttribute<'a>) {
        if let Some(name) = attribute_name(attr) {
            if TEXT_ATTRIBUTES.contains(&name.as_str()) {
                return;
            }
        }
        walk::walk_jsx_attribute(self, attr);
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        // Inline style objects are layout, not prose.
        if static_key_name(&prop.key).as_deref() == Some("style") {
            return;
        }
        walk::walk_object_property(self, prop);
    }

    fn visit_string_literal(&mut self, lit: &StringLiteral<'a>) {
        let value = lit.value.as_str();
        let tokens: Vec<&str> = value.split_whitespace().collect();
        if tokens.len() >= 3 && prose_words(value) * 10 >= tokens.len() as u32 * 6 {
            self.signals.prose_words += prose_words(value);
        }
    }

    fn visit_template_literal(&mut self, lit: &TemplateLiteral<'a>) {
        if lit
            .quasis
            .iter()
            .any(|quasi| quasi.value.raw.as_str().contains("@keyframes"))
        {
            self.signals.periodic_updates += 1;
            self.matched.insert("periodic-update:css-keyframes".to_string());
        }
        walk::walk_template_literal(self, lit);
    }
}

/// Words made of letters, allowing apostrophes and trailing punctuation.
fn prose_words(text: &str) -> u32 {
    text.split_whitespace()
        .filter(|token| {
            let word = token.trim_end_matches(|c: char| matches!(c, ',' | '.' | '!' | '?' | ':' | ';'));
            !word.is_empty() && word.chars().all(|c| c.is_alphabetic() || c == '\'')
        })
        .count() as u32
}

#[derive(Default)]
struct KeyCollector {
    keys: BTreeSet<String>,
    max_length: u32,
}

impl<'a> Visit<'a> for KeyCollector {
    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if let Some(name) = static_key_name(&prop.key) {
            if name == "length" {
                if let Some(n) = numeric_value(&prop.value) {
                    self.max_length = self.max_length.max(n as u32);
                }
            }
            self.keys.insert(name);
        }
        walk::walk_object_property(self, prop);
    }

    fn visit_binary_expression(&mut self, expr: &BinaryExpression<'a>) {
        if matches!(expr.operator, BinaryOperator::LessThan | BinaryOperator::LessEqualThan) {
            if let Some(n) = numeric_value(&expr.right) {
                self.max_length = self.max_length.max(n as u32);
            }
        }
        walk::walk_binary_expression(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Dialect;
    use crate::parse::parse_artifact;
    use oxc_allocator::Allocator;

    fn classify_code(code: &str) -> ClassificationProfile {
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, code, Dialect::Tsx).unwrap();
        classify(&tree)
    }

    const ORBIT: &str = r#"
import React, { useState, useEffect } from 'react';
export default function Orbit() {
  const [angle, setAngle] = useState(0);
  useEffect(() => {
    const id = setInterval(() => setAngle(a => a + 2), 16);
    return () => clearInterval(id);
  }, []);
  return <div style={{ transform: `rotate(${angle}deg)` }} />;
}
"#;

    const ARTICLE: &str = r#"
export default function Article() {
  return (
    <article>
      <h1>Why deterministic rendering matters</h1>
      <p>Offline renderers sample every frame exactly once, so any hidden clock makes output drift between runs.</p>
      <p>Moving state onto a frame counter keeps each frame reproducible and easy to review.</p>
    </article>
  );
}
"#;

    #[test]
    fn timer_driven_geometry_is_effect_dominant() {
        let profile = classify_code(ORBIT);
        assert_eq!(profile.primary_category, Category::EffectDominant);
        assert!(profile.confidence_score >= 60);
        assert!(profile
            .matched_signals
            .contains(&"periodic-update:setInterval".to_string()));
        assert!(profile
            .matched_signals
            .contains(&"geometric-binding:angle".to_string()));
    }

    #[test]
    fn prose_is_content_dominant() {
        let profile = classify_code(ARTICLE);
        assert_eq!(profile.primary_category, Category::ContentDominant);
        assert_eq!(profile.signals.periodic_updates, 0);
        assert!(profile.signals.prose_words > 20);
    }

    #[test]
    fn whitespace_does_not_change_profile() {
        let reflowed = ORBIT.replace("\n", "\n\n   ").replace("  ", "    ");
        assert_eq!(classify_code(ORBIT), classify_code(&reflowed));
    }

    #[test]
    fn ties_default_to_content() {
        let signals = Signals {
            periodic_updates: 1,
            prose_words: 45,
            text_nodes: 1,
            geometric_bindings: 0,
            node_count: 40,
        };
        let profile = score(signals, BTreeSet::new());
        assert_eq!(profile.effect_score, 35);
        assert_eq!(profile.content_score, 32);
        assert_eq!(profile.primary_category, Category::ContentDominant);
    }

    #[test]
    fn strong_signals_on_both_sides_are_mixed() {
        let signals = Signals {
            periodic_updates: 2,
            prose_words: 90,
            text_nodes: 6,
            geometric_bindings: 1,
            node_count: 200,
        };
        let profile = score(signals, BTreeSet::new());
        assert_eq!(profile.effect_score, 95);
        assert_eq!(profile.content_score, 72);
        assert_eq!(profile.primary_category, Category::Mixed);
    }
}
