//! Recurrence analysis.
//!
//! A state update such as `p => ({ ...p, x: p.x + p.vx })` describes one tick
//! of a recurrence. This module recognizes the shapes that have a closed form
//! in the tick count (linear, modular, geometric, toggles, integrated
//! velocity) and marks everything else opaque, with a fallback step when one
//! branch of the update is still recognizable.

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::diagnostics::SourceSpan;
use crate::syntax::{
    callee_path, is_math_random, is_wall_clock_read, numeric_value, span_of, static_key_name,
    strip_parens, FunctionParts,
};

/// Side-effect-free arithmetic over the previous value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "term", rename_all = "camelCase")]
pub enum Term {
    Num { value: f64 },
    /// The previous value of a scalar binding.
    Prev,
    /// A property of the previous element or record.
    Prop { name: String },
    /// Authored code that does not depend on the previous value.
    Free { span: SourceSpan },
    Neg { inner: Box<Term> },
    Not { inner: Box<Term> },
    Bin { lhs: Box<Term>, op: ArithOp, rhs: Box<Term> },
    Math { function: String, args: Vec<Term> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Term {
    fn num(value: f64) -> Term {
        Term::Num { value }
    }

    fn bin(lhs: Term, op: ArithOp, rhs: Term) -> Term {
        Term::Bin {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }

    fn mentions_prev(&self) -> bool {
        match self {
            Term::Prev => true,
            Term::Num { .. } | Term::Prop { .. } | Term::Free { .. } => false,
            Term::Neg { inner } | Term::Not { inner } => inner.mentions_prev(),
            Term::Bin { lhs, rhs, .. } => lhs.mentions_prev() || rhs.mentions_prev(),
            Term::Math { args, .. } => args.iter().any(Term::mentions_prev),
        }
    }

    /// Property names read off the previous element.
    pub fn props(&self, out: &mut BTreeSet<String>) {
        match self {
            Term::Prop { name } => {
                out.insert(name.clone());
            }
            Term::Neg { inner } | Term::Not { inner } => inner.props(out),
            Term::Bin { lhs, rhs, .. } => {
                lhs.props(out);
                rhs.props(out);
            }
            Term::Math { args, .. } => args.iter().for_each(|arg| arg.props(out)),
            _ => {}
        }
    }

    fn mentions_prop(&self, name: &str) -> bool {
        let mut props = BTreeSet::new();
        self.props(&mut props);
        props.contains(name)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Term::Num { value } => Some(*value),
            Term::Neg { inner } => inner.as_number().map(|v| -v),
            _ => None,
        }
    }
}

/// How one value evolves per tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "form", rename_all = "camelCase")]
pub enum Update {
    /// `value + step`
    Linear { step: Term },
    /// `(value + step) % modulus`
    Modular { step: Term, modulus: Term },
    /// `value * ratio`
    Geometric { ratio: Term },
    /// `!value`
    Toggle,
    /// Replaced by a value that no longer depends on itself.
    Set { value: Term },
    /// `value + velocity` where `velocity` itself steps linearly by `accel`.
    Integrated { velocity: String, accel: Term },
    /// No closed form. `fallback` is the best-effort approximation, if any.
    Opaque {
        reason: String,
        fallback: Option<Box<Update>>,
    },
}

impl Update {
    pub fn is_opaque(&self) -> bool {
        matches!(self, Update::Opaque { .. })
    }

    fn opaque(reason: impl Into<String>, fallback: Option<Update>) -> Update {
        Update::Opaque {
            reason: reason.into(),
            fallback: fallback.map(Box::new),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyUpdate {
    pub name: String,
    pub update: Update,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Recurrence {
    /// The whole value steps as a scalar.
    Scalar { update: Update },
    /// Every element of a collection is updated the same way.
    Elements { properties: Vec<PropertyUpdate>, conditional: bool },
    /// A single record is updated property by property.
    Record { properties: Vec<PropertyUpdate>, conditional: bool },
    Opaque { reason: String },
}

impl Recurrence {
    /// True when any part needed an approximation.
    pub fn is_low_fidelity(&self) -> bool {
        match self {
            Recurrence::Scalar { update } => update.is_opaque(),
            Recurrence::Elements { properties, conditional }
            | Recurrence::Record { properties, conditional } => {
                *conditional || properties.iter().any(|p| p.update.is_opaque())
            }
            Recurrence::Opaque { .. } => true,
        }
    }

    pub fn opaque_reasons(&self) -> Vec<String> {
        match self {
            Recurrence::Scalar { update } => reason_of(update).into_iter().collect(),
            Recurrence::Elements { properties, conditional }
            | Recurrence::Record { properties, conditional } => {
                let mut reasons: Vec<String> = properties
                    .iter()
                    .filter_map(|p| reason_of(&p.update).map(|r| format!("{}: {}", p.name, r)))
                    .collect();
                if *conditional {
                    reasons.push("conditional statements in the update were ignored".to_string());
                }
                reasons
            }
            Recurrence::Opaque { reason } => vec![reason.clone()],
        }
    }
}

fn reason_of(update: &Update) -> Option<String> {
    match update {
        Update::Opaque { reason, .. } => Some(reason.clone()),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYSIS
// ═══════════════════════════════════════════════════════════════════════════════

/// Analyze the argument of a setter call for binding `binding`. `mutable`
/// names the other bindings whose values change over time.
pub fn analyze_update(
    arg: &Expression,
    binding: &str,
    source: &str,
    mutable: &BTreeSet<String>,
) -> Recurrence {
    let arg = strip_parens(arg);
    if let Some(parts) = FunctionParts::of(arg) {
        let Some(param) = parts.param_name(0) else {
            return Recurrence::Opaque {
                reason: "update function without a named parameter".to_string(),
            };
        };
        if let Some(recurrence) = analyze_collection_update(&parts, param, source, mutable) {
            return recurrence;
        }
        if let Some(recurrence) = analyze_record_update(&parts, param, source, mutable) {
            return recurrence;
        }
        return match parts.returned_expression() {
            Some(body) if parts.statements().len() <= 1 || parts.expression_body => {
                let mut ctx = TermContext::scalar(&[param, binding], source);
                ctx.mutable = mutable.clone();
                Recurrence::Scalar {
                    update: analyze_value(body, &ctx, None),
                }
            }
            _ => Recurrence::Opaque {
                reason: "update function with statements".to_string(),
            },
        };
    }

    // `setValue(expr)` reading the binding directly.
    let mut ctx = TermContext::scalar(&[binding], source);
    ctx.mutable = mutable.clone();
    Recurrence::Scalar {
        update: analyze_value(arg, &ctx, None),
    }
}

/// `prev => prev.map(item => ...)`
fn analyze_collection_update(
    parts: &FunctionParts,
    param: &str,
    source: &str,
    mutable: &BTreeSet<String>,
) -> Option<Recurrence> {
    let body = strip_parens(parts.returned_expression()?);
    let Expression::CallExpression(call) = body else { return None };
    let Expression::StaticMemberExpression(member) = strip_parens(&call.callee) else {
        return None;
    };
    let Expression::Identifier(object) = strip_parens(&member.object) else { return None };
    if object.name != param {
        return None;
    }
    match member.property.name.as_str() {
        "map" => {}
        "filter" | "slice" | "concat" | "reduce" => {
            return Some(Recurrence::Opaque {
                reason: format!("collection size changes via {}", member.property.name),
            });
        }
        _ => return None,
    }
    let callback = call.arguments.first().and_then(|a| a.as_expression())?;
    let Some(callback) = FunctionParts::of(callback) else {
        return Some(Recurrence::Opaque {
            reason: "map callback is not an inline function".to_string(),
        });
    };
    let Some(item) = callback.param_name(0) else {
        return Some(Recurrence::Opaque {
            reason: "map callback destructures its element".to_string(),
        });
    };
    Some(match analyze_object_body(&callback, item, source, mutable) {
        Ok((properties, conditional)) => Recurrence::Elements {
            properties,
            conditional,
        },
        Err(reason) => Recurrence::Opaque { reason },
    })
}

/// `prev => ({ ...prev, x: prev.x + 1 })`
fn analyze_record_update(
    parts: &FunctionParts,
    param: &str,
    source: &str,
    mutable: &BTreeSet<String>,
) -> Option<Recurrence> {
    let returned = strip_parens(parts.returned_expression()?);
    let Expression::ObjectExpression(_) = returned else { return None };
    Some(match analyze_object_body(parts, param, source, mutable) {
        Ok((properties, conditional)) => Recurrence::Record {
            properties,
            conditional,
        },
        Err(reason) => Recurrence::Opaque { reason },
    })
}

/// Reads `{ ...item, key: expr }` returned from a callback, substituting
/// block-local declarations. Other statements are skipped and reported.
fn analyze_object_body(
    parts: &FunctionParts,
    item: &str,
    source: &str,
    mutable: &BTreeSet<String>,
) -> Result<(Vec<PropertyUpdate>, bool), String> {
    let mut ctx = TermContext::element(item, source);
    ctx.mutable = mutable.clone();
    let mut conditional = false;

    if !parts.expression_body {
        let statements = parts.statements();
        for stmt in statements.iter().take(statements.len().saturating_sub(1)) {
            match stmt {
                Statement::VariableDeclaration(decl) => {
                    for declarator in &decl.declarations {
                        match (&declarator.id, &declarator.init) {
                            (BindingPattern::BindingIdentifier(id), Some(init)) => {
                                if let Some(term) = ctx.term(init) {
                                    ctx.locals.insert(id.name.to_string(), term);
                                } else {
                                    ctx.opaque_locals.insert(id.name.to_string());
                                }
                            }
                            (BindingPattern::ObjectPattern(pattern), Some(init))
                                if is_identifier(init, item) =>
                            {
                                for prop in &pattern.properties {
                                    let (Some(key), Some(local)) = (
                                        static_key_name(&prop.key),
                                        crate::syntax::binding_name(&prop.value),
                                    ) else {
                                        continue;
                                    };
                                    ctx.locals.insert(local.to_string(), Term::Prop { name: key });
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => conditional = true,
            }
        }
        // Locals reassigned after declaration make their substitution stale.
        let mut assigned = AssignedNames::default();
        for stmt in statements {
            assigned.visit_statement(stmt);
        }
        for name in assigned.names {
            if ctx.locals.remove(&name).is_some() {
                ctx.opaque_locals.insert(name);
                conditional = true;
            }
        }
    }

    let Some(Expression::ObjectExpression(object)) = parts.returned_expression().map(strip_parens) else {
        return Err("element update does not return an object literal".to_string());
    };

    let mut entries: Vec<(String, &Expression)> = Vec::new();
    for property in &object.properties {
        match property {
            ObjectPropertyKind::SpreadProperty(spread) => {
                if !is_identifier(&spread.argument, item) {
                    return Err("element update spreads a foreign value".to_string());
                }
            }
            ObjectPropertyKind::ObjectProperty(prop) => {
                let Some(key) = static_key_name(&prop.key) else {
                    return Err("element update uses a computed key".to_string());
                };
                entries.push((key, &prop.value));
            }
        }
    }

    // Identity entries (`x: p.x`) do not change anything.
    let changing: BTreeSet<String> = entries
        .iter()
        .filter(|(key, value)| ctx.term(value) != Some(Term::Prop { name: key.clone() }))
        .map(|(key, _)| key.clone())
        .collect();

    let mut properties = Vec::new();
    for (key, value) in &entries {
        if !changing.contains(key) {
            continue;
        }
        let target = Term::Prop { name: key.clone() };
        let update = analyze_value(value, &ctx, Some((&target, &changing)));
        properties.push(PropertyUpdate {
            name: key.clone(),
            update,
        });
    }
    resolve_integrations(&mut properties);
    Ok((properties, conditional))
}

/// Turns `value + velocity` steps into [`Update::Integrated`] once the
/// velocity's own update is known.
fn resolve_integrations(properties: &mut [PropertyUpdate]) {
    let linear: HashMap<String, Term> = properties
        .iter()
        .filter_map(|p| match &p.update {
            Update::Linear { step } if step.as_number().is_some() || !has_props(step) => {
                Some((p.name.clone(), step.clone()))
            }
            _ => None,
        })
        .collect();
    for property in properties.iter_mut() {
        let Update::Opaque { fallback: Some(fallback), .. } = &property.update else { continue };
        let Update::Linear { step: Term::Prop { name: velocity } } = fallback.as_ref() else {
            continue;
        };
        // A velocity without its own closed form keeps the linear fallback.
        if let Some(accel) = linear.get(velocity) {
            property.update = Update::Integrated {
                velocity: velocity.clone(),
                accel: accel.clone(),
            };
        }
    }
}

fn has_props(term: &Term) -> bool {
    let mut props = BTreeSet::new();
    term.props(&mut props);
    !props.is_empty()
}

fn is_identifier(expr: &Expression, name: &str) -> bool {
    matches!(strip_parens(expr), Expression::Identifier(ident) if ident.name == name)
}

/// `target` is `None` for scalars (the target is [`Term::Prev`]).
fn analyze_value(
    expr: &Expression,
    ctx: &TermContext,
    element: Option<(&Term, &BTreeSet<String>)>,
) -> Update {
    let target = element.map(|(t, _)| t.clone()).unwrap_or(Term::Prev);
    let changing = element.map(|(_, c)| c);

    if let Expression::ConditionalExpression(cond) = strip_parens(expr) {
        if element.is_none() {
            if let Some(update) = wrap_counter(cond, ctx) {
                return update;
            }
        }
        let fallback = [&cond.alternate, &cond.consequent]
            .into_iter()
            .map(|branch| analyze_value(branch, ctx, element))
            .find(|update| !update.is_opaque() && !matches!(update, Update::Set { .. }));
        return Update::opaque("conditional update (e.g. collision response)", fallback);
    }

    let Some(term) = ctx.term(expr) else {
        return Update::opaque(ctx.failure_reason(expr), None);
    };
    if ctx.has_random(expr) {
        let fallback = Update::Set { value: term };
        return Update::opaque("per-tick randomness collapsed to one seeded draw", Some(fallback));
    }
    let mentions = |t: &Term| match &target {
        Term::Prop { name } => t.mentions_prop(name),
        _ => t.mentions_prev(),
    };

    if !mentions(&term) {
        return Update::Set { value: term };
    }
    if let Term::Not { inner } = &term {
        if **inner == target {
            return Update::Toggle;
        }
    }
    if let Term::Bin { lhs, op: ArithOp::Rem, rhs } = &term {
        if !mentions(rhs) {
            if let Some(step) = additive_step(lhs, &target) {
                if !mentions(&step) {
                    return Update::Modular {
                        step,
                        modulus: (**rhs).clone(),
                    };
                }
            }
        }
    }
    if let Term::Bin { lhs, op: ArithOp::Mul, rhs } = &term {
        if **lhs == target && !mentions(rhs) {
            return Update::Geometric { ratio: (**rhs).clone() };
        }
        if **rhs == target && !mentions(lhs) {
            return Update::Geometric { ratio: (**lhs).clone() };
        }
    }
    if let Some(step) = additive_step(&term, &target) {
        if mentions(&step) {
            return Update::opaque("step depends on the value itself", None);
        }
        let mut step_props = BTreeSet::new();
        step.props(&mut step_props);
        let depends_on_changing = changing
            .map(|c| step_props.iter().any(|p| c.contains(p)))
            .unwrap_or(false);
        if depends_on_changing || ctx.reads_mutable(&step) {
            return Update::opaque("step depends on other changing values", Some(Update::Linear { step }));
        }
        return Update::Linear { step };
    }
    Update::opaque("no closed form for this update", None)
}

/// `prev >= n - 1 ? 0 : prev + 1` and friends.
fn wrap_counter(cond: &ConditionalExpression, ctx: &TermContext) -> Option<Update> {
    let Expression::BinaryExpression(test) = strip_parens(&cond.test) else { return None };
    let left = ctx.term(&test.left)?;
    let right = ctx.term(&test.right)?;
    if right.mentions_prev() {
        return None;
    }
    let (reset, advance) = match test.operator {
        BinaryOperator::GreaterEqualThan | BinaryOperator::StrictEquality | BinaryOperator::Equality => {
            (&cond.consequent, &cond.alternate)
        }
        BinaryOperator::LessThan => (&cond.alternate, &cond.consequent),
        _ => return None,
    };
    if numeric_value(reset) != Some(0.0) {
        return None;
    }
    let step = additive_step(&ctx.term(advance)?, &Term::Prev)?;
    if step.as_number() != Some(1.0) {
        return None;
    }
    let modulus = match additive_step(&left, &Term::Prev)?.as_number()? {
        // `prev >= n - 1` / `prev < n - 1`
        offset if offset == 0.0 => Term::bin(right, ArithOp::Add, Term::num(1.0)),
        // `prev + 1 >= n` / `prev + 1 < n`
        offset if offset == 1.0 => right,
        _ => return None,
    };
    Some(Update::Modular {
        step: Term::num(1.0),
        modulus,
    })
}

/// If `term` is `target + rest` (a single positive occurrence in an additive
/// chain), returns `rest`. `target` alone yields a zero step.
fn additive_step(term: &Term, target: &Term) -> Option<Term> {
    let mut parts = Vec::new();
    flatten_additive(term, true, &mut parts);
    let position = parts.iter().position(|(t, positive)| *positive && t == target)?;
    parts.remove(position);
    let mut step: Option<Term> = None;
    for (part, positive) in parts {
        step = Some(match (step, positive) {
            (None, true) => part,
            (None, false) => Term::Neg { inner: Box::new(part) },
            (Some(acc), true) => Term::bin(acc, ArithOp::Add, part),
            (Some(acc), false) => Term::bin(acc, ArithOp::Sub, part),
        });
    }
    Some(step.unwrap_or(Term::num(0.0)))
}

fn flatten_additive(term: &Term, positive: bool, out: &mut Vec<(Term, bool)>) {
    match term {
        Term::Bin { lhs, op: ArithOp::Add, rhs } => {
            flatten_additive(lhs, positive, out);
            flatten_additive(rhs, positive, out);
        }
        Term::Bin { lhs, op: ArithOp::Sub, rhs } => {
            flatten_additive(lhs, positive, out);
            flatten_additive(rhs, !positive, out);
        }
        other => out.push((other.clone(), positive)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TERM CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct TermContext<'s> {
    source: &'s str,
    /// Names that denote the previous scalar value.
    prev_names: Vec<String>,
    /// Name of the previous element/record parameter.
    item: Option<String>,
    locals: HashMap<String, Term>,
    opaque_locals: BTreeSet<String>,
    /// Other state bindings whose values change over time.
    mutable: BTreeSet<String>,
}

impl<'s> TermContext<'s> {
    fn scalar(names: &[&str], source: &'s str) -> Self {
        TermContext {
            source,
            prev_names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    fn element(item: &str, source: &'s str) -> Self {
        TermContext {
            source,
            item: Some(item.to_string()),
            ..Default::default()
        }
    }

    fn term(&self, expr: &Expression) -> Option<Term> {
        let expr = strip_parens(expr);
        match expr {
            Expression::NumericLiteral(lit) => Some(Term::num(lit.value)),
            Expression::Identifier(ident) => {
                let name = ident.name.as_str();
                if self.prev_names.iter().any(|n| n == name) {
                    Some(Term::Prev)
                } else if let Some(local) = self.locals.get(name) {
                    Some(local.clone())
                } else if self.item.as_deref() == Some(name) || self.opaque_locals.contains(name) {
                    None
                } else {
                    Some(Term::Free { span: span_of(expr) })
                }
            }
            Expression::StaticMemberExpression(member) => {
                if let Some(item) = &self.item {
                    if is_identifier(&member.object, item) {
                        return Some(Term::Prop {
                            name: member.property.name.to_string(),
                        });
                    }
                }
                self.free(expr)
            }
            Expression::BinaryExpression(bin) => {
                let op = match bin.operator {
                    BinaryOperator::Addition => ArithOp::Add,
                    BinaryOperator::Subtraction => ArithOp::Sub,
                    BinaryOperator::Multiplication => ArithOp::Mul,
                    BinaryOperator::Division => ArithOp::Div,
                    BinaryOperator::Remainder => ArithOp::Rem,
                    _ => return self.free(expr),
                };
                Some(Term::bin(self.term(&bin.left)?, op, self.term(&bin.right)?))
            }
            Expression::UnaryExpression(unary) => match unary.operator {
                UnaryOperator::UnaryNegation => Some(Term::Neg {
                    inner: Box::new(self.term(&unary.argument)?),
                }),
                UnaryOperator::LogicalNot => Some(Term::Not {
                    inner: Box::new(self.term(&unary.argument)?),
                }),
                UnaryOperator::UnaryPlus => self.term(&unary.argument),
                _ => self.free(expr),
            },
            Expression::CallExpression(call) => {
                let path = callee_path(call);
                match path.as_deref().and_then(|p| p.strip_prefix("Math.")) {
                    Some("random") => self.free(expr),
                    Some(function) => {
                        let mut args = Vec::new();
                        for arg in &call.arguments {
                            args.push(self.term(arg.as_expression()?)?);
                        }
                        Some(Term::Math {
                            function: function.to_string(),
                            args,
                        })
                    }
                    None => self.free(expr),
                }
            }
            _ => self.free(expr),
        }
    }

    /// Authored code is kept only when it cannot see the previous value.
    fn free(&self, expr: &Expression) -> Option<Term> {
        let mut finder = ReferenceFinder {
            names: self.blocked_names(),
            found: false,
            random: false,
        };
        finder.visit_expression(expr);
        if finder.found {
            return None;
        }
        Some(Term::Free { span: span_of(expr) })
    }

    fn blocked_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.prev_names.iter().cloned().collect();
        names.extend(self.item.iter().cloned());
        names.extend(self.opaque_locals.iter().cloned());
        names.extend(self.locals.keys().cloned());
        names
    }

    fn has_random(&self, expr: &Expression) -> bool {
        let mut finder = ReferenceFinder {
            names: BTreeSet::new(),
            found: false,
            random: false,
        };
        finder.visit_expression(expr);
        finder.random
    }

    fn reads_mutable(&self, term: &Term) -> bool {
        if self.mutable.is_empty() {
            return false;
        }
        let mut spans = Vec::new();
        collect_free(term, &mut spans);
        spans.iter().any(|span| {
            let code = span.slice(self.source);
            self.mutable.iter().any(|name| contains_word(code, name))
        })
    }

    fn failure_reason(&self, expr: &Expression) -> String {
        let mut finder = ReferenceFinder {
            names: BTreeSet::new(),
            found: false,
            random: false,
        };
        finder.visit_expression(expr);
        if finder.random {
            "update draws fresh random numbers".to_string()
        } else {
            "update reads the previous value in an unsupported way".to_string()
        }
    }
}

fn collect_free(term: &Term, out: &mut Vec<SourceSpan>) {
    match term {
        Term::Free { span } => out.push(*span),
        Term::Neg { inner } | Term::Not { inner } => collect_free(inner, out),
        Term::Bin { lhs, rhs, .. } => {
            collect_free(lhs, out);
            collect_free(rhs, out);
        }
        Term::Math { args, .. } => args.iter().for_each(|a| collect_free(a, out)),
        _ => {}
    }
}

fn contains_word(code: &str, word: &str) -> bool {
    code.match_indices(word).any(|(idx, _)| {
        let before = code[..idx].chars().next_back();
        let after = code[idx + word.len()..].chars().next();
        let boundary = |c: Option<char>| c.map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '$'));
        boundary(before) && boundary(after)
    })
}

struct ReferenceFinder {
    names: BTreeSet<String>,
    found: bool,
    random: bool,
}

impl<'a> Visit<'a> for ReferenceFinder {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if self.names.contains(ident.name.as_str()) {
            self.found = true;
        }
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if is_math_random(call) || is_wall_clock_read(call) {
            self.random = true;
        }
        walk::walk_call_expression(self, call);
    }
}

#[derive(Default)]
struct AssignedNames {
    names: BTreeSet<String>,
}

impl<'a> Visit<'a> for AssignedNames {
    fn visit_simple_assignment_target(&mut self, target: &SimpleAssignmentTarget<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) = target {
            self.names.insert(ident.name.to_string());
        }
        walk::walk_simple_assignment_target(self, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Dialect;
    use crate::parse::parse_artifact;
    use oxc_allocator::Allocator;

    /// Analyzes the first argument of the first call statement in `code`.
    fn analyze(code: &str, binding: &str) -> Recurrence {
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, code, Dialect::Tsx).unwrap();
        let Some(Statement::ExpressionStatement(stmt)) = tree.program.body.first() else {
            panic!("expected a call statement");
        };
        let Expression::CallExpression(call) = &stmt.expression else {
            panic!("expected a call");
        };
        let arg = call.arguments[0].as_expression().unwrap();
        analyze_update(arg, binding, code, &BTreeSet::new())
    }

    fn scalar(recurrence: Recurrence) -> Update {
        match recurrence {
            Recurrence::Scalar { update } => update,
            other => panic!("expected scalar recurrence, got {:?}", other),
        }
    }

    #[test]
    fn counter_increment_is_linear() {
        let update = scalar(analyze("setCount(c => c + 2);", "count"));
        assert_eq!(update, Update::Linear { step: Term::num(2.0) });

        let direct = scalar(analyze("setCount(count - 1);", "count"));
        assert_eq!(
            direct,
            Update::Linear {
                step: Term::Neg { inner: Box::new(Term::num(1.0)) }
            }
        );
    }

    #[test]
    fn modular_and_wrapping_counters() {
        let code = "setIndex(i => (i + 1) % slides.length);";
        match scalar(analyze(code, "index")) {
            Update::Modular { step, modulus } => {
                assert_eq!(step, Term::num(1.0));
                let Term::Free { span } = modulus else { panic!("modulus should be authored code") };
                assert_eq!(span.slice(code), "slides.length");
            }
            other => panic!("unexpected {:?}", other),
        }

        let wrap = scalar(analyze("setIndex(i => i >= 3 ? 0 : i + 1);", "index"));
        assert_eq!(
            wrap,
            Update::Modular {
                step: Term::num(1.0),
                modulus: Term::bin(Term::num(3.0), ArithOp::Add, Term::num(1.0)),
            }
        );
    }

    #[test]
    fn toggles_and_damping() {
        assert_eq!(scalar(analyze("setOn(v => !v);", "on")), Update::Toggle);
        assert_eq!(
            scalar(analyze("setScale(s => s * 0.98);", "scale")),
            Update::Geometric { ratio: Term::num(0.98) }
        );
    }

    #[test]
    fn element_motion_with_velocity_and_gravity() {
        let code = "setBalls(prev => prev.map(b => ({ ...b, vy: b.vy + 0.5, y: b.y + b.vy, x: b.x + b.vx })));";
        let Recurrence::Elements { properties, conditional } = analyze(code, "balls") else {
            panic!("expected element recurrence");
        };
        assert!(!conditional);
        let by_name: HashMap<&str, &Update> =
            properties.iter().map(|p| (p.name.as_str(), &p.update)).collect();
        assert_eq!(by_name["vy"], &Update::Linear { step: Term::num(0.5) });
        assert_eq!(
            by_name["x"],
            &Update::Linear {
                step: Term::Prop { name: "vx".into() }
            }
        );
        assert_eq!(
            by_name["y"],
            &Update::Integrated {
                velocity: "vy".into(),
                accel: Term::num(0.5)
            }
        );
    }

    #[test]
    fn collision_response_is_opaque_with_fallback() {
        let code = "setDots(prev => prev.map(d => ({ ...d, x: d.x > 800 ? 0 : d.x + d.vx })));";
        let recurrence = analyze(code, "dots");
        assert!(recurrence.is_low_fidelity());
        let Recurrence::Elements { properties, .. } = recurrence else { panic!() };
        match &properties[0].update {
            Update::Opaque { fallback: Some(fallback), .. } => {
                assert_eq!(
                    **fallback,
                    Update::Linear {
                        step: Term::Prop { name: "vx".into() }
                    }
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn block_bodies_substitute_locals() {
        let code = r#"setStars(prev => prev.map(s => {
            const next = s.phase + 0.1;
            return { ...s, phase: next };
        }));"#;
        let Recurrence::Elements { properties, conditional } = analyze(code, "stars") else {
            panic!()
        };
        assert!(!conditional);
        assert_eq!(properties[0].update, Update::Linear { step: Term::num(0.1) });
    }

    #[test]
    fn shrinking_collections_are_opaque() {
        let code = "setItems(prev => prev.filter(i => i.life > 0));";
        assert!(matches!(analyze(code, "items"), Recurrence::Opaque { .. }));
    }
}
