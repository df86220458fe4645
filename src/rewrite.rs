//! Determinism rewriting.
//!
//! Every resolvable binding's `useState` declaration is replaced by a
//! `const` computed from the frame counter, the timers and handlers that
//! drove it are removed, ambient randomness is seeded, and wall-clock reads
//! become frame arithmetic. All changes are recorded as edits; nothing here
//! touches the tree.
//!
//! Invariants:
//! - Derived values read no clock and no unseeded randomness.
//! - Every property read off a rewritten binding exists on its derived value.
//! - Code that does more than schedule state updates is never removed.

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::{FrameSource, TransformOptions};
use crate::diagnostics::{
    Finding, FindingKind, Severity, SourceSpan, FC_BINDING_UNTOUCHED, FC_COMPETING_MUTATIONS,
    FC_EDIT_CONFLICT, FC_HANDLER_FROZEN, FC_OPAQUE_RECURRENCE, FC_OPAQUE_SHAPE,
    FC_SCHEDULING_RETAINED, FC_SHAPE_INCOMPLETE, FC_UNSAFE_TRANSFORM, FC_WALL_CLOCK_RETAINED,
};
use crate::edits::EditBuffer;
use crate::emit::{
    const_declaration, named_import, BinOp, JsExpr, ObjectMember, SEEDED_RANDOM_HELPER,
    SEEDED_RANDOM_NAME,
};
use crate::parse::{validate_expression, SyntaxTree};
use crate::recurrence::{ArithOp, PropertyUpdate, Recurrence, Term, Update};
use crate::resolve::{BindingMap, Confidence, MutationContext, MutationSite, Shape, StateBinding};
use crate::syntax::{
    argument_expression, binding_name, callee_path, collect_components, is_math_random,
    is_wall_clock_read, span_of, FunctionParts,
};

const ITEM: &str = "__item";
const INDEX: &str = "__i";
const SEED_STRIDE: f64 = 1009.0;
const MAX_DERIVATION_DEPTH: usize = 3;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    pub fps: u32,
    pub step_frames: u32,
    pub frame_source: FrameSource,
}

impl RewriteContext {
    pub fn from_options(options: &TransformOptions) -> Self {
        RewriteContext {
            fps: options.fps(),
            step_frames: options.step_frames(),
            frame_source: options.frame_source.clone(),
        }
    }
}

impl Default for RewriteContext {
    fn default() -> Self {
        Self::from_options(&TransformOptions::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fidelity {
    /// Closed form of the authored recurrence.
    Exact,
    /// Best-effort substitute for a recurrence without a closed form.
    Approximate,
    /// Nothing drives the value over time; it keeps its initial value.
    Frozen,
    /// Left as authored.
    Untouched,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingReport {
    pub name: String,
    pub fidelity: Fidelity,
    /// How much of the initial shape was inferred.
    pub confidence: Confidence,
    pub driver: Option<String>,
    pub used_properties: Vec<String>,
    /// Properties every derived element (or the derived record) carries.
    pub derived_properties: Vec<String>,
    pub defaulted_properties: Vec<String>,
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteReport {
    pub bindings: Vec<BindingReport>,
    pub findings: Vec<Finding>,
    pub frame_name: Option<String>,
    pub seeded_random_calls: usize,
    pub clock_reads: usize,
    pub removed_effects: usize,
    pub removed_handlers: usize,
    pub removed_functions: usize,
}

impl RewriteReport {
    pub fn rewritten(&self) -> impl Iterator<Item = &BindingReport> {
        self.bindings.iter().filter(|b| b.fidelity != Fidelity::Untouched)
    }
}

/// Value a missing property takes on a derived element.
pub fn neutral_default(property: &str) -> JsExpr {
    match property {
        "opacity" | "scale" | "alpha" | "life" => JsExpr::Number(1.0),
        "color" | "fill" | "stroke" => JsExpr::str("currentColor"),
        "trail" | "points" | "history" => JsExpr::Array(Vec::new()),
        "label" | "text" | "title" | "name" => JsExpr::str(""),
        _ => JsExpr::Number(0.0),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[tracing::instrument(skip_all, target = "framecast", fields(bindings = map.len()))]
pub fn rewrite(
    tree: &SyntaxTree,
    map: &BindingMap,
    ctx: &RewriteContext,
    edits: &mut EditBuffer,
) -> RewriteReport {
    let frame_name = choose_frame_name(&tree.program);
    let mut rewriter = Rewriter {
        tree,
        map,
        ctx,
        edits,
        frame: JsExpr::ident(frame_name.clone()),
        report: RewriteReport::default(),
        owners: BTreeSet::new(),
        removed: Vec::new(),
    };

    let (seeded, conflicts) = seed_randomness(tree, rewriter.edits);
    rewriter.report.seeded_random_calls = seeded;
    for span in conflicts {
        rewriter.conflict(span, "random seed");
    }
    rewriter.replace_wall_clock();

    let derived = rewriter.derive_bindings();
    let setters: BTreeSet<String> = derived
        .iter()
        .filter_map(|d| d.binding.setter.clone())
        .collect();
    rewriter.remove_scheduling(&setters);
    for derivation in &derived {
        rewriter.replace_declaration(derivation);
    }
    for derivation in &derived {
        rewriter.neutralize_residual(derivation.binding);
    }
    rewriter.insert_frame_declarations();
    rewriter.insert_preamble();

    if !rewriter.owners.is_empty() {
        rewriter.report.frame_name = Some(frame_name);
    }
    tracing::debug!(
        target: "framecast",
        rewritten = rewriter.report.rewritten().count(),
        seeded = rewriter.report.seeded_random_calls,
        clock = rewriter.report.clock_reads,
        "rewrite planned"
    );
    rewriter.report
}

struct Derivation<'m> {
    binding: &'m StateBinding,
    text: String,
}

enum Clock {
    /// Ticks elapsed at the current frame.
    Steps(JsExpr),
    /// The single update happens once this test holds.
    Once(JsExpr),
}

struct Rewriter<'t, 'm, 'e, 'a> {
    tree: &'t SyntaxTree<'a>,
    map: &'m BindingMap,
    ctx: &'t RewriteContext,
    edits: &'e mut EditBuffer,
    frame: JsExpr,
    report: RewriteReport,
    /// Function bodies that need the frame declaration.
    owners: BTreeSet<SourceSpan>,
    removed: Vec<SourceSpan>,
}

impl<'t, 'm, 'e, 'a> Rewriter<'t, 'm, 'e, 'a> {
    fn source(&self) -> &'a str {
        self.tree.source
    }

    fn render(&self, span: SourceSpan) -> String {
        self.edits.render(self.tree.source, span)
    }

    fn finding(&mut self, finding: Finding, offset: u32) {
        let finding = finding.at(self.tree.position(offset));
        self.report.findings.push(finding);
    }

    fn conflict(&mut self, span: SourceSpan, what: &str) {
        tracing::warn!(target: "framecast", start = span.start, end = span.end, what, "edit conflict");
        let finding = Finding::new(
            FC_EDIT_CONFLICT,
            FindingKind::UnsafeTransform,
            Severity::Warning,
            format!("{} edit overlaps another rewrite and was dropped", what),
        )
        .resolved();
        self.finding(finding, span.start);
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Wall clock
    // ───────────────────────────────────────────────────────────────────────────

    fn replace_wall_clock(&mut self) {
        let mut reads = ClockReads::default();
        reads.visit_program(&self.tree.program);
        if reads.spans.is_empty() {
            return;
        }
        let components = collect_components(&self.tree.program);
        let millis = self
            .frame
            .clone()
            .mul(JsExpr::Number(1000.0).div(JsExpr::Number(self.ctx.fps as f64)));
        let text = format!("({})", millis.print());
        for span in reads.spans {
            let owner = components
                .iter()
                .find(|c| c.contains(span))
                .and_then(|c| c.body);
            match owner {
                Some(owner) => match self.edits.replace(span, text.clone()) {
                    Ok(()) => {
                        self.owners.insert(owner);
                        self.report.clock_reads += 1;
                    }
                    Err(_) => self.conflict(span, "clock"),
                },
                None => {
                    let finding = Finding::new(
                        FC_WALL_CLOCK_RETAINED,
                        FindingKind::Advisory,
                        Severity::Warning,
                        format!("`{}` outside a component body was left as authored", span.slice(self.source())),
                    );
                    self.finding(finding, span.start);
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Derivations
    // ───────────────────────────────────────────────────────────────────────────

    fn derive_bindings(&mut self) -> Vec<Derivation<'m>> {
        let map: &'m BindingMap = self.map;
        let mut derived = Vec::new();
        for binding in &map.bindings {
            if binding.mutation_sites.is_empty() {
                continue;
            }
            if !binding.rewritable {
                self.untouched(binding);
                continue;
            }
            if let Some(derivation) = self.derive(binding) {
                derived.push(derivation);
            }
        }
        derived
    }

    fn untouched(&mut self, binding: &StateBinding) {
        if binding.mutation_sites.iter().any(|s| s.context.is_periodic()) {
            let finding = Finding::new(
                FC_BINDING_UNTOUCHED,
                FindingKind::Advisory,
                Severity::Warning,
                format!(
                    "`{}` is animated but was left as authored: {}",
                    binding.name,
                    binding.blocker.as_deref().unwrap_or("not rewritable")
                ),
            )
            .about(binding.name.clone());
            self.finding(finding, binding.declaration.start);
        }
        self.report.bindings.push(BindingReport {
            name: binding.name.clone(),
            fidelity: Fidelity::Untouched,
            confidence: binding.confidence,
            driver: None,
            used_properties: binding.used_properties().into_iter().collect(),
            derived_properties: Vec::new(),
            defaulted_properties: Vec::new(),
            expression: None,
        });
    }

    fn derive(&mut self, binding: &'m StateBinding) -> Option<Derivation<'m>> {
        let (driver, competing) = choose_driver(binding);
        let init = self.initial_value(binding);
        let clock = driver.and_then(|site| self.clock(&site.context));

        let (mut value, updated) = match (driver, &clock) {
            (Some(site), Some(clock)) => self.evolve(&site.recurrence, init.clone(), clock),
            _ => (init.clone(), BTreeSet::new()),
        };

        // Properties read downstream but absent from the derived shape.
        let used = binding.used_properties();
        let known: BTreeSet<String> = binding
            .shape
            .property_names()
            .map(|names| names.into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        let structured = matches!(binding.shape, Shape::Collection { .. } | Shape::Known { .. } | Shape::Opaque);
        let defaulted: Vec<String> = if structured {
            used.iter()
                .filter(|p| !known.contains(*p) && !updated.contains(*p))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        if !defaulted.is_empty() {
            let collection = binding.shape.is_collection()
                || is_element_recurrence(driver)
                || binding.usage_sites.iter().any(|u| u.via_element);
            value = with_defaults(value, &defaulted, collection);
        }

        let fidelity = match (driver, &clock) {
            (Some(site), Some(_))
                if competing || site.recurrence.is_low_fidelity() || binding.confidence == Confidence::Low =>
            {
                Fidelity::Approximate
            }
            (Some(_), Some(_)) => Fidelity::Exact,
            _ => Fidelity::Frozen,
        };

        let printed = value.print();
        if let Err(error) = validate_expression(&printed, self.tree.dialect) {
            let finding = Finding::new(
                FC_UNSAFE_TRANSFORM,
                FindingKind::UnsafeTransform,
                Severity::Warning,
                format!("derived value for `{}` did not re-parse: {}", binding.name, error.message),
            )
            .about(binding.name.clone())
            .resolved();
            self.finding(finding, binding.declaration.start);
            self.untouched(binding);
            return None;
        }

        self.binding_findings(binding, driver, competing, &defaulted);
        let mut derived_properties: BTreeSet<String> = known;
        derived_properties.extend(updated.iter().cloned());
        derived_properties.extend(defaulted.iter().cloned());
        self.report.bindings.push(BindingReport {
            name: binding.name.clone(),
            fidelity,
            confidence: binding.confidence,
            driver: driver.map(|site| describe_context(&site.context)),
            used_properties: used.into_iter().collect(),
            derived_properties: derived_properties.into_iter().collect(),
            defaulted_properties: defaulted,
            expression: Some(printed),
        });
        tracing::debug!(target: "framecast", binding = %binding.name, ?fidelity, "derived binding");

        Some(Derivation {
            binding,
            text: const_declaration(&binding.name, &value),
        })
    }

    fn binding_findings(
        &mut self,
        binding: &StateBinding,
        driver: Option<&MutationSite>,
        competing: bool,
        defaulted: &[String],
    ) {
        if let Some(site) = driver {
            let reasons = site.recurrence.opaque_reasons();
            if !reasons.is_empty() {
                let finding = Finding::new(
                    FC_OPAQUE_RECURRENCE,
                    FindingKind::OpaqueRecurrence,
                    Severity::Warning,
                    format!("`{}` approximated: {}", binding.name, reasons.join("; ")),
                )
                .about(binding.name.clone())
                .resolved();
                self.finding(finding, site.call.start);
            }
            if competing {
                let finding = Finding::new(
                    FC_COMPETING_MUTATIONS,
                    FindingKind::OpaqueRecurrence,
                    Severity::Warning,
                    format!("`{}` has several periodic updates; the first one drives it", binding.name),
                )
                .about(binding.name.clone())
                .resolved();
                self.finding(finding, site.call.start);
            }
        } else if binding
            .mutation_sites
            .iter()
            .any(|s| matches!(s.context, MutationContext::EventHandler { .. }))
        {
            let finding = Finding::new(
                FC_HANDLER_FROZEN,
                FindingKind::Advisory,
                Severity::Info,
                format!("`{}` only changes on interaction and holds its initial value", binding.name),
            )
            .about(binding.name.clone())
            .resolved();
            self.finding(finding, binding.declaration.start);
        }

        if binding.confidence == Confidence::Low {
            let mut message = format!("the initial shape of `{}` could not be inferred", binding.name);
            if !defaulted.is_empty() {
                message.push_str(&format!("; neutral defaults added for {}", defaulted.join(", ")));
            }
            let finding = Finding::new(FC_OPAQUE_SHAPE, FindingKind::ShapeIncomplete, Severity::Warning, message)
                .about(binding.name.clone())
                .resolved();
            self.finding(finding, binding.declaration.start);
        } else if !defaulted.is_empty() {
            let finding = Finding::new(
                FC_SHAPE_INCOMPLETE,
                FindingKind::ShapeIncomplete,
                Severity::Warning,
                format!(
                    "`{}` is read for {} which its initializer does not define; neutral defaults added",
                    binding.name,
                    defaulted.join(", ")
                ),
            )
            .about(binding.name.clone())
            .resolved();
            self.finding(finding, binding.declaration.start);
        }
    }

    fn initial_value(&self, binding: &StateBinding) -> JsExpr {
        match binding.initializer {
            Some(span) => {
                let code = self.render(span);
                if binding.lazy_initializer {
                    JsExpr::raw(code).call(Vec::new())
                } else {
                    JsExpr::raw(code)
                }
            }
            None => JsExpr::ident("undefined"),
        }
    }

    fn clock(&self, context: &MutationContext) -> Option<Clock> {
        let fps = self.ctx.fps as f64;
        match context {
            MutationContext::Interval { period_ms: Some(ms), .. }
            | MutationContext::Timeout { delay_ms: Some(ms), repeating: true } => {
                Some(Clock::Steps(self.ticks_at(fps * ms / 1000.0)))
            }
            MutationContext::Interval { period: Some(span), .. } => {
                let frames_per_tick = JsExpr::Number(fps)
                    .mul(JsExpr::raw(self.render(*span)))
                    .div(JsExpr::Number(1000.0));
                Some(Clock::Steps(self.frame.clone().div(frames_per_tick).floor()))
            }
            MutationContext::Interval { .. } | MutationContext::Timeout { repeating: true, .. } => {
                Some(Clock::Steps(self.ticks_at(fps)))
            }
            MutationContext::AnimationFrame => Some(Clock::Steps(self.ticks_at(fps / 60.0))),
            MutationContext::EventHandler { .. } => {
                Some(Clock::Steps(self.ticks_at(self.ctx.step_frames as f64)))
            }
            MutationContext::Timeout { delay_ms, repeating: false } => {
                let threshold = (delay_ms.unwrap_or(0.0) * fps / 1000.0).ceil().max(1.0);
                Some(Clock::Once(self.frame.clone().binary(BinOp::Ge, JsExpr::Number(threshold))))
            }
            MutationContext::Effect => Some(Clock::Once(self.frame.clone().binary(BinOp::Ge, JsExpr::Number(1.0)))),
            MutationContext::Other => None,
        }
    }

    /// Whole ticks elapsed when one tick lasts `frames_per_tick` frames.
    fn ticks_at(&self, frames_per_tick: f64) -> JsExpr {
        let frame = self.frame.clone();
        if !frames_per_tick.is_finite() || frames_per_tick <= 0.0 || (frames_per_tick - 1.0).abs() < 1e-9 {
            return frame;
        }
        let per_frame = 1.0 / frames_per_tick;
        if frames_per_tick < 1.0 && (per_frame - per_frame.round()).abs() < 1e-9 {
            return frame.mul(JsExpr::Number(per_frame.round()));
        }
        frame.div(JsExpr::Number(frames_per_tick)).floor()
    }

    /// Derived value plus the element/record properties the update overrides.
    fn evolve(&self, recurrence: &Recurrence, init: JsExpr, clock: &Clock) -> (JsExpr, BTreeSet<String>) {
        match clock {
            Clock::Steps(ticks) => self.at_ticks(recurrence, init, ticks),
            Clock::Once(test) => {
                let (after, updated) = self.at_ticks(recurrence, init.clone(), &JsExpr::Number(1.0));
                if after == init {
                    return (init, updated);
                }
                (JsExpr::conditional(test.clone(), after, init), updated)
            }
        }
    }

    fn at_ticks(&self, recurrence: &Recurrence, init: JsExpr, ticks: &JsExpr) -> (JsExpr, BTreeSet<String>) {
        match recurrence {
            Recurrence::Scalar { update } => (self.scalar_closed(update, init, ticks), BTreeSet::new()),
            Recurrence::Elements { properties, .. } => {
                let object = self.element_object(properties, ticks);
                let value = init.member("map").call(vec![JsExpr::arrow(&[ITEM], object)]);
                (value, properties.iter().map(|p| p.name.clone()).collect())
            }
            Recurrence::Record { properties, .. } => {
                let object = self.element_object(properties, ticks);
                let value = JsExpr::arrow(&[ITEM], object).call(vec![init]);
                (value, properties.iter().map(|p| p.name.clone()).collect())
            }
            Recurrence::Opaque { .. } => (init, BTreeSet::new()),
        }
    }

    fn scalar_closed(&self, update: &Update, base: JsExpr, t: &JsExpr) -> JsExpr {
        let prop = |name: &str| base.clone().member(name);
        match update {
            Update::Linear { step } => plus(base.clone(), times(self.term(step, &base, &prop), t.clone())),
            Update::Modular { step, modulus } => {
                let stepped = plus(base.clone(), times(self.term(step, &base, &prop), t.clone()));
                let modulus = self.term(modulus, &base, &prop);
                let non_negative = step.as_number().is_some_and(|k| k >= 0.0)
                    && matches!(&base, JsExpr::Raw(code) if code.trim().parse::<f64>().is_ok_and(|v| v >= 0.0));
                if non_negative {
                    stepped.rem(modulus)
                } else {
                    wrap_modulo(stepped, modulus)
                }
            }
            Update::Geometric { ratio } => times(
                base.clone(),
                JsExpr::math("pow", vec![self.term(ratio, &base, &prop), t.clone()]),
            ),
            Update::Toggle => toggled(base, t),
            Update::Set { value } => after_first(t, self.term(value, &base, &prop), base.clone()),
            Update::Integrated { .. } => base,
            Update::Opaque { fallback, .. } => match fallback {
                Some(fallback) => self.scalar_closed(fallback, base, t),
                None => base,
            },
        }
    }

    fn element_object(&self, properties: &[PropertyUpdate], t: &JsExpr) -> JsExpr {
        let item = JsExpr::ident(ITEM);
        let mut members = vec![ObjectMember::Spread(item.clone())];
        for property in properties {
            let value = self.property_closed(&property.name, &property.update, properties, &item, t, 0);
            members.push(ObjectMember::Property(property.name.clone(), value));
        }
        JsExpr::Object(members)
    }

    fn property_closed(
        &self,
        name: &str,
        update: &Update,
        properties: &[PropertyUpdate],
        item: &JsExpr,
        t: &JsExpr,
        depth: usize,
    ) -> JsExpr {
        let base = item.clone().member(name);
        let initial = |prop: &str| item.clone().member(prop);
        match update {
            Update::Linear { step } => plus(base.clone(), times(self.term(step, &base, &initial), t.clone())),
            Update::Modular { step, modulus } => {
                let stepped = plus(base.clone(), times(self.term(step, &base, &initial), t.clone()));
                wrap_modulo(stepped, self.term(modulus, &base, &initial))
            }
            Update::Geometric { ratio } => times(
                base.clone(),
                JsExpr::math("pow", vec![self.term(ratio, &base, &initial), t.clone()]),
            ),
            Update::Toggle => toggled(base, t),
            Update::Set { value } => {
                // Derived properties follow the closed forms they read.
                let current = |prop: &str| match properties.iter().find(|p| p.name == prop) {
                    Some(other) if depth < MAX_DERIVATION_DEPTH && other.name != name => {
                        self.property_closed(prop, &other.update, properties, item, t, depth + 1)
                    }
                    _ => item.clone().member(prop),
                };
                after_first(t, self.term(value, &base, &current), base.clone())
            }
            Update::Integrated { velocity, accel } => {
                let v0 = item.clone().member(velocity.as_str());
                let accel = self.term(accel, &base, &initial);
                // x0 + v0·t + a·t(t−1)/2
                let ramp = t.clone().mul(t.clone().sub(JsExpr::Number(1.0))).div(JsExpr::Number(2.0));
                plus(plus(base, times(v0, t.clone())), times(accel, ramp))
            }
            Update::Opaque { fallback, .. } => match fallback {
                Some(fallback) => self.property_closed(name, fallback, properties, item, t, depth),
                None => base,
            },
        }
    }

    fn term(&self, term: &Term, prev: &JsExpr, prop: &dyn Fn(&str) -> JsExpr) -> JsExpr {
        match term {
            Term::Num { value } => JsExpr::Number(*value),
            Term::Prev => prev.clone(),
            Term::Prop { name } => prop(name),
            Term::Free { span } => JsExpr::raw(self.render(*span)),
            Term::Neg { inner } => match inner.as_number() {
                Some(value) => JsExpr::Number(-value),
                None => JsExpr::Number(-1.0).mul(self.term(inner, prev, prop)),
            },
            Term::Not { inner } => self.term(inner, prev, prop).not(),
            Term::Bin { lhs, op, rhs } => {
                let op = match op {
                    ArithOp::Add => BinOp::Add,
                    ArithOp::Sub => BinOp::Sub,
                    ArithOp::Mul => BinOp::Mul,
                    ArithOp::Div => BinOp::Div,
                    ArithOp::Rem => BinOp::Rem,
                };
                self.term(lhs, prev, prop).binary(op, self.term(rhs, prev, prop))
            }
            Term::Math { function, args } => JsExpr::math(
                function,
                args.iter().map(|arg| self.term(arg, prev, prop)).collect(),
            ),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Edits
    // ───────────────────────────────────────────────────────────────────────────

    fn is_removed(&self, span: SourceSpan) -> bool {
        self.removed.iter().any(|removed| removed.contains(span))
    }

    fn remove(&mut self, span: SourceSpan, what: &str) -> bool {
        match self.edits.remove(span) {
            Ok(()) => {
                self.removed.push(span);
                true
            }
            Err(_) => {
                self.conflict(span, what);
                false
            }
        }
    }

    /// Removes effects, handlers and handler functions whose only work was
    /// updating rewritten bindings.
    fn remove_scheduling(&mut self, setters: &BTreeSet<String>) {
        let map = self.map;
        let covered = |used: &BTreeSet<String>| !used.is_empty() && used.is_subset(setters);

        for effect in &map.effects {
            if effect.scheduling_only && covered(&effect.setters) {
                let span = line_span(self.source(), effect.statement);
                if self.remove(span, "effect") {
                    self.report.removed_effects += 1;
                }
            } else if effect.setters.iter().any(|s| setters.contains(s)) {
                let finding = Finding::new(
                    FC_SCHEDULING_RETAINED,
                    FindingKind::Advisory,
                    Severity::Warning,
                    "effect does more than schedule state updates; it was kept and its rewritten updates emptied",
                );
                self.finding(finding, effect.statement.start);
            }
        }

        for handler in &map.handlers {
            if handler.mutation_only && covered(&handler.setters) {
                let span = leading_space_span(self.source(), handler.attribute);
                if self.remove(span, "handler") {
                    self.report.removed_handlers += 1;
                }
            }
        }

        for function in &map.functions {
            let unreferenced = function.references.iter().all(|r| self.is_removed(*r));
            if function.mutation_only && covered(&function.setters) && unreferenced {
                let span = line_span(self.source(), function.declaration);
                if self.remove(span, "handler function") {
                    self.report.removed_functions += 1;
                }
            }
        }
    }

    fn replace_declaration(&mut self, derivation: &Derivation) {
        let binding = derivation.binding;
        match self.edits.replace(binding.declaration, derivation.text.clone()) {
            Ok(()) => {
                self.owners.insert(binding.owner);
            }
            Err(_) => self.conflict(binding.declaration, "declaration"),
        }
    }

    /// Setter calls left in retained code become empty statements.
    fn neutralize_residual(&mut self, binding: &StateBinding) {
        for site in &binding.mutation_sites {
            if self.is_removed(site.call) {
                continue;
            }
            let result = match site.statement {
                Some(statement) if statement != site.call => self.edits.replace(statement, ";"),
                _ => self.edits.replace(site.call, "undefined"),
            };
            if result.is_err() {
                self.conflict(site.call, "setter");
            }
        }
    }

    fn insert_frame_declarations(&mut self) {
        if self.owners.is_empty() {
            return;
        }
        let hook = existing_hook_import(&self.tree.program, &self.ctx.frame_source)
            .unwrap_or_else(|| self.ctx.frame_source.hook.clone());
        let declaration = const_declaration(&self.frame.print(), &JsExpr::ident(hook).call(Vec::new()));
        let owners: Vec<SourceSpan> = self.owners.iter().copied().collect();
        for owner in owners {
            if self.source().as_bytes().get(owner.start as usize) != Some(&b'{') {
                self.conflict(owner, "frame declaration");
                continue;
            }
            let indent = body_indent(self.source(), owner);
            let text = format!("\n{}{}", indent, declaration);
            if self.edits.insert(owner.start + 1, text).is_err() {
                self.conflict(owner, "frame declaration");
            }
        }
    }

    fn insert_preamble(&mut self) {
        let needs_import = !self.owners.is_empty()
            && existing_hook_import(&self.tree.program, &self.ctx.frame_source).is_none();
        let needs_helper = self.report.seeded_random_calls > 0 && !declares_helper(&self.tree.program);
        if !needs_import && !needs_helper {
            return;
        }
        let offset = preamble_offset(&self.tree.program);
        let mut pieces = Vec::new();
        if needs_import {
            pieces.push(named_import(&[self.ctx.frame_source.hook.as_str()], &self.ctx.frame_source.module));
        }
        if needs_helper {
            pieces.push(SEEDED_RANDOM_HELPER.to_string());
        }
        for (idx, piece) in pieces.into_iter().enumerate() {
            let separator = if idx == 0 { "\n" } else { "\n\n" };
            let text = if offset == 0 {
                format!("{}{}", piece, if needs_helper { "\n\n" } else { "\n" })
            } else {
                format!("{}{}", separator, piece)
            };
            if self.edits.insert(offset, text).is_err() {
                self.conflict(SourceSpan::new(offset, offset), "preamble");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DRIVERS
// ═══════════════════════════════════════════════════════════════════════════════

/// The mutation site whose recurrence defines the derived value, and whether
/// other periodic sites compete with it.
fn choose_driver(binding: &StateBinding) -> (Option<&MutationSite>, bool) {
    let periodic: Vec<&MutationSite> = binding
        .mutation_sites
        .iter()
        .filter(|s| s.context.is_periodic())
        .collect();
    if let Some(first) = periodic.first() {
        let competing = periodic.iter().skip(1).any(|other| {
            other.context != first.context
                || std::mem::discriminant(&other.recurrence) != std::mem::discriminant(&first.recurrence)
        });
        return (Some(first), competing);
    }

    let steppers: Vec<&MutationSite> = binding
        .mutation_sites
        .iter()
        .filter(|s| matches!(s.context, MutationContext::EventHandler { .. }))
        .filter(|s| stepper_rank(&s.recurrence).is_some())
        .collect();
    if let Some(best) = steppers.iter().min_by_key(|s| stepper_rank(&s.recurrence)) {
        return (Some(best), false);
    }

    let once = binding.mutation_sites.iter().find(|s| {
        matches!(
            s.context,
            MutationContext::Timeout { repeating: false, .. } | MutationContext::Effect
        ) && !matches!(s.recurrence, Recurrence::Opaque { .. })
    });
    (once, false)
}

/// Forward modular steps first, then any modular step, then linear counters.
fn stepper_rank(recurrence: &Recurrence) -> Option<u8> {
    match recurrence {
        Recurrence::Scalar { update: Update::Modular { step, .. } } => {
            Some(if step.as_number().is_some_and(|k| k > 0.0) { 0 } else { 1 })
        }
        Recurrence::Scalar { update: Update::Linear { .. } } => Some(2),
        _ => None,
    }
}

fn is_element_recurrence(driver: Option<&MutationSite>) -> bool {
    matches!(driver.map(|d| &d.recurrence), Some(Recurrence::Elements { .. }))
}

fn describe_context(context: &MutationContext) -> String {
    match context {
        MutationContext::Interval { period_ms: Some(ms), .. } => format!("interval {}ms", ms),
        MutationContext::Interval { .. } => "interval".to_string(),
        MutationContext::Timeout { delay_ms, repeating } => format!(
            "{} {}ms",
            if *repeating { "repeating timeout" } else { "timeout" },
            delay_ms.unwrap_or(0.0)
        ),
        MutationContext::AnimationFrame => "animation frame".to_string(),
        MutationContext::EventHandler { attribute } => format!("{} stepper", attribute),
        MutationContext::Effect => "effect".to_string(),
        MutationContext::Other => "other".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn plus(a: JsExpr, b: JsExpr) -> JsExpr {
    if b.is_zero() {
        a
    } else if a.is_zero() || matches!(&a, JsExpr::Raw(code) if code.trim() == "0") {
        b
    } else {
        a.add(b)
    }
}

fn times(a: JsExpr, b: JsExpr) -> JsExpr {
    if a.is_zero() || b.is_zero() {
        JsExpr::Number(0.0)
    } else if a.is_one() {
        b
    } else if b.is_one() {
        a
    } else {
        a.mul(b)
    }
}

/// `((x % m) + m) % m`, a modulo that stays non-negative.
fn wrap_modulo(x: JsExpr, m: JsExpr) -> JsExpr {
    x.rem(m.clone()).add(m.clone()).rem(m)
}

fn toggled(base: JsExpr, t: &JsExpr) -> JsExpr {
    let odd = t
        .clone()
        .rem(JsExpr::Number(2.0))
        .binary(BinOp::StrictEq, JsExpr::Number(1.0));
    JsExpr::conditional(odd, base.clone().not(), base)
}

fn after_first(t: &JsExpr, value: JsExpr, base: JsExpr) -> JsExpr {
    if matches!(t, JsExpr::Number(n) if *n >= 1.0) {
        return value;
    }
    JsExpr::conditional(t.clone().binary(BinOp::Ge, JsExpr::Number(1.0)), value, base)
}

/// Adds `prop: item.prop ?? default` for every property in `missing`.
fn with_defaults(value: JsExpr, missing: &[String], collection: bool) -> JsExpr {
    let item = JsExpr::ident(ITEM);
    let mut members = vec![ObjectMember::Spread(item.clone())];
    for property in missing {
        members.push(ObjectMember::Property(
            property.clone(),
            item.clone()
                .member(property.as_str())
                .binary(BinOp::Nullish, neutral_default(property)),
        ));
    }
    let object = JsExpr::Object(members);
    if collection {
        value.member("map").call(vec![JsExpr::arrow(&[ITEM], object)])
    } else {
        JsExpr::arrow(&[ITEM], object).call(vec![value])
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Extends a statement span over its indentation and the preceding line break.
fn line_span(source: &str, span: SourceSpan) -> SourceSpan {
    let bytes = source.as_bytes();
    let mut start = span.start as usize;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] == b'\n' {
        start -= 1;
        if start > 0 && bytes[start - 1] == b'\r' {
            start -= 1;
        }
        return SourceSpan::new(start as u32, span.end);
    }
    span
}

/// Extends an attribute span over the whitespace before it.
fn leading_space_span(source: &str, span: SourceSpan) -> SourceSpan {
    let bytes = source.as_bytes();
    let mut start = span.start as usize;
    while start > 0 && bytes[start - 1].is_ascii_whitespace() {
        start -= 1;
    }
    SourceSpan::new(start as u32, span.end)
}

/// Indentation of the first statement in a `{ ... }` body.
fn body_indent(source: &str, body: SourceSpan) -> String {
    let inner = source
        .get(body.start as usize + 1..body.end as usize)
        .unwrap_or_default();
    let leading: &str = &inner[..inner.len() - inner.trim_start().len()];
    match leading.rfind('\n') {
        Some(idx) => leading[idx + 1..].to_string(),
        None => "  ".to_string(),
    }
}

fn preamble_offset(program: &Program) -> u32 {
    let last_import = program
        .body
        .iter()
        .filter(|stmt| matches!(stmt, Statement::ImportDeclaration(_)))
        .map(span_of)
        .last();
    if let Some(span) = last_import {
        return span.end;
    }
    program.directives.last().map(|d| span_of(d).end).unwrap_or(0)
}

/// Local name of the frame hook when the module already imports it.
fn existing_hook_import(program: &Program, source: &FrameSource) -> Option<String> {
    program.body.iter().find_map(|stmt| {
        let Statement::ImportDeclaration(import) = stmt else { return None };
        if import.source.value != source.module.as_str() {
            return None;
        }
        import.specifiers.as_ref()?.iter().find_map(|specifier| match specifier {
            ImportDeclarationSpecifier::ImportSpecifier(named) if named.imported.name() == source.hook.as_str() => {
                Some(named.local.name.to_string())
            }
            _ => None,
        })
    })
}

fn declares_helper(program: &Program) -> bool {
    program.body.iter().any(|stmt| match stmt {
        Statement::VariableDeclaration(decl) => decl
            .declarations
            .iter()
            .any(|d| binding_name(&d.id) == Some(SEEDED_RANDOM_NAME)),
        _ => false,
    })
}

fn choose_frame_name(program: &Program) -> String {
    let mut probe = NameProbe {
        name: "frame",
        found: false,
    };
    probe.visit_program(program);
    if probe.found {
        "__frame".to_string()
    } else {
        "frame".to_string()
    }
}

struct NameProbe {
    name: &'static str,
    found: bool,
}

impl<'a> Visit<'a> for NameProbe {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if ident.name == self.name {
            self.found = true;
        }
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        if ident.name == self.name {
            self.found = true;
        }
    }
}

#[derive(Default)]
struct ClockReads {
    spans: Vec<SourceSpan>,
}

impl<'a> Visit<'a> for ClockReads {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if is_wall_clock_read(call) {
            self.spans.push(span_of(call));
            return;
        }
        walk::walk_call_expression(self, call);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RANDOMNESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Replaces every `Math.random()` with `__seededRandom(seed)`, the seed built
/// from the nearest element index and the call's ordinal. Callbacks that
/// draw random numbers but take no index parameter get one. Returns the
/// number of seeded calls and the spans whose edits conflicted.
pub fn seed_randomness(tree: &SyntaxTree, edits: &mut EditBuffer) -> (usize, Vec<SourceSpan>) {
    let mut seeder = RandomSeeder {
        source: tree.source,
        edits,
        indices: Vec::new(),
        ordinal: 0,
        conflicts: Vec::new(),
    };
    seeder.visit_program(&tree.program);
    (seeder.ordinal as usize, seeder.conflicts)
}

struct RandomSeeder<'s, 'e> {
    source: &'s str,
    edits: &'e mut EditBuffer,
    indices: Vec<Option<String>>,
    ordinal: u32,
    conflicts: Vec<SourceSpan>,
}

impl<'s, 'e> RandomSeeder<'s, 'e> {
    fn seed_call(&mut self, span: SourceSpan) {
        self.ordinal += 1;
        let ordinal = JsExpr::Number(self.ordinal as f64);
        let seed = match self.indices.last().cloned().flatten() {
            Some(index) => JsExpr::ident(index).mul(JsExpr::Number(SEED_STRIDE)).add(ordinal),
            None => ordinal,
        };
        let text = JsExpr::ident(SEEDED_RANDOM_NAME).call(vec![seed]).print();
        if self.edits.replace(span, text).is_err() {
            self.conflicts.push(span);
        }
    }

    /// Name of the callback's index parameter, adding one when the callback
    /// needs it.
    fn index_parameter(&mut self, callback: &Expression, parts: &FunctionParts) -> Option<String> {
        if let Some(name) = parts.param_name(1) {
            return Some(name.to_string());
        }
        if parts.param_count() >= 2 || parts.params.rest.is_some() || !draws_random(callback) {
            return None;
        }
        let source = self.source;
        let result = match parts.params.items.first() {
            Some(first) => {
                let span = span_of(first);
                let before = source.get(..span.start as usize).unwrap_or_default().trim_end();
                if before.ends_with('(') {
                    self.edits.insert(span.end, format!(", {}", INDEX))
                } else {
                    self.edits
                        .replace(span, format!("({}, {})", span.slice(source), INDEX))
                }
            }
            None => {
                let params = span_of(parts.params);
                if source.as_bytes().get(params.start as usize) != Some(&b'(') {
                    return None;
                }
                self.edits.insert(params.start + 1, format!("_, {}", INDEX))
            }
        };
        match result {
            Ok(()) => Some(INDEX.to_string()),
            Err(_) => {
                self.conflicts.push(parts.span);
                None
            }
        }
    }
}

impl<'s, 'e, 'a> Visit<'a> for RandomSeeder<'s, 'e> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if is_math_random(call) {
            self.seed_call(span_of(call));
            return;
        }

        let callback_position = match callee_path(call).as_deref() {
            Some("Array.from") => Some(1),
            _ => match &call.callee {
                Expression::StaticMemberExpression(member)
                    if matches!(member.property.name.as_str(), "map" | "forEach" | "flatMap") =>
                {
                    Some(0)
                }
                _ => None,
            },
        };
        let callback = callback_position
            .and_then(|position| argument_expression(call, position).map(|cb| (position, cb)));
        if let Some((position, callback)) = callback {
            if let Some(parts) = FunctionParts::of(callback) {
                let index = self.index_parameter(callback, &parts);
                self.visit_expression(&call.callee);
                for (idx, arg) in call.arguments.iter().enumerate() {
                    if idx == position {
                        self.indices.push(index.clone());
                        self.visit_argument(arg);
                        self.indices.pop();
                    } else {
                        self.visit_argument(arg);
                    }
                }
                return;
            }
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        let index = match &stmt.init {
            Some(ForStatementInit::VariableDeclaration(decl)) => decl
                .declarations
                .first()
                .and_then(|d| binding_name(&d.id))
                .map(str::to_string),
            _ => None,
        };
        self.indices.push(index);
        walk::walk_for_statement(self, stmt);
        self.indices.pop();
    }
}

fn draws_random(expr: &Expression) -> bool {
    #[derive(Default)]
    struct Probe {
        found: bool,
    }
    impl<'a> Visit<'a> for Probe {
        fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
            if is_math_random(call) {
                self.found = true;
            }
            walk::walk_call_expression(self, call);
        }
    }
    let mut probe = Probe::default();
    probe.visit_expression(expr);
    probe.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Dialect;
    use crate::parse::{parse_artifact, validate_program};
    use crate::resolve::resolve_bindings;
    use oxc_allocator::Allocator;

    fn run(code: &str) -> (String, RewriteReport) {
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, code, Dialect::Tsx).unwrap();
        let map = resolve_bindings(&tree);
        let mut edits = EditBuffer::new();
        let report = rewrite(&tree, &map, &RewriteContext::default(), &mut edits);
        let output = edits.apply(code);
        validate_program(&output, Dialect::Tsx).unwrap_or_else(|e| panic!("{}\n---\n{}", e, output));
        (output, report)
    }

    #[test]
    fn interval_counter_becomes_frame_expression() {
        let code = r#"import { useState, useEffect } from 'react';

export default function Counter() {
  const [count, setCount] = useState(0);
  useEffect(() => {
    const id = setInterval(() => setCount(c => c + 1), 1000);
    return () => clearInterval(id);
  }, []);
  return <h1>{count}</h1>;
}
"#;
        let (output, report) = run(code);
        assert!(output.contains("const count = Math.floor(frame / 30);"), "{}", output);
        assert!(output.contains("const frame = useCurrentFrame();"));
        assert!(output.contains("import { useCurrentFrame } from \"remotion\";"));
        assert!(!output.contains("setInterval"));
        assert!(!output.contains("useEffect(("));
        assert_eq!(report.removed_effects, 1);
        assert_eq!(report.bindings[0].fidelity, Fidelity::Exact);
    }

    #[test]
    fn particles_are_seeded_and_completed() {
        let code = r#"
function Field() {
  const [dots, setDots] = useState(() =>
    Array.from({ length: 20 }, () => ({ x: Math.random() * 400, vx: 2 }))
  );
  useEffect(() => {
    const id = setInterval(() => {
      setDots(prev => prev.map(d => ({ ...d, x: d.x + d.vx })));
    }, 16);
    return () => clearInterval(id);
  }, []);
  return <svg>{dots.map((d, i) => <circle key={i} cx={d.x} r={d.size} fill={d.color} />)}</svg>;
}
"#;
        let (output, report) = run(code);
        assert!(!output.contains("Math.random"));
        assert!(output.contains("(_, __i) => ({ x: __seededRandom((__i * 1009) + 1) * 400"), "{}", output);
        assert!(output.contains("const __seededRandom = (seed) =>"));
        assert!(output.contains("x: __item.x + (__item.vx * Math.floor(frame / 0.48))"), "{}", output);
        assert!(output.contains("size: __item.size ?? 0"));
        assert!(output.contains("color: __item.color ?? \"currentColor\""));

        let dots = &report.bindings[0];
        assert_eq!(dots.defaulted_properties, vec!["color".to_string(), "size".to_string()]);
        for used in &dots.used_properties {
            assert!(dots.derived_properties.contains(used), "{} missing", used);
        }
        assert!(report.findings.iter().any(|f| f.code == FC_SHAPE_INCOMPLETE));
    }

    #[test]
    fn click_stepper_carousel() {
        let code = r#"
const slides = ['One', 'Two', 'Three', 'Four'];
export function Carousel() {
  const [index, setIndex] = useState(0);
  return (
    <div>
      <p>{slides[index]}</p>
      <button onClick={() => setIndex(i => (i + 1) % slides.length)}>Next</button>
    </div>
  );
}
"#;
        let (output, report) = run(code);
        assert!(
            output.contains("const index = Math.floor(frame / 90) % slides.length;"),
            "{}",
            output
        );
        assert!(output.contains("<button>Next</button>"), "{}", output);
        assert_eq!(report.removed_handlers, 1);
    }

    #[test]
    fn handler_with_other_work_is_kept() {
        let code = r#"
function Toggle() {
  const [open, setOpen] = useState(false);
  return <button onClick={() => { track('click'); setOpen(v => !v); }}>{open ? 'on' : 'off'}</button>;
}
"#;
        let (output, report) = run(code);
        assert!(output.contains("track('click'); ;"), "{}", output);
        assert!(output.contains("const open = false;"));
        assert_eq!(report.bindings[0].fidelity, Fidelity::Frozen);
        assert!(report.findings.iter().any(|f| f.code == FC_HANDLER_FROZEN));
    }

    #[test]
    fn collision_bounce_is_approximated() {
        let code = r#"
function Ball() {
  const [ball, setBall] = useState({ x: 0, vx: 3 });
  useEffect(() => {
    const id = requestAnimationFrame(function step() {
      setBall(b => ({ ...b, x: b.x > 300 ? 0 : b.x + b.vx }));
    });
    return () => cancelAnimationFrame(id);
  }, []);
  return <div style={{ left: ball.x }} />;
}
"#;
        let (output, report) = run(code);
        assert!(output.contains("const ball = ((__item) => ({ ...__item, x: __item.x + (__item.vx * (frame * 2)) }))"), "{}", output);
        assert_eq!(report.bindings[0].fidelity, Fidelity::Approximate);
        assert!(report.findings.iter().any(|f| f.code == FC_OPAQUE_RECURRENCE));
    }

    #[test]
    fn wall_clock_reads_use_frames() {
        let code = r#"
const started = Date.now();
function Clock() {
  const elapsed = Date.now() - started;
  return <span>{elapsed}</span>;
}
"#;
        let (output, report) = run(code);
        assert!(output.contains("const elapsed = (frame * (1000 / 30)) - started;"), "{}", output);
        assert_eq!(report.clock_reads, 1);
        assert!(report.findings.iter().any(|f| f.code == FC_WALL_CLOCK_RETAINED));
    }

    #[test]
    fn existing_frame_name_is_avoided() {
        let code = r#"
function Film({ frame }) {
  const [n, setN] = useState(0);
  useEffect(() => { const t = setInterval(() => setN(v => v + 1), 1000); return () => clearInterval(t); }, []);
  return <i>{frame}{n}</i>;
}
"#;
        let (output, _) = run(code);
        assert!(output.contains("const __frame = useCurrentFrame();"));
        assert!(output.contains("const n = Math.floor(__frame / 30);"));
    }

    #[test]
    fn named_generator_initializer_is_called() {
        let code = r#"
function makeStars() {
  const out = [];
  for (let i = 0; i < 40; i++) {
    out.push({ x: Math.random() * 400, y: Math.random() * 300 });
  }
  return out;
}
function Sky() {
  const [stars, setStars] = useState(makeStars);
  useEffect(() => {
    const id = setInterval(() => setStars(s => s.map(st => ({ ...st, y: st.y + 1 }))), 1000);
    return () => clearInterval(id);
  }, []);
  return <svg>{stars.map((st, i) => <circle key={i} cx={st.x} cy={st.y} r={1} />)}</svg>;
}
"#;
        let (output, report) = run(code);
        assert!(
            output.contains("const stars = makeStars().map((__item) => ({ ...__item, y: __item.y + Math.floor(frame / 30) }));"),
            "{}",
            output
        );
        assert!(!output.contains("__item.x ??"), "{}", output);
        let stars = &report.bindings[0];
        assert_eq!(stars.confidence, Confidence::High);
        assert_eq!(stars.fidelity, Fidelity::Exact);
        assert!(stars.defaulted_properties.is_empty());
        assert!(!report.findings.iter().any(|f| f.code == FC_OPAQUE_SHAPE));
    }

    #[test]
    fn named_scalar_initializer_is_called() {
        let code = r#"
const start = () => 5;
function Ticker() {
  const [n, setN] = useState(start);
  useEffect(() => {
    const id = setInterval(() => setN(v => v + 1), 1000);
    return () => clearInterval(id);
  }, []);
  return <b>{n}</b>;
}
"#;
        let (output, report) = run(code);
        assert!(output.contains("const n = start() + Math.floor(frame / 30);"), "{}", output);
        assert_eq!(report.bindings[0].fidelity, Fidelity::Exact);
    }

    #[test]
    fn uninferable_initializer_is_approximate() {
        let code = r#"
function Feed() {
  const [items, setItems] = useState(buildItems(12));
  useEffect(() => {
    const id = setInterval(() => setItems(xs => xs.map(it => ({ ...it, y: it.y + 1 }))), 1000);
    return () => clearInterval(id);
  }, []);
  return <ul>{items.map(it => <li key={it.id}>{it.y}</li>)}</ul>;
}
"#;
        let (output, report) = run(code);
        assert!(output.contains("buildItems(12).map((__item) =>"), "{}", output);
        let items = &report.bindings[0];
        assert_eq!(items.confidence, Confidence::Low);
        assert_eq!(items.fidelity, Fidelity::Approximate);
        assert_eq!(items.defaulted_properties, vec!["id".to_string()]);
        let finding = report
            .findings
            .iter()
            .find(|f| f.code == FC_OPAQUE_SHAPE)
            .expect("opaque shape finding");
        assert!(finding.message.contains("could not be inferred"));
        assert!(finding.message.contains("id"));
    }
}
