//! Stateful-variable resolution.
//!
//! Finds every `const [value, setValue] = useState(init)` declared inside a
//! function body, infers the initial shape of `value`, and records where the
//! binding is read (usage sites) and where the setter is called (mutation
//! sites, tagged with what drives them). Effects and event handlers are
//! summarized alongside so the rewriter can tell which of them exist only to
//! schedule mutations.

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_syntax::scope::ScopeFlags;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::diagnostics::SourceSpan;
use crate::parse::SyntaxTree;
use crate::recurrence::{analyze_update, Recurrence};
use crate::syntax::{
    argument_expression, attribute_name, binding_name, callee_path, collect_local_functions,
    is_hook_call, is_timer_cancel, is_wall_clock_read, numeric_value, span_of, static_key_name,
    strip_parens, timer_kind, FunctionParts, TimerKind,
};

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    String,
    Boolean,
    Null,
    Array,
    Object,
    Function,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyShape {
    pub name: String,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum Shape {
    Scalar { kind: ValueKind },
    Known { properties: Vec<PropertyShape> },
    Collection { length: Option<u32>, element: Box<Shape> },
    Opaque,
}

impl Shape {
    /// Statically known property names: of the value itself for `Known`, of
    /// each element for a collection of `Known`.
    pub fn property_names(&self) -> Option<Vec<&str>> {
        match self {
            Shape::Known { properties } => Some(properties.iter().map(|p| p.name.as_str()).collect()),
            Shape::Collection { element, .. } => match element.as_ref() {
                Shape::Known { .. } => element.property_names(),
                Shape::Scalar { .. } => Some(Vec::new()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Shape::Collection { .. })
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Shape::Opaque)
    }

    /// Opaque itself, or a collection of opaque elements.
    pub fn is_low_confidence(&self) -> bool {
        match self {
            Shape::Opaque => true,
            // An empty literal has no elements to infer.
            Shape::Collection { length: Some(0), .. } => false,
            Shape::Collection { element, .. } => element.is_low_confidence(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSite {
    pub span: SourceSpan,
    pub property: String,
    /// Read off an element of the collection rather than the value itself.
    pub via_element: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "context", rename_all = "camelCase")]
pub enum MutationContext {
    Interval {
        period_ms: Option<f64>,
        period: Option<SourceSpan>,
    },
    Timeout {
        delay_ms: Option<f64>,
        repeating: bool,
    },
    AnimationFrame,
    EventHandler { attribute: String },
    Effect,
    Other,
}

impl MutationContext {
    /// Driven by the passage of time rather than by user input.
    pub fn is_periodic(&self) -> bool {
        matches!(
            self,
            MutationContext::Interval { .. }
                | MutationContext::AnimationFrame
                | MutationContext::Timeout { repeating: true, .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationSite {
    pub call: SourceSpan,
    /// The expression statement consisting of just this call, if any.
    pub statement: Option<SourceSpan>,
    pub context: MutationContext,
    pub recurrence: Recurrence,
    /// Enclosing `useEffect` statement.
    pub effect: Option<SourceSpan>,
    /// Index into [`BindingMap::handlers`] for inline handler attributes.
    pub handler: Option<usize>,
    /// Named function the call sits in, when that function is a handler or
    /// timer callback.
    pub function: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateBinding {
    pub name: String,
    pub setter: Option<String>,
    /// The whole `const [..] = useState(..)` statement.
    pub declaration: SourceSpan,
    pub initializer: Option<SourceSpan>,
    /// `useState(() => ...)`
    pub lazy_initializer: bool,
    pub shape: Shape,
    pub confidence: Confidence,
    /// Body of the function declaring the binding.
    pub owner: SourceSpan,
    pub usage_sites: Vec<UsageSite>,
    pub mutation_sites: Vec<MutationSite>,
    pub shape_incomplete: bool,
    pub missing_properties: Vec<String>,
    pub rewritable: bool,
    /// Why the binding cannot be rewritten, when it cannot.
    pub blocker: Option<String>,
}

impl StateBinding {
    /// Distinct property names read at usage sites.
    pub fn used_properties(&self) -> BTreeSet<String> {
        self.usage_sites.iter().map(|u| u.property.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSite {
    pub statement: SourceSpan,
    pub owner: SourceSpan,
    pub dependencies: Vec<String>,
    pub setters: BTreeSet<String>,
    /// The effect does nothing except schedule and perform state updates.
    pub scheduling_only: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSite {
    pub attribute: SourceSpan,
    pub name: String,
    pub setters: BTreeSet<String>,
    pub mutation_only: bool,
    /// Named function the handler refers to.
    pub function: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerFunction {
    pub name: String,
    pub declaration: SourceSpan,
    pub setters: BTreeSet<String>,
    pub mutation_only: bool,
    /// Every reference to the function by name.
    pub references: Vec<SourceSpan>,
}

/// Bindings in declaration order plus the scheduling structure around them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingMap {
    pub bindings: Vec<StateBinding>,
    pub effects: Vec<EffectSite>,
    pub handlers: Vec<HandlerSite>,
    pub functions: Vec<HandlerFunction>,
}

impl BindingMap {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

/// Member names that belong to arrays, strings and numbers rather than to
/// the application's data.
const BUILTIN_MEMBERS: &[&str] = &[
    "length", "map", "forEach", "filter", "reduce", "slice", "concat", "find", "findIndex",
    "some", "every", "includes", "indexOf", "join", "flatMap", "at", "keys", "values",
    "entries", "toString", "toFixed", "padStart", "split", "trim", "toUpperCase",
    "toLowerCase", "sort", "reverse", "push",
];

const ELEMENT_CALLBACKS: &[&str] = &["map", "forEach", "filter", "some", "every", "find", "findIndex", "flatMap"];

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[tracing::instrument(skip_all, target = "framecast", fields(bytes = tree.source.len()))]
pub fn resolve_bindings(tree: &SyntaxTree) -> BindingMap {
    let functions = collect_local_functions(&tree.program);

    let mut finder = DeclarationFinder::new(&functions);
    finder.visit_program(&tree.program);
    let seeds = finder.seeds;
    if seeds.is_empty() {
        return BindingMap::default();
    }

    let mut seeder = ContextSeeder::default();
    seeder.visit_program(&tree.program);

    let setters: BTreeSet<String> = seeds.iter().filter_map(|s| s.setter.clone()).collect();
    let mut collector = SiteCollector {
        source: tree.source,
        seeds: &seeds,
        functions: &functions,
        setters: &setters,
        named_contexts: &seeder.contexts,
        frames: vec![Frame::default()],
        aliases: Vec::new(),
        statement_calls: HashMap::new(),
        usages: vec![Vec::new(); seeds.len()],
        mutations: vec![Vec::new(); seeds.len()],
        setter_escapes: vec![0; seeds.len()],
        effects: Vec::new(),
        handlers: Vec::new(),
        function_decls: HashMap::new(),
        function_refs: HashMap::new(),
        bodies: Vec::new(),
    };
    collector.visit_program(&tree.program);

    let mut map = BindingMap {
        effects: collector.effects,
        handlers: collector.handlers,
        ..Default::default()
    };

    let mut names: Vec<&String> = seeder.contexts.keys().collect();
    names.sort();
    for name in names {
        let Some(declaration) = collector.function_decls.get(name) else { continue };
        let mut purity = Purity::new(&functions, &setters);
        let mut called = BTreeSet::new();
        let mutation_only = purity.named(name, &mut called);
        map.functions.push(HandlerFunction {
            name: name.clone(),
            declaration: *declaration,
            setters: called,
            mutation_only,
            references: collector.function_refs.get(name).cloned().unwrap_or_default(),
        });
    }

    let usages = collector.usages;
    let mutations = collector.mutations;
    let escapes = collector.setter_escapes;
    for (((seed, usage_sites), mutation_sites), escapes) in
        seeds.into_iter().zip(usages).zip(mutations).zip(escapes)
    {
        map.bindings.push(finish_binding(seed, usage_sites, mutation_sites, escapes));
    }

    for binding in &map.bindings {
        tracing::debug!(
            target: "framecast",
            binding = %binding.name,
            mutations = binding.mutation_sites.len(),
            usages = binding.usage_sites.len(),
            rewritable = binding.rewritable,
            "resolved binding"
        );
    }
    map
}

fn finish_binding(
    seed: BindingSeed,
    usage_sites: Vec<UsageSite>,
    mutation_sites: Vec<MutationSite>,
    setter_escapes: usize,
) -> StateBinding {
    let used: BTreeSet<String> = usage_sites.iter().map(|u| u.property.clone()).collect();
    let missing_properties: Vec<String> = match seed.shape.property_names() {
        Some(known) => used.iter().filter(|p| !known.contains(&p.as_str())).cloned().collect(),
        None => Vec::new(),
    };

    let blocker = if seed.setter.is_none() {
        Some("binding has no setter".to_string())
    } else if setter_escapes > 0 {
        Some("setter is passed around instead of called".to_string())
    } else if !seed.sole_declarator {
        Some("declaration shares its statement with other declarators".to_string())
    } else {
        None
    };

    StateBinding {
        name: seed.name,
        setter: seed.setter,
        declaration: seed.declaration,
        initializer: seed.initializer,
        lazy_initializer: seed.lazy,
        shape_incomplete: !missing_properties.is_empty(),
        missing_properties,
        shape: seed.shape,
        confidence: seed.confidence,
        owner: seed.owner,
        usage_sites,
        mutation_sites,
        rewritable: blocker.is_none(),
        blocker,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATIONS
// ═══════════════════════════════════════════════════════════════════════════════

struct BindingSeed {
    name: String,
    setter: Option<String>,
    declaration: SourceSpan,
    sole_declarator: bool,
    initializer: Option<SourceSpan>,
    lazy: bool,
    shape: Shape,
    confidence: Confidence,
    owner: SourceSpan,
}

struct DeclarationFinder<'f, 'b, 'a> {
    functions: &'f HashMap<String, FunctionParts<'b, 'a>>,
    bodies: Vec<SourceSpan>,
    seeds: Vec<BindingSeed>,
}

impl<'f, 'b, 'a> DeclarationFinder<'f, 'b, 'a> {
    fn new(functions: &'f HashMap<String, FunctionParts<'b, 'a>>) -> Self {
        DeclarationFinder {
            functions,
            bodies: Vec::new(),
            seeds: Vec::new(),
        }
    }
}

impl<'f, 'b, 'a> Visit<'a> for DeclarationFinder<'f, 'b, 'a> {
    fn visit_function_body(&mut self, body: &FunctionBody<'a>) {
        self.bodies.push(span_of(body));
        walk::walk_function_body(self, body);
        self.bodies.pop();
    }

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if let Some(owner) = self.bodies.last().copied() {
            for declarator in &decl.declarations {
                let Some(Expression::CallExpression(call)) = declarator.init.as_ref().map(strip_parens) else {
                    continue;
                };
                if !is_hook_call(call, "useState") {
                    continue;
                }
                let BindingPattern::ArrayPattern(pattern) = &declarator.id else { continue };
                let Some(name) = pattern.elements.first().and_then(|e| e.as_ref()).and_then(binding_name) else {
                    continue;
                };
                let setter = pattern
                    .elements
                    .get(1)
                    .and_then(|e| e.as_ref())
                    .and_then(binding_name)
                    .map(str::to_string);

                let init = argument_expression(call, 0);
                // `useState(makeItems)` calls the named function, like an inline initializer.
                let named_initializer = init.and_then(|e| match strip_parens(e) {
                    Expression::Identifier(ident) => self.functions.get(ident.name.as_str()),
                    _ => None,
                });
                let lazy = named_initializer.is_some()
                    || init.is_some_and(|e| FunctionParts::of(e).is_some_and(|f| f.param_count() == 0));
                let shape = match (named_initializer, init) {
                    (Some(parts), _) if parts.param_count() == 0 => function_result_shape(parts, self.functions, 0),
                    (Some(_), _) => Shape::Opaque,
                    (None, Some(init)) => infer_shape(init, self.functions, 0),
                    (None, None) => Shape::Scalar { kind: ValueKind::Unknown },
                };
                let confidence = if shape.is_low_confidence() { Confidence::Low } else { Confidence::High };
                self.seeds.push(BindingSeed {
                    name: name.to_string(),
                    setter,
                    declaration: span_of(decl),
                    sole_declarator: decl.declarations.len() == 1,
                    initializer: init.map(span_of),
                    lazy,
                    shape,
                    confidence,
                    owner,
                });
            }
        }
        walk::walk_variable_declaration(self, decl);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHAPE INFERENCE
// ═══════════════════════════════════════════════════════════════════════════════

const MAX_SHAPE_DEPTH: usize = 4;

fn infer_shape(expr: &Expression, functions: &HashMap<String, FunctionParts>, depth: usize) -> Shape {
    if depth > MAX_SHAPE_DEPTH {
        return Shape::Opaque;
    }
    let expr = strip_parens(expr);
    match expr {
        Expression::ObjectExpression(object) => Shape::Known {
            properties: object_properties(object),
        },
        Expression::ArrayExpression(array) => array_shape(array),
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
            match FunctionParts::of(expr) {
                Some(parts) if parts.param_count() == 0 => function_result_shape(&parts, functions, depth),
                _ => Shape::Scalar { kind: ValueKind::Function },
            }
        }
        Expression::CallExpression(call) => call_shape(call, functions, depth),
        _ => match value_kind(expr) {
            ValueKind::Unknown | ValueKind::Object | ValueKind::Array => Shape::Opaque,
            kind => Shape::Scalar { kind },
        },
    }
}

fn object_properties(object: &ObjectExpression) -> Vec<PropertyShape> {
    let mut properties: Vec<PropertyShape> = Vec::new();
    for property in &object.properties {
        let ObjectPropertyKind::ObjectProperty(prop) = property else { continue };
        let Some(name) = static_key_name(&prop.key) else { continue };
        if properties.iter().any(|p| p.name == name) {
            continue;
        }
        properties.push(PropertyShape {
            name,
            kind: value_kind(&prop.value),
        });
    }
    properties
}

fn array_shape(array: &ArrayExpression) -> Shape {
    let mut element: Option<Shape> = None;
    for item in &array.elements {
        let Some(expr) = item.as_expression() else {
            return Shape::Collection {
                length: None,
                element: Box::new(Shape::Opaque),
            };
        };
        let shape = match strip_parens(expr) {
            Expression::ObjectExpression(object) => Shape::Known {
                properties: object_properties(object),
            },
            other => Shape::Scalar { kind: value_kind(other) },
        };
        element = Some(match element {
            None => shape,
            Some(previous) => merge_shapes(previous, shape),
        });
    }
    Shape::Collection {
        length: Some(array.elements.len() as u32),
        element: Box::new(element.unwrap_or(Shape::Opaque)),
    }
}

/// Union of the properties of two element shapes.
fn merge_shapes(a: Shape, b: Shape) -> Shape {
    match (a, b) {
        (Shape::Known { mut properties }, Shape::Known { properties: more }) => {
            for property in more {
                if !properties.iter().any(|p| p.name == property.name) {
                    properties.push(property);
                }
            }
            Shape::Known { properties }
        }
        (Shape::Scalar { kind: x }, Shape::Scalar { kind: y }) if x == y => Shape::Scalar { kind: x },
        _ => Shape::Opaque,
    }
}

fn call_shape(call: &CallExpression, functions: &HashMap<String, FunctionParts>, depth: usize) -> Shape {
    let path = callee_path(call);
    match path.as_deref() {
        // Array.from({ length: N }, (_, i) => ...)
        Some("Array.from") => {
            let length = argument_expression(call, 0).and_then(declared_length);
            let element = argument_expression(call, 1)
                .and_then(FunctionParts::of)
                .map(|cb| function_result_shape(&cb, functions, depth))
                .unwrap_or(Shape::Opaque);
            return Shape::Collection {
                length,
                element: Box::new(element),
            };
        }
        Some(name) if functions.contains_key(name) => {
            if let Some(parts) = functions.get(name) {
                return function_result_shape(parts, functions, depth + 1);
            }
        }
        _ => {}
    }

    // [...Array(N)].map(cb), Array(N).fill(0).map(cb), Array.from({length: N}).map(cb)
    if let Expression::StaticMemberExpression(member) = strip_parens(&call.callee) {
        if member.property.name == "map" {
            if let Some(length) = sized_array_length(&member.object) {
                let element = argument_expression(call, 0)
                    .and_then(FunctionParts::of)
                    .map(|cb| function_result_shape(&cb, functions, depth))
                    .unwrap_or(Shape::Opaque);
                return Shape::Collection {
                    length,
                    element: Box::new(element),
                };
            }
        }
    }
    Shape::Opaque
}

/// `Some(len)` when `expr` builds an array of a fixed (possibly unknown) size.
fn sized_array_length(expr: &Expression) -> Option<Option<u32>> {
    match strip_parens(expr) {
        Expression::ArrayExpression(array) if array.elements.len() == 1 => {
            let ArrayExpressionElement::SpreadElement(spread) = &array.elements[0] else {
                return None;
            };
            sized_array_length(&spread.argument)
        }
        Expression::CallExpression(call) => match callee_path(call).as_deref() {
            Some("Array") => Some(argument_expression(call, 0).and_then(as_length)),
            Some("Array.from") => Some(argument_expression(call, 0).and_then(declared_length)),
            _ => match strip_parens(&call.callee) {
                Expression::StaticMemberExpression(member) if member.property.name == "fill" => {
                    sized_array_length(&member.object)
                }
                _ => None,
            },
        },
        Expression::NewExpression(construct) => match &construct.callee {
            Expression::Identifier(ident) if ident.name == "Array" => {
                Some(construct.arguments.first().and_then(|a| a.as_expression()).and_then(as_length))
            }
            _ => None,
        },
        _ => None,
    }
}

fn as_length(expr: &Expression) -> Option<u32> {
    numeric_value(expr).filter(|n| *n >= 0.0 && n.fract() == 0.0).map(|n| n as u32)
}

/// `{ length: N }`
fn declared_length(expr: &Expression) -> Option<u32> {
    let Expression::ObjectExpression(object) = strip_parens(expr) else { return None };
    object.properties.iter().find_map(|property| match property {
        ObjectPropertyKind::ObjectProperty(prop) if static_key_name(&prop.key).as_deref() == Some("length") => {
            as_length(&prop.value)
        }
        _ => None,
    })
}

/// Shape of what a function returns: its returned expression, or an array
/// filled by a `for` loop of `push` calls.
fn function_result_shape(
    parts: &FunctionParts,
    functions: &HashMap<String, FunctionParts>,
    depth: usize,
) -> Shape {
    if let Some(returned) = parts.returned_expression() {
        if let Expression::Identifier(ident) = strip_parens(returned) {
            if let Some(shape) = pushed_collection(parts.statements(), &ident.name) {
                return shape;
            }
        }
        return infer_shape(returned, functions, depth + 1);
    }
    Shape::Opaque
}

/// `const out = []; for (let i = 0; i < N; i++) { out.push({ ... }) } return out;`
fn pushed_collection(statements: &[Statement], array: &str) -> Option<Shape> {
    let declared = statements.iter().any(|stmt| match stmt {
        Statement::VariableDeclaration(decl) => decl.declarations.iter().any(|d| {
            binding_name(&d.id) == Some(array)
                && matches!(d.init.as_ref().map(strip_parens), Some(Expression::ArrayExpression(a)) if a.elements.is_empty())
        }),
        _ => false,
    });
    if !declared {
        return None;
    }
    for stmt in statements {
        let Statement::ForStatement(for_stmt) = stmt else { continue };
        let mut pushes = PushFinder {
            array,
            element: None,
        };
        pushes.visit_statement(&for_stmt.body);
        let Some(element) = pushes.element else { continue };
        let length = for_stmt.test.as_ref().and_then(|test| match strip_parens(test) {
            Expression::BinaryExpression(bin) if bin.operator == BinaryOperator::LessThan => as_length(&bin.right),
            _ => None,
        });
        return Some(Shape::Collection {
            length,
            element: Box::new(element),
        });
    }
    None
}

struct PushFinder<'n> {
    array: &'n str,
    element: Option<Shape>,
}

impl<'n, 'a> Visit<'a> for PushFinder<'n> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::StaticMemberExpression(member) = strip_parens(&call.callee) {
            let target = matches!(strip_parens(&member.object), Expression::Identifier(i) if i.name == self.array);
            if target && member.property.name == "push" {
                if let Some(Expression::ObjectExpression(object)) = argument_expression(call, 0).map(strip_parens) {
                    let shape = Shape::Known {
                        properties: object_properties(object),
                    };
                    self.element = Some(match self.element.take() {
                        None => shape,
                        Some(previous) => merge_shapes(previous, shape),
                    });
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

fn value_kind(expr: &Expression) -> ValueKind {
    match strip_parens(expr) {
        Expression::NumericLiteral(_) => ValueKind::Number,
        Expression::StringLiteral(_) | Expression::TemplateLiteral(_) => ValueKind::String,
        Expression::BooleanLiteral(_) => ValueKind::Boolean,
        Expression::NullLiteral(_) => ValueKind::Null,
        Expression::ArrayExpression(_) => ValueKind::Array,
        Expression::ObjectExpression(_) => ValueKind::Object,
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => ValueKind::Function,
        Expression::UnaryExpression(unary) => match unary.operator {
            UnaryOperator::UnaryNegation | UnaryOperator::UnaryPlus => ValueKind::Number,
            UnaryOperator::LogicalNot => ValueKind::Boolean,
            _ => ValueKind::Unknown,
        },
        Expression::BinaryExpression(bin) => match bin.operator {
            BinaryOperator::Subtraction
            | BinaryOperator::Multiplication
            | BinaryOperator::Division
            | BinaryOperator::Remainder
            | BinaryOperator::Exponential => ValueKind::Number,
            BinaryOperator::Addition => match (value_kind(&bin.left), value_kind(&bin.right)) {
                (ValueKind::String, _) | (_, ValueKind::String) => ValueKind::String,
                (ValueKind::Number, ValueKind::Number) => ValueKind::Number,
                _ => ValueKind::Unknown,
            },
            _ => ValueKind::Boolean,
        },
        Expression::CallExpression(call) => match callee_path(call) {
            Some(path) if path.starts_with("Math.") => ValueKind::Number,
            _ if is_wall_clock_read(call) => ValueKind::Number,
            _ => ValueKind::Unknown,
        },
        _ => ValueKind::Unknown,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTEXTS OF NAMED CALLBACKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Names passed to timers or used by handler attributes, with the context
/// that will run them.
#[derive(Default)]
struct ContextSeeder {
    contexts: HashMap<String, MutationContext>,
    handler: Option<String>,
}

impl<'a> Visit<'a> for ContextSeeder {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Some(kind) = timer_kind(call) {
            if let Some(Expression::Identifier(ident)) = argument_expression(call, 0).map(strip_parens) {
                self.contexts
                    .entry(ident.name.to_string())
                    .or_insert_with(|| timer_context(kind, call, &[], ""));
            }
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_jsx_attribute(&mut self, attr: &JSXAttribute<'a>) {
        let previous = self.handler.take();
        self.handler = attribute_name(attr).filter(|name| is_handler_attribute(name));
        walk::walk_jsx_attribute(self, attr);
        self.handler = previous;
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if let Some(attribute) = &self.handler {
            self.contexts
                .entry(ident.name.to_string())
                .or_insert_with(|| MutationContext::EventHandler {
                    attribute: attribute.clone(),
                });
        }
    }
}

fn is_handler_attribute(name: &str) -> bool {
    name.len() > 2 && name.starts_with("on") && name[2..].starts_with(|c: char| c.is_ascii_uppercase())
}

fn timer_context(kind: TimerKind, call: &CallExpression, deps: &[String], binding: &str) -> MutationContext {
    let delay = argument_expression(call, 1);
    let delay_ms = delay.and_then(numeric_value);
    match kind {
        TimerKind::Interval => MutationContext::Interval {
            period_ms: delay_ms,
            period: delay.map(span_of),
        },
        TimerKind::Timeout => MutationContext::Timeout {
            delay_ms,
            repeating: !binding.is_empty() && deps.iter().any(|d| d == binding),
        },
        TimerKind::AnimationFrame => MutationContext::AnimationFrame,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SITES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum FrameKind {
    Timer(TimerKind, Option<f64>, Option<SourceSpan>),
    Handler(String),
    Named(MutationContext),
    Effect,
    Other,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    effect: Option<SourceSpan>,
    deps: Vec<String>,
    handler: Option<usize>,
    function: Option<String>,
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            kind: FrameKind::Other,
            effect: None,
            deps: Vec::new(),
            handler: None,
            function: None,
        }
    }
}

impl Frame {
    fn context_for(&self, binding: &str) -> MutationContext {
        match &self.kind {
            FrameKind::Timer(TimerKind::Interval, ms, span) => MutationContext::Interval {
                period_ms: *ms,
                period: *span,
            },
            FrameKind::Timer(TimerKind::Timeout, ms, _) => MutationContext::Timeout {
                delay_ms: *ms,
                repeating: self.deps.iter().any(|d| d == binding),
            },
            FrameKind::Timer(TimerKind::AnimationFrame, ..) => MutationContext::AnimationFrame,
            FrameKind::Handler(attribute) => MutationContext::EventHandler {
                attribute: attribute.clone(),
            },
            FrameKind::Named(MutationContext::Timeout { delay_ms, .. }) => MutationContext::Timeout {
                delay_ms: *delay_ms,
                repeating: self.deps.iter().any(|d| d == binding),
            },
            FrameKind::Named(context) => context.clone(),
            FrameKind::Effect => MutationContext::Effect,
            FrameKind::Other => MutationContext::Other,
        }
    }
}

struct SiteCollector<'s, 'f, 'b, 'a> {
    source: &'s str,
    seeds: &'s [BindingSeed],
    functions: &'f HashMap<String, FunctionParts<'b, 'a>>,
    setters: &'f BTreeSet<String>,
    named_contexts: &'f HashMap<String, MutationContext>,
    frames: Vec<Frame>,
    /// Callback parameters standing for an element of a binding.
    aliases: Vec<(String, usize)>,
    statement_calls: HashMap<u32, SourceSpan>,
    usages: Vec<Vec<UsageSite>>,
    mutations: Vec<Vec<MutationSite>>,
    setter_escapes: Vec<usize>,
    effects: Vec<EffectSite>,
    handlers: Vec<HandlerSite>,
    function_decls: HashMap<String, SourceSpan>,
    function_refs: HashMap<String, Vec<SourceSpan>>,
    bodies: Vec<SourceSpan>,
}

impl<'s, 'f, 'b, 'a> SiteCollector<'s, 'f, 'b, 'a> {
    fn frame(&self) -> Frame {
        self.frames.last().cloned().unwrap_or_default()
    }

    fn binding_named(&self, name: &str, at: SourceSpan) -> Option<usize> {
        self.seeds
            .iter()
            .rposition(|seed| seed.name == name && seed.owner.contains(at))
    }

    fn binding_with_setter(&self, setter: &str, at: SourceSpan) -> Option<usize> {
        self.seeds
            .iter()
            .rposition(|seed| seed.setter.as_deref() == Some(setter) && seed.owner.contains(at))
    }

    fn alias(&self, name: &str) -> Option<usize> {
        self.aliases.iter().rev().find(|(alias, _)| alias == name).map(|(_, idx)| *idx)
    }

    fn record_usage(&mut self, binding: usize, span: SourceSpan, property: &str, via_element: bool) {
        if BUILTIN_MEMBERS.contains(&property) {
            return;
        }
        self.usages[binding].push(UsageSite {
            span,
            property: property.to_string(),
            via_element,
        });
    }

    fn mutable_except(&self, binding: usize) -> BTreeSet<String> {
        self.seeds
            .iter()
            .enumerate()
            .filter(|(idx, seed)| *idx != binding && seed.setter.is_some())
            .map(|(_, seed)| seed.name.clone())
            .collect()
    }

    fn record_mutation(&mut self, binding: usize, call: &CallExpression<'a>) {
        let frame = self.frame();
        let name = self.seeds[binding].name.clone();
        let recurrence = match argument_expression(call, 0) {
            Some(arg) => analyze_update(arg, &name, self.source, &self.mutable_except(binding)),
            None => Recurrence::Opaque {
                reason: "setter called without a value".to_string(),
            },
        };
        let call_span = span_of(call);
        self.mutations[binding].push(MutationSite {
            call: call_span,
            statement: self.statement_calls.get(&call_span.start).copied(),
            context: frame.context_for(&name),
            recurrence,
            effect: frame.effect,
            handler: frame.handler,
            function: frame.function.clone(),
        });
    }

    fn with_frame(&mut self, frame: Frame, f: impl FnOnce(&mut Self)) {
        self.frames.push(frame);
        f(self);
        self.frames.pop();
    }

    /// Walks an element callback with its first parameter bound to `binding`.
    fn visit_element_callback(&mut self, binding: usize, callback: &Expression<'a>) {
        let mut pushed = false;
        if let Some(parts) = FunctionParts::of(callback) {
            if let Some(param) = parts.params.items.first() {
                match &param.pattern {
                    BindingPattern::BindingIdentifier(ident) => {
                        self.aliases.push((ident.name.to_string(), binding));
                        pushed = true;
                    }
                    BindingPattern::ObjectPattern(pattern) => {
                        for property in &pattern.properties {
                            if let Some(key) = static_key_name(&property.key) {
                                self.record_usage(binding, span_of(&property.key), &key, true);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        self.visit_expression(callback);
        if pushed {
            self.aliases.pop();
        }
    }

    fn record_effect(&mut self, stmt: &ExpressionStatement<'a>, call: &CallExpression<'a>) -> Vec<String> {
        let deps: Vec<String> = match argument_expression(call, 1).map(strip_parens) {
            Some(Expression::ArrayExpression(array)) => array
                .elements
                .iter()
                .filter_map(|e| e.as_expression())
                .filter_map(|e| match strip_parens(e) {
                    Expression::Identifier(ident) => Some(ident.name.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        let mut purity = Purity::new(self.functions, self.setters);
        let mut called = BTreeSet::new();
        let scheduling_only = argument_expression(call, 0)
            .map(|cb| purity.callback(cb, &mut called))
            .unwrap_or(false);
        self.effects.push(EffectSite {
            statement: span_of(stmt),
            owner: self.bodies.last().copied().unwrap_or_default(),
            dependencies: deps.clone(),
            setters: called,
            scheduling_only,
        });
        deps
    }
}

impl<'s, 'f, 'b, 'a> Visit<'a> for SiteCollector<'s, 'f, 'b, 'a> {
    fn visit_function_body(&mut self, body: &FunctionBody<'a>) {
        self.bodies.push(span_of(body));
        walk::walk_function_body(self, body);
        self.bodies.pop();
    }

    fn visit_expression_statement(&mut self, stmt: &ExpressionStatement<'a>) {
        if let Expression::CallExpression(call) = strip_parens(&stmt.expression) {
            self.statement_calls.insert(span_of(&**call).start, span_of(stmt));

            if is_hook_call(call, "useEffect") || is_hook_call(call, "useLayoutEffect") {
                let deps = self.record_effect(stmt, call);
                let frame = Frame {
                    kind: FrameKind::Effect,
                    effect: Some(span_of(stmt)),
                    deps,
                    ..Frame::default()
                };
                self.with_frame(frame, |this| {
                    // The dependency list is not a use of the setter.
                    if let Some(callback) = argument_expression(call, 0) {
                        this.visit_expression(callback);
                    }
                });
                return;
            }
        }
        walk::walk_expression_statement(self, stmt);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let span = span_of(call);
        if let Expression::Identifier(callee) = strip_parens(&call.callee) {
            if let Some(binding) = self.binding_with_setter(&callee.name, span) {
                self.record_mutation(binding, call);
                for arg in &call.arguments {
                    self.visit_argument(arg);
                }
                return;
            }
        }

        if let Some(kind) = timer_kind(call) {
            self.visit_expression(&call.callee);
            let delay = argument_expression(call, 1);
            let parent = self.frame();
            for (idx, arg) in call.arguments.iter().enumerate() {
                if idx == 0 {
                    let frame = Frame {
                        kind: FrameKind::Timer(kind, delay.and_then(numeric_value), delay.map(span_of)),
                        ..parent.clone()
                    };
                    self.with_frame(frame, |this| this.visit_argument(arg));
                } else {
                    self.visit_argument(arg);
                }
            }
            return;
        }

        if let Expression::StaticMemberExpression(member) = strip_parens(&call.callee) {
            let method = member.property.name.as_str();
            if ELEMENT_CALLBACKS.contains(&method) {
                let target = match strip_parens(&member.object) {
                    Expression::Identifier(object) => self.binding_named(&object.name, span),
                    _ => None,
                };
                if let (Some(binding), Some(callback)) = (target, argument_expression(call, 0)) {
                    self.visit_expression(&call.callee);
                    self.visit_element_callback(binding, callback);
                    for arg in call.arguments.iter().skip(1) {
                        self.visit_argument(arg);
                    }
                    return;
                }
            }
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_static_member_expression(&mut self, member: &StaticMemberExpression<'a>) {
        let span = span_of(member);
        let property = member.property.name.as_str();
        match strip_parens(&member.object) {
            Expression::Identifier(object) => {
                if let Some(binding) = self.binding_named(&object.name, span) {
                    self.record_usage(binding, span, property, false);
                } else if let Some(binding) = self.alias(&object.name) {
                    self.record_usage(binding, span, property, true);
                }
            }
            Expression::ComputedMemberExpression(indexed) => {
                if let Expression::Identifier(object) = strip_parens(&indexed.object) {
                    if let Some(binding) = self.binding_named(&object.name, span) {
                        self.record_usage(binding, span, property, true);
                    }
                }
            }
            _ => {}
        }
        walk::walk_static_member_expression(self, member);
    }

    fn visit_jsx_attribute(&mut self, attr: &JSXAttribute<'a>) {
        let Some(name) = attribute_name(attr).filter(|name| is_handler_attribute(name)) else {
            walk::walk_jsx_attribute(self, attr);
            return;
        };
        let value = match &attr.value {
            Some(JSXAttributeValue::ExpressionContainer(container)) => container.expression.as_expression(),
            _ => None,
        };
        let Some(value) = value else {
            walk::walk_jsx_attribute(self, attr);
            return;
        };

        let mut purity = Purity::new(self.functions, self.setters);
        let mut called = BTreeSet::new();
        let mutation_only = purity.callback(value, &mut called);
        let function = match strip_parens(value) {
            Expression::Identifier(ident) => Some(ident.name.to_string()),
            _ => None,
        };
        self.handlers.push(HandlerSite {
            attribute: span_of(attr),
            name: name.clone(),
            setters: called,
            mutation_only,
            function,
        });
        let frame = Frame {
            kind: FrameKind::Handler(name),
            handler: Some(self.handlers.len() - 1),
            ..Frame::default()
        };
        self.with_frame(frame, |this| walk::walk_jsx_attribute(this, attr));
    }

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if decl.declarations.len() == 1 {
            let declarator = &decl.declarations[0];
            if let (Some(name), Some(init)) = (binding_name(&declarator.id), declarator.init.as_ref()) {
                if FunctionParts::of(init).is_some() {
                    self.function_decls.insert(name.to_string(), span_of(decl));
                }
            }
        }
        walk::walk_variable_declaration(self, decl);
    }

    fn visit_variable_declarator(&mut self, declarator: &VariableDeclarator<'a>) {
        let named = binding_name(&declarator.id)
            .filter(|_| declarator.init.as_ref().is_some_and(|init| FunctionParts::of(init).is_some()))
            .and_then(|name| self.named_contexts.get(name).map(|ctx| (name.to_string(), ctx.clone())));
        match named {
            Some((name, context)) => {
                let frame = Frame {
                    kind: FrameKind::Named(context),
                    function: Some(name),
                    handler: None,
                    ..self.frame()
                };
                self.with_frame(frame, |this| walk::walk_variable_declarator(this, declarator));
            }
            None => walk::walk_variable_declarator(self, declarator),
        }
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        let Some(name) = func.id.as_ref().map(|id| id.name.to_string()) else {
            walk::walk_function(self, func, flags);
            return;
        };
        if func.body.is_some() && !crate::syntax::is_component_name(&name) {
            self.function_decls.entry(name.clone()).or_insert_with(|| span_of(func));
        }
        match self.named_contexts.get(&name).cloned() {
            Some(context) => {
                let frame = Frame {
                    kind: FrameKind::Named(context),
                    function: Some(name),
                    handler: None,
                    ..self.frame()
                };
                self.with_frame(frame, |this| walk::walk_function(this, func, flags));
            }
            None => walk::walk_function(self, func, flags),
        }
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        let span = span_of(ident);
        let name = ident.name.as_str();
        if let Some(binding) = self.binding_with_setter(name, span) {
            self.setter_escapes[binding] += 1;
        }
        if self.named_contexts.contains_key(name) {
            self.function_refs.entry(name.to_string()).or_default().push(span);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULING PURITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Decides whether code does nothing but schedule timers and call setters.
/// Called setters are collected along the way.
struct Purity<'f, 'b, 'a> {
    functions: &'f HashMap<String, FunctionParts<'b, 'a>>,
    setters: &'f BTreeSet<String>,
    local: HashMap<String, bool>,
    visiting: Vec<String>,
}

impl<'f, 'b, 'a> Purity<'f, 'b, 'a> {
    fn new(functions: &'f HashMap<String, FunctionParts<'b, 'a>>, setters: &'f BTreeSet<String>) -> Self {
        Purity {
            functions,
            setters,
            local: HashMap::new(),
            visiting: Vec::new(),
        }
    }

    fn callback(&mut self, expr: &Expression, called: &mut BTreeSet<String>) -> bool {
        match strip_parens(expr) {
            Expression::Identifier(ident) => self.named(&ident.name, called),
            other => match FunctionParts::of(other) {
                Some(parts) => self.statements(parts.statements(), called),
                None => false,
            },
        }
    }

    fn named(&mut self, name: &str, called: &mut BTreeSet<String>) -> bool {
        if self.visiting.iter().any(|n| n == name) {
            return true;
        }
        if let Some(result) = self.local.get(name) {
            return *result;
        }
        let functions = self.functions;
        let Some(parts) = functions.get(name) else { return false };
        let statements = parts.statements();
        self.visiting.push(name.to_string());
        let result = self.statements(statements, called);
        self.visiting.pop();
        result
    }

    fn statements(&mut self, statements: &[Statement], called: &mut BTreeSet<String>) -> bool {
        // Hoist local helper functions first.
        for stmt in statements {
            match stmt {
                Statement::FunctionDeclaration(func) => {
                    if let Some(id) = &func.id {
                        let name = id.name.to_string();
                        self.visiting.push(name.clone());
                        let parts = FunctionParts::of_function(func);
                        let result = self.statements(parts.statements(), called);
                        self.visiting.pop();
                        self.local.insert(name, result);
                    }
                }
                Statement::VariableDeclaration(decl) => {
                    for declarator in &decl.declarations {
                        let (Some(name), Some(init)) = (binding_name(&declarator.id), declarator.init.as_ref()) else {
                            continue;
                        };
                        if let Some(parts) = FunctionParts::of(init) {
                            self.visiting.push(name.to_string());
                            let result = self.statements(parts.statements(), called);
                            self.visiting.pop();
                            self.local.insert(name.to_string(), result);
                        }
                    }
                }
                _ => {}
            }
        }
        statements.iter().all(|stmt| self.statement(stmt, called))
    }

    fn statement(&mut self, stmt: &Statement, called: &mut BTreeSet<String>) -> bool {
        match stmt {
            Statement::ExpressionStatement(expr) => self.effectful(&expr.expression, called),
            Statement::VariableDeclaration(decl) => decl.declarations.iter().all(|declarator| match &declarator.init {
                None => true,
                Some(init) if FunctionParts::of(init).is_some() => true,
                Some(init) => self.value(init, called),
            }),
            Statement::FunctionDeclaration(_) | Statement::EmptyStatement(_) => true,
            Statement::ReturnStatement(ret) => match &ret.argument {
                None => true,
                Some(arg) => match FunctionParts::of(arg) {
                    Some(cleanup) => self.statements(cleanup.statements(), called),
                    None => is_pure(arg),
                },
            },
            Statement::IfStatement(if_stmt) => {
                is_pure(&if_stmt.test)
                    && self.statement(&if_stmt.consequent, called)
                    && if_stmt
                        .alternate
                        .as_ref()
                        .map_or(true, |alt| self.statement(alt, called))
            }
            Statement::BlockStatement(block) => self.statements(&block.body, called),
            _ => false,
        }
    }

    /// An expression evaluated for its effect.
    fn effectful(&mut self, expr: &Expression, called: &mut BTreeSet<String>) -> bool {
        match strip_parens(expr) {
            Expression::CallExpression(call) => {
                if let Expression::Identifier(callee) = strip_parens(&call.callee) {
                    if self.setters.contains(callee.name.as_str()) {
                        called.insert(callee.name.to_string());
                        return true;
                    }
                }
                if timer_kind(call).is_some() {
                    return match argument_expression(call, 0) {
                        Some(callback) => self.callback(callback, called),
                        None => false,
                    };
                }
                if is_timer_cancel(call) {
                    return true;
                }
                match strip_parens(&call.callee) {
                    Expression::Identifier(callee) if call.arguments.iter().all(|a| a.as_expression().is_some_and(is_pure)) => {
                        self.named(&callee.name, called)
                    }
                    _ => false,
                }
            }
            Expression::AssignmentExpression(assign) => self.value(&assign.right, called),
            Expression::UpdateExpression(_) => true,
            other => is_pure(other),
        }
    }

    /// A value that may itself be a timer handle.
    fn value(&mut self, expr: &Expression, called: &mut BTreeSet<String>) -> bool {
        match strip_parens(expr) {
            Expression::CallExpression(call) if timer_kind(call).is_some() => self.effectful(expr, called),
            other => is_pure(other),
        }
    }
}

/// No calls beyond `Math.*` and clock reads, no writes.
pub fn is_pure(expr: &Expression) -> bool {
    let mut scan = PureScan { pure: true };
    scan.visit_expression(expr);
    scan.pure
}

struct PureScan {
    pure: bool,
}

impl<'a> Visit<'a> for PureScan {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let allowed = is_wall_clock_read(call)
            || callee_path(call).is_some_and(|path| path.starts_with("Math."));
        if !allowed {
            self.pure = false;
            return;
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_assignment_expression(&mut self, _: &AssignmentExpression<'a>) {
        self.pure = false;
    }

    fn visit_update_expression(&mut self, _: &UpdateExpression<'a>) {
        self.pure = false;
    }

    fn visit_new_expression(&mut self, _: &NewExpression<'a>) {
        self.pure = false;
    }

    fn visit_await_expression(&mut self, _: &AwaitExpression<'a>) {
        self.pure = false;
    }

    // Function values are not run by being written down.
    fn visit_arrow_function_expression(&mut self, _: &ArrowFunctionExpression<'a>) {}

    fn visit_function(&mut self, _: &Function<'a>, _: ScopeFlags) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Dialect;
    use crate::parse::parse_artifact;
    use crate::recurrence::Update;
    use oxc_allocator::Allocator;

    impl BindingMap {
        fn get(&self, name: &str) -> Option<&StateBinding> {
            self.bindings.iter().find(|b| b.name == name)
        }

        fn function(&self, name: &str) -> Option<&HandlerFunction> {
            self.functions.iter().find(|f| f.name == name)
        }
    }

    fn resolve(code: &str) -> BindingMap {
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, code, Dialect::Tsx).unwrap();
        resolve_bindings(&tree)
    }

    const PARTICLES: &str = r#"
import React, { useState, useEffect } from 'react';

function makeParticles() {
  const out = [];
  for (let i = 0; i < 50; i++) {
    out.push({ id: i, x: Math.random() * 800, y: Math.random() * 600, vx: 1, vy: 2 });
  }
  return out;
}

export default function Field() {
  const [particles, setParticles] = useState(() => makeParticles());
  useEffect(() => {
    const id = setInterval(() => {
      setParticles(prev => prev.map(p => ({ ...p, x: p.x + p.vx, y: p.y + p.vy })));
    }, 16);
    return () => clearInterval(id);
  }, []);
  return (
    <svg>
      {particles.map(p => <circle key={p.id} cx={p.x} cy={p.y} r={p.size} fill={p.color} />)}
    </svg>
  );
}
"#;

    #[test]
    fn generator_shape_and_missing_properties() {
        let map = resolve(PARTICLES);
        let binding = map.get("particles").unwrap();
        assert!(binding.lazy_initializer);
        let Shape::Collection { length, element } = &binding.shape else {
            panic!("expected a collection, got {:?}", binding.shape);
        };
        assert_eq!(*length, Some(50));
        let names: Vec<&str> = element.property_names().unwrap();
        assert_eq!(names, vec!["id", "x", "y", "vx", "vy"]);
        assert!(binding.shape_incomplete);
        assert_eq!(binding.missing_properties, vec!["color".to_string(), "size".to_string()]);
        assert!(binding.usage_sites.iter().all(|u| u.via_element));
    }

    #[test]
    fn interval_mutation_inside_scheduling_effect() {
        let map = resolve(PARTICLES);
        let binding = map.get("particles").unwrap();
        assert!(binding.rewritable);
        assert_eq!(binding.mutation_sites.len(), 1);
        let site = &binding.mutation_sites[0];
        assert!(matches!(
            site.context,
            MutationContext::Interval { period_ms: Some(ms), .. } if ms == 16.0
        ));
        assert!(site.statement.is_some());
        assert!(matches!(site.recurrence, Recurrence::Elements { .. }));

        assert_eq!(map.effects.len(), 1);
        let effect = &map.effects[0];
        assert!(effect.scheduling_only);
        assert_eq!(Some(effect.statement), site.effect);
        assert!(effect.setters.contains("setParticles"));
    }

    #[test]
    fn click_handlers_and_named_functions() {
        let code = r#"
const slides = ['a', 'b', 'c', 'd'];
export function Carousel() {
  const [index, setIndex] = useState(0);
  const next = () => setIndex(i => (i + 1) % slides.length);
  return (
    <div>
      <p>{slides[index]}</p>
      <button onClick={next}>Next</button>
      <button onClick={() => { console.log('x'); setIndex(0); }}>Reset</button>
    </div>
  );
}
"#;
        let map = resolve(code);
        let binding = map.get("index").unwrap();
        assert_eq!(binding.mutation_sites.len(), 2);
        let first = &binding.mutation_sites[0];
        assert_eq!(
            first.context,
            MutationContext::EventHandler {
                attribute: "onClick".into()
            }
        );
        assert_eq!(first.function.as_deref(), Some("next"));
        match &first.recurrence {
            Recurrence::Scalar { update: Update::Modular { .. } } => {}
            other => panic!("unexpected {:?}", other),
        }

        let next = map.function("next").unwrap();
        assert!(next.mutation_only);
        assert_eq!(next.references.len(), 1);

        assert_eq!(map.handlers.len(), 2);
        assert!(map.handlers[0].mutation_only);
        assert_eq!(map.handlers[0].function.as_deref(), Some("next"));
        assert!(!map.handlers[1].mutation_only, "console.log keeps the handler");
    }

    #[test]
    fn escaping_setter_blocks_rewrite() {
        let code = r#"
function Panel() {
  const [open, setOpen] = useState(false);
  return <Child onToggle={setOpen} open={open} />;
}
"#;
        let map = resolve(code);
        let binding = map.get("open").unwrap();
        assert!(!binding.rewritable);
        assert!(binding.blocker.is_some());
        assert_eq!(binding.shape, Shape::Scalar { kind: ValueKind::Boolean });
    }

    #[test]
    fn array_builders_and_literals() {
        let code = r#"
function Stars() {
  const [stars] = useState([...Array(12)].map((_, i) => ({ x: i * 10, twinkle: 0 })));
  const [dots] = useState(Array.from({ length: 5 }, () => ({ r: 2 })));
  const [ball, setBall] = useState({ x: 0, y: 0 });
  const [label] = useState(config.label);
  const [trail] = useState([]);
  return <g>{ball.x}{ball.z}</g>;
}
"#;
        let map = resolve(code);
        let stars = map.get("stars").unwrap();
        assert!(matches!(&stars.shape, Shape::Collection { length: Some(12), .. }));
        let dots = map.get("dots").unwrap();
        assert!(matches!(&dots.shape, Shape::Collection { length: Some(5), .. }));
        let ball = map.get("ball").unwrap();
        assert_eq!(ball.missing_properties, vec!["z".to_string()]);
        let label = map.get("label").unwrap();
        assert!(label.shape.is_opaque());
        assert_eq!(label.confidence, Confidence::Low);
        assert_eq!(stars.confidence, Confidence::High);
        assert_eq!(map.get("trail").unwrap().confidence, Confidence::High);
    }

    #[test]
    fn named_initializer_functions_are_lazy() {
        let code = r#"
function makeStars() {
  const out = [];
  for (let i = 0; i < 40; i++) {
    out.push({ x: Math.random() * 400, y: 0 });
  }
  return out;
}
function Sky() {
  const [stars, setStars] = useState(makeStars);
  const [seed] = useState(initialSeed);
  return <g>{stars.map(s => s.x)}{seed}</g>;
}
"#;
        let map = resolve(code);
        let stars = map.get("stars").unwrap();
        assert!(stars.lazy_initializer);
        assert!(matches!(&stars.shape, Shape::Collection { length: Some(40), .. }));
        assert_eq!(stars.confidence, Confidence::High);

        let seed = map.get("seed").unwrap();
        assert!(!seed.lazy_initializer);
        assert!(seed.shape.is_opaque());
        assert_eq!(seed.confidence, Confidence::Low);
    }

    #[test]
    fn animation_frame_loop_declared_in_effect() {
        let code = r#"
function Spinner() {
  const [angle, setAngle] = useState(0);
  useEffect(() => {
    let raf;
    const loop = () => {
      setAngle(a => (a + 2) % 360);
      raf = requestAnimationFrame(loop);
    };
    raf = requestAnimationFrame(loop);
    return () => cancelAnimationFrame(raf);
  }, []);
  return <div style={{ transform: `rotate(${angle}deg)` }} />;
}
"#;
        let map = resolve(code);
        let binding = map.get("angle").unwrap();
        assert_eq!(binding.mutation_sites[0].context, MutationContext::AnimationFrame);
        assert!(map.effects[0].scheduling_only);
    }
}
