//! Small pattern helpers over the oxc AST shared by every pass.

use oxc_ast::ast::*;
use oxc_span::GetSpan;
use std::collections::HashMap;

use crate::diagnostics::SourceSpan;

/// Peel parentheses and TS-only wrappers.
pub fn strip_parens<'b, 'a>(expr: &'b Expression<'a>) -> &'b Expression<'a> {
    match expr {
        Expression::ParenthesizedExpression(paren) => strip_parens(&paren.expression),
        Expression::TSAsExpression(cast) => strip_parens(&cast.expression),
        Expression::TSSatisfiesExpression(cast) => strip_parens(&cast.expression),
        Expression::TSNonNullExpression(cast) => strip_parens(&cast.expression),
        _ => expr,
    }
}

/// Dotted path of an identifier or a static member chain, e.g. `window.setInterval`.
pub fn dotted_path(expr: &Expression) -> Option<String> {
    match strip_parens(expr) {
        Expression::Identifier(ident) => Some(ident.name.to_string()),
        Expression::StaticMemberExpression(member) => {
            let object = dotted_path(&member.object)?;
            Some(format!("{}.{}", object, member.property.name))
        }
        _ => None,
    }
}

/// Callee path with a `window.`/`globalThis.` prefix removed.
pub fn callee_path(call: &CallExpression) -> Option<String> {
    let path = dotted_path(&call.callee)?;
    let trimmed = path
        .strip_prefix("window.")
        .or_else(|| path.strip_prefix("globalThis."))
        .map(str::to_string)
        .unwrap_or(path);
    Some(trimmed)
}

/// True for `hook(...)` and `React.hook(...)`.
pub fn is_hook_call(call: &CallExpression, hook: &str) -> bool {
    match callee_path(call) {
        Some(path) => path == hook || path.strip_prefix("React.") == Some(hook),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Interval,
    Timeout,
    AnimationFrame,
}

pub fn timer_kind(call: &CallExpression) -> Option<TimerKind> {
    match callee_path(call)?.as_str() {
        "setInterval" => Some(TimerKind::Interval),
        "setTimeout" => Some(TimerKind::Timeout),
        "requestAnimationFrame" => Some(TimerKind::AnimationFrame),
        _ => None,
    }
}

pub fn is_timer_cancel(call: &CallExpression) -> bool {
    matches!(
        callee_path(call).as_deref(),
        Some("clearInterval" | "clearTimeout" | "cancelAnimationFrame")
    )
}

pub fn is_wall_clock_read(call: &CallExpression) -> bool {
    matches!(callee_path(call).as_deref(), Some("Date.now" | "performance.now"))
}

pub fn is_math_random(call: &CallExpression) -> bool {
    call.arguments.is_empty() && callee_path(call).as_deref() == Some("Math.random")
}

pub fn argument_expression<'b, 'a>(
    call: &'b CallExpression<'a>,
    index: usize,
) -> Option<&'b Expression<'a>> {
    call.arguments.get(index).and_then(|arg| arg.as_expression())
}

/// Numeric literal value, including a leading minus sign.
pub fn numeric_value(expr: &Expression) -> Option<f64> {
    match strip_parens(expr) {
        Expression::NumericLiteral(lit) => Some(lit.value),
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::UnaryNegation => {
            numeric_value(&unary.argument).map(|v| -v)
        }
        _ => None,
    }
}

pub fn static_key_name(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(ident) => Some(ident.name.to_string()),
        PropertyKey::StringLiteral(lit) => Some(lit.value.to_string()),
        _ => None,
    }
}

pub fn binding_name<'b>(pattern: &'b BindingPattern) -> Option<&'b str> {
    match pattern {
        BindingPattern::BindingIdentifier(ident) => Some(ident.name.as_str()),
        _ => None,
    }
}

pub fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

pub fn span_of<T: GetSpan>(node: &T) -> SourceSpan {
    SourceSpan::from(node.span())
}

// ═══════════════════════════════════════════════════════════════════════════════
// FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Uniform view over arrow functions and function expressions.
pub struct FunctionParts<'b, 'a> {
    pub params: &'b FormalParameters<'a>,
    pub body: Option<&'b FunctionBody<'a>>,
    pub expression_body: bool,
    pub span: SourceSpan,
}

impl<'b, 'a> FunctionParts<'b, 'a> {
    pub fn of(expr: &'b Expression<'a>) -> Option<Self> {
        match strip_parens(expr) {
            Expression::ArrowFunctionExpression(arrow) => Some(FunctionParts {
                params: &*arrow.params,
                body: Some(&*arrow.body),
                expression_body: arrow.expression,
                span: span_of(&**arrow),
            }),
            Expression::FunctionExpression(func) => Some(Self::of_function(func)),
            _ => None,
        }
    }

    pub fn of_function(func: &'b Function<'a>) -> Self {
        FunctionParts {
            params: &*func.params,
            body: func.body.as_deref(),
            expression_body: false,
            span: span_of(func),
        }
    }

    pub fn param_name(&self, index: usize) -> Option<&'b str> {
        self.params
            .items
            .get(index)
            .and_then(|param| binding_name(&param.pattern))
    }

    pub fn param_count(&self) -> usize {
        self.params.items.len()
    }

    pub fn statements(&self) -> &'b [Statement<'a>] {
        match self.body {
            Some(body) => &body.statements,
            None => &[],
        }
    }

    /// The expression body, or the argument of a block's trailing `return`.
    pub fn returned_expression(&self) -> Option<&'b Expression<'a>> {
        let statements = self.statements();
        if self.expression_body {
            if let Some(Statement::ExpressionStatement(stmt)) = statements.first() {
                return Some(&stmt.expression);
            }
            return None;
        }
        match statements.last() {
            Some(Statement::ReturnStatement(ret)) => ret.argument.as_ref(),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A top-level function that renders markup.
#[derive(Debug, Clone)]
pub struct ComponentBody {
    /// Span of the `{ ... }` block; `None` for expression-bodied arrows.
    pub body: Option<SourceSpan>,
    pub span: SourceSpan,
    /// Opening-element spans of the markup roots it returns.
    pub roots: Vec<SourceSpan>,
}

impl ComponentBody {
    pub fn contains(&self, span: SourceSpan) -> bool {
        self.span.contains(span)
    }
}

pub fn collect_components(program: &Program) -> Vec<ComponentBody> {
    let mut components = Vec::new();
    for stmt in &program.body {
        match stmt {
            Statement::FunctionDeclaration(func) => push_function(&mut components, func, false),
            Statement::VariableDeclaration(decl) => push_declarators(&mut components, decl),
            Statement::ExportDefaultDeclaration(export) => match &export.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                    push_function(&mut components, func, true)
                }
                ExportDefaultDeclarationKind::ArrowFunctionExpression(arrow) => {
                    let parts = FunctionParts {
                        params: &*arrow.params,
                        body: Some(&*arrow.body),
                        expression_body: arrow.expression,
                        span: span_of(&**arrow),
                    };
                    push_parts(&mut components, &parts);
                }
                _ => {}
            },
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::FunctionDeclaration(func)) => {
                    push_function(&mut components, func, false)
                }
                Some(Declaration::VariableDeclaration(decl)) => {
                    push_declarators(&mut components, decl)
                }
                _ => {}
            },
            _ => {}
        }
    }
    components
}

fn push_function(components: &mut Vec<ComponentBody>, func: &Function, default_export: bool) {
    let named = func.id.as_ref().is_some_and(|id| is_component_name(&id.name));
    if named || default_export {
        push_parts(components, &FunctionParts::of_function(func));
    }
}

fn push_declarators(components: &mut Vec<ComponentBody>, decl: &VariableDeclaration) {
    for declarator in &decl.declarations {
        let Some(name) = binding_name(&declarator.id) else { continue };
        if !is_component_name(name) {
            continue;
        }
        if let Some(parts) = declarator.init.as_ref().and_then(FunctionParts::of) {
            push_parts(components, &parts);
        }
    }
}

fn push_parts(components: &mut Vec<ComponentBody>, parts: &FunctionParts) {
    let mut roots = Vec::new();
    if parts.expression_body {
        if let Some(expr) = parts.returned_expression() {
            push_root(&mut roots, expr);
        }
    } else {
        for stmt in parts.statements() {
            if let Statement::ReturnStatement(ret) = stmt {
                if let Some(arg) = &ret.argument {
                    push_root(&mut roots, arg);
                }
            }
        }
    }
    components.push(ComponentBody {
        body: if parts.expression_body {
            None
        } else {
            parts.body.map(span_of)
        },
        span: parts.span,
        roots,
    });
}

fn push_root(roots: &mut Vec<SourceSpan>, expr: &Expression) {
    match strip_parens(expr) {
        Expression::JSXElement(element) => roots.push(span_of(&*element.opening_element)),
        Expression::JSXFragment(fragment) => {
            for child in &fragment.children {
                if let JSXChild::Element(element) = child {
                    roots.push(span_of(&*element.opening_element));
                    break;
                }
            }
        }
        _ => {}
    }
}

/// Named functions declared at the top level or directly inside another
/// named function, keyed by name. Later declarations shadow earlier ones.
pub fn collect_local_functions<'b, 'a>(
    program: &'b Program<'a>,
) -> HashMap<String, FunctionParts<'b, 'a>> {
    let mut functions = HashMap::new();
    collect_functions_in(&program.body, &mut functions, 0);
    functions
}

fn collect_functions_in<'b, 'a>(
    statements: &'b [Statement<'a>],
    functions: &mut HashMap<String, FunctionParts<'b, 'a>>,
    depth: usize,
) {
    if depth > 2 {
        return;
    }
    for stmt in statements {
        match stmt {
            Statement::FunctionDeclaration(func) => add_function(func, functions, depth),
            Statement::VariableDeclaration(decl) => add_declarators(decl, functions, depth),
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::FunctionDeclaration(func)) => add_function(func, functions, depth),
                Some(Declaration::VariableDeclaration(decl)) => {
                    add_declarators(decl, functions, depth)
                }
                _ => {}
            },
            Statement::ExportDefaultDeclaration(export) => {
                if let ExportDefaultDeclarationKind::FunctionDeclaration(func) = &export.declaration {
                    add_function(func, functions, depth);
                }
            }
            _ => {}
        }
    }
}

fn add_function<'b, 'a>(
    func: &'b Function<'a>,
    functions: &mut HashMap<String, FunctionParts<'b, 'a>>,
    depth: usize,
) {
    let parts = FunctionParts::of_function(func);
    collect_functions_in(parts.statements(), functions, depth + 1);
    if let Some(id) = &func.id {
        functions.insert(id.name.to_string(), parts);
    }
}

fn add_declarators<'b, 'a>(
    decl: &'b VariableDeclaration<'a>,
    functions: &mut HashMap<String, FunctionParts<'b, 'a>>,
    depth: usize,
) {
    for declarator in &decl.declarations {
        let (Some(name), Some(init)) = (binding_name(&declarator.id), declarator.init.as_ref()) else {
            continue;
        };
        if let Some(parts) = FunctionParts::of(init) {
            collect_functions_in(parts.statements(), functions, depth + 1);
            functions.insert(name.to_string(), parts);
        }
    }
}

pub fn attribute_name(attr: &JSXAttribute) -> Option<String> {
    match &attr.name {
        JSXAttributeName::Identifier(ident) => Some(ident.name.to_string()),
        JSXAttributeName::NamespacedName(ns) => {
            Some(format!("{}:{}", ns.namespace.name, ns.name.name))
        }
    }
}

/// Tag name of an element when it is a plain lowercase intrinsic.
pub fn intrinsic_tag(opening: &JSXOpeningElement) -> Option<String> {
    match &opening.name {
        JSXElementName::Identifier(ident) => Some(ident.name.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Dialect;
    use crate::parse::parse_artifact;
    use oxc_allocator::Allocator;

    #[test]
    fn finds_declared_and_exported_components() {
        let code = r#"
const helper = () => 1;
function Card() { return <section>card</section>; }
export const Badge = () => <span>b</span>;
export default function App() {
  return (
    <main>
      <Card />
    </main>
  );
}
"#;
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, code, Dialect::Jsx).unwrap();
        let components = collect_components(&tree.program);
        let roots: Vec<&str> = components
            .iter()
            .map(|c| c.roots[0].slice(code).split('>').next().unwrap_or_default())
            .collect();
        assert_eq!(roots, vec!["<section", "<span", "<main"]);

        let app = &components[2];
        assert!(app.body.is_some());
        assert_eq!(app.roots.len(), 1);
        assert!(app.roots[0].slice(code).starts_with("<main"));
        assert!(components[1].body.is_none());
    }

    #[test]
    fn dotted_paths_strip_window_prefix() {
        let code = "window.setInterval(tick, 16); React.useState(0); Math.random();";
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, code, Dialect::JavaScript).unwrap();
        let mut paths = Vec::new();
        for stmt in &tree.program.body {
            if let Statement::ExpressionStatement(es) = stmt {
                if let Expression::CallExpression(call) = &es.expression {
                    paths.push(callee_path(call).unwrap());
                }
            }
        }
        assert_eq!(paths, vec!["setInterval", "React.useState", "Math.random"]);
    }
}
