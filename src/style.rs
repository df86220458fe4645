//! Style normalization.
//!
//! Static utility classes on intrinsic elements become explicit inline style
//! declarations, and HTML-style `style="a: b"` strings become style objects.
//! Work happens in three steps: [`collect_elements`] reads what the markup
//! says, [`normalize`] turns it into one [`StylePlan`] per element (which the
//! enhancement pass may extend), and [`emit`] writes the plans back as edits.
//!
//! Authored declarations always win: resolved classes are merged in front of
//! an existing style object, never over it.

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use std::collections::BTreeSet;

use crate::diagnostics::{
    Finding, FindingKind, Position, Severity, SourceSpan, FC_DYNAMIC_CLASS, FC_EDIT_CONFLICT,
    FC_UNRESOLVED_UTILITY,
};
use crate::edits::EditBuffer;
use crate::emit::{print_members, JsExpr, ObjectMember};
use crate::parse::SyntaxTree;
use crate::syntax::{attribute_name, collect_components, intrinsic_tag, span_of, static_key_name};
use crate::tailwind::resolve_utility;

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum ClassAttr {
    None,
    Static {
        attribute: SourceSpan,
        /// The string literal, quotes included.
        value: SourceSpan,
        tokens: Vec<String>,
    },
    Dynamic {
        attribute: SourceSpan,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StyleAttr {
    None,
    /// `style={{ ... }}`
    Object {
        object: SourceSpan,
        properties: Vec<String>,
        /// Properties whose value is a plain string literal.
        literals: Vec<(String, String)>,
        spread: bool,
    },
    /// `style="color: red"`
    Text {
        attribute: SourceSpan,
        declarations: Vec<(String, String)>,
    },
    /// `style={expr}`
    Dynamic { expression: SourceSpan },
}

/// Styling facts about one intrinsic element's opening tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementStyle {
    pub tag: String,
    pub span: SourceSpan,
    pub position: Position,
    /// Offset right after the tag name, where new attributes go.
    pub name_end: u32,
    /// The tag spreads props (`{...props}`), so attribute order matters.
    pub spreads_props: bool,
    /// Outermost element a component returns.
    pub root: bool,
    pub class: ClassAttr,
    pub style: StyleAttr,
}

impl ElementStyle {
    pub fn authored_properties(&self) -> Vec<&str> {
        match &self.style {
            StyleAttr::Object { properties, .. } => properties.iter().map(String::as_str).collect(),
            StyleAttr::Text { declarations, .. } => declarations.iter().map(|(p, _)| p.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Authored value of `property` when it is a string literal.
    pub fn authored_literal(&self, property: &str) -> Option<&str> {
        let declarations = match &self.style {
            StyleAttr::Object { literals, .. } => literals,
            StyleAttr::Text { declarations, .. } => declarations,
            _ => return None,
        };
        declarations
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }

    /// A spread or non-literal style may set anything.
    pub fn style_is_open(&self) -> bool {
        matches!(
            self.style,
            StyleAttr::Object { spread: true, .. } | StyleAttr::Dynamic { .. }
        )
    }
}

#[tracing::instrument(skip_all, target = "framecast")]
pub fn collect_elements(tree: &SyntaxTree) -> Vec<ElementStyle> {
    let roots: BTreeSet<SourceSpan> = collect_components(&tree.program)
        .into_iter()
        .flat_map(|c| c.roots)
        .collect();
    let mut collector = ElementCollector {
        tree,
        roots,
        elements: Vec::new(),
    };
    collector.visit_program(&tree.program);
    collector.elements
}

struct ElementCollector<'t, 'a> {
    tree: &'t SyntaxTree<'a>,
    roots: BTreeSet<SourceSpan>,
    elements: Vec<ElementStyle>,
}

impl<'t, 'a> Visit<'a> for ElementCollector<'t, 'a> {
    fn visit_jsx_opening_element(&mut self, opening: &JSXOpeningElement<'a>) {
        if let Some(tag) = intrinsic_tag(opening) {
            let span = span_of(opening);
            let mut element = ElementStyle {
                tag,
                span,
                position: self.tree.position(span.start),
                name_end: span_of(&opening.name).end,
                spreads_props: false,
                root: self.roots.contains(&span),
                class: ClassAttr::None,
                style: StyleAttr::None,
            };
            for item in &opening.attributes {
                match item {
                    JSXAttributeItem::Attribute(attr) => match attribute_name(attr).as_deref() {
                        Some("className") | Some("class") => element.class = class_attr(attr),
                        Some("style") => element.style = style_attr(attr),
                        _ => {}
                    },
                    JSXAttributeItem::SpreadAttribute(_) => element.spreads_props = true,
                }
            }
            self.elements.push(element);
        }
        walk::walk_jsx_opening_element(self, opening);
    }
}

fn class_attr(attr: &JSXAttribute) -> ClassAttr {
    let attribute = span_of(attr);
    let literal = match &attr.value {
        Some(JSXAttributeValue::StringLiteral(lit)) => Some(&**lit),
        Some(JSXAttributeValue::ExpressionContainer(container)) => match container.expression.as_expression() {
            Some(Expression::StringLiteral(lit)) => Some(&**lit),
            _ => None,
        },
        _ => None,
    };
    match literal {
        Some(lit) => ClassAttr::Static {
            attribute,
            value: span_of(lit),
            tokens: lit.value.split_whitespace().map(str::to_string).collect(),
        },
        None => ClassAttr::Dynamic { attribute },
    }
}

fn style_attr(attr: &JSXAttribute) -> StyleAttr {
    match &attr.value {
        Some(JSXAttributeValue::StringLiteral(lit)) => StyleAttr::Text {
            attribute: span_of(attr),
            declarations: parse_style_text(&lit.value),
        },
        Some(JSXAttributeValue::ExpressionContainer(container)) => match container.expression.as_expression() {
            Some(Expression::ObjectExpression(object)) => {
                let mut properties = Vec::new();
                let mut literals = Vec::new();
                let mut spread = false;
                for property in &object.properties {
                    match property {
                        ObjectPropertyKind::ObjectProperty(prop) => match static_key_name(&prop.key) {
                            Some(name) => {
                                if let Expression::StringLiteral(lit) = &prop.value {
                                    literals.push((name.clone(), lit.value.to_string()));
                                }
                                properties.push(name);
                            }
                            None => spread = true,
                        },
                        ObjectPropertyKind::SpreadProperty(_) => spread = true,
                    }
                }
                StyleAttr::Object {
                    object: span_of(&**object),
                    properties,
                    literals,
                    spread,
                }
            }
            Some(expr) => StyleAttr::Dynamic {
                expression: span_of(expr),
            },
            None => StyleAttr::None,
        },
        _ => StyleAttr::None,
    }
}

/// `"background-color: red; font-size: 12px"` → `[("backgroundColor", "red"), ("fontSize", "12px")]`
pub fn parse_style_text(text: &str) -> Vec<(String, String)> {
    text.split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let (property, value) = (property.trim(), value.trim());
            if property.is_empty() || value.is_empty() {
                return None;
            }
            Some((css_to_camel(property), value.to_string()))
        })
        .collect()
}

fn css_to_camel(property: &str) -> String {
    if property.starts_with("--") {
        return property.to_string();
    }
    let lowered = property.to_ascii_lowercase();
    match lowered.strip_prefix('-') {
        // React keeps `ms` lowercase; other vendor prefixes are capitalized.
        Some(rest) if rest.starts_with("ms-") => camel_tail(rest),
        Some(rest) => {
            let camel = camel_tail(rest);
            let mut chars = camel.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first.to_ascii_uppercase(), chars.as_str()),
                None => camel,
            }
        }
        None => camel_tail(&lowered),
    }
}

fn camel_tail(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLANS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePlan {
    /// Declarations resolved from utility classes, in class order.
    pub resolved: Vec<(String, JsExpr)>,
    pub kept_classes: Vec<String>,
    pub unresolved: Vec<String>,
    /// Declarations added by enhancement rules.
    pub additions: Vec<(String, JsExpr)>,
}

#[derive(Debug, Clone, Default)]
pub struct StylePlans {
    pub elements: Vec<ElementStyle>,
    pub plans: Vec<StylePlan>,
    pub findings: Vec<Finding>,
}

impl StylePlans {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the element will carry `property` once the plan is emitted.
    pub fn has_property(&self, idx: usize, property: &str) -> bool {
        let (Some(element), Some(plan)) = (self.elements.get(idx), self.plans.get(idx)) else {
            return false;
        };
        element.authored_properties().contains(&property)
            || plan.resolved.iter().any(|(p, _)| p == property)
            || plan.additions.iter().any(|(p, _)| p == property)
    }

    /// String value `property` will have once emitted; authored values win.
    pub fn string_value(&self, idx: usize, property: &str) -> Option<String> {
        if let Some(authored) = self.elements.get(idx)?.authored_literal(property) {
            return Some(authored.to_string());
        }
        let plan = self.plans.get(idx)?;
        plan.resolved
            .iter()
            .chain(plan.additions.iter())
            .find(|(p, _)| p == property)
            .and_then(|(_, v)| match v {
                JsExpr::Str(s) => Some(s.clone()),
                _ => None,
            })
    }

    /// Adds a declaration unless the element already has the property.
    pub fn add(&mut self, idx: usize, property: &str, value: JsExpr) -> bool {
        if self.has_property(idx, property) || self.elements.get(idx).map_or(true, |e| e.style_is_open()) {
            return false;
        }
        self.plans[idx].additions.push((property.to_string(), value));
        true
    }
}

/// Resolve every element's classes against the utility table.
pub fn normalize(elements: &[ElementStyle]) -> StylePlans {
    let mut plans = Vec::with_capacity(elements.len());
    let mut findings = Vec::new();
    for element in elements {
        let mut plan = StylePlan::default();
        match &element.class {
            ClassAttr::Static { tokens, .. } => {
                for token in tokens {
                    match resolve_utility(token) {
                        Some(declarations) => {
                            for (property, value) in declarations {
                                // A later class overrides an earlier one.
                                plan.resolved.retain(|(p, _)| p != property);
                                plan.resolved.push((property.to_string(), value));
                            }
                        }
                        None => {
                            plan.kept_classes.push(token.clone());
                            plan.unresolved.push(token.clone());
                        }
                    }
                }
                if !plan.unresolved.is_empty() {
                    findings.push(
                        Finding::new(
                            FC_UNRESOLVED_UTILITY,
                            FindingKind::Advisory,
                            Severity::Info,
                            format!("<{}> keeps unrecognized classes: {}", element.tag, plan.unresolved.join(" ")),
                        )
                        .at(element.position)
                        .about(element.tag.clone()),
                    );
                }
            }
            ClassAttr::Dynamic { .. } => findings.push(
                Finding::new(
                    FC_DYNAMIC_CLASS,
                    FindingKind::Advisory,
                    Severity::Info,
                    format!("<{}> has a computed className that was left as authored", element.tag),
                )
                .at(element.position)
                .about(element.tag.clone()),
            ),
            ClassAttr::None => {}
        }
        plans.push(plan);
    }
    StylePlans {
        elements: elements.to_vec(),
        plans,
        findings,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Records the edits that realize `plans`. Returns findings for edits that
/// collided with earlier rewrites.
pub fn emit(plans: &StylePlans, source: &str, edits: &mut EditBuffer) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (element, plan) in plans.elements.iter().zip(&plans.plans) {
        if let Err(conflict) = emit_element(element, plan, source, edits) {
            tracing::warn!(target: "framecast", tag = %element.tag, %conflict, "style edit dropped");
            findings.push(
                Finding::new(
                    FC_EDIT_CONFLICT,
                    FindingKind::UnsafeTransform,
                    Severity::Warning,
                    format!("style for <{}> overlaps another rewrite and was left as authored", element.tag),
                )
                .at(element.position)
                .resolved(),
            );
        }
    }
    findings
}

fn emit_element(
    element: &ElementStyle,
    plan: &StylePlan,
    source: &str,
    edits: &mut EditBuffer,
) -> Result<(), crate::edits::EditConflict> {
    let mut declarations: Vec<(String, JsExpr)> = plan.resolved.clone();
    declarations.extend(plan.additions.iter().cloned());
    let converting = matches!(element.style, StyleAttr::Text { .. });
    if declarations.is_empty() && !converting {
        return Ok(());
    }

    match &element.style {
        StyleAttr::None => {
            let object = JsExpr::Object(properties(&declarations));
            // Beside the class it replaces, so spread props keep the precedence they had over it.
            let offset = match &element.class {
                ClassAttr::Static { attribute, .. } if element.spreads_props => attribute.end,
                _ => element.name_end,
            };
            edits.insert(offset, format!(" style={{{}}}", object.print()))?;
        }
        StyleAttr::Object { object, properties: authored, spread, .. } => {
            declarations.retain(|(p, _)| !authored.contains(p));
            if authored.is_empty() && !spread {
                edits.replace(*object, JsExpr::Object(properties(&declarations)).print())?;
            } else if !declarations.is_empty() {
                let after_brace = source.as_bytes().get(object.start as usize + 1);
                let gap = if after_brace.is_some_and(u8::is_ascii_whitespace) { "" } else { " " };
                let members = print_members(&properties(&declarations));
                edits.insert(object.start + 1, format!(" {},{}", members, gap))?;
            }
        }
        StyleAttr::Text { attribute, declarations: authored } => {
            for (property, value) in authored {
                declarations.retain(|(p, _)| p != property);
                declarations.push((property.clone(), JsExpr::str(value.clone())));
            }
            let object = JsExpr::Object(properties(&declarations));
            edits.replace(*attribute, format!("style={{{}}}", object.print()))?;
        }
        StyleAttr::Dynamic { expression } => {
            let mut members = properties(&declarations);
            members.push(ObjectMember::Spread(JsExpr::raw(edits.render(source, *expression))));
            edits.replace(*expression, JsExpr::Object(members).print())?;
        }
    }

    if let ClassAttr::Static { attribute, value, .. } = &element.class {
        if !plan.resolved.is_empty() {
            if plan.kept_classes.is_empty() {
                edits.remove(leading_space(source, *attribute))?;
            } else {
                edits.replace(*value, JsExpr::str(plan.kept_classes.join(" ")).print())?;
            }
        }
    }
    Ok(())
}

fn properties(declarations: &[(String, JsExpr)]) -> Vec<ObjectMember> {
    declarations
        .iter()
        .map(|(p, v)| ObjectMember::Property(p.clone(), v.clone()))
        .collect()
}

fn leading_space(source: &str, span: SourceSpan) -> SourceSpan {
    let bytes = source.as_bytes();
    let mut start = span.start as usize;
    while start > 0 && bytes[start - 1].is_ascii_whitespace() {
        start -= 1;
    }
    SourceSpan::new(start as u32, span.end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Dialect;
    use crate::parse::parse_artifact;
    use oxc_allocator::Allocator;

    fn normalize_source(code: &str) -> (String, StylePlans) {
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, code, Dialect::Tsx).unwrap();
        let plans = normalize(&collect_elements(&tree));
        let mut edits = EditBuffer::new();
        let conflicts = emit(&plans, code, &mut edits);
        assert!(conflicts.is_empty());
        (edits.apply(code), plans)
    }

    #[test]
    fn classes_become_inline_styles() {
        let (output, plans) = normalize_source(r#"const A = () => <div className="flex p-4 bg-blue-500">x</div>;"#);
        assert_eq!(
            output,
            r##"const A = () => <div style={{ display: "flex", padding: 16, backgroundColor: "#3b82f6" }}>x</div>;"##
        );
        assert!(plans.elements[0].root);
        assert!(plans.findings.is_empty());
    }

    #[test]
    fn unknown_classes_are_kept_and_reported() {
        let (output, plans) = normalize_source(r#"const A = () => <p className="hover:underline text-lg fancy">x</p>;"#);
        assert_eq!(
            output,
            r#"const A = () => <p style={{ fontSize: 18 }} className="hover:underline fancy">x</p>;"#
        );
        assert_eq!(plans.plans[0].unresolved, vec!["hover:underline", "fancy"]);
        assert_eq!(plans.findings[0].code, FC_UNRESOLVED_UTILITY);
    }

    #[test]
    fn authored_style_wins() {
        let (output, _) = normalize_source(
            r#"const A = () => <div className="p-2 text-red-500" style={{ color: 'white' }} />;"#,
        );
        assert_eq!(
            output,
            r#"const A = () => <div style={{ padding: 8, color: 'white' }} />;"#
        );
    }

    #[test]
    fn merged_members_keep_compact_objects_readable() {
        let (output, _) = normalize_source(r#"const A = () => <div className="p-2" style={{color:'white'}} />;"#);
        assert_eq!(output, r#"const A = () => <div style={{ padding: 8, color:'white'}} />;"#);
    }

    #[test]
    fn style_follows_class_past_spread_props() {
        let (output, plans) = normalize_source(r#"const A = (props) => <div {...props} className="p-2 flex">x</div>;"#);
        assert!(plans.elements[0].spreads_props);
        assert_eq!(
            output,
            r#"const A = (props) => <div {...props} style={{ padding: 8, display: "flex" }}>x</div>;"#
        );

        let (output, _) = normalize_source(r#"const B = (props) => <p {...props} className="fancy p-2">x</p>;"#);
        assert_eq!(
            output,
            r#"const B = (props) => <p {...props} className="fancy" style={{ padding: 8 }}>x</p>;"#
        );
    }

    #[test]
    fn style_strings_become_objects() {
        let (output, _) = normalize_source(r#"const A = () => <span style="font-size: 12px; -webkit-user-select: none">x</span>;"#);
        assert_eq!(
            output,
            r#"const A = () => <span style={{ fontSize: "12px", WebkitUserSelect: "none" }}>x</span>;"#
        );
    }

    #[test]
    fn computed_class_is_left_alone() {
        let code = r#"const A = ({ on }) => <div className={on ? 'a' : 'b'} />;"#;
        let (output, plans) = normalize_source(code);
        assert_eq!(output, code);
        assert_eq!(plans.findings[0].code, FC_DYNAMIC_CLASS);
    }

    #[test]
    fn css_property_names() {
        assert_eq!(css_to_camel("background-color"), "backgroundColor");
        assert_eq!(css_to_camel("-ms-transform"), "msTransform");
        assert_eq!(css_to_camel("--accent"), "--accent");
    }
}
