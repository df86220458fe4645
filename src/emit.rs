//! Structural emission.
//!
//! Rewritten code is built as [`JsExpr`] trees and printed here, so every
//! emitted fragment is well-formed by construction. Authored code that is
//! carried over verbatim enters as [`JsExpr::Raw`] and is always wrapped in
//! parentheses unless it is a plain identifier or literal.

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum JsExpr {
    Ident(String),
    Number(f64),
    Str(String),
    /// Authored source slice, already validated as an expression.
    Raw(String),
    Member(Box<JsExpr>, String),
    Call(Box<JsExpr>, Vec<JsExpr>),
    Binary(Box<JsExpr>, BinOp, Box<JsExpr>),
    Not(Box<JsExpr>),
    Conditional(Box<JsExpr>, Box<JsExpr>, Box<JsExpr>),
    Object(Vec<ObjectMember>),
    Array(Vec<JsExpr>),
    Arrow(Vec<String>, Box<JsExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectMember {
    Spread(JsExpr),
    Property(String, JsExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Ge,
    StrictEq,
    Nullish,
}

impl BinOp {
    fn token(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Ge => ">=",
            BinOp::StrictEq => "===",
            BinOp::Nullish => "??",
        }
    }
}

// Constructors read better than nested boxes at call sites.
impl JsExpr {
    pub fn ident(name: impl Into<String>) -> Self {
        JsExpr::Ident(name.into())
    }

    pub fn raw(code: impl Into<String>) -> Self {
        JsExpr::Raw(code.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        JsExpr::Str(value.into())
    }

    pub fn member(self, property: impl Into<String>) -> Self {
        JsExpr::Member(Box::new(self), property.into())
    }

    pub fn call(self, args: Vec<JsExpr>) -> Self {
        JsExpr::Call(Box::new(self), args)
    }

    pub fn binary(self, op: BinOp, rhs: JsExpr) -> Self {
        JsExpr::Binary(Box::new(self), op, Box::new(rhs))
    }

    pub fn add(self, rhs: JsExpr) -> Self {
        self.binary(BinOp::Add, rhs)
    }

    pub fn sub(self, rhs: JsExpr) -> Self {
        self.binary(BinOp::Sub, rhs)
    }

    pub fn mul(self, rhs: JsExpr) -> Self {
        self.binary(BinOp::Mul, rhs)
    }

    pub fn div(self, rhs: JsExpr) -> Self {
        self.binary(BinOp::Div, rhs)
    }

    pub fn rem(self, rhs: JsExpr) -> Self {
        self.binary(BinOp::Rem, rhs)
    }

    pub fn not(self) -> Self {
        JsExpr::Not(Box::new(self))
    }

    pub fn conditional(test: JsExpr, consequent: JsExpr, alternate: JsExpr) -> Self {
        JsExpr::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate))
    }

    pub fn arrow(params: &[&str], body: JsExpr) -> Self {
        JsExpr::Arrow(params.iter().map(|p| p.to_string()).collect(), Box::new(body))
    }

    /// `Math.<name>(args)`
    pub fn math(name: &str, args: Vec<JsExpr>) -> Self {
        JsExpr::ident("Math").member(name).call(args)
    }

    pub fn floor(self) -> Self {
        JsExpr::math("floor", vec![self])
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, JsExpr::Number(n) if *n == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, JsExpr::Number(n) if *n == 1.0)
    }

    pub fn print(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn is_atomic(&self) -> bool {
        match self {
            JsExpr::Ident(_)
            | JsExpr::Str(_)
            | JsExpr::Member(..)
            | JsExpr::Call(..)
            | JsExpr::Array(_) => true,
            JsExpr::Number(n) => *n >= 0.0,
            // `write` already parenthesizes compound raw code.
            JsExpr::Raw(_) => true,
            _ => false,
        }
    }

    fn write_operand(&self, out: &mut String) {
        if self.is_atomic() {
            self.write(out);
        } else {
            out.push('(');
            self.write(out);
            out.push(')');
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            JsExpr::Ident(name) => out.push_str(name),
            JsExpr::Number(n) => out.push_str(&format_number(*n)),
            JsExpr::Str(value) => write_string(out, value),
            JsExpr::Raw(code) => {
                if is_simple_raw(code) {
                    out.push_str(code.trim());
                } else {
                    out.push('(');
                    out.push_str(code.trim());
                    out.push(')');
                }
            }
            JsExpr::Member(object, property) => {
                object.write_operand(out);
                out.push('.');
                out.push_str(property);
            }
            JsExpr::Call(callee, args) => {
                callee.write_operand(out);
                out.push('(');
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    arg.write_argument(out);
                }
                out.push(')');
            }
            JsExpr::Binary(lhs, op, rhs) => {
                lhs.write_operand(out);
                let _ = write!(out, " {} ", op.token());
                rhs.write_operand(out);
            }
            JsExpr::Not(inner) => {
                out.push('!');
                inner.write_operand(out);
            }
            JsExpr::Conditional(test, consequent, alternate) => {
                test.write_operand(out);
                out.push_str(" ? ");
                consequent.write_operand(out);
                out.push_str(" : ");
                alternate.write_operand(out);
            }
            JsExpr::Object(members) => write_object(out, members),
            JsExpr::Array(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    item.write_argument(out);
                }
                out.push(']');
            }
            JsExpr::Arrow(params, body) => {
                out.push('(');
                out.push_str(&params.join(", "));
                out.push_str(") => ");
                if matches!(**body, JsExpr::Object(_)) {
                    out.push('(');
                    body.write(out);
                    out.push(')');
                } else {
                    body.write_argument(out);
                }
            }
        }
    }

    /// Argument and element positions only need parentheses around commas.
    fn write_argument(&self, out: &mut String) {
        match self {
            JsExpr::Raw(code) if !is_simple_raw(code) => {
                out.push('(');
                out.push_str(code.trim());
                out.push(')');
            }
            _ => self.write(out),
        }
    }
}

fn write_object(out: &mut String, members: &[ObjectMember]) {
    if members.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{ ");
    for (idx, member) in members.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        match member {
            ObjectMember::Spread(expr) => {
                out.push_str("...");
                expr.write_operand(out);
            }
            ObjectMember::Property(key, value) => {
                write_key(out, key);
                out.push_str(": ");
                value.write_argument(out);
            }
        }
    }
    out.push_str(" }");
}

/// Object members without the surrounding braces, for splicing into an
/// existing literal.
pub fn print_members(members: &[ObjectMember]) -> String {
    let mut out = String::new();
    write_object(&mut out, members);
    out.strip_prefix("{ ")
        .and_then(|inner| inner.strip_suffix(" }"))
        .unwrap_or_default()
        .to_string()
}

fn write_key(out: &mut String, key: &str) {
    if is_identifier(key) {
        out.push_str(key);
    } else {
        write_string(out, key);
    }
}

fn write_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let rounded = (n * 1e6).round() / 1e6;
    format!("{}", rounded)
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn is_simple_raw(code: &str) -> bool {
    let code = code.trim();
    is_identifier(code)
        || code.parse::<f64>().map(|n| n >= 0.0).unwrap_or(false)
        || is_member_chain(code)
}

fn is_member_chain(code: &str) -> bool {
    !code.is_empty() && code.split('.').all(is_identifier)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn const_declaration(name: &str, value: &JsExpr) -> String {
    format!("const {} = {};", name, value.print())
}

pub fn named_import(names: &[&str], module: &str) -> String {
    let mut out = String::new();
    let _ = write!(out, "import {{ {} }} from ", names.join(", "));
    write_string(&mut out, module);
    out.push(';');
    out
}

/// Seeded uniform generator in `[0, 1)`; the same seed always yields the same value.
pub const SEEDED_RANDOM_HELPER: &str = "const __seededRandom = (seed) => {\n  const x = Math.sin(seed * 12.9898 + 78.233) * 43758.5453;\n  return x - Math.floor(x);\n};";

pub const SEEDED_RANDOM_NAME: &str = "__seededRandom";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_operands_are_parenthesized() {
        let expr = JsExpr::raw("p.x + 1").add(JsExpr::ident("p").member("vx").mul(JsExpr::ident("t")));
        assert_eq!(expr.print(), "(p.x + 1) + (p.vx * t)");
    }

    #[test]
    fn compound_raw_code_is_wrapped_once() {
        assert_eq!(JsExpr::raw("() => 5").call(Vec::new()).print(), "(() => 5)()");
        assert_eq!(JsExpr::raw("a ?? b").member("x").print(), "(a ?? b).x");
        assert_eq!(JsExpr::raw("-1").mul(JsExpr::raw("v")).print(), "(-1) * v");
    }

    #[test]
    fn arrow_returning_object_is_wrapped() {
        let body = JsExpr::Object(vec![
            ObjectMember::Spread(JsExpr::ident("item")),
            ObjectMember::Property("x".into(), JsExpr::Number(2.5)),
            ObjectMember::Property("data-id".into(), JsExpr::str("a\"b")),
        ]);
        let arrow = JsExpr::arrow(&["item", "index"], body);
        assert_eq!(
            arrow.print(),
            "(item, index) => ({ ...item, x: 2.5, \"data-id\": \"a\\\"b\" })"
        );
    }

    #[test]
    fn numbers_print_compactly() {
        assert_eq!(format_number(90.0), "90");
        assert_eq!(format_number(0.48), "0.48");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
        assert_eq!(JsExpr::Number(-2.0).add(JsExpr::Number(1.0)).print(), "(-2) + 1");
    }

    #[test]
    fn members_print_without_braces() {
        let members = vec![
            ObjectMember::Property("display".into(), JsExpr::str("flex")),
            ObjectMember::Property("gap".into(), JsExpr::Number(16.0)),
        ];
        assert_eq!(print_members(&members), "display: \"flex\", gap: 16");
    }

    #[test]
    fn import_statement() {
        assert_eq!(
            named_import(&["useCurrentFrame"], "remotion"),
            "import { useCurrentFrame } from \"remotion\";"
        );
    }
}
