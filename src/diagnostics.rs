//! Finding codes, guarantees and positions.
//!
//! Every recoverable problem the engine meets is recorded as a [`Finding`]
//! and returned with the result. Nothing in here is ever raised.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// FINDING CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const FC_PARSE_FAILURE: &str = "FC-PARSE-001";
pub const FC_UNSUPPORTED_DIALECT: &str = "FC-PARSE-002";
pub const FC_SHAPE_INCOMPLETE: &str = "FC-SHAPE-001";
pub const FC_OPAQUE_SHAPE: &str = "FC-SHAPE-002";
pub const FC_OPAQUE_RECURRENCE: &str = "FC-RECUR-001";
pub const FC_COMPETING_MUTATIONS: &str = "FC-RECUR-002";
pub const FC_BINDING_UNTOUCHED: &str = "FC-BIND-001";
pub const FC_HANDLER_FROZEN: &str = "FC-BIND-002";
pub const FC_SCHEDULING_RETAINED: &str = "FC-SCHED-001";
pub const FC_WALL_CLOCK_RETAINED: &str = "FC-SCHED-002";
pub const FC_UNRESOLVED_UTILITY: &str = "FC-STYLE-001";
pub const FC_DYNAMIC_CLASS: &str = "FC-STYLE-002";
pub const FC_CORRUPTION_REPAIRED: &str = "FC-CORRUPT-001";
pub const FC_CORRUPTION_UNRESOLVED: &str = "FC-CORRUPT-002";
pub const FC_UNSAFE_TRANSFORM: &str = "FC-SAFE-001";
pub const FC_EDIT_CONFLICT: &str = "FC-SAFE-002";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_guarantee(code: &str) -> &'static str {
    match code {
        FC_PARSE_FAILURE => "Unparseable artifacts are returned verbatim.",
        FC_UNSUPPORTED_DIALECT => "Only component source dialects are rewritten.",
        FC_SHAPE_INCOMPLETE => {
            "Every property read at a usage site exists on the derived value."
        }
        FC_OPAQUE_SHAPE => "Initializers beyond literal construction are never guessed.",
        FC_OPAQUE_RECURRENCE => "Approximated motion is always marked low-fidelity.",
        FC_COMPETING_MUTATIONS => "A binding is driven by exactly one recurrence.",
        FC_BINDING_UNTOUCHED => "Bindings that cannot be rewritten safely are left as authored.",
        FC_HANDLER_FROZEN => "Interaction-driven values hold their initial value.",
        FC_SCHEDULING_RETAINED => "Scheduling with side effects beyond state updates is kept.",
        FC_WALL_CLOCK_RETAINED => "Wall-clock reads outside components are left as authored.",
        FC_UNRESOLVED_UTILITY => "Unknown utility classes are kept, never deleted.",
        FC_DYNAMIC_CLASS => "Computed class names are left as authored.",
        FC_CORRUPTION_REPAIRED => "Repairs are applied only when the pattern is unambiguous.",
        FC_CORRUPTION_UNRESOLVED => "Ambiguous damage is reported without altering text.",
        FC_UNSAFE_TRANSFORM => "Output is never worse than input.",
        FC_EDIT_CONFLICT => "Overlapping rewrites are dropped rather than merged.",
        _ => "Unknown guarantee.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    ParseError,
    ShapeIncomplete,
    OpaqueRecurrence,
    CorruptionFinding,
    UnsafeTransform,
    /// Informational notes about what was left alone.
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub code: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    pub guarantee: String,
    pub line: u32,
    pub column: u32,
    /// Binding, element, or signature the finding is about.
    pub subject: Option<String>,
    /// True when the engine handled the problem itself.
    pub resolved: bool,
}

impl Finding {
    pub fn new(code: &str, kind: FindingKind, severity: Severity, message: impl Into<String>) -> Self {
        Finding {
            code: code.to_string(),
            kind,
            severity,
            message: message.into(),
            guarantee: get_guarantee(code).to_string(),
            line: 0,
            column: 0,
            subject: None,
            resolved: false,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.line = position.line;
        self.column = position.column;
        self
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn resolved(mut self) -> Self {
        self.resolved = true;
        self
    }

    pub fn is_corruption(&self) -> bool {
        self.kind == FindingKind::CorruptionFinding
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct SourceSpan {
    pub start: u32,
    pub end: u32,
}

impl SourceSpan {
    pub fn new(start: u32, end: u32) -> Self {
        SourceSpan { start, end }
    }

    pub fn contains(&self, other: SourceSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_offset(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }
}

impl From<oxc_span::Span> for SourceSpan {
    fn from(span: oxc_span::Span) -> Self {
        SourceSpan::new(span.start, span.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets to 1-based line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    text_len: u32,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx as u32 + 1);
            }
        }
        LineIndex {
            line_starts,
            text_len: text.len() as u32,
        }
    }

    pub fn position(&self, text: &str, offset: u32) -> Position {
        let offset = offset.min(self.text_len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line] as usize;
        let column = text
            .get(start..offset as usize)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(0);
        Position {
            line: line as u32 + 1,
            column: column as u32 + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index_reports_one_based_positions() {
        let text = "const a = 1;\nconst b = 2;\n";
        let index = LineIndex::new(text);
        assert_eq!(index.position(text, 0), Position { line: 1, column: 1 });
        assert_eq!(index.position(text, 13), Position { line: 2, column: 1 });
        assert_eq!(index.position(text, 19), Position { line: 2, column: 7 });
    }

    #[test]
    fn finding_carries_guarantee_for_code() {
        let finding = Finding::new(
            FC_SHAPE_INCOMPLETE,
            FindingKind::ShapeIncomplete,
            Severity::Warning,
            "missing trail",
        )
        .about("particles");
        assert_eq!(finding.guarantee, get_guarantee(FC_SHAPE_INCOMPLETE));
        assert_eq!(finding.subject.as_deref(), Some("particles"));
        assert!(!finding.resolved);
    }

    #[test]
    fn span_containment() {
        let outer = SourceSpan::new(10, 40);
        assert!(outer.contains(SourceSpan::new(10, 40)));
        assert!(outer.contains(SourceSpan::new(12, 20)));
        assert!(!outer.contains(SourceSpan::new(5, 20)));
        assert!(outer.contains_offset(39));
        assert!(!outer.contains_offset(40));
    }
}
