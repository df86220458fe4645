//! Corruption guard.
//!
//! A lexical scanner that knows enough JS/JSX to tell a broken quote or
//! delimiter from legitimate text, plus a handful of repair signatures for
//! the corruptions generated artifacts are known to carry. Repairs are line
//! local and only kept when the repaired line scans clean.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::diagnostics::{
    Finding, FindingKind, Position, Severity, FC_CORRUPTION_REPAIRED, FC_CORRUPTION_UNRESOLVED,
};

pub const NESTED_STRING_BOUNDARY: &str = "nested-string-boundary";
pub const ESCAPED_ATTRIBUTE_QUOTE: &str = "escaped-attribute-quote";
pub const CODE_FENCE: &str = "code-fence";

lazy_static! {
    // `"'Inter'", sans-serif"` → `"'Inter', sans-serif"`
    static ref QUOTED_FONT_DOUBLE: Regex =
        Regex::new(r#""'([^'"\n]*)'"(,[^'"\n]*)""#).unwrap();
    // `'"Inter"', sans-serif'` → `'"Inter", sans-serif'`
    static ref QUOTED_FONT_SINGLE: Regex =
        Regex::new(r#"'"([^'"\n]*)"'(,[^'"\n]*)'"#).unwrap();
    // `'Foo'", bar'` → `'Foo, bar'`
    static ref SPLIT_SINGLE: Regex = Regex::new(r#"'([^'"\n]*)'"(,[^'"\n]*)'"#).unwrap();
    // `"Foo"', bar"` → `"Foo, bar"`
    static ref SPLIT_DOUBLE: Regex = Regex::new(r#""([^'"\n]*)"'(,[^'"\n]*)""#).unwrap();
    // `className=\"x\"` → `className="x"`
    static ref ESCAPED_ATTRIBUTE: Regex =
        Regex::new(r#"([A-Za-z][\w:-]*)=\\"([^"\\\n]*)\\""#).unwrap();
    static ref FENCE_LINE: Regex = Regex::new(r"^\s*```[\w+-]*\s*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    UnterminatedString,
    UnterminatedTemplate,
    UnterminatedComment,
    UnclosedDelimiter,
    UnmatchedCloser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanIssue {
    pub kind: IssueKind,
    pub line: u32,
    pub column: u32,
    pub delimiter: char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Paren,
    Bracket,
    Brace,
    /// `${` inside a template literal.
    Substitution,
}

impl Frame {
    fn opener(&self) -> char {
        match self {
            Frame::Paren => '(',
            Frame::Bracket => '[',
            Frame::Brace => '{',
            Frame::Substitution => '$',
        }
    }

    fn closes(&self, c: char) -> bool {
        matches!(
            (self, c),
            (Frame::Paren, ')') | (Frame::Bracket, ']') | (Frame::Brace | Frame::Substitution, '}')
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Str { quote: char, at: usize },
    Template,
    LineComment,
    BlockComment { at: usize },
    Regex { in_class: bool },
}

struct Scanner {
    chars: Vec<char>,
    lines: Vec<(u32, u32)>,
}

impl Scanner {
    fn new(text: &str) -> Self {
        let mut chars: Vec<char> = text.chars().collect();
        // A final newline lets strings on the last line end like any other.
        if chars.last() != Some(&'\n') {
            chars.push('\n');
        }
        let mut lines = Vec::with_capacity(chars.len());
        let (mut line, mut column) = (1, 1);
        for c in &chars {
            lines.push((line, column));
            if *c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Scanner { chars, lines }
    }

    fn issue(&self, kind: IssueKind, at: usize, delimiter: char) -> ScanIssue {
        let (line, column) = self.lines.get(at).copied().unwrap_or((1, 1));
        ScanIssue {
            kind,
            line,
            column,
            delimiter,
        }
    }

    /// An apostrophe right after a letter is prose (`Don't`) when it does
    /// not close on its own line.
    fn is_prose_quote(&self, at: usize) -> bool {
        self.chars[at] == '\'' && at > 0 && self.chars[at - 1].is_alphanumeric()
    }

    fn regex_allowed(last: Option<char>, next: Option<char>) -> bool {
        if matches!(next, Some('>') | Some('/') | Some('*')) {
            return false;
        }
        matches!(
            last,
            None | Some('(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | ';' | '+' | '-' | '*' | '%' | '~' | '^')
        )
    }

    fn scan(&self) -> Vec<ScanIssue> {
        let chars = &self.chars;
        let mut issues = Vec::new();
        let mut stack: Vec<(Frame, usize)> = Vec::new();
        let mut templates: Vec<usize> = Vec::new();
        let mut state = State::Code;
        let mut last: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match state {
                State::Code => match c {
                    '\'' | '"' => state = State::Str { quote: c, at: i },
                    '`' => {
                        templates.push(i);
                        state = State::Template;
                    }
                    '/' if next == Some('/') => state = State::LineComment,
                    '/' if next == Some('*') => {
                        state = State::BlockComment { at: i };
                        i += 1;
                    }
                    '/' if Self::regex_allowed(last, next) => state = State::Regex { in_class: false },
                    '(' => stack.push((Frame::Paren, i)),
                    '[' => stack.push((Frame::Bracket, i)),
                    '{' => stack.push((Frame::Brace, i)),
                    ')' | ']' | '}' => {
                        match stack.iter().rposition(|(frame, _)| frame.closes(c)) {
                            Some(depth) => {
                                for (frame, at) in stack.drain(depth + 1..) {
                                    issues.push(self.issue(IssueKind::UnclosedDelimiter, at, frame.opener()));
                                }
                                if let Some((Frame::Substitution, _)) = stack.pop() {
                                    state = State::Template;
                                }
                            }
                            None => issues.push(self.issue(IssueKind::UnmatchedCloser, i, c)),
                        }
                    }
                    _ => {}
                },
                State::Str { quote, at } => {
                    if c == '\\' {
                        i += 1;
                    } else if c == quote {
                        state = State::Code;
                        last = Some('"');
                        i += 1;
                        continue;
                    } else if c == '\n' {
                        state = State::Code;
                        if self.is_prose_quote(at) {
                            // Rescan the rest of the line as code.
                            i = at + 1;
                            continue;
                        }
                        issues.push(self.issue(IssueKind::UnterminatedString, at, quote));
                    }
                }
                State::Template => {
                    if c == '\\' {
                        i += 1;
                    } else if c == '`' {
                        templates.pop();
                        state = State::Code;
                        last = Some('"');
                        i += 1;
                        continue;
                    } else if c == '$' && next == Some('{') {
                        stack.push((Frame::Substitution, i));
                        state = State::Code;
                        last = Some('{');
                        i += 2;
                        continue;
                    }
                }
                State::LineComment => {
                    if c == '\n' {
                        state = State::Code;
                    }
                }
                State::BlockComment { .. } => {
                    if c == '*' && next == Some('/') {
                        state = State::Code;
                        i += 2;
                        continue;
                    }
                }
                State::Regex { in_class } => match c {
                    '\\' => i += 1,
                    '[' => state = State::Regex { in_class: true },
                    ']' if in_class => state = State::Regex { in_class: false },
                    '/' if !in_class => {
                        state = State::Code;
                        last = Some('"');
                        i += 1;
                        continue;
                    }
                    // Not a regex after all; read it as division.
                    '\n' => state = State::Code,
                    _ => {}
                },
            }
            if state == State::Code && !c.is_whitespace() {
                last = Some(c);
            }
            i += 1;
        }

        match state {
            State::Str { quote, at } if !self.is_prose_quote(at) => {
                issues.push(self.issue(IssueKind::UnterminatedString, at, quote));
            }
            State::BlockComment { at } => issues.push(self.issue(IssueKind::UnterminatedComment, at, '*')),
            _ => {}
        }
        if let Some(at) = templates.first() {
            issues.push(self.issue(IssueKind::UnterminatedTemplate, *at, '`'));
        }
        for (frame, at) in stack {
            if frame != Frame::Substitution {
                issues.push(self.issue(IssueKind::UnclosedDelimiter, at, frame.opener()));
            }
        }
        issues.sort_by_key(|issue| (issue.line, issue.column));
        issues
    }
}

/// Lexical problems in `text`, ordered by position.
pub fn scan(text: &str) -> Vec<ScanIssue> {
    Scanner::new(text).scan()
}

fn line_is_clean(line: &str) -> bool {
    !scan(line).iter().any(|issue| {
        matches!(
            issue.kind,
            IssueKind::UnterminatedString | IssueKind::UnmatchedCloser
        )
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSPECTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardReport {
    pub findings: Vec<Finding>,
    pub issues: Vec<ScanIssue>,
    pub balanced: bool,
    pub unresolved: usize,
}

impl GuardReport {
    pub fn broken_lines(&self) -> BTreeSet<u32> {
        self.issues.iter().map(|issue| issue.line).collect()
    }
}

#[tracing::instrument(skip_all, target = "framecast", fields(bytes = text.len()))]
pub fn inspect(text: &str) -> GuardReport {
    let issues = scan(text);
    let lines: Vec<&str> = text.lines().collect();
    let mut findings = Vec::new();
    for issue in &issues {
        let line = lines.get(issue.line as usize - 1).copied().unwrap_or_default();
        let signature = match_signature(line).map(|(name, _)| name);
        let message = match signature {
            Some(name) => format!("{} on line {} ({})", describe(issue), issue.line, name),
            None => format!("{} on line {}", describe(issue), issue.line),
        };
        findings.push(
            Finding::new(FC_CORRUPTION_UNRESOLVED, FindingKind::CorruptionFinding, Severity::Warning, message)
                .at(Position {
                    line: issue.line,
                    column: issue.column,
                })
                .about(signature.unwrap_or("unbalanced-delimiter")),
        );
    }
    let unresolved = findings.len();
    if unresolved > 0 {
        tracing::debug!(target: "framecast", unresolved, "guard found lexical issues");
    }
    GuardReport {
        findings,
        balanced: issues.is_empty(),
        issues,
        unresolved,
    }
}

fn describe(issue: &ScanIssue) -> String {
    match issue.kind {
        IssueKind::UnterminatedString => format!("unterminated {} string", issue.delimiter),
        IssueKind::UnterminatedTemplate => "unterminated template literal".to_string(),
        IssueKind::UnterminatedComment => "unterminated block comment".to_string(),
        IssueKind::UnclosedDelimiter => format!("unclosed `{}`", issue.delimiter),
        IssueKind::UnmatchedCloser => format!("unmatched `{}`", issue.delimiter),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPAIR
// ═══════════════════════════════════════════════════════════════════════════════

/// First signature whose rewrite changes `line`, with the rewritten line.
fn match_signature(line: &str) -> Option<(&'static str, String)> {
    let rules: [(&'static str, &Regex, &str); 5] = [
        (NESTED_STRING_BOUNDARY, &QUOTED_FONT_DOUBLE, "\"'$1'$2\""),
        (NESTED_STRING_BOUNDARY, &QUOTED_FONT_SINGLE, "'\"$1\"$2'"),
        (NESTED_STRING_BOUNDARY, &SPLIT_SINGLE, "'$1$2'"),
        (NESTED_STRING_BOUNDARY, &SPLIT_DOUBLE, "\"$1$2\""),
        (ESCAPED_ATTRIBUTE_QUOTE, &ESCAPED_ATTRIBUTE, "$1=\"$2\""),
    ];
    rules.into_iter().find_map(|(name, pattern, replacement)| {
        let fixed = pattern.replace_all(line, replacement);
        (fixed != line).then(|| (name, fixed.into_owned()))
    })
}

/// Removes markdown fence lines at the start and end of the document.
fn strip_code_fences(text: &str) -> Option<(String, u32)> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let first = lines.iter().position(|l| !l.trim().is_empty())?;
    let last = lines.iter().rposition(|l| !l.trim().is_empty())?;
    let leading = FENCE_LINE.is_match(lines[first].trim_end_matches(['\r', '\n']));
    let trailing = last > first && FENCE_LINE.is_match(lines[last].trim_end_matches(['\r', '\n']));
    if !leading && !trailing {
        return None;
    }
    let kept: String = lines
        .iter()
        .enumerate()
        .filter(|(idx, _)| !(leading && *idx == first) && !(trailing && *idx == last))
        .map(|(_, line)| *line)
        .collect();
    Some((kept, first as u32 + 1))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairOutcome {
    pub text: String,
    /// Applied repairs followed by whatever is still unresolved.
    pub findings: Vec<Finding>,
    pub repairs: u32,
    pub report: GuardReport,
}

impl RepairOutcome {
    pub fn changed(&self) -> bool {
        self.repairs > 0
    }
}

fn repaired(signature: &str, line: u32, message: String) -> Finding {
    Finding::new(FC_CORRUPTION_REPAIRED, FindingKind::CorruptionFinding, Severity::Info, message)
        .at(Position { line, column: 1 })
        .about(signature)
        .resolved()
}

/// Applies at most `max_attempts` verified signature repairs.
#[tracing::instrument(skip_all, target = "framecast", fields(max_attempts = max_attempts))]
pub fn repair(text: &str, max_attempts: u32) -> RepairOutcome {
    let mut current = text.to_string();
    let mut findings = Vec::new();
    let mut repairs = 0;

    if max_attempts > 0 {
        if let Some((stripped, line)) = strip_code_fences(&current) {
            current = stripped;
            repairs += 1;
            findings.push(repaired(CODE_FENCE, line, "removed markdown code fence".to_string()));
        }
    }

    let mut attempted: BTreeSet<u32> = BTreeSet::new();
    while repairs < max_attempts {
        let broken = inspect(&current).broken_lines();
        let Some(line_no) = broken.into_iter().find(|line| !attempted.contains(line)) else {
            break;
        };
        attempted.insert(line_no);

        let mut lines: Vec<String> = current.split_inclusive('\n').map(str::to_string).collect();
        let Some(original) = lines.get(line_no as usize - 1) else { break };
        let body = original.trim_end_matches(['\r', '\n']);
        let ending = original[body.len()..].to_string();
        let Some((signature, fixed)) = match_signature(body) else {
            continue;
        };
        if !line_is_clean(&fixed) {
            tracing::debug!(target: "framecast", line = line_no, signature, "repair did not verify");
            continue;
        }
        findings.push(repaired(
            signature,
            line_no,
            format!("repaired {} on line {}: `{}` → `{}`", signature, line_no, body.trim(), fixed.trim()),
        ));
        lines[line_no as usize - 1] = format!("{}{}", fixed, ending);
        current = lines.concat();
        repairs += 1;
    }

    let report = inspect(&current);
    findings.extend(report.findings.iter().cloned());
    if report.unresolved > 0 {
        tracing::warn!(target: "framecast", unresolved = report.unresolved, "corruption left unresolved");
    }
    RepairOutcome {
        text: current,
        findings,
        repairs,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_jsx_is_balanced() {
        let code = r#"
const re = /[a-z]+\/x/g;
export const A = ({ n }) => (
  <div className="a" style={{ width: n / 2 }}>
    <p>Don't stop, it's {`${n} items`}</p>
    {/* note */}
    <img src={n} />
  </div>
);
"#;
        let report = inspect(code);
        assert!(report.balanced, "{:?}", report.issues);
        assert_eq!(report.unresolved, 0);
    }

    #[test]
    fn reports_broken_lines() {
        let code = "const a = { font: 'x\", b: 1 };\nconst b = (1;\n";
        let issues = scan(code);
        assert!(issues.iter().any(|i| i.kind == IssueKind::UnterminatedString && i.line == 1));
        assert!(issues.iter().any(|i| i.kind == IssueKind::UnclosedDelimiter && i.delimiter == '('));
        assert!(!inspect(code).balanced);
    }

    #[test]
    fn nested_string_boundary_is_repaired() {
        let code = "const s = { fontFamily: 'Foo'\", bar' };\n";
        let outcome = repair(code, 3);
        assert_eq!(outcome.text, "const s = { fontFamily: 'Foo, bar' };\n");
        assert_eq!(outcome.repairs, 1);
        assert_eq!(outcome.findings[0].code, FC_CORRUPTION_REPAIRED);
        assert_eq!(outcome.findings[0].subject.as_deref(), Some(NESTED_STRING_BOUNDARY));
        assert!(outcome.report.balanced);
    }

    #[test]
    fn quoted_font_variant() {
        let code = "const s = { fontFamily: \"'Inter'\", sans-serif\" };";
        let outcome = repair(code, 3);
        assert_eq!(outcome.text, "const s = { fontFamily: \"'Inter', sans-serif\" };");
    }

    #[test]
    fn escaped_attribute_quotes() {
        let code = "const A = () => <div className=\\\"box\\\">x</div>;\n";
        let outcome = repair(code, 3);
        assert_eq!(outcome.text, "const A = () => <div className=\"box\">x</div>;\n");
    }

    #[test]
    fn code_fences_are_stripped() {
        let code = "```tsx\nconst a = 1;\n```\n";
        let outcome = repair(code, 3);
        assert_eq!(outcome.text, "const a = 1;\n");
        assert_eq!(outcome.findings[0].subject.as_deref(), Some(CODE_FENCE));
    }

    #[test]
    fn repairs_respect_the_budget() {
        let code = "const s = { fontFamily: 'Foo'\", bar' };\n";
        let outcome = repair(code, 0);
        assert_eq!(outcome.text, code);
        assert_eq!(outcome.repairs, 0);
        assert!(outcome.report.unresolved > 0);
        assert!(outcome.findings.iter().all(|f| !f.resolved));
    }

    #[test]
    fn unknown_breakage_is_reported_not_changed() {
        let code = "const a = 'open;\n";
        let outcome = repair(code, 3);
        assert_eq!(outcome.text, code);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].code, FC_CORRUPTION_UNRESOLVED);
    }
}
