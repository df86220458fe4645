//! Structural parser.
//!
//! Wraps oxc so the rest of the engine sees either a [`SyntaxTree`] or a
//! positioned [`ParseError`]. The grammar already tolerates optional
//! terminators and mixed quoting; artifacts that still fail to parse are
//! handed back to the orchestrator untouched.

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_parser::Parser;

use crate::artifact::Dialect;
use crate::diagnostics::{LineIndex, Position};
use crate::error::ParseError;

/// Arena-backed tree for one invocation.
pub struct SyntaxTree<'a> {
    pub program: Program<'a>,
    pub source: &'a str,
    pub dialect: Dialect,
    pub lines: LineIndex,
}

impl<'a> SyntaxTree<'a> {
    pub fn position(&self, offset: u32) -> Position {
        self.lines.position(self.source, offset)
    }
}

pub fn parse_artifact<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    dialect: Dialect,
) -> Result<SyntaxTree<'a>, ParseError> {
    let ret = Parser::new(allocator, source, dialect.source_type()).parse();
    let lines = LineIndex::new(source);

    if let Some(error) = ret.errors.first() {
        let offset = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset() as u32)
            .unwrap_or(0);
        let position = lines.position(source, offset);
        tracing::debug!(target: "framecast", errors = ret.errors.len(), "parse failed");
        return Err(ParseError {
            message: error.to_string(),
            offset,
            line: position.line,
            column: position.column,
        });
    }
    if ret.panicked {
        return Err(ParseError {
            message: "parser aborted".to_string(),
            offset: 0,
            line: 1,
            column: 1,
        });
    }

    Ok(SyntaxTree {
        program: ret.program,
        source,
        dialect,
        lines,
    })
}

/// Checks that an emitted fragment is a single well-formed expression.
pub fn validate_expression(code: &str, dialect: Dialect) -> Result<(), ParseError> {
    let allocator = Allocator::default();
    match Parser::new(&allocator, code, dialect.source_type()).parse_expression() {
        Ok(_) => Ok(()),
        Err(errors) => Err(ParseError {
            message: errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "invalid expression".to_string()),
            offset: 0,
            line: 1,
            column: 1,
        }),
    }
}

/// Checks that a whole program parses cleanly.
pub fn validate_program(code: &str, dialect: Dialect) -> Result<(), ParseError> {
    let allocator = Allocator::default();
    parse_artifact(&allocator, code, dialect).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_component_without_semicolons() {
        let code = r#"
import React from 'react'
export default function App() {
  const label = "mixed" + 'quotes'
  return <div title={label}>hello</div>
}
"#;
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, code, Dialect::Jsx).unwrap();
        assert_eq!(tree.program.body.len(), 2);
    }

    #[test]
    fn truncated_input_reports_position() {
        let code = "export default function App() {\n  return <div>\n";
        let allocator = Allocator::default();
        let err = parse_artifact(&allocator, code, Dialect::Jsx)
            .err()
            .expect("truncated input must not parse");
        assert!(err.line >= 1);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn validates_fragments() {
        assert!(validate_expression("({ ...p, x: p.x + 1 })", Dialect::Tsx).is_ok());
        assert!(validate_expression("a +", Dialect::Tsx).is_err());
        assert!(validate_program("const a = 1;", Dialect::Tsx).is_ok());
    }
}
