//! Node-aligned source edits.
//!
//! Passes never mutate the tree; they record `(start, end, text)` replacements
//! against node spans and the buffer applies them back to front. An outer
//! replacement may swallow inner ones as long as the caller rendered them
//! into its text first (see [`EditBuffer::render`]).

use crate::diagnostics::SourceSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: SourceSpan,
    pub text: String,
    seq: usize,
}

impl Edit {
    fn is_insertion(&self) -> bool {
        self.span.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("edit {start}..{end} overlaps an existing rewrite")]
pub struct EditConflict {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Default, Clone)]
pub struct EditBuffer {
    edits: Vec<Edit>,
    next_seq: usize,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `span`. Edits strictly inside `span` are dropped; partial
    /// overlaps are rejected.
    pub fn replace(&mut self, span: SourceSpan, text: impl Into<String>) -> Result<(), EditConflict> {
        if span.is_empty() {
            return self.insert(span.start, text);
        }
        for edit in &self.edits {
            let inside = span.contains(edit.span)
                && !(edit.is_insertion() && (edit.span.start == span.start || edit.span.start == span.end));
            let disjoint = edit.span.end <= span.start || edit.span.start >= span.end;
            if !inside && !disjoint {
                return Err(EditConflict {
                    start: span.start,
                    end: span.end,
                });
            }
        }
        self.edits.retain(|edit| {
            !(span.contains(edit.span)
                && !(edit.is_insertion() && (edit.span.start == span.start || edit.span.start == span.end)))
        });
        self.push(span, text.into());
        Ok(())
    }

    pub fn remove(&mut self, span: SourceSpan) -> Result<(), EditConflict> {
        self.replace(span, String::new())
    }

    /// Insert at `offset`. Several insertions at one offset keep their order.
    pub fn insert(&mut self, offset: u32, text: impl Into<String>) -> Result<(), EditConflict> {
        if self
            .edits
            .iter()
            .any(|edit| !edit.is_insertion() && edit.span.start < offset && offset < edit.span.end)
        {
            return Err(EditConflict {
                start: offset,
                end: offset,
            });
        }
        self.push(SourceSpan::new(offset, offset), text.into());
        Ok(())
    }

    fn push(&mut self, span: SourceSpan, text: String) {
        self.edits.push(Edit {
            span,
            text,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    /// Source text of `span` with the edits recorded inside it applied.
    pub fn render(&self, source: &str, span: SourceSpan) -> String {
        let inner: Vec<&Edit> = self
            .sorted()
            .into_iter()
            .filter(|edit| {
                span.contains(edit.span)
                    && !(edit.is_insertion() && (edit.span.start == span.start || edit.span.start == span.end))
            })
            .collect();
        splice(source, span, &inner)
    }

    pub fn apply(&self, source: &str) -> String {
        let whole = SourceSpan::new(0, source.len() as u32);
        let all = self.sorted();
        splice(source, whole, &all)
    }

    fn sorted(&self) -> Vec<&Edit> {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|edit| (edit.span.start, !edit.is_insertion(), edit.seq));
        edits
    }
}

fn splice(source: &str, span: SourceSpan, edits: &[&Edit]) -> String {
    let mut out = String::with_capacity(span.slice(source).len() + 64);
    let mut cursor = span.start as usize;
    for edit in edits {
        let start = edit.span.start as usize;
        if start < cursor {
            continue;
        }
        out.push_str(source.get(cursor..start).unwrap_or_default());
        out.push_str(&edit.text);
        cursor = edit.span.end as usize;
    }
    out.push_str(source.get(cursor..span.end as usize).unwrap_or_default());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_replacements_and_insertions_in_order() {
        let source = "let a = 1; let b = 2;";
        let mut edits = EditBuffer::new();
        edits.replace(SourceSpan::new(8, 9), "10").unwrap();
        edits.insert(0, "// head\n").unwrap();
        edits.insert(0, "// second\n").unwrap();
        edits.remove(SourceSpan::new(11, 21)).unwrap();
        assert_eq!(edits.apply(source), "// head\n// second\nlet a = 10; ");
    }

    #[test]
    fn outer_replacement_swallows_rendered_inner_edits() {
        let source = "const v = Math.random() * 2;";
        let mut edits = EditBuffer::new();
        edits.replace(SourceSpan::new(10, 23), "rand(1)").unwrap();
        let init = SourceSpan::new(10, 27);
        let rendered = edits.render(source, init);
        assert_eq!(rendered, "rand(1) * 2");

        edits
            .replace(SourceSpan::new(0, 28), format!("const v = {};", rendered))
            .unwrap();
        assert_eq!(edits.edits.len(), 1);
        assert_eq!(edits.apply(source), "const v = rand(1) * 2;");
    }

    #[test]
    fn partial_overlap_is_rejected() {
        let mut edits = EditBuffer::new();
        edits.replace(SourceSpan::new(5, 10), "x").unwrap();
        assert!(edits.replace(SourceSpan::new(8, 12), "y").is_err());
        assert!(edits.insert(7, "z").is_err());
        assert!(edits.insert(10, "z").is_ok());
    }
}
