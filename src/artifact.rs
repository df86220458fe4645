//! Source artifacts and dialect sniffing.

use lazy_static::lazy_static;
use oxc_span::SourceType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FramecastError, FramecastResult};

lazy_static! {
    static ref JSX_MARKUP: Regex = Regex::new(r"</[A-Za-z][\w.]*\s*>|<[A-Za-z][\w.]*[^<>]*/>").unwrap();
    static ref TS_SYNTAX: Regex = Regex::new(
        r"(?m)^\s*(export\s+)?(interface|type)\s+[A-Z]\w*|:\s*(React\.)?FC\b|\buse(State|Ref)<|\)\s*:\s*(number|string|boolean|void)\b|\bas\s+const\b"
    )
    .unwrap();
    static ref HTML_DOCUMENT: Regex = Regex::new(r"(?i)^\s*(<!doctype\s+html|<html[\s>])").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Tsx,
    Jsx,
    #[serde(rename = "ts")]
    TypeScript,
    #[serde(rename = "js")]
    JavaScript,
    Html,
}

impl Dialect {
    /// Guess the dialect from the text itself.
    pub fn sniff(text: &str) -> Dialect {
        if HTML_DOCUMENT.is_match(text) {
            return Dialect::Html;
        }
        let jsx = JSX_MARKUP.is_match(text);
        let ts = TS_SYNTAX.is_match(text);
        match (jsx, ts) {
            (true, true) => Dialect::Tsx,
            (true, false) => Dialect::Jsx,
            (false, true) => Dialect::TypeScript,
            (false, false) => Dialect::JavaScript,
        }
    }

    pub fn from_path(path: &Path) -> Option<Dialect> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tsx" => Some(Dialect::Tsx),
            "jsx" => Some(Dialect::Jsx),
            "ts" | "mts" => Some(Dialect::TypeScript),
            "js" | "mjs" => Some(Dialect::JavaScript),
            "html" | "htm" => Some(Dialect::Html),
            _ => None,
        }
    }

    pub fn is_transformable(&self) -> bool {
        !matches!(self, Dialect::Html)
    }

    /// Parser configuration. JSX artifacts routinely carry TS annotations,
    /// so both markup dialects parse as TSX.
    pub fn source_type(&self) -> SourceType {
        let markup = matches!(self, Dialect::Tsx | Dialect::Jsx | Dialect::JavaScript);
        SourceType::default()
            .with_typescript(true)
            .with_jsx(markup)
            .with_module(true)
    }
}

/// Immutable input text plus its dialect.
#[derive(Debug, Clone)]
pub struct SourceArtifact {
    text: String,
    dialect: Dialect,
}

impl SourceArtifact {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let dialect = Dialect::sniff(&text);
        SourceArtifact { text, dialect }
    }

    pub fn with_dialect(text: impl Into<String>, dialect: Dialect) -> Self {
        SourceArtifact {
            text: text.into(),
            dialect,
        }
    }

    /// Decode raw bytes. Invalid UTF-8 is the one hard failure of the engine.
    pub fn from_bytes(bytes: &[u8]) -> FramecastResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            FramecastError::unreadable(format!("invalid UTF-8 at byte {}", e.valid_up_to()))
        })?;
        Ok(SourceArtifact::new(text))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn size(&self) -> usize {
        self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_markup_and_annotations() {
        let tsx = "const App: React.FC = () => <div className=\"x\">hi</div>;";
        assert_eq!(Dialect::sniff(tsx), Dialect::Tsx);

        let jsx = "export default function App() { return <div>hi</div>; }";
        assert_eq!(Dialect::sniff(jsx), Dialect::Jsx);

        let js = "const a = 1 < 2;";
        assert_eq!(Dialect::sniff(js), Dialect::JavaScript);
    }

    #[test]
    fn html_documents_are_not_transformable() {
        let html = "<!DOCTYPE html>\n<html><body><canvas></canvas></body></html>";
        let artifact = SourceArtifact::new(html);
        assert_eq!(artifact.dialect(), Dialect::Html);
        assert!(!artifact.dialect().is_transformable());
    }

    #[test]
    fn invalid_utf8_is_unreadable() {
        let err = SourceArtifact::from_bytes(&[0x66, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, FramecastError::UnreadableInput(_)));
    }

    #[test]
    fn dialect_from_extension() {
        assert_eq!(Dialect::from_path(Path::new("a/App.TSX")), Some(Dialect::Tsx));
        assert_eq!(Dialect::from_path(Path::new("README.md")), None);
    }
}
