//! Hard failures.
//!
//! Malformed surface syntax is never an error here: it becomes a fallback
//! result with findings. Only input that cannot be read as text at all, or
//! options that cannot be decoded, surface as [`FramecastError`].

use serde::Serialize;

/// Convenience result type used across framecast.
pub type FramecastResult<T> = Result<T, FramecastError>;

/// Top-level error taxonomy for the public entry points.
#[derive(thiserror::Error, Debug)]
pub enum FramecastError {
    /// The byte stream is not valid UTF-8 text.
    #[error("unreadable input: {0}")]
    UnreadableInput(String),

    /// Options document could not be decoded.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramecastError {
    /// Build a [`FramecastError::UnreadableInput`] value.
    pub fn unreadable(msg: impl Into<String>) -> Self {
        Self::UnreadableInput(msg.into())
    }

    /// Build a [`FramecastError::InvalidOptions`] value.
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }
}

/// Typed parse failure with a position in the source text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset of the first reported error.
    pub offset: u32,
    /// 1-based line.
    pub line: u32,
    /// 1-based column, counted in characters.
    pub column: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_position() {
        let err = ParseError {
            message: "Unexpected token".to_string(),
            offset: 12,
            line: 2,
            column: 5,
        };
        assert_eq!(err.to_string(), "parse error at 2:5: Unexpected token");
    }

    #[test]
    fn helper_constructors_pick_variant() {
        assert!(matches!(
            FramecastError::unreadable("bad utf-8"),
            FramecastError::UnreadableInput(_)
        ));
        assert!(FramecastError::invalid_options("fps")
            .to_string()
            .starts_with("invalid options"));
    }
}
