//! # framecast
//!
//! Rewrites a self-contained, time-driven UI component into a frame-indexed
//! one: every value that a timer, an animation-frame loop or a click handler
//! used to mutate becomes a pure function of the current frame.
//!
//! ## Pipeline
//!
//! 1. **Parse** the artifact into an `oxc` syntax tree. Nothing else touches raw text
//!    except the corruption guard.
//! 2. **Classify** it as effect-dominant, content-dominant or mixed.
//! 3. **Resolve** every `useState` binding: its initial shape, its recurrence and where
//!    it is read.
//! 4. **Rewrite** each binding into a closed-form expression of `frame`, removing the
//!    scheduling that drove it and seeding randomness.
//! 5. **Normalize** utility classes into inline style objects, then optionally
//!    **enhance** effect-driven artifacts with a bounded set of additive rules.
//! 6. **Validate** the output against the input and fall back to the input text
//!    whenever the output would be worse.
//!
//! ## Findings
//!
//! Everything recoverable is a [`Finding`] carrying an `FC-*` code and the guarantee
//! it protects. Only unreadable bytes and undecodable options are errors.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod artifact;
mod classify;
mod config;
mod diagnostics;
mod edits;
mod emit;
mod enhance;
mod error;
mod guard;
mod parse;
mod pipeline;
mod recurrence;
mod resolve;
mod rewrite;
mod style;
mod syntax;
mod tailwind;

#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod scenario_tests;

pub use artifact::{Dialect, SourceArtifact};
pub use classify::{Category, ClassificationProfile, Signals};
pub use config::{FrameSource, TransformOptions};
pub use diagnostics::*;
pub use enhance::{enhance, AppliedEnhancement, EnhanceOutcome, EnhanceSettings};
pub use error::{FramecastError, FramecastResult, ParseError};
pub use guard::{inspect, repair, GuardReport, IssueKind, RepairOutcome, ScanIssue};
pub use pipeline::{
    classify_text, digest, transform, transform_artifact, transform_batch, transform_bytes, Stage,
    TransformResult,
};
pub use resolve::Confidence;
pub use rewrite::{BindingReport, Fidelity};

/// Node entry point: `transform_native(source, options?)` returns the result as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn transform_native(
    source: String,
    options_json: Option<serde_json::Value>,
) -> napi::Result<serde_json::Value> {
    let options: TransformOptions = match options_json {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| napi::Error::from_reason(format!("Invalid options: {}", e)))?,
        None => TransformOptions::default(),
    };
    let result = transform(&source, &options);
    serde_json::to_value(&result)
        .map_err(|e| napi::Error::from_reason(format!("Failed to serialize result: {}", e)))
}
