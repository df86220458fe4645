//! Safety orchestration.
//!
//! Drives one artifact through `Parsing → Classifying → Transforming →
//! Validating → Done`, dropping to `Fallback` from any stage. A fallback
//! returns the input text byte for byte, so the result is never worse than
//! not running the engine at all.

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::artifact::{Dialect, SourceArtifact};
use crate::classify::{classify, ClassificationProfile};
use crate::config::TransformOptions;
use crate::diagnostics::{
    Finding, FindingKind, Position, Severity, FC_PARSE_FAILURE, FC_UNSAFE_TRANSFORM,
    FC_UNSUPPORTED_DIALECT,
};
use crate::edits::EditBuffer;
use crate::enhance::{apply_rules, AppliedEnhancement, EnhanceSettings};
use crate::error::{FramecastResult, ParseError};
use crate::guard::{inspect, repair};
use crate::parse::{parse_artifact, validate_program};
use crate::resolve::resolve_bindings;
use crate::rewrite::{rewrite, BindingReport, RewriteContext};
use crate::style::{collect_elements, emit, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Parsing,
    Repairing,
    Classifying,
    Transforming,
    Validating,
    Done,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub output_text: String,
    pub applied_enhancements: Vec<AppliedEnhancement>,
    pub corruption_findings: Vec<Finding>,
    pub used_fallback: bool,
    pub fallback_reason: Option<String>,
    pub findings: Vec<Finding>,
    pub classification: Option<ClassificationProfile>,
    pub bindings: Vec<BindingReport>,
    pub stages: Vec<Stage>,
    pub dialect: Dialect,
    pub input_digest: String,
    pub output_digest: String,
}

/// Hex SHA-256 of `text`.
pub fn digest(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    hash.iter().map(|byte| format!("{:02x}", byte)).collect()
}

pub fn transform(text: &str, options: &TransformOptions) -> TransformResult {
    let artifact = match options.dialect {
        Some(dialect) => SourceArtifact::with_dialect(text, dialect),
        None => SourceArtifact::new(text),
    };
    transform_artifact(&artifact, options)
}

/// Like [`transform`], for raw bytes. Fails only when the bytes are not text.
pub fn transform_bytes(bytes: &[u8], options: &TransformOptions) -> FramecastResult<TransformResult> {
    let artifact = SourceArtifact::from_bytes(bytes)?;
    let artifact = match options.dialect {
        Some(dialect) => SourceArtifact::with_dialect(artifact.text(), dialect),
        None => artifact,
    };
    Ok(transform_artifact(&artifact, options))
}

/// Transforms independent artifacts in parallel; results keep input order.
pub fn transform_batch(artifacts: &[SourceArtifact], options: &TransformOptions) -> Vec<TransformResult> {
    artifacts
        .par_iter()
        .map(|artifact| transform_artifact(artifact, options))
        .collect()
}

/// Classifies `text` without rewriting it.
pub fn classify_text(text: &str, dialect: Option<Dialect>) -> Result<ClassificationProfile, ParseError> {
    let dialect = dialect.unwrap_or_else(|| Dialect::sniff(text));
    let allocator = Allocator::default();
    let tree = parse_artifact(&allocator, text, dialect)?;
    Ok(classify(&tree))
}

#[tracing::instrument(skip_all, target = "framecast", fields(bytes = artifact.size(), dialect = ?artifact.dialect()))]
pub fn transform_artifact(artifact: &SourceArtifact, options: &TransformOptions) -> TransformResult {
    let mut run = Run::new(artifact);
    match run.drive(options) {
        Ok(transformed) => run.finish(transformed),
        Err(reason) => run.fall_back(reason),
    }
}

struct Transformed {
    text: String,
    applied: Vec<AppliedEnhancement>,
    classification: ClassificationProfile,
    bindings: Vec<BindingReport>,
}

struct Run<'s> {
    input: &'s str,
    dialect: Dialect,
    stages: Vec<Stage>,
    findings: Vec<Finding>,
    corruption: Vec<Finding>,
}

impl<'s> Run<'s> {
    fn new(artifact: &'s SourceArtifact) -> Self {
        Run {
            input: artifact.text(),
            dialect: artifact.dialect(),
            stages: Vec::new(),
            findings: Vec::new(),
            corruption: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(target: "framecast", ?stage, "stage");
        self.stages.push(stage);
    }

    fn parse_failure(&mut self, error: &ParseError) {
        self.findings.push(
            Finding::new(FC_PARSE_FAILURE, FindingKind::ParseError, Severity::Error, error.message.clone()).at(
                Position {
                    line: error.line,
                    column: error.column,
                },
            ),
        );
    }

    fn unsafe_output(&mut self, message: String) -> String {
        self.findings.push(Finding::new(
            FC_UNSAFE_TRANSFORM,
            FindingKind::UnsafeTransform,
            Severity::Error,
            message.clone(),
        ));
        message
    }

    /// Runs every stage; `Err` carries the fallback reason.
    fn drive(&mut self, options: &TransformOptions) -> Result<Transformed, String> {
        self.enter(Stage::Parsing);
        options.validate().map_err(|e| e.to_string())?;
        if !self.dialect.is_transformable() {
            self.findings.push(Finding::new(
                FC_UNSUPPORTED_DIALECT,
                FindingKind::ParseError,
                Severity::Error,
                format!("{:?} documents are not transformed", self.dialect),
            ));
            return Err(format!("unsupported dialect {:?}", self.dialect));
        }

        let working = match validate_program(self.input, self.dialect) {
            Ok(()) => self.input.to_string(),
            Err(error) => {
                self.parse_failure(&error);
                if options.max_repair_attempts == 0 {
                    return Err(format!("parse failed: {}", error));
                }
                self.enter(Stage::Repairing);
                let outcome = repair(self.input, options.max_repair_attempts);
                self.corruption
                    .extend(outcome.findings.iter().filter(|f| f.resolved).cloned());
                if !outcome.changed() {
                    return Err(format!("parse failed: {}", error));
                }
                validate_program(&outcome.text, self.dialect)
                    .map_err(|still| format!("parse failed after repair: {}", still))?;
                tracing::debug!(target: "framecast", repairs = outcome.repairs, "repaired input parses");
                outcome.text
            }
        };

        let mut transformed = self.transform_stages(&working, options)?;
        self.enter(Stage::Validating);
        transformed.text = self.validate(std::mem::take(&mut transformed.text), options)?;
        Ok(transformed)
    }

    fn transform_stages(&mut self, working: &str, options: &TransformOptions) -> Result<Transformed, String> {
        let allocator = Allocator::default();
        let tree = parse_artifact(&allocator, working, self.dialect).map_err(|e| format!("parse failed: {}", e))?;

        self.enter(Stage::Classifying);
        let classification = match options.force_category {
            Some(category) => ClassificationProfile::forced(category),
            None => classify(&tree),
        };

        self.enter(Stage::Transforming);
        let map = resolve_bindings(&tree);
        let mut edits = EditBuffer::new();
        let report = rewrite(&tree, &map, &RewriteContext::from_options(options), &mut edits);
        self.findings.extend(report.findings.iter().cloned());

        let mut plans = normalize(&collect_elements(&tree));
        let applied = apply_rules(&mut plans, &classification, &EnhanceSettings::from_options(options));
        self.findings.extend(plans.findings.iter().cloned());
        self.findings.extend(emit(&plans, working, &mut edits));

        Ok(Transformed {
            text: edits.apply(working),
            applied,
            classification,
            bindings: report.bindings,
        })
    }

    /// The output must parse, and must not scan worse than the input did.
    fn validate(&mut self, output: String, options: &TransformOptions) -> Result<String, String> {
        if let Err(error) = validate_program(&output, self.dialect) {
            return Err(self.unsafe_output(format!("transformed output did not re-parse: {}", error)));
        }
        let before = inspect(self.input);
        let after = inspect(&output);
        if before.balanced && !after.balanced {
            return Err(self.unsafe_output("transformed output has unbalanced delimiters".to_string()));
        }
        if after.unresolved > before.unresolved {
            return Err(self.unsafe_output(format!(
                "transformed output has {} unresolved corruption findings, input had {}",
                after.unresolved, before.unresolved
            )));
        }
        self.corruption.extend(after.findings);

        if !options.canonical_output {
            return Ok(output);
        }
        let allocator = Allocator::default();
        let canonical = match parse_artifact(&allocator, &output, self.dialect) {
            Ok(tree) => Codegen::new().build(&tree.program).code,
            Err(error) => return Err(self.unsafe_output(format!("canonical reprint failed: {}", error))),
        };
        Ok(canonical)
    }

    fn finish(mut self, transformed: Transformed) -> TransformResult {
        self.enter(Stage::Done);
        let Transformed {
            text: output,
            applied,
            classification,
            bindings,
        } = transformed;
        tracing::debug!(
            target: "framecast",
            bindings = bindings.len(),
            enhancements = applied.len(),
            findings = self.findings.len(),
            "transform complete"
        );
        TransformResult {
            input_digest: digest(self.input),
            output_digest: digest(&output),
            output_text: output,
            applied_enhancements: applied,
            corruption_findings: self.corruption,
            used_fallback: false,
            fallback_reason: None,
            findings: self.findings,
            classification: Some(classification),
            bindings,
            stages: self.stages,
            dialect: self.dialect,
        }
    }

    fn fall_back(mut self, reason: String) -> TransformResult {
        self.enter(Stage::Fallback);
        tracing::warn!(target: "framecast", %reason, "falling back to input text");
        let report = inspect(self.input);
        let mut corruption = self.corruption;
        corruption.extend(report.findings);
        let digest = digest(self.input);
        TransformResult {
            output_text: self.input.to_string(),
            applied_enhancements: Vec::new(),
            corruption_findings: corruption,
            used_fallback: true,
            fallback_reason: Some(reason),
            findings: self.findings,
            classification: None,
            bindings: Vec::new(),
            stages: self.stages,
            dialect: self.dialect,
            input_digest: digest.clone(),
            output_digest: digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_input_falls_back_verbatim() {
        let input = "export default function A() { return <div>{items.map(i => </div>; ";
        let result = transform(input, &TransformOptions::default());
        assert!(result.used_fallback);
        assert_eq!(result.output_text, input);
        assert_eq!(result.input_digest, result.output_digest);
        assert_eq!(result.stages.last(), Some(&Stage::Fallback));
        assert!(result.findings.iter().any(|f| f.code == FC_PARSE_FAILURE));
    }

    #[test]
    fn static_component_passes_through() {
        let input = "export default function A() {\n  return <div>hi</div>;\n}\n";
        let result = transform(input, &TransformOptions::default());
        assert!(!result.used_fallback);
        assert_eq!(result.output_text, input);
        assert_eq!(
            result.stages,
            vec![Stage::Parsing, Stage::Classifying, Stage::Transforming, Stage::Validating, Stage::Done]
        );
    }

    #[test]
    fn html_documents_fall_back() {
        let input = "<!DOCTYPE html>\n<html><body><script>setInterval(tick, 16)</script></body></html>";
        let result = transform(input, &TransformOptions::default());
        assert!(result.used_fallback);
        assert_eq!(result.output_text, input);
        assert!(result.findings.iter().any(|f| f.code == FC_UNSUPPORTED_DIALECT));
    }

    #[test]
    fn invalid_options_fall_back() {
        let input = "export const A = () => <div />;";
        let options = TransformOptions {
            fps: 0,
            ..TransformOptions::default()
        };
        let result = transform(input, &options);
        assert!(result.used_fallback);
        assert_eq!(result.output_text, input);
    }

    #[test]
    fn invalid_utf8_is_a_hard_error() {
        let result = transform_bytes(&[0x66, 0xff, 0xfe], &TransformOptions::default());
        assert!(matches!(result, Err(crate::error::FramecastError::UnreadableInput(_))));
    }

    #[test]
    fn digests_are_sha256_hex() {
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn canonical_output_reprints() {
        let input = "export const A = () => <div   className=\"x\">hi</div>;";
        let options = TransformOptions {
            canonical_output: true,
            ..TransformOptions::default()
        };
        let result = transform(input, &options);
        assert!(!result.used_fallback);
        assert_ne!(result.output_text, input);
        assert!(result.output_text.contains("className=\"x\""));
    }
}
