//! Transform options.
//!
//! Options are plain serde data so they can come from a JSON document, the
//! CLI, or the native binding with the same defaults.

use serde::{Deserialize, Serialize};

use crate::artifact::Dialect;
use crate::classify::Category;
use crate::error::{FramecastError, FramecastResult};

pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_MAX_REPAIR_ATTEMPTS: u32 = 3;
pub const DEFAULT_ENHANCEMENT_THRESHOLD: u8 = 60;

/// Where the frame counter comes from in emitted code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSource {
    pub module: String,
    pub hook: String,
}

impl Default for FrameSource {
    fn default() -> Self {
        FrameSource {
            module: "remotion".to_string(),
            hook: "useCurrentFrame".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformOptions {
    /// Overrides the classifier's category.
    pub force_category: Option<Category>,
    pub enable_enhancement: bool,
    pub max_repair_attempts: u32,
    pub fps: u32,
    /// Frames each click-driven step is held for. Defaults to three seconds.
    pub step_frames: Option<u32>,
    pub enhancement_threshold: u8,
    pub frame_source: FrameSource,
    /// Skips sniffing when the caller already knows the dialect.
    pub dialect: Option<Dialect>,
    /// Re-print the validated output with the code generator.
    pub canonical_output: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            force_category: None,
            enable_enhancement: true,
            max_repair_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
            fps: DEFAULT_FPS,
            step_frames: None,
            enhancement_threshold: DEFAULT_ENHANCEMENT_THRESHOLD,
            frame_source: FrameSource::default(),
            dialect: None,
            canonical_output: false,
        }
    }
}

impl TransformOptions {
    pub fn from_json(json: &str) -> FramecastResult<Self> {
        let options: TransformOptions = serde_json::from_str(json)
            .map_err(|e| FramecastError::invalid_options(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> FramecastResult<()> {
        if self.fps == 0 {
            return Err(FramecastError::invalid_options("fps must be positive"));
        }
        if self.step_frames == Some(0) {
            return Err(FramecastError::invalid_options("stepFrames must be positive"));
        }
        if self.enhancement_threshold > 100 {
            return Err(FramecastError::invalid_options(
                "enhancementThreshold must be within 0..=100",
            ));
        }
        Ok(())
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.force_category = Some(category);
        self
    }

    pub fn with_enhancement(mut self, enabled: bool) -> Self {
        self.enable_enhancement = enabled;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_max_repair_attempts(mut self, attempts: u32) -> Self {
        self.max_repair_attempts = attempts;
        self
    }

    /// Frames each click-driven step lasts.
    pub fn step_frames(&self) -> u32 {
        self.step_frames
            .unwrap_or_else(|| self.fps.max(1).saturating_mul(3))
            .max(1)
    }

    pub fn fps(&self) -> u32 {
        self.fps.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let options = TransformOptions::from_json(r#"{"enableEnhancement": false}"#).unwrap();
        assert!(!options.enable_enhancement);
        assert_eq!(options.fps, DEFAULT_FPS);
        assert_eq!(options.max_repair_attempts, DEFAULT_MAX_REPAIR_ATTEMPTS);
        assert_eq!(options.step_frames(), 90);
        assert_eq!(options.frame_source.hook, "useCurrentFrame");
    }

    #[test]
    fn json_reads_forced_category() {
        let options =
            TransformOptions::from_json(r#"{"forceCategory": "effect-dominant", "fps": 60}"#)
                .unwrap();
        assert_eq!(options.force_category, Some(Category::EffectDominant));
        assert_eq!(options.step_frames(), 180);
    }

    #[test]
    fn rejects_zero_fps() {
        let err = TransformOptions::from_json(r#"{"fps": 0}"#).unwrap_err();
        assert!(matches!(err, FramecastError::InvalidOptions(_)));
    }
}
