//! Pipeline configuration and serialisation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    postprocess::{DEFAULT_THRESHOLD, LabelSet},
    preprocess::DEFAULT_MAX_SEQUENCE_LENGTH,
    vocab::SpecialTokens,
};

/// Default engine parallelism hint.
pub const DEFAULT_THREAD_COUNT: usize = 4;

/// Errors returned by [`PipelineConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_sequence_length must be at least 2 but was {0}")]
    MaxSequenceLength(usize),
    #[error("thread_count must be greater than 0")]
    ThreadCount,
    #[error("output_arity must be 1 or 2 but was {0}")]
    OutputArity(usize),
    #[error("threshold must be finite")]
    Threshold,
}

/// How the target sequence length is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceLengthMode {
    /// Pad to the length the model declares; models without a static shape
    /// fall back to [`SequenceLengthMode::Dynamic`].
    #[default]
    Fixed,
    /// Use `min(tokens + 2, max_sequence_length)` without padding. Models
    /// with a static shape are still padded to it.
    Dynamic,
}

/// Configuration for a [`Pipeline`](crate::Pipeline).
///
/// # Examples
///
/// ```
/// use phrase_verdict::config::PipelineConfig;
///
/// let cfg: PipelineConfig = serde_json::from_str(r#"{"output_arity": 1}"#)
///     .expect("parse config");
/// assert_eq!(cfg.max_sequence_length, 512);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Hard cap on positions, special tokens included.
    pub max_sequence_length: usize,
    /// Engine parallelism hint; has no effect on results.
    pub thread_count: usize,
    /// Number of floats the model emits: 1 (score) or 2 (logits).
    pub output_arity: usize,
    pub sequence_length: SequenceLengthMode,
    pub special_tokens: SpecialTokens,
    pub labels: LabelSet,
    /// Decision threshold for single-score models.
    pub threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            thread_count: DEFAULT_THREAD_COUNT,
            output_arity: 2,
            sequence_length: SequenceLengthMode::default(),
            special_tokens: SpecialTokens::default(),
            labels: LabelSet::default(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Ensure the configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid field.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_sequence_length < 2 {
            return Err(ConfigError::MaxSequenceLength(self.max_sequence_length));
        }
        if self.thread_count == 0 {
            return Err(ConfigError::ThreadCount);
        }
        if !matches!(self.output_arity, 1 | 2) {
            return Err(ConfigError::OutputArity(self.output_arity));
        }
        if !self.threshold.is_finite() {
            return Err(ConfigError::Threshold);
        }
        Ok(self)
    }
}
