//! Error kinds surfaced by the classification pipeline.
//!
//! Structural problems (arity, shape, output size) fail fast. Vocabulary
//! misses never appear here; they resolve to the unknown token instead.

use thiserror::Error;

use crate::{config::ConfigError, tensor::InputSlot, vocab::VocabularyLoadError};

/// Failure reported by an [`InferenceEngine`](crate::engine::InferenceEngine)
/// backend.
#[derive(Debug, Error)]
#[error("inference engine failed: {0}")]
pub struct EngineError(#[source] Box<dyn std::error::Error + Send + Sync + 'static>);

impl EngineError {
    /// Wraps any backend error.
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self(source.into())
    }
}

/// Errors returned while building or running a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Vocabulary(#[from] VocabularyLoadError),
    #[error("model declares {expected} input slots but {actual} buffers were assembled")]
    InputArity { expected: usize, actual: usize },
    #[error("{slot} buffer holds {actual} elements but {expected} were expected")]
    ShapeMismatch {
        slot: InputSlot,
        expected: usize,
        actual: usize,
    },
    #[error("output buffer of length {actual} is neither a single score nor two logits")]
    UnsupportedOutputShape { actual: usize },
    #[error("model produces {actual} outputs but the configured policy expects {expected}")]
    OutputArity { expected: usize, actual: usize },
    #[error("model returned no output buffers")]
    MissingOutput,
    #[error("model does not declare a token_ids input slot")]
    MissingTokenIdsSlot,
    #[error("sequence length must be greater than zero")]
    ZeroSequenceLength,
    #[error("sequence length {max} leaves no room for the begin and end tokens")]
    SequenceTooShort { max: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}
