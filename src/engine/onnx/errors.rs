use std::path::PathBuf;

use thiserror::Error;

use crate::error::EngineError;

/// Errors produced while loading or running an [`OnnxEngine`](super::OnnxEngine).
#[derive(Debug, Error)]
pub enum OnnxEngineError {
    #[error("failed to read artefact at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artefact at {path} expected SHA-256 {expected} but found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("failed to construct ONNX session builder: {0}")]
    CreateSessionBuilder(#[source] ort::Error),
    #[error("failed to configure {threads} intra-op threads: {source}")]
    ConfigureThreads {
        threads: usize,
        #[source]
        source: ort::Error,
    },
    #[error("failed to create ONNX session: {0}")]
    CreateSession(#[source] ort::Error),
    #[error("engine requires at least one input slot")]
    MissingInputSlots,
    #[error("model declares {declared} inputs but {configured} slots were configured")]
    InputArity { declared: usize, configured: usize },
    #[error("model has no input named \"{name}\"")]
    UnknownInput { name: String },
    #[error("output_len must be 1 or 2 but was {0}")]
    OutputLength(usize),
    #[error("failed to convert buffer into tensor: {0}")]
    EncodeTensor(#[source] ort::Error),
    #[error("tensor dimension {0} does not fit the backend's shape type")]
    Dimension(usize),
    #[error("session mutex was poisoned by a previous panic")]
    SessionPoisoned,
    #[error("failed to run inference: {0}")]
    Inference(#[source] ort::Error),
    #[error("ONNX output \"{name}\" missing from session results")]
    OutputMissing { name: String },
}

impl From<OnnxEngineError> for EngineError {
    fn from(error: OnnxEngineError) -> Self {
        Self::new(error)
    }
}
