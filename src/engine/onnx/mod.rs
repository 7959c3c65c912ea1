//! ONNX Runtime backend with artefact verification.
mod artefact;
mod config;
mod errors;

pub use artefact::{OnnxArtefact, compute_sha256};
pub use config::OnnxEngineConfig;
pub use errors::OnnxEngineError;

use std::sync::Mutex;

use ort::{
    session::{Session, SessionInputValue},
    value::TensorRef,
};

use crate::{
    engine::InferenceEngine,
    error::EngineError,
    tensor::{SlotSpec, TensorBuffer},
};

/// Transformer encoder executed by ONNX Runtime.
///
/// Every input is fed as an `f32` tensor, matching exported models that cast
/// ids inside the graph.
///
/// # Examples
/// ```no_run
/// use phrase_verdict::engine::onnx::{OnnxArtefact, OnnxEngine, OnnxEngineConfig, OnnxEngineError};
/// use phrase_verdict::tensor::{InputSlot, SlotSpec};
///
/// # fn main() -> Result<(), OnnxEngineError> {
/// let engine = OnnxEngine::new(OnnxEngineConfig {
///     model: OnnxArtefact {
///         path: std::path::PathBuf::from("/models/robbert_correctness.onnx"),
///         sha256: Some("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef".into()),
///     },
///     inputs: vec![
///         SlotSpec::new("input_ids", InputSlot::TokenIds, Some(128)),
///         SlotSpec::new("attention_mask", InputSlot::AttentionMask, Some(128)),
///     ],
///     output_name: "logits".into(),
///     output_len: 1,
///     thread_count: 4,
/// })?;
/// # let _ = engine;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OnnxEngine {
    session: Mutex<Session>,
    inputs: Vec<SlotSpec>,
    output_name: String,
    output_len: usize,
}

impl OnnxEngine {
    /// Verifies the model artefact and builds an ONNX session.
    ///
    /// # Errors
    ///
    /// Returns [`OnnxEngineError`] when the checksum does not match, the
    /// session cannot be created, or the configured slots disagree with the
    /// graph's declared inputs.
    pub fn new(config: OnnxEngineConfig) -> Result<Self, OnnxEngineError> {
        if config.inputs.is_empty() {
            return Err(OnnxEngineError::MissingInputSlots);
        }
        if !matches!(config.output_len, 1 | 2) {
            return Err(OnnxEngineError::OutputLength(config.output_len));
        }

        config.model.verify()?;

        let session = Session::builder()
            .map_err(OnnxEngineError::CreateSessionBuilder)?
            .with_intra_threads(config.thread_count)
            .map_err(|source| OnnxEngineError::ConfigureThreads {
                threads: config.thread_count,
                source: source.into(),
            })?
            .commit_from_file(&config.model.path)
            .map_err(OnnxEngineError::CreateSession)?;

        if session.inputs.len() != config.inputs.len() {
            return Err(OnnxEngineError::InputArity {
                declared: session.inputs.len(),
                configured: config.inputs.len(),
            });
        }
        if let Some(slot) = config
            .inputs
            .iter()
            .find(|slot| !session.inputs.iter().any(|input| input.name == slot.name))
        {
            return Err(OnnxEngineError::UnknownInput {
                name: slot.name.clone(),
            });
        }
        tracing::info!(
            path = %config.model.path.display(),
            inputs = config.inputs.len(),
            threads = config.thread_count,
            "ONNX session created"
        );

        Ok(Self {
            session: Mutex::new(session),
            inputs: config.inputs,
            output_name: config.output_name,
            output_len: config.output_len,
        })
    }

    fn execute(&self, inputs: &[TensorBuffer]) -> Result<Vec<TensorBuffer>, OnnxEngineError> {
        let shapes = inputs
            .iter()
            .map(|buffer| {
                buffer
                    .shape()
                    .iter()
                    .map(|dim| i64::try_from(*dim).map_err(|_| OnnxEngineError::Dimension(*dim)))
                    .collect::<Result<Vec<i64>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut feed: Vec<(&str, SessionInputValue<'_>)> = Vec::with_capacity(inputs.len());
        for ((slot, buffer), shape) in self.inputs.iter().zip(inputs).zip(shapes) {
            let tensor = TensorRef::from_array_view((shape, buffer.data()))
                .map_err(OnnxEngineError::EncodeTensor)?;
            feed.push((slot.name.as_str(), tensor.into()));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| OnnxEngineError::SessionPoisoned)?;
        let outputs = session.run(feed).map_err(OnnxEngineError::Inference)?;

        let value =
            outputs
                .get(&self.output_name)
                .ok_or_else(|| OnnxEngineError::OutputMissing {
                    name: self.output_name.clone(),
                })?;
        let (_, data) = value
            .try_extract_tensor::<f32>()
            .map_err(OnnxEngineError::Inference)?;
        Ok(vec![TensorBuffer::row(data.to_vec())])
    }
}

impl InferenceEngine for OnnxEngine {
    fn input_slots(&self) -> &[SlotSpec] {
        &self.inputs
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn run(&self, inputs: &[TensorBuffer]) -> Result<Vec<TensorBuffer>, EngineError> {
        Ok(self.execute(inputs)?)
    }
}
