//! Inference engine contract.
//!
//! The pipeline never interprets the model itself. It hands an engine one
//! buffer per declared input slot and reads back its output buffers. Arity and
//! element counts are checked here, before the backend is touched.

#[cfg(feature = "onnx")]
pub mod onnx;

use crate::{
    error::{EngineError, PipelineError},
    tensor::{SlotSpec, TensorBuffer},
};

/// Tensor execution backend for a pretrained encoder.
///
/// Implementations may parallelise internally but `run` must block until the
/// outputs are ready.
pub trait InferenceEngine {
    /// Ordered input slots the loaded model declares.
    fn input_slots(&self) -> &[SlotSpec];

    /// Number of floats in the primary output (1 score or 2 logits).
    fn output_len(&self) -> usize;

    /// Executes the model once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the backend fails.
    fn run(&self, inputs: &[TensorBuffer]) -> Result<Vec<TensorBuffer>, EngineError>;

    /// Static sequence length shared by the input slots, if any.
    fn declared_sequence_length(&self) -> Option<usize> {
        self.input_slots()
            .iter()
            .find_map(|slot| slot.sequence_length)
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn input_slots(&self) -> &[SlotSpec] {
        (**self).input_slots()
    }

    fn output_len(&self) -> usize {
        (**self).output_len()
    }

    fn run(&self, inputs: &[TensorBuffer]) -> Result<Vec<TensorBuffer>, EngineError> {
        (**self).run(inputs)
    }
}

/// Validates `inputs` against the engine's declared slots, then runs it.
///
/// # Errors
///
/// Returns [`PipelineError::InputArity`] when the buffer count differs from
/// the slot count and [`PipelineError::ShapeMismatch`] when a buffer's element
/// count disagrees with its slot or with the first buffer. In both cases the
/// engine is not invoked. Backend failures surface as
/// [`PipelineError::Engine`].
pub fn invoke<E>(engine: &E, inputs: &[TensorBuffer]) -> Result<Vec<TensorBuffer>, PipelineError>
where
    E: InferenceEngine + ?Sized,
{
    let slots = engine.input_slots();
    if slots.len() != inputs.len() {
        return Err(PipelineError::InputArity {
            expected: slots.len(),
            actual: inputs.len(),
        });
    }
    let sequence = inputs.first().map_or(0, TensorBuffer::len);
    for (slot, buffer) in slots.iter().zip(inputs) {
        let expected = slot.expected_elements(sequence);
        if buffer.len() != expected {
            return Err(PipelineError::ShapeMismatch {
                slot: slot.kind,
                expected,
                actual: buffer.len(),
            });
        }
    }
    tracing::debug!(slots = slots.len(), sequence, "invoking inference engine");
    Ok(engine.run(inputs)?)
}
