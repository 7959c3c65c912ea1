//! Fixed-shape tensor payloads handed to the inference engine.
//!
//! Every slot is shaped `[1, L]` and stored as `f32`. Ids stay below
//! [`MAX_EXACT_ID`](crate::vocab::MAX_EXACT_ID), so the cast is exact.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error::PipelineError, preprocess::PreprocessedInput};

/// Semantic role of an engine input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSlot {
    TokenIds,
    AttentionMask,
    SegmentIds,
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TokenIds => "token_ids",
            Self::AttentionMask => "attention_mask",
            Self::SegmentIds => "segment_ids",
        })
    }
}

/// Declared input slot of a loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotSpec {
    /// Backend input name, e.g. `input_ids`.
    pub name: String,
    pub kind: InputSlot,
    /// Static sequence length, or `None` when the model accepts any length.
    #[serde(default)]
    pub sequence_length: Option<usize>,
}

impl SlotSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: InputSlot, sequence_length: Option<usize>) -> Self {
        Self {
            name: name.into(),
            kind,
            sequence_length,
        }
    }

    /// Element count the slot requires for a sequence of `len` positions.
    #[must_use]
    pub fn expected_elements(&self, len: usize) -> usize {
        self.sequence_length.unwrap_or(len)
    }
}

/// Dense `f32` buffer with a row-major shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorBuffer {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl TensorBuffer {
    /// Wraps `data` as a single-row batch.
    #[must_use]
    pub fn row(data: Vec<f32>) -> Self {
        Self {
            shape: vec![1, data.len()],
            data,
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "vocabulary ids are bounded below 2^24"
)]
fn encode(values: &[u32]) -> Vec<f32> {
    values.iter().map(|value| *value as f32).collect()
}

/// Builds one buffer per declared slot, in declaration order.
///
/// # Errors
///
/// Returns [`PipelineError::ShapeMismatch`] when the input arrays differ in
/// length or a slot's static length disagrees with the input.
///
/// # Examples
///
/// ```
/// use phrase_verdict::{PreprocessedInput, tensor::{assemble, InputSlot, SlotSpec}};
///
/// let input = PreprocessedInput {
///     token_ids: vec![2, 7, 3],
///     segment_ids: vec![0, 0, 0],
///     attention_mask: vec![1, 1, 1],
/// };
/// let slots = [
///     SlotSpec::new("input_ids", InputSlot::TokenIds, None),
///     SlotSpec::new("attention_mask", InputSlot::AttentionMask, None),
/// ];
/// let buffers = assemble(&input, &slots).expect("assemble");
/// assert_eq!(buffers.len(), 2);
/// assert_eq!(buffers[0].data(), &[2.0, 7.0, 3.0]);
/// assert_eq!(buffers[0].shape(), &[1, 3]);
/// ```
pub fn assemble(
    input: &PreprocessedInput,
    slots: &[SlotSpec],
) -> Result<Vec<TensorBuffer>, PipelineError> {
    input.check_lengths()?;
    slots
        .iter()
        .map(|spec| {
            let values = input.slot(spec.kind);
            let expected = spec.expected_elements(values.len());
            if values.len() == expected {
                Ok(TensorBuffer::row(encode(values)))
            } else {
                Err(PipelineError::ShapeMismatch {
                    slot: spec.kind,
                    expected,
                    actual: values.len(),
                })
            }
        })
        .collect()
}
