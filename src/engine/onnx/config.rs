//! Configuration for the ONNX Runtime engine.

use serde::{Deserialize, Serialize};

use super::artefact::OnnxArtefact;
use crate::{config::DEFAULT_THREAD_COUNT, tensor::SlotSpec};

/// Configuration for an [`OnnxEngine`](super::OnnxEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnnxEngineConfig {
    /// Model artefact (ONNX graph) to load.
    pub model: OnnxArtefact,
    /// Input slots in the order the graph declares them.
    pub inputs: Vec<SlotSpec>,
    /// Name of the output holding the score or logits.
    pub output_name: String,
    /// Number of floats in that output, 1 or 2.
    pub output_len: usize,
    /// Intra-op thread count handed to ONNX Runtime.
    #[serde(default = "default_threads")]
    pub thread_count: usize,
}

fn default_threads() -> usize {
    DEFAULT_THREAD_COUNT
}
