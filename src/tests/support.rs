//! Test doubles and float helpers.

use std::{
    fmt,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    engine::InferenceEngine,
    error::EngineError,
    tensor::{SlotSpec, TensorBuffer},
};

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

type Responder = Box<dyn Fn(&[TensorBuffer]) -> Result<Vec<f32>, String> + Send + Sync>;

/// Scripted engine that records how often and with what it was run.
pub struct StubEngine {
    slots: Vec<SlotSpec>,
    output_len: usize,
    respond: Responder,
    calls: AtomicUsize,
    last_inputs: Mutex<Option<Vec<TensorBuffer>>>,
}

impl fmt::Debug for StubEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubEngine")
            .field("slots", &self.slots)
            .field("output_len", &self.output_len)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl StubEngine {
    /// Engine that always returns `output`.
    #[must_use]
    pub fn new(slots: Vec<SlotSpec>, output: Vec<f32>) -> Self {
        let output_len = output.len();
        Self::with_responder(slots, output_len, move |_| Ok(output.clone()))
    }

    /// Engine whose output is computed from the inputs it receives.
    #[must_use]
    pub fn with_responder<F>(slots: Vec<SlotSpec>, output_len: usize, respond: F) -> Self
    where
        F: Fn(&[TensorBuffer]) -> Result<Vec<f32>, String> + Send + Sync + 'static,
    {
        Self {
            slots,
            output_len,
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            last_inputs: Mutex::new(None),
        }
    }

    /// Engine whose every run fails.
    #[must_use]
    pub fn failing(slots: Vec<SlotSpec>, output_len: usize) -> Self {
        Self::with_responder(slots, output_len, |_| Err("backend unavailable".into()))
    }

    /// Number of completed or attempted runs.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Buffers passed to the most recent run.
    #[must_use]
    pub fn last_inputs(&self) -> Option<Vec<TensorBuffer>> {
        self.last_inputs
            .lock()
            .map_or(None, |guard| guard.clone())
    }
}

impl InferenceEngine for StubEngine {
    fn input_slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn run(&self, inputs: &[TensorBuffer]) -> Result<Vec<TensorBuffer>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_inputs.lock() {
            *guard = Some(inputs.to_vec());
        }
        let output = (self.respond)(inputs).map_err(EngineError::new)?;
        Ok(vec![TensorBuffer::row(output)])
    }
}
