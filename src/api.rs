use serde::{Deserialize, Serialize};

/// Diagnostic record for a single classification.
///
/// # Examples
///
/// ```
/// use phrase_verdict::api::Trace;
///
/// let trace = Trace {
///     text: "dit klopt".into(),
///     token_count: 4,
///     label: "Ja".into(),
///     scores: vec![0.9],
/// };
/// assert_eq!(trace.label, "Ja");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub text: String,
    /// Unpadded positions fed to the model, begin/end markers included.
    pub token_count: usize,
    pub label: String,
    /// Raw score or class probabilities, depending on the output policy.
    pub scores: Vec<f32>,
}

/// Trait for turning a phrase into a verdict label.
pub trait Classifier {
    /// Error type returned when classification fails.
    type Error: std::error::Error + Send + Sync;

    /// Classify a phrase and return its label string.
    ///
    /// # Errors
    ///
    /// Returns an error if classification fails.
    fn classify(&self, text: &str) -> Result<String, Self::Error>;

    /// Produce a diagnostic trace for a phrase.
    ///
    /// # Errors
    ///
    /// Returns an error if trace generation fails.
    fn trace(&self, text: &str) -> Result<Trace, Self::Error>;
}
