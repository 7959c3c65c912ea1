//! Text processing interface shared by classifiers.

/// Processes text to produce a structured, thread-safe output.
///
/// [`Pipeline`](crate::Pipeline) implements this with `Output = Label` so it
/// can be stored behind a trait object alongside other text processors.
pub trait TextProcessor {
    /// Structured result returned by the processor.
    ///
    /// Outputs must be `Send + Sync + 'static` so they can be safely shared
    /// across threads and stored in trait objects without borrowing.
    type Output: Send + Sync + 'static;
    /// Error type returned when processing fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Process the supplied text.
    ///
    /// # Errors
    ///
    /// Returns an error if processing fails.
    fn process(&self, input: &str) -> Result<Self::Output, Self::Error>;
}

/// Phrase classifier usable as a trait object.
pub type LabelProvider<E> =
    dyn TextProcessor<Output = crate::postprocess::Label, Error = E> + Send + Sync + 'static;
