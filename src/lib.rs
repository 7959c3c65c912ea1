//! Core library entry point.
//! Re-exports public types and traits.

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod providers;
pub mod tensor;
pub mod tokenize;
pub mod vocab;

pub use api::{Classifier, Trace};
#[cfg(feature = "cli")]
pub use cli::VerdictArgs;
pub use config::{ConfigError, PipelineConfig, SequenceLengthMode};
pub use engine::InferenceEngine;
pub use error::{EngineError, PipelineError};
pub use pipeline::Pipeline;
pub use postprocess::{Label, LabelSet, OutputPolicy};
pub use preprocess::{PreprocessedInput, Preprocessor, SequenceLength};
pub use providers::{LabelProvider, TextProcessor};
pub use tokenize::{Tokenize, WhitespaceTokenizer};
pub use vocab::{SpecialTokens, Vocabulary, VocabularyLoadError};

pub mod tests;
