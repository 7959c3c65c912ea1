//! Tokenisation policies feeding the preprocessor.
//!
//! Any policy works as long as it yields an ordered sequence of strings for
//! every input. Whitespace splitting is the baseline; a subword tokenizer
//! backed by the `tokenizers` crate is available behind the `subword` feature.

/// Splits raw text into an ordered token sequence.
///
/// Implementations must be total and deterministic: every input produces a
/// sequence (possibly empty) and equal inputs produce equal sequences.
pub trait Tokenize {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Splits on Unicode whitespace, keeping tokens verbatim.
///
/// # Examples
///
/// ```
/// use phrase_verdict::tokenize::{Tokenize, WhitespaceTokenizer};
///
/// let tokens = WhitespaceTokenizer.tokenize("  ik  ben\tblij ");
/// assert_eq!(tokens, vec!["ik", "ben", "blij"]);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenize for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_owned).collect()
    }
}

#[cfg(feature = "subword")]
pub use subword::{SubwordTokenizer, SubwordTokenizerError};

#[cfg(feature = "subword")]
mod subword {
    use std::path::{Path, PathBuf};

    use thiserror::Error;
    use tokenizers::Tokenizer;

    use super::{Tokenize, WhitespaceTokenizer};

    /// Errors raised while loading a [`SubwordTokenizer`].
    #[derive(Debug, Error)]
    pub enum SubwordTokenizerError {
        #[error("failed to load tokenizer from {path}: {source}")]
        Load {
            path: PathBuf,
            #[source]
            source: tokenizers::Error,
        },
    }

    /// Subword tokenizer loaded from a `tokenizer.json` artefact.
    ///
    /// Only the token strings are used; special tokens, truncation and padding
    /// are left to the preprocessor so every policy shares one path.
    #[derive(Debug)]
    pub struct SubwordTokenizer {
        inner: Tokenizer,
    }

    impl SubwordTokenizer {
        /// Loads a serialised Hugging Face tokenizer.
        ///
        /// # Errors
        ///
        /// Returns [`SubwordTokenizerError::Load`] when the file is missing or
        /// cannot be parsed.
        pub fn from_file(path: &Path) -> Result<Self, SubwordTokenizerError> {
            let mut inner =
                Tokenizer::from_file(path).map_err(|source| SubwordTokenizerError::Load {
                    path: path.to_path_buf(),
                    source,
                })?;
            inner.with_padding(None);
            // Clearing truncation cannot fail.
            let _ = inner.with_truncation(None);
            Ok(Self { inner })
        }
    }

    impl Tokenize for SubwordTokenizer {
        fn tokenize(&self, text: &str) -> Vec<String> {
            match self.inner.encode(text, false) {
                Ok(encoding) => encoding.get_tokens().to_vec(),
                Err(error) => {
                    tracing::warn!(%error, "subword encoding failed; splitting on whitespace");
                    WhitespaceTokenizer.tokenize(text)
                }
            }
        }
    }

}
