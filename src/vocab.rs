//! Token vocabulary loaded once from a serialised `{token: id}` table.
//!
//! Lookups never fail: tokens missing from the table resolve to the id of the
//! unknown sentinel so out-of-vocabulary words cannot abort inference.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest id whose `f32` encoding is exact.
pub const MAX_EXACT_ID: u32 = 1 << 24;

/// Errors raised while loading a [`Vocabulary`].
#[derive(Debug, Error)]
pub enum VocabularyLoadError {
    #[error("failed to read vocabulary at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("vocabulary is not a string-to-integer table: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("vocabulary is missing required token \"{token}\"")]
    MissingSentinel { token: String },
    #[error("token \"{token}\" has id {id} which exceeds the exact f32 range")]
    IdOutOfRange { token: String, id: u32 },
}

/// Reserved tokens wrapped around every sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecialTokens {
    /// Sentinel substituted for out-of-vocabulary tokens.
    pub unknown: String,
    /// Marker prepended to every sequence.
    pub begin: String,
    /// Marker appended to every sequence.
    pub end: String,
    /// Id written into padding positions.
    pub pad_id: u32,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            unknown: "[UNK]".into(),
            begin: "[CLS]".into(),
            end: "[SEP]".into(),
            pad_id: 0,
        }
    }
}

/// Immutable token-to-id mapping.
///
/// # Examples
///
/// ```
/// use phrase_verdict::vocab::{SpecialTokens, Vocabulary};
///
/// let json = r#"{"[UNK]": 1, "[CLS]": 2, "[SEP]": 3, "hallo": 7}"#;
/// let vocab = Vocabulary::from_json(json, &SpecialTokens::default())
///     .expect("valid vocabulary");
/// assert_eq!(vocab.lookup("hallo"), 7);
/// assert_eq!(vocab.lookup("onbekend"), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
    unknown_id: u32,
    begin_id: u32,
    end_id: u32,
    pad_id: u32,
}

impl Vocabulary {
    /// Parses a JSON object mapping token strings to non-negative ids.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyLoadError`] when the table is malformed, lacks one of
    /// the configured special tokens, or holds an id at or above
    /// [`MAX_EXACT_ID`].
    pub fn from_json(json: &str, special: &SpecialTokens) -> Result<Self, VocabularyLoadError> {
        let ids: HashMap<String, u32> =
            serde_json::from_str(json).map_err(VocabularyLoadError::Parse)?;
        Self::from_map(ids, special)
    }

    /// Reads and parses a JSON vocabulary file.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyLoadError::Io`] when the file cannot be read and the
    /// errors of [`Vocabulary::from_json`] otherwise.
    pub fn from_file(path: &Path, special: &SpecialTokens) -> Result<Self, VocabularyLoadError> {
        let json = fs::read_to_string(path).map_err(|source| VocabularyLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let vocab = Self::from_json(&json, special)?;
        tracing::info!(path = %path.display(), size = vocab.len(), "vocabulary loaded");
        Ok(vocab)
    }

    /// Builds a vocabulary from an already decoded table.
    ///
    /// # Errors
    ///
    /// See [`Vocabulary::from_json`].
    pub fn from_map(
        ids: HashMap<String, u32>,
        special: &SpecialTokens,
    ) -> Result<Self, VocabularyLoadError> {
        if let Some((token, id)) = ids.iter().find(|(_, id)| **id >= MAX_EXACT_ID) {
            return Err(VocabularyLoadError::IdOutOfRange {
                token: token.clone(),
                id: *id,
            });
        }
        let required = |token: &str| {
            ids.get(token)
                .copied()
                .ok_or_else(|| VocabularyLoadError::MissingSentinel {
                    token: token.to_owned(),
                })
        };
        let unknown_id = required(&special.unknown)?;
        let begin_id = required(&special.begin)?;
        let end_id = required(&special.end)?;
        if special.pad_id >= MAX_EXACT_ID {
            return Err(VocabularyLoadError::IdOutOfRange {
                token: "<pad>".into(),
                id: special.pad_id,
            });
        }
        Ok(Self {
            ids,
            unknown_id,
            begin_id,
            end_id,
            pad_id: special.pad_id,
        })
    }

    /// Returns the id of `token`, or the unknown sentinel's id when absent.
    #[must_use]
    pub fn lookup(&self, token: &str) -> u32 {
        self.ids.get(token).copied().unwrap_or(self.unknown_id)
    }

    #[must_use]
    pub fn unknown_id(&self) -> u32 {
        self.unknown_id
    }

    #[must_use]
    pub fn begin_id(&self) -> u32 {
        self.begin_id
    }

    #[must_use]
    pub fn end_id(&self) -> u32 {
        self.end_id
    }

    #[must_use]
    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// Number of distinct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
