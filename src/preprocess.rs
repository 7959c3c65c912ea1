//! Turns free text into the three parallel integer arrays a BERT-style
//! encoder expects.
//!
//! Tokens beyond `max_sequence_length - 2` are dropped from the end, the
//! sequence is wrapped in begin/end markers, mapped through the vocabulary and
//! padded to the target length.

use serde::{Deserialize, Serialize};

use crate::{
    error::PipelineError,
    tensor::InputSlot,
    tokenize::{Tokenize, WhitespaceTokenizer},
    vocab::Vocabulary,
};

/// Default cap on the number of positions fed to the encoder.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// Number of positions reserved for the begin and end markers.
const SPECIAL_TOKEN_COUNT: usize = 2;

/// Target length policy for the assembled arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceLength {
    /// Pad every sequence to the model's statically declared length.
    Fixed(usize),
    /// Use the post-special-token count without padding.
    Dynamic,
}

/// Encoder input for a single phrase.
///
/// All three arrays share one length; padding positions carry the pad id, a
/// zero segment id and a zero mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessedInput {
    pub token_ids: Vec<u32>,
    pub segment_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl PreprocessedInput {
    /// Common length of the three arrays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Number of real and special positions, i.e. the unmasked prefix.
    #[must_use]
    pub fn real_count(&self) -> usize {
        self.attention_mask.iter().take_while(|m| **m == 1).count()
    }

    /// Returns the array backing `slot`.
    #[must_use]
    pub fn slot(&self, slot: InputSlot) -> &[u32] {
        match slot {
            InputSlot::TokenIds => &self.token_ids,
            InputSlot::AttentionMask => &self.attention_mask,
            InputSlot::SegmentIds => &self.segment_ids,
        }
    }

    /// Checks that the auxiliary arrays match the token id array.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ShapeMismatch`] naming the first array whose
    /// length differs.
    pub fn check_lengths(&self) -> Result<(), PipelineError> {
        let expected = self.token_ids.len();
        for slot in [InputSlot::SegmentIds, InputSlot::AttentionMask] {
            let actual = self.slot(slot).len();
            if actual != expected {
                return Err(PipelineError::ShapeMismatch {
                    slot,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Applies truncation, special tokens and padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    max_sequence_length: usize,
    length: SequenceLength,
}

impl Preprocessor {
    /// Creates a preprocessor capped at `max_sequence_length` positions.
    ///
    /// With [`SequenceLength::Fixed`] the effective cap is the smaller of the
    /// two lengths so real tokens are never padded past the model's shape.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ZeroSequenceLength`] for a zero cap and
    /// [`PipelineError::SequenceTooShort`] when fewer than two positions are
    /// available.
    pub fn new(max_sequence_length: usize, length: SequenceLength) -> Result<Self, PipelineError> {
        if max_sequence_length == 0 {
            return Err(PipelineError::ZeroSequenceLength);
        }
        if max_sequence_length < SPECIAL_TOKEN_COUNT {
            return Err(PipelineError::SequenceTooShort {
                max: max_sequence_length,
            });
        }
        if let SequenceLength::Fixed(fixed) = length {
            if fixed < SPECIAL_TOKEN_COUNT {
                return Err(PipelineError::SequenceTooShort { max: fixed });
            }
        }
        Ok(Self {
            max_sequence_length,
            length,
        })
    }

    #[must_use]
    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    #[must_use]
    pub fn length(&self) -> SequenceLength {
        self.length
    }

    fn cap(&self) -> usize {
        match self.length {
            SequenceLength::Fixed(fixed) => fixed.min(self.max_sequence_length),
            SequenceLength::Dynamic => self.max_sequence_length,
        }
    }

    /// Tokenises `text` and builds the encoder input.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ShapeMismatch`] if the arrays end up with
    /// different lengths.
    pub fn preprocess<T>(
        &self,
        text: &str,
        tokenizer: &T,
        vocab: &Vocabulary,
    ) -> Result<PreprocessedInput, PipelineError>
    where
        T: Tokenize + ?Sized,
    {
        let tokens = tokenizer.tokenize(text);
        let kept = tokens.len().min(self.cap() - SPECIAL_TOKEN_COUNT);
        let real_count = kept + SPECIAL_TOKEN_COUNT;
        let target = match self.length {
            SequenceLength::Fixed(fixed) => fixed,
            SequenceLength::Dynamic => real_count,
        };

        let mut token_ids = Vec::with_capacity(target);
        token_ids.push(vocab.begin_id());
        token_ids.extend(tokens.iter().take(kept).map(|token| vocab.lookup(token)));
        token_ids.push(vocab.end_id());
        token_ids.resize(target, vocab.pad_id());

        let mut attention_mask = vec![1; real_count];
        attention_mask.resize(target, 0);

        let input = PreprocessedInput {
            token_ids,
            segment_ids: vec![0; target],
            attention_mask,
        };
        input.check_lengths()?;
        tracing::debug!(
            tokens = tokens.len(),
            kept,
            length = input.len(),
            "preprocessed input"
        );
        Ok(input)
    }
}

/// Whitespace-tokenises `text` and wraps it without padding.
///
/// # Errors
///
/// Returns the construction errors of [`Preprocessor::new`].
///
/// # Examples
///
/// ```
/// use phrase_verdict::{preprocess, vocab::{SpecialTokens, Vocabulary}};
///
/// let vocab = Vocabulary::from_json(
///     r#"{"[UNK]": 1, "[CLS]": 2, "[SEP]": 3, "goed": 9}"#,
///     &SpecialTokens::default(),
/// )
/// .expect("valid vocabulary");
/// let input = preprocess::preprocess("goed zo", &vocab, 512).expect("preprocess");
/// assert_eq!(input.token_ids, vec![2, 9, 1, 3]);
/// assert_eq!(input.attention_mask, vec![1, 1, 1, 1]);
/// ```
pub fn preprocess(
    text: &str,
    vocab: &Vocabulary,
    max_sequence_length: usize,
) -> Result<PreprocessedInput, PipelineError> {
    Preprocessor::new(max_sequence_length, SequenceLength::Dynamic)?.preprocess(
        text,
        &WhitespaceTokenizer,
        vocab,
    )
}
