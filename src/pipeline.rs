//! End-to-end phrase classification.
//!
//! A [`Pipeline`] owns the immutable state produced at load time (vocabulary,
//! tokenizer, preprocessing policy, engine, output policy). Every call works
//! on per-call buffers only, so a pipeline with a thread-safe engine can be
//! shared across threads without locking.

use std::{fmt, sync::Arc};

use crate::{
    api::{Classifier, Trace},
    config::{PipelineConfig, SequenceLengthMode},
    engine::{self, InferenceEngine},
    error::PipelineError,
    postprocess::{Label, LabelSet, OutputPolicy},
    preprocess::{PreprocessedInput, Preprocessor, SequenceLength},
    providers::TextProcessor,
    tensor::{self, InputSlot},
    tokenize::{Tokenize, WhitespaceTokenizer},
    vocab::Vocabulary,
};

/// Tokenise → assemble → run → postprocess.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use phrase_verdict::{
///     Pipeline, PipelineConfig,
///     tensor::{InputSlot, SlotSpec},
///     tests::support::StubEngine,
///     vocab::{SpecialTokens, Vocabulary},
/// };
///
/// let vocab = Vocabulary::from_json(
///     r#"{"[UNK]": 1, "[CLS]": 2, "[SEP]": 3}"#,
///     &SpecialTokens::default(),
/// )
/// .expect("valid vocabulary");
/// let engine = StubEngine::new(
///     vec![SlotSpec::new("input_ids", InputSlot::TokenIds, Some(8))],
///     vec![-0.3, 1.2],
/// );
/// let pipeline = Pipeline::new(&PipelineConfig::default(), Arc::new(vocab), engine)
///     .expect("pipeline");
/// assert_eq!(pipeline.classify("dat is mooi").expect("classify"), "Positive");
/// ```
pub struct Pipeline<E> {
    vocab: Arc<Vocabulary>,
    tokenizer: Box<dyn Tokenize + Send + Sync>,
    preprocessor: Preprocessor,
    engine: E,
    policy: OutputPolicy,
    labels: LabelSet,
}

impl<E: fmt::Debug> fmt::Debug for Pipeline<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("vocab_size", &self.vocab.len())
            .field("preprocessor", &self.preprocessor)
            .field("engine", &self.engine)
            .field("policy", &self.policy)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl<E: InferenceEngine> Pipeline<E> {
    /// Builds a pipeline around a loaded engine using whitespace tokenisation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for invalid configuration,
    /// [`PipelineError::MissingTokenIdsSlot`] when the engine takes no token
    /// ids, [`PipelineError::UnsupportedOutputShape`] when the engine emits
    /// neither one nor two values, [`PipelineError::OutputArity`] when its
    /// output size disagrees with `output_arity`, and [`PipelineError::ShapeMismatch`] when
    /// slots declare conflicting static lengths.
    pub fn new(
        config: &PipelineConfig,
        vocab: Arc<Vocabulary>,
        engine: E,
    ) -> Result<Self, PipelineError> {
        let config = config.clone().validate()?;
        let slots = engine.input_slots();
        if !slots.iter().any(|slot| slot.kind == InputSlot::TokenIds) {
            return Err(PipelineError::MissingTokenIdsSlot);
        }
        let declared = engine.declared_sequence_length();
        if let Some(expected) = declared {
            if let Some(slot) = slots
                .iter()
                .find(|slot| slot.sequence_length.is_some_and(|len| len != expected))
            {
                return Err(PipelineError::ShapeMismatch {
                    slot: slot.kind,
                    expected,
                    actual: slot.sequence_length.unwrap_or_default(),
                });
            }
        }
        match engine.output_len() {
            actual if !matches!(actual, 1 | 2) => {
                return Err(PipelineError::UnsupportedOutputShape { actual });
            }
            actual if actual != config.output_arity => {
                return Err(PipelineError::OutputArity {
                    expected: config.output_arity,
                    actual,
                });
            }
            _ => {}
        }

        // A static input shape accepts nothing else, whatever the mode.
        let length = match (config.sequence_length, declared) {
            (SequenceLengthMode::Fixed, Some(fixed)) => SequenceLength::Fixed(fixed),
            (SequenceLengthMode::Dynamic, Some(fixed)) => {
                tracing::debug!(fixed, "model declares a static sequence length; padding to it");
                SequenceLength::Fixed(fixed)
            }
            (SequenceLengthMode::Fixed, None) => {
                tracing::debug!("model declares no static sequence length; using dynamic length");
                SequenceLength::Dynamic
            }
            (SequenceLengthMode::Dynamic, None) => SequenceLength::Dynamic,
        };
        let preprocessor = Preprocessor::new(config.max_sequence_length, length)?;
        let policy = OutputPolicy::for_arity(config.output_arity, config.threshold)?;
        tracing::info!(
            slots = slots.len(),
            ?length,
            arity = policy.arity(),
            "pipeline ready"
        );

        Ok(Self {
            vocab,
            tokenizer: Box::new(WhitespaceTokenizer),
            preprocessor,
            engine,
            policy,
            labels: config.labels,
        })
    }

    /// Replaces the tokenisation policy.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: impl Tokenize + Send + Sync + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn policy(&self) -> OutputPolicy {
        self.policy
    }

    /// Builds the encoder input for `text` without running the model.
    ///
    /// # Errors
    ///
    /// See [`Preprocessor::preprocess`].
    pub fn preprocess(&self, text: &str) -> Result<PreprocessedInput, PipelineError> {
        self.preprocessor
            .preprocess(text, self.tokenizer.as_ref(), &self.vocab)
    }

    /// Runs the full pipeline and returns the structured label.
    ///
    /// # Errors
    ///
    /// Returns shape, arity and engine errors; unknown words never fail.
    pub fn label(&self, text: &str) -> Result<Label, PipelineError> {
        let input = self.preprocess(text)?;
        self.label_input(&input)
    }

    fn label_input(&self, input: &PreprocessedInput) -> Result<Label, PipelineError> {
        let buffers = tensor::assemble(input, self.engine.input_slots())?;
        let outputs = engine::invoke(&self.engine, &buffers)?;
        let output = outputs.first().ok_or(PipelineError::MissingOutput)?;
        let label = self.policy.decide(output.data(), &self.labels)?;
        tracing::debug!(label = %label.text, scores = ?label.scores, "classified");
        Ok(label)
    }

    /// Classifies `text` and returns the label string.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::label`].
    pub fn classify(&self, text: &str) -> Result<String, PipelineError> {
        self.label(text).map(|label| label.text)
    }

    /// Classifies `text` and records the intermediate counts and scores.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::label`].
    pub fn trace(&self, text: &str) -> Result<Trace, PipelineError> {
        let input = self.preprocess(text)?;
        let label = self.label_input(&input)?;
        Ok(Trace {
            text: text.to_owned(),
            token_count: input.real_count(),
            label: label.text,
            scores: label.scores,
        })
    }
}

impl<E: InferenceEngine> Classifier for Pipeline<E> {
    type Error = PipelineError;

    fn classify(&self, text: &str) -> Result<String, Self::Error> {
        Pipeline::classify(self, text)
    }

    fn trace(&self, text: &str) -> Result<Trace, Self::Error> {
        Pipeline::trace(self, text)
    }
}

impl<E> TextProcessor for Pipeline<E>
where
    E: InferenceEngine + Send + Sync,
{
    type Output = Label;
    type Error = PipelineError;

    fn process(&self, input: &str) -> Result<Self::Output, Self::Error> {
        self.label(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tensor::{SlotSpec, TensorBuffer},
        tests::support::StubEngine,
        vocab::SpecialTokens,
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn vocab() -> Arc<Vocabulary> {
        let json = r#"{"[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3, "goed": 10, "fout": 11}"#;
        Arc::new(
            Vocabulary::from_json(json, &SpecialTokens::default())
                .unwrap_or_else(|e| panic!("fixture vocabulary: {e}")),
        )
    }

    fn slots(len: Option<usize>) -> Vec<SlotSpec> {
        vec![
            SlotSpec::new("input_ids", InputSlot::TokenIds, len),
            SlotSpec::new("attention_mask", InputSlot::AttentionMask, len),
        ]
    }

    fn single_score() -> PipelineConfig {
        PipelineConfig {
            output_arity: 1,
            labels: LabelSet::dutch(),
            ..PipelineConfig::default()
        }
    }

    #[rstest]
    fn classifies_single_score(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(slots(Some(6)), vec![0.9]);
        let pipeline = Pipeline::new(&single_score(), vocab, engine)
            .unwrap_or_else(|e| panic!("pipeline: {e}"));
        assert_eq!(
            pipeline.classify("goed zo").unwrap_or_else(|e| panic!("{e}")),
            "Ja"
        );
        let inputs = pipeline
            .engine()
            .last_inputs()
            .unwrap_or_else(|| panic!("engine not run"));
        let data: Vec<&[f32]> = inputs.iter().map(TensorBuffer::data).collect();
        assert_eq!(
            data,
            vec![
                &[2.0, 10.0, 1.0, 3.0, 0.0, 0.0][..],
                &[1.0, 1.0, 1.0, 1.0, 0.0, 0.0][..],
            ]
        );
    }

    #[rstest]
    fn dynamic_mode_ignores_declared_length(vocab: Arc<Vocabulary>) {
        let config = PipelineConfig {
            sequence_length: SequenceLengthMode::Dynamic,
            ..PipelineConfig::default()
        };
        let engine = StubEngine::new(slots(None), vec![0.0, 1.0]);
        let pipeline =
            Pipeline::new(&config, vocab, engine).unwrap_or_else(|e| panic!("pipeline: {e}"));
        let input = pipeline.preprocess("goed").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(input.token_ids, vec![2, 10, 3]);
    }

    #[rstest]
    fn fixed_mode_without_static_shape_falls_back(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(slots(None), vec![0.0, 1.0]);
        let pipeline = Pipeline::new(&PipelineConfig::default(), vocab, engine)
            .unwrap_or_else(|e| panic!("pipeline: {e}"));
        assert_eq!(
            pipeline
                .preprocess("goed fout")
                .map(|input| input.len())
                .ok(),
            Some(4)
        );
    }

    #[rstest]
    fn rejects_output_arity_disagreement(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(slots(Some(8)), vec![0.1, 0.9]);
        assert!(matches!(
            Pipeline::new(&single_score(), vocab, engine),
            Err(PipelineError::OutputArity {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[rstest]
    fn rejects_engine_without_token_ids(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(
            vec![SlotSpec::new("mask", InputSlot::AttentionMask, None)],
            vec![0.5],
        );
        assert!(matches!(
            Pipeline::new(&single_score(), vocab, engine),
            Err(PipelineError::MissingTokenIdsSlot)
        ));
    }

    #[rstest]
    fn rejects_conflicting_static_lengths(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(
            vec![
                SlotSpec::new("input_ids", InputSlot::TokenIds, Some(8)),
                SlotSpec::new("token_type_ids", InputSlot::SegmentIds, Some(16)),
            ],
            vec![0.5],
        );
        assert!(matches!(
            Pipeline::new(&single_score(), vocab, engine),
            Err(PipelineError::ShapeMismatch {
                slot: InputSlot::SegmentIds,
                expected: 8,
                actual: 16
            })
        ));
    }

    #[rstest]
    fn rejects_invalid_config(vocab: Arc<Vocabulary>) {
        let config = PipelineConfig {
            output_arity: 3,
            ..PipelineConfig::default()
        };
        let engine = StubEngine::new(slots(None), vec![0.1, 0.2, 0.7]);
        assert!(matches!(
            Pipeline::new(&config, vocab, engine),
            Err(PipelineError::Config(_))
        ));
    }

    #[rstest]
    fn engine_returning_wrong_size_is_reported(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::with_responder(slots(None), 2, |_| Ok(vec![0.1, 0.2, 0.7]));
        let pipeline = Pipeline::new(&PipelineConfig::default(), vocab, engine)
            .unwrap_or_else(|e| panic!("pipeline: {e}"));
        assert!(matches!(
            pipeline.classify("goed"),
            Err(PipelineError::UnsupportedOutputShape { actual: 3 })
        ));
    }

    #[rstest]
    fn single_score_engine_returning_nothing_is_unsupported(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::with_responder(slots(None), 1, |_| Ok(Vec::new()));
        let pipeline = Pipeline::new(&single_score(), vocab, engine)
            .unwrap_or_else(|e| panic!("pipeline: {e}"));
        assert!(matches!(
            pipeline.classify("goed"),
            Err(PipelineError::UnsupportedOutputShape { actual: 0 })
        ));
    }

    #[rstest]
    fn engine_declaring_unsupported_output_len_is_rejected(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(slots(None), vec![0.1, 0.2, 0.7]);
        assert!(matches!(
            Pipeline::new(&PipelineConfig::default(), vocab, engine),
            Err(PipelineError::UnsupportedOutputShape { actual: 3 })
        ));
    }

    #[rstest]
    fn dynamic_mode_pads_to_declared_static_length(vocab: Arc<Vocabulary>) {
        let config = PipelineConfig {
            sequence_length: SequenceLengthMode::Dynamic,
            ..PipelineConfig::default()
        };
        let engine = StubEngine::new(slots(Some(8)), vec![0.0, 1.0]);
        let pipeline =
            Pipeline::new(&config, vocab, engine).unwrap_or_else(|e| panic!("pipeline: {e}"));
        assert_eq!(
            pipeline.classify("de kat").unwrap_or_else(|e| panic!("{e}")),
            "Positive"
        );
        let inputs = pipeline
            .engine()
            .last_inputs()
            .unwrap_or_else(|| panic!("engine not run"));
        assert!(inputs.iter().all(|buffer| buffer.shape() == [1, 8]));
    }

    #[rstest]
    fn trace_reports_unpadded_count(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(slots(Some(16)), vec![2.0, 2.0]);
        let pipeline = Pipeline::new(&PipelineConfig::default(), vocab, engine)
            .unwrap_or_else(|e| panic!("pipeline: {e}"));
        let trace = pipeline
            .trace("goed fout onbekend")
            .unwrap_or_else(|e| panic!("trace: {e}"));
        assert_eq!(trace.token_count, 5);
        assert_eq!(trace.label, "Negative");
        assert_eq!(trace.scores, vec![0.5, 0.5]);
    }

    #[rstest]
    fn custom_tokenizer_is_used(vocab: Arc<Vocabulary>) {
        struct Letters;
        impl Tokenize for Letters {
            fn tokenize(&self, text: &str) -> Vec<String> {
                text.chars().map(String::from).collect()
            }
        }
        let engine = StubEngine::new(slots(None), vec![0.0, 1.0]);
        let pipeline = Pipeline::new(&PipelineConfig::default(), vocab, engine)
            .unwrap_or_else(|e| panic!("pipeline: {e}"))
            .with_tokenizer(Letters);
        let input = pipeline.preprocess("ab").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(input.token_ids, vec![2, 1, 1, 3]);
    }

    #[rstest]
    fn works_as_a_label_provider(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(slots(None), vec![1.0, -1.0]);
        let provider: Box<crate::LabelProvider<PipelineError>> = Box::new(
            Pipeline::new(&PipelineConfig::default(), vocab, engine)
                .unwrap_or_else(|e| panic!("pipeline: {e}")),
        );
        let label = provider
            .process("fout")
            .unwrap_or_else(|e| panic!("process: {e}"));
        assert!(!label.positive);
        assert_eq!(label.text, "Negative");
    }

    #[rstest]
    fn is_shareable_across_threads(vocab: Arc<Vocabulary>) {
        let engine = StubEngine::new(slots(Some(8)), vec![0.2, 0.8]);
        let pipeline = Arc::new(
            Pipeline::new(&PipelineConfig::default(), vocab, engine)
                .unwrap_or_else(|e| panic!("pipeline: {e}")),
        );
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                std::thread::spawn(move || pipeline.classify("goed"))
            })
            .collect();
        for handle in handles {
            let label = handle
                .join()
                .unwrap_or_else(|_| panic!("worker panicked"))
                .unwrap_or_else(|e| panic!("classify: {e}"));
            assert_eq!(label, "Positive");
        }
        assert_eq!(pipeline.engine().calls(), 4);
    }
}
