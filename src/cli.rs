//! CLI argument types and layered configuration for the `verdict` binary.
//! Loads from CLI args, environment (prefix `VERDICT_`), and optional config
//! files.

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use ortho_config::OrthoError;
use serde::Deserialize;
use std::{io::Write, path::PathBuf, sync::Arc};
use thiserror::Error;

use crate::{
    config::{PipelineConfig, SequenceLengthMode},
    error::PipelineError,
    postprocess::LabelSet,
    preprocess::{Preprocessor, SequenceLength},
    tensor::{InputSlot, SlotSpec},
    tokenize::WhitespaceTokenizer,
    vocab::Vocabulary,
};

/// Errors raised while running the `verdict` command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("a vocabulary path is required (--vocab or VERDICT_VOCAB)")]
    MissingVocab,
    #[error("a model path is required unless --dry-run is set")]
    MissingModel,
    #[error("invalid input slot \"{0}\"; expected name=token_ids|attention_mask|segment_ids")]
    InvalidSlot(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[cfg(feature = "onnx")]
    #[error(transparent)]
    Onnx(#[from] crate::engine::onnx::OnnxEngineError),
    #[error("this build has no inference backend; rebuild with the `onnx` feature")]
    BackendUnavailable,
    #[error("failed to serialise output: {0}")]
    Serialise(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Command-line arguments for the `verdict` binary.
///
/// # Examples
///
/// Parse flags directly:
/// ```
/// use phrase_verdict::cli::VerdictArgs;
/// use ortho_config::OrthoConfig;
///
/// let args = VerdictArgs::load_from_iter(["verdict", "--dry-run=true", "--text", "hallo"])
///     .expect("load args from CLI iterator");
/// assert!(args.dry_run);
/// assert_eq!(args.text.as_deref(), Some("hallo"));
/// ```
///
/// Load from a configuration file:
/// ```
/// use phrase_verdict::cli::VerdictArgs;
/// use ortho_config::OrthoConfig;
/// use std::io::Write;
/// use tempfile::NamedTempFile;
///
/// let mut file = NamedTempFile::new().expect("create temp file");
/// writeln!(file, "output_arity = 1").expect("write config");
/// let path = file.path().to_str().expect("path str");
/// let args = VerdictArgs::load_from_iter(["verdict", "--config-path", path])
///     .expect("load args from config path");
/// assert_eq!(args.output_arity, 1);
/// ```
#[derive(Debug, Deserialize, ortho_config::OrthoConfig)]
#[ortho_config(prefix = "VERDICT")]
pub struct VerdictArgs {
    /// Phrase to classify.
    pub text: Option<String>,

    /// JSON vocabulary mapping tokens to ids.
    pub vocab: Option<PathBuf>,

    /// ONNX model file.
    pub model: Option<PathBuf>,

    /// Expected SHA-256 of the model file.
    pub model_sha256: Option<String>,

    /// Comma-separated `name=kind` input slots in model order.
    #[ortho_config(default = "input_ids=token_ids,attention_mask=attention_mask".to_string())]
    #[serde(default = "default_inputs")]
    pub inputs: String,

    /// Name of the model output holding the score or logits.
    #[ortho_config(default = "logits".to_string())]
    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Static sequence length declared by the model, if any.
    pub static_length: Option<usize>,

    /// Hard cap on positions, special tokens included.
    #[ortho_config(default = 512)]
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    /// Engine parallelism hint.
    #[ortho_config(default = 4)]
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Number of floats the model emits: 1 (score) or 2 (logits).
    #[ortho_config(default = 2)]
    #[serde(default = "default_output_arity")]
    pub output_arity: usize,

    /// Label reported for the positive class.
    pub positive_label: Option<String>,

    /// Label reported for the negative class.
    pub negative_label: Option<String>,

    /// Print the preprocessed input as JSON instead of running the model.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub dry_run: bool,

    /// Optional path to a configuration file.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

fn default_inputs() -> String {
    "input_ids=token_ids,attention_mask=attention_mask".into()
}

fn default_output_name() -> String {
    "logits".into()
}

fn default_max_sequence_length() -> usize {
    crate::preprocess::DEFAULT_MAX_SEQUENCE_LENGTH
}

fn default_thread_count() -> usize {
    crate::config::DEFAULT_THREAD_COUNT
}

fn default_output_arity() -> usize {
    2
}

impl VerdictArgs {
    /// Load configuration solely from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if any variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Env::prefixed("VERDICT_"))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if the file cannot be read or parsed.
    pub fn load_from_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from environment variables and a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if either source contains invalid values.
    pub fn load_from_env_and_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("VERDICT_"))
            .extract()
            .map_err(Into::into)
    }

    /// Pipeline settings implied by the arguments.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = LabelSet::default();
        PipelineConfig {
            max_sequence_length: self.max_sequence_length,
            thread_count: self.thread_count,
            output_arity: self.output_arity,
            sequence_length: SequenceLengthMode::Fixed,
            labels: LabelSet {
                positive: self.positive_label.clone().unwrap_or(defaults.positive),
                negative: self.negative_label.clone().unwrap_or(defaults.negative),
            },
            ..PipelineConfig::default()
        }
    }

    /// Parses `inputs` into slot declarations.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::InvalidSlot`] for entries that are not
    /// `name=kind` with a known kind.
    pub fn slot_specs(&self) -> Result<Vec<SlotSpec>, CliError> {
        self.inputs
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (name, kind) = entry
                    .split_once('=')
                    .ok_or_else(|| CliError::InvalidSlot(entry.to_owned()))?;
                let kind = match kind.trim() {
                    "token_ids" => InputSlot::TokenIds,
                    "attention_mask" => InputSlot::AttentionMask,
                    "segment_ids" => InputSlot::SegmentIds,
                    _ => return Err(CliError::InvalidSlot(entry.to_owned())),
                };
                Ok(SlotSpec::new(name.trim(), kind, self.static_length))
            })
            .collect()
    }
}

/// Executes the command described by `args`, writing the result to `out`.
///
/// # Errors
///
/// Returns [`CliError`] when required paths are missing, artefacts fail to
/// load, or classification fails.
pub fn run(args: &VerdictArgs, out: &mut impl Write) -> Result<(), CliError> {
    let config = args.pipeline_config().validate().map_err(PipelineError::from)?;
    let vocab_path = args.vocab.as_deref().ok_or(CliError::MissingVocab)?;
    let vocab = Vocabulary::from_file(vocab_path, &config.special_tokens)
        .map_err(PipelineError::from)?;
    let text = args.text.as_deref().unwrap_or_default();

    if args.dry_run {
        let length = args
            .static_length
            .map_or(SequenceLength::Dynamic, SequenceLength::Fixed);
        let input = Preprocessor::new(config.max_sequence_length, length)?.preprocess(
            text,
            &WhitespaceTokenizer,
            &vocab,
        )?;
        serde_json::to_writer(&mut *out, &input)?;
        writeln!(out)?;
        return Ok(());
    }

    let label = classify_with_model(args, &config, Arc::new(vocab), text)?;
    writeln!(out, "{label}")?;
    Ok(())
}

#[cfg(feature = "onnx")]
fn classify_with_model(
    args: &VerdictArgs,
    config: &PipelineConfig,
    vocab: Arc<Vocabulary>,
    text: &str,
) -> Result<String, CliError> {
    use crate::{
        Pipeline,
        engine::onnx::{OnnxArtefact, OnnxEngine, OnnxEngineConfig},
    };

    let model = args.model.clone().ok_or(CliError::MissingModel)?;
    let engine = OnnxEngine::new(OnnxEngineConfig {
        model: OnnxArtefact {
            path: model,
            sha256: args.model_sha256.clone(),
        },
        inputs: args.slot_specs()?,
        output_name: args.output_name.clone(),
        output_len: config.output_arity,
        thread_count: config.thread_count,
    })?;
    Ok(Pipeline::new(config, vocab, engine)?.classify(text)?)
}

#[cfg(not(feature = "onnx"))]
fn classify_with_model(
    args: &VerdictArgs,
    _config: &PipelineConfig,
    _vocab: Arc<Vocabulary>,
    _text: &str,
) -> Result<String, CliError> {
    args.model.as_ref().ok_or(CliError::MissingModel)?;
    args.slot_specs()?;
    Err(CliError::BackendUnavailable)
}
