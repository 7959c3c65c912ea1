//! Maps raw model outputs to a discrete verdict.
//!
//! The policy is chosen once from the model's declared output arity:
//! a single correctness score is thresholded, two class logits go through a
//! max-shifted softmax and an argmax that prefers the lower index on ties.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Default decision threshold for single-score models.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Label strings reported for each class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelSet {
    pub positive: String,
    pub negative: String,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            positive: "Positive".into(),
            negative: "Negative".into(),
        }
    }
}

impl LabelSet {
    /// Labels used by the Dutch keyboard deployment.
    #[must_use]
    pub fn dutch() -> Self {
        Self {
            positive: "Ja".into(),
            negative: "Nee".into(),
        }
    }

    fn pick(&self, positive: bool) -> &str {
        if positive {
            &self.positive
        } else {
            &self.negative
        }
    }
}

/// Outcome of postprocessing one output buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
    pub positive: bool,
    /// Raw score for single-score models, class probabilities otherwise.
    pub scores: Vec<f32>,
}

/// Decision rule selected by output arity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputPolicy {
    /// One correctness score; positive when strictly above `threshold`.
    SingleScore { threshold: f32 },
    /// Negative/positive logits at indices 0 and 1.
    TwoLogit,
}

impl OutputPolicy {
    /// Selects the policy for a model producing `arity` floats.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedOutputShape`] unless `arity` is 1
    /// or 2.
    pub fn for_arity(arity: usize, threshold: f32) -> Result<Self, PipelineError> {
        match arity {
            1 => Ok(Self::SingleScore { threshold }),
            2 => Ok(Self::TwoLogit),
            actual => Err(PipelineError::UnsupportedOutputShape { actual }),
        }
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::SingleScore { .. } => 1,
            Self::TwoLogit => 2,
        }
    }

    /// Applies the policy to a model output.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedOutputShape`] when `output` holds
    /// neither one nor two values, and [`PipelineError::OutputArity`] when it
    /// holds the other supported length.
    pub fn decide(&self, output: &[f32], labels: &LabelSet) -> Result<Label, PipelineError> {
        match (self, output) {
            (Self::SingleScore { threshold }, [score]) => {
                let positive = *score > *threshold;
                Ok(Label {
                    text: labels.pick(positive).to_owned(),
                    positive,
                    scores: vec![*score],
                })
            }
            (Self::TwoLogit, [_, _]) => {
                let probabilities = softmax(output);
                let positive = argmax(&probabilities) == Some(1);
                Ok(Label {
                    text: labels.pick(positive).to_owned(),
                    positive,
                    scores: probabilities,
                })
            }
            (_, [_] | [_, _]) => Err(PipelineError::OutputArity {
                expected: self.arity(),
                actual: output.len(),
            }),
            _ => Err(PipelineError::UnsupportedOutputShape {
                actual: output.len(),
            }),
        }
    }
}

/// Converts logits to probabilities, subtracting the maximum first so large
/// logits cannot overflow.
///
/// # Examples
///
/// ```
/// use phrase_verdict::postprocess::softmax;
///
/// let p = softmax(&[1000.0, 1000.1]);
/// assert!((p[0] - 0.475).abs() < 1e-3);
/// assert!((p[1] - 0.525).abs() < 1e-3);
/// ```
#[must_use]
#[expect(clippy::float_arithmetic, reason = "softmax requires float operations")]
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|logit| (logit - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|value| value / sum).collect()
}

/// Index of the largest value; the first one wins on ties.
///
/// Only a strictly greater value displaces the current best, so NaN never
/// moves the choice away from the lowest index.
#[must_use]
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (index, value)| match best {
            Some((_, top)) if value.partial_cmp(&top) != Some(Ordering::Greater) => best,
            _ => Some((index, *value)),
        })
        .map(|(index, _)| index)
}

/// Postprocesses `output` with the policy its length implies and the default
/// threshold.
///
/// # Errors
///
/// Returns [`PipelineError::UnsupportedOutputShape`] for lengths other than
/// 1 or 2.
///
/// # Examples
///
/// ```
/// use phrase_verdict::postprocess::{postprocess, LabelSet};
///
/// let labels = LabelSet::dutch();
/// assert_eq!(postprocess(&[0.6], &labels).unwrap().text, "Ja");
/// assert_eq!(postprocess(&[0.5], &labels).unwrap().text, "Nee");
/// ```
pub fn postprocess(output: &[f32], labels: &LabelSet) -> Result<Label, PipelineError> {
    OutputPolicy::for_arity(output.len(), DEFAULT_THRESHOLD)?.decide(output, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.6, "Ja")]
    #[case(0.4, "Nee")]
    #[case(0.5, "Nee")]
    #[case(1.0, "Ja")]
    #[case(f32::NAN, "Nee")]
    fn thresholds_single_score(#[case] score: f32, #[case] expected: &str) {
        let label = postprocess(&[score], &LabelSet::dutch())
            .unwrap_or_else(|e| panic!("postprocess: {e}"));
        assert_eq!(label.text, expected);
    }

    #[rstest]
    fn custom_threshold_applies() {
        let policy = OutputPolicy::for_arity(1, 0.8).unwrap_or_else(|e| panic!("{e}"));
        let label = policy
            .decide(&[0.7], &LabelSet::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(label.text, "Negative");
        assert!(!label.positive);
    }

    #[rstest]
    fn tied_logits_pick_lowest_index() {
        let label =
            postprocess(&[2.0, 2.0], &LabelSet::default()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(label.text, "Negative");
        assert!(
            label
                .scores
                .iter()
                .all(|p| approx_eq(*p, 0.5, 1e-6))
        );
    }

    #[rstest]
    fn softmax_survives_large_logits() {
        let probabilities = softmax(&[1000.0, 1000.1]);
        assert!(probabilities.iter().all(|p| p.is_finite()));
        assert!(matches!(
            probabilities.as_slice(),
            [a, b] if approx_eq(*a, 0.475, 1e-3) && approx_eq(*b, 0.525, 1e-3)
        ));
        assert_eq!(argmax(&probabilities), Some(1));
    }

    #[rstest]
    #[case(&[-1.0, 3.0], "Positive")]
    #[case(&[3.0, -1.0], "Negative")]
    #[case(&[-1000.0, -999.0], "Positive")]
    fn two_logits_follow_argmax(#[case] logits: &[f32], #[case] expected: &str) {
        let label = postprocess(logits, &LabelSet::default()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(label.text, expected);
        #[expect(clippy::float_arithmetic, reason = "probability sum")]
        let total = label.scores.iter().sum::<f32>() - 1.0;
        assert!(total.abs() < 1e-6);
    }

    #[rstest]
    #[case(&[f32::NAN, 1.0])]
    #[case(&[1.0, f32::NAN])]
    fn nan_logits_fall_back_to_negative(#[case] logits: &[f32]) {
        let label = postprocess(logits, &LabelSet::default()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(label.text, "Negative");
        assert!(!label.positive);
    }

    #[rstest]
    #[case(OutputPolicy::SingleScore { threshold: DEFAULT_THRESHOLD }, &[])]
    #[case(OutputPolicy::SingleScore { threshold: DEFAULT_THRESHOLD }, &[0.1, 0.2, 0.7])]
    #[case(OutputPolicy::TwoLogit, &[])]
    #[case(OutputPolicy::TwoLogit, &[0.1, 0.2, 0.7])]
    fn policy_rejects_unsupported_lengths(#[case] policy: OutputPolicy, #[case] output: &[f32]) {
        assert!(matches!(
            policy.decide(output, &LabelSet::default()),
            Err(PipelineError::UnsupportedOutputShape { actual }) if actual == output.len()
        ));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0.1, 0.2, 0.7])]
    fn rejects_unsupported_lengths(#[case] output: &[f32]) {
        assert!(matches!(
            postprocess(output, &LabelSet::default()),
            Err(PipelineError::UnsupportedOutputShape { actual }) if actual == output.len()
        ));
    }

    #[rstest]
    fn policy_rejects_mismatched_buffer() {
        assert!(matches!(
            OutputPolicy::TwoLogit.decide(&[0.3], &LabelSet::default()),
            Err(PipelineError::OutputArity {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[rstest]
    #[case(&[], None)]
    #[case(&[0.1], Some(0))]
    #[case(&[0.1, 0.9, 0.9], Some(1))]
    #[case(&[0.4, 0.4, 0.4], Some(0))]
    #[case(&[f32::NAN, 1.0], Some(0))]
    #[case(&[0.2, f32::NAN, 0.9], Some(2))]
    fn argmax_prefers_first_maximum(#[case] values: &[f32], #[case] expected: Option<usize>) {
        assert_eq!(argmax(values), expected);
    }
}
