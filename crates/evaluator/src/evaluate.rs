use crate::confusion::{ClassScores, ConfusionMatrix};
use crate::error::EvaluatorError;
use crate::labels::Label;
use crate::stats::{benjamini_hochberg, bonferroni, chi_square_independence, CorrectedPValues};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fewest samples a state needs before it is evaluated on its own.
pub const MIN_STATE_SAMPLES: usize = 5;
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Multiple-testing correction applied to p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    None,
    #[default]
    Bonferroni,
    BenjaminiHochberg,
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Correction::None => "none",
            Correction::Bonferroni => "bonferroni",
            Correction::BenjaminiHochberg => "benjamini_hochberg",
        })
    }
}

impl Correction {
    /// Corrects a single p-value known to belong to a family of `n_tests`.
    ///
    /// BH needs the whole family to rank, so a lone p-value passes through.
    pub fn adjust_single(self, p_value: f64, n_tests: usize) -> f64 {
        match self {
            Correction::Bonferroni if n_tests > 1 => (p_value * n_tests as f64).min(1.0),
            _ => p_value,
        }
    }

    /// Corrects a whole family; results are in input order.
    pub fn adjust_family(self, p_values: &[f64], alpha: f64) -> Result<CorrectedPValues, EvaluatorError> {
        match self {
            Correction::None => Ok(CorrectedPValues {
                adjusted: p_values.to_vec(),
                significant: p_values.iter().map(|&p| p < alpha).collect(),
            }),
            Correction::Bonferroni => bonferroni(p_values, alpha),
            Correction::BenjaminiHochberg => benjamini_hochberg(p_values, alpha),
        }
    }
}

/// Full evaluation of one prediction sequence against ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub total_predictions: usize,
    pub correct_predictions: usize,
    pub accuracy: f64,
    /// Accuracy over predictions that were Buy or Sell.
    pub directional_accuracy: f64,
    /// Accuracy over predictions that were Hold.
    pub hold_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub class_scores: [ClassScores; 3],
    pub confusion_matrix: ConfusionMatrix,
    pub chi2_statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub adjusted_p_value: f64,
    pub correction: Correction,
    pub alpha: f64,
    pub significant: bool,
}

/// Metrics of one group of samples sharing a state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateEvaluation<K> {
    pub state: K,
    pub sample_count: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub p_value: f64,
    pub adjusted_p_value: f64,
    pub significant: bool,
}

/// One row of a variant comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantComparison {
    pub name: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub p_value: f64,
}

/// Computes classification and significance metrics over -1/0/1 labels.
#[derive(Debug, Clone, Copy)]
pub struct ModelEvaluator {
    alpha: f64,
}

impl Default for ModelEvaluator {
    fn default() -> Self {
        Self { alpha: DEFAULT_ALPHA }
    }
}

impl ModelEvaluator {
    pub fn new(alpha: f64) -> Result<Self, EvaluatorError> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(EvaluatorError::InvalidAlpha(alpha));
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Evaluates `predicted` against `actual`.
    ///
    /// `n_tests` is the size of the family this test belongs to; with
    /// `n_tests <= 1` no correction is applied.
    pub fn evaluate(
        &self,
        actual: &[Label],
        predicted: &[Label],
        correction: Correction,
        n_tests: usize,
    ) -> Result<EvaluationResult, EvaluatorError> {
        let matrix = ConfusionMatrix::from_labels(actual, predicted)?;
        let weighted = matrix.weighted_scores();
        let chi = chi_square_independence(&matrix.counts);
        let adjusted_p_value = correction.adjust_single(chi.p_value, n_tests);

        let (directional_hits, directional_total) = hits(actual, predicted, |p| p != Label::Hold);
        let (hold_hits, hold_total) = hits(actual, predicted, |p| p == Label::Hold);

        Ok(EvaluationResult {
            total_predictions: actual.len(),
            correct_predictions: matrix.correct() as usize,
            accuracy: matrix.accuracy(),
            directional_accuracy: fraction(directional_hits, directional_total),
            hold_accuracy: fraction(hold_hits, hold_total),
            precision: weighted.precision,
            recall: weighted.recall,
            f1: weighted.f1,
            class_scores: matrix.class_scores(),
            confusion_matrix: matrix,
            chi2_statistic: chi.statistic,
            degrees_of_freedom: chi.degrees_of_freedom,
            p_value: chi.p_value,
            adjusted_p_value,
            correction,
            alpha: self.alpha,
            significant: adjusted_p_value < self.alpha,
        })
    }

    /// Groups samples by state and evaluates every state with at least
    /// `MIN_STATE_SAMPLES` samples, best accuracy first.
    ///
    /// The correction is applied across the family of evaluated states.
    pub fn evaluate_states<K>(
        &self,
        states: &[K],
        actual: &[Label],
        predicted: &[Label],
        correction: Correction,
    ) -> Result<Vec<StateEvaluation<K>>, EvaluatorError>
    where
        K: Ord + Clone,
    {
        if states.len() != actual.len() || actual.len() != predicted.len() {
            return Err(EvaluatorError::StateLengthMismatch {
                states: states.len(),
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }

        let mut groups: BTreeMap<&K, (Vec<Label>, Vec<Label>)> = BTreeMap::new();
        for ((state, &a), &p) in states.iter().zip(actual).zip(predicted) {
            let group = groups.entry(state).or_default();
            group.0.push(a);
            group.1.push(p);
        }

        let mut results = Vec::new();
        for (state, (a, p)) in groups {
            if a.len() < MIN_STATE_SAMPLES {
                continue;
            }
            let eval = self.evaluate(&a, &p, Correction::None, 1)?;
            results.push(StateEvaluation {
                state: state.clone(),
                sample_count: a.len(),
                accuracy: eval.accuracy,
                precision: eval.precision,
                recall: eval.recall,
                f1: eval.f1,
                p_value: eval.p_value,
                adjusted_p_value: eval.p_value,
                significant: false,
            });
        }

        let p_values: Vec<f64> = results.iter().map(|r| r.p_value).collect();
        let corrected = correction.adjust_family(&p_values, self.alpha)?;
        for ((result, q), significant) in results.iter_mut().zip(corrected.adjusted).zip(corrected.significant) {
            result.adjusted_p_value = q;
            result.significant = significant;
        }

        results.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
        Ok(results)
    }

    /// Scores several prediction sequences on the same ground truth, best F1 first.
    pub fn compare_variants<S>(
        &self,
        actual: &[Label],
        variants: &[(S, Vec<Label>)],
    ) -> Result<Vec<VariantComparison>, EvaluatorError>
    where
        S: AsRef<str>,
    {
        let mut rows = variants
            .iter()
            .map(|(name, predicted)| {
                let eval = self.evaluate(actual, predicted, Correction::None, 1)?;
                Ok(VariantComparison {
                    name: name.as_ref().to_owned(),
                    accuracy: eval.accuracy,
                    precision: eval.precision,
                    recall: eval.recall,
                    f1: eval.f1,
                    p_value: eval.p_value,
                })
            })
            .collect::<Result<Vec<_>, EvaluatorError>>()?;
        rows.sort_by(|a, b| b.f1.total_cmp(&a.f1));
        Ok(rows)
    }

    /// Accuracy of directional calls against the sign of realized price changes,
    /// as a percentage, plus the full evaluation.
    pub fn prediction_accuracy(
        &self,
        price_changes: &[f64],
        predicted: &[Label],
    ) -> Result<(f64, EvaluationResult), EvaluatorError> {
        let actual: Vec<Label> = price_changes.iter().map(|&c| Label::from_change(c)).collect();
        let result = self.evaluate(&actual, predicted, Correction::None, 1)?;
        Ok((result.accuracy * 100.0, result))
    }
}

fn hits(actual: &[Label], predicted: &[Label], include: impl Fn(Label) -> bool) -> (usize, usize) {
    actual
        .iter()
        .zip(predicted)
        .filter(|(_, p)| include(**p))
        .fold((0, 0), |(hit, total), (a, p)| (hit + usize::from(a == p), total + 1))
}

fn fraction(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
