use crate::error::EvaluatorError;
use crate::labels::Label;
use serde::{Deserialize, Serialize};

/// Per-class scores, the rows of a classification report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of actual samples of this class.
    pub support: u64,
}

/// Support-weighted averages over the three classes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// A 3x3 confusion matrix; rows are actual labels, columns predicted, both in
/// `Label::ALL` order (-1, 0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[u64; 3]; 3],
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[Label], predicted: &[Label]) -> Result<Self, EvaluatorError> {
        if actual.len() != predicted.len() {
            return Err(EvaluatorError::LengthMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        if actual.is_empty() {
            return Err(EvaluatorError::EmptyInput("label sequence"));
        }
        let mut matrix = Self::default();
        for (a, p) in actual.iter().zip(predicted) {
            matrix.counts[a.index()][p.index()] += 1;
        }
        Ok(matrix)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> u64 {
        (0..3).map(|i| self.counts[i][i]).sum()
    }

    pub fn row_totals(&self) -> [u64; 3] {
        self.counts.map(|row| row.iter().sum())
    }

    pub fn column_totals(&self) -> [u64; 3] {
        let mut totals = [0; 3];
        for row in &self.counts {
            for (t, c) in totals.iter_mut().zip(row) {
                *t += c;
            }
        }
        totals
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Precision, recall and F1 per class. Undefined ratios are 0.
    pub fn class_scores(&self) -> [ClassScores; 3] {
        let rows = self.row_totals();
        let cols = self.column_totals();
        Label::ALL.map(|label| {
            let i = label.index();
            let tp = self.counts[i][i];
            let precision = ratio(tp, cols[i]);
            let recall = ratio(tp, rows[i]);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassScores {
                label,
                precision,
                recall,
                f1,
                support: rows[i],
            }
        })
    }

    pub fn weighted_scores(&self) -> WeightedScores {
        let total = self.total() as f64;
        let mut weighted = WeightedScores {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
        if total == 0.0 {
            return weighted;
        }
        for scores in self.class_scores() {
            let w = scores.support as f64 / total;
            weighted.precision += w * scores.precision;
            weighted.recall += w * scores.recall;
            weighted.f1 += w * scores.f1;
        }
        weighted
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
