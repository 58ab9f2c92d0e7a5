//! # ASMBTR Evaluator
//!
//! Measures how well three-way directional calls (-1 sell, 0 hold, 1 buy)
//! match what the market actually did, and whether the match is better than
//! chance.
//!
//! ## Public API
//!
//! - `Label`, `labels_from_price_changes`: the label alphabet and thresholded labelling.
//! - `ConfusionMatrix`: counts plus per-class and support-weighted scores.
//! - `ModelEvaluator`: full evaluation, per-state breakdown, variant ranking.
//! - `bonferroni`, `benjamini_hochberg`, `chi_square_independence`: the statistics.
//! - `collect_labeled_predictions`: online predict-then-learn samples from an `AdaptiveModel`.
//! - `report`: `comfy-table` rendering for the console.

pub mod collect;
pub mod confusion;
pub mod error;
pub mod evaluate;
pub mod labels;
pub mod report;
pub mod stats;

pub use collect::{collect_labeled_predictions, unzip_samples, LabeledPrediction};
pub use confusion::{ClassScores, ConfusionMatrix, WeightedScores};
pub use error::EvaluatorError;
pub use evaluate::{
    Correction, EvaluationResult, ModelEvaluator, StateEvaluation, VariantComparison,
    DEFAULT_ALPHA, MIN_STATE_SAMPLES,
};
pub use labels::{labels_from_price_changes, labels_from_values, Label};
pub use stats::{
    benjamini_hochberg, bonferroni, chi_square_independence, compare_corrections,
    ChiSquareTest, CorrectedPValues, CorrectionComparison,
};
