use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Length mismatch: actual has {actual} labels, predicted has {predicted}")]
    LengthMismatch { actual: usize, predicted: usize },

    #[error("Length mismatch: {states} states, {actual} actual labels, {predicted} predicted labels")]
    StateLengthMismatch {
        states: usize,
        actual: usize,
        predicted: usize,
    },

    #[error("Cannot evaluate an empty {0}")]
    EmptyInput(&'static str),

    #[error("Invalid label {0}; expected -1, 0 or 1")]
    InvalidLabel(i8),

    #[error("Significance level must be within (0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("Invalid p-value {0}; expected a number within [0, 1]")]
    InvalidPValue(f64),

    #[error("Model error: {0}")]
    Model(#[from] core_types::CoreError),

    #[error("I/O error while writing report: {0}")]
    Io(#[from] std::io::Error),
}
