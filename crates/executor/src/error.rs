use core_types::Side;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Not enough balance to pay for the fill. Required: {required}, Available: {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("A {0} position is already open")]
    PositionAlreadyOpen(Side),

    #[error("No position is open")]
    NoOpenPosition,

    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}
