use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Invalid configuration for {0}: {1}")]
    InvalidConfiguration(String, String),
}

impl CoreError {
    pub fn input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidInput(field.into(), reason.into())
    }

    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidConfiguration(field.into(), reason.into())
    }
}
