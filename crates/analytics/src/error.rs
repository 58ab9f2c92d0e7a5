use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid input for analytics calculation: {0}")]
    InvalidInput(String),
}
