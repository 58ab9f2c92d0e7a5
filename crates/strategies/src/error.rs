use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error(transparent)]
    Core(#[from] core_types::CoreError),

    #[error("Depth mismatch: encoder={encoder}, table={table}, config={config}")]
    DepthMismatch {
        encoder: usize,
        table: usize,
        config: usize,
    },

    #[error("No predictor registered for symbol '{0}'")]
    UnknownSymbol(String),

    #[error("Failed to read or write prediction table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Prediction table snapshot is malformed: {0}")]
    Snapshot(#[from] serde_json::Error),
}
