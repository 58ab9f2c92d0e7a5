use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod optimizer_config;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use optimizer_config::{ObjectiveMetric, OptimizerSettings, ParamRange, ParameterSpace, SamplerKind};
pub use settings::{BacktestSettings, Config, StrategyConfig, MAX_DEPTH, MIN_DEPTH};

/// Default file name looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "asmbtr.toml";

/// Loads and validates the application configuration.
///
/// Values are layered: built-in defaults, then the TOML file at `path`, then
/// `ASMBTR__SECTION__FIELD` environment variables. A missing file is only an
/// error when the caller named it explicitly.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file_source = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file_source)
        .add_source(
            config::Environment::with_prefix("ASMBTR")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;
    tracing::debug!(?config, "Configuration loaded");

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_toml(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let file = write_toml(
            r#"
[backtest]
initial_balance = 5000

[strategy]
depth = 10
take_profit_pct = 0.02

[optimizer]
n_trials = 20
objective = "sharpe"
"#,
        );
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.backtest.initial_balance, dec!(5000));
        assert_eq!(cfg.backtest.commission, dec!(0.0002));
        assert_eq!(cfg.strategy.depth, 10);
        assert_eq!(cfg.strategy.take_profit_pct, dec!(0.02));
        assert_eq!(cfg.strategy.min_observations, 5);
        assert_eq!(cfg.optimizer.n_trials, 20);
        assert_eq!(cfg.optimizer.objective, ObjectiveMetric::Sharpe);
        assert_eq!(cfg.optimizer.parameter_space.depth, ParamRange::new(6, 12));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let file = write_toml("[strategy]\ndepth = 70\n");
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
