use crate::optimizer_config::OptimizerSettings;
use core_types::CoreError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Lowest and highest supported encoder depth.
pub const MIN_DEPTH: usize = 2;
pub const MAX_DEPTH: usize = 64;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub backtest: BacktestSettings,
    pub strategy: StrategyConfig,
    pub optimizer: OptimizerSettings,
}

impl Config {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.backtest.validate()?;
        self.strategy.validate()?;
        self.optimizer.validate()
    }
}

/// Contains parameters for the backtesting and simulation engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BacktestSettings {
    /// The starting account balance, in quote currency.
    pub initial_balance: Decimal,
    /// Commission charged on each fill, as a fraction of notional.
    /// 0.0002 corresponds to 0.02%.
    pub commission: Decimal,
    /// Adverse price adjustment applied to each fill, as a fraction of price.
    pub slippage: Decimal,
    /// Record an equity point every N ticks (the last tick is always recorded).
    pub equity_sample_interval: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            commission: dec!(0.0002),
            slippage: dec!(0.0001),
            equity_sample_interval: 100,
        }
    }
}

impl BacktestSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.initial_balance <= Decimal::ZERO {
            return Err(CoreError::configuration(
                "backtest.initial_balance",
                "must be positive",
            ));
        }
        if !(Decimal::ZERO..Decimal::ONE).contains(&self.commission) {
            return Err(CoreError::configuration(
                "backtest.commission",
                "must be within [0, 1)",
            ));
        }
        if !(Decimal::ZERO..Decimal::ONE).contains(&self.slippage) {
            return Err(CoreError::configuration(
                "backtest.slippage",
                "must be within [0, 1)",
            ));
        }
        if self.equity_sample_interval == 0 {
            return Err(CoreError::configuration(
                "backtest.equity_sample_interval",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// The immutable parameter bundle of one ASMBTR strategy instance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Number of movements encoded into a state.
    pub depth: usize,
    /// Minimum `|P(up) - P(down)|` before a prediction becomes a signal.
    pub confidence_threshold: f64,
    /// Fraction of the current balance committed to each new position.
    pub position_size_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    /// Factor applied to every table entry each decay cycle.
    pub decay_rate: f64,
    /// Number of observed movements between two decay cycles.
    pub decay_interval: u64,
    pub min_observations: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            depth: 8,
            confidence_threshold: 0.1,
            position_size_pct: dec!(0.02),
            stop_loss_pct: dec!(0.005),
            take_profit_pct: dec!(0.010),
            decay_rate: 0.999,
            decay_interval: 100,
            min_observations: 5,
        }
    }
}

impl StrategyConfig {
    /// Range-checks every field. Called by every constructor that accepts a config.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&self.depth) {
            return Err(CoreError::configuration(
                "strategy.depth",
                format!("must be within [{MIN_DEPTH}, {MAX_DEPTH}], got {}", self.depth),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(CoreError::configuration(
                "strategy.confidence_threshold",
                format!("must be within [0, 1], got {}", self.confidence_threshold),
            ));
        }
        if self.position_size_pct <= Decimal::ZERO || self.position_size_pct > Decimal::ONE {
            return Err(CoreError::configuration(
                "strategy.position_size_pct",
                format!("must be within (0, 1], got {}", self.position_size_pct),
            ));
        }
        for (field, value) in [
            ("strategy.stop_loss_pct", self.stop_loss_pct),
            ("strategy.take_profit_pct", self.take_profit_pct),
        ] {
            if value <= Decimal::ZERO || value >= Decimal::ONE {
                return Err(CoreError::configuration(
                    field,
                    format!("must be within (0, 1), got {value}"),
                ));
            }
        }
        if !(0.9..=1.0).contains(&self.decay_rate) {
            return Err(CoreError::configuration(
                "strategy.decay_rate",
                format!("must be within [0.9, 1.0], got {}", self.decay_rate),
            ));
        }
        if self.decay_interval == 0 {
            return Err(CoreError::configuration(
                "strategy.decay_interval",
                "must be at least 1",
            ));
        }
        if self.min_observations == 0 {
            return Err(CoreError::configuration(
                "strategy.min_observations",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn depth_outside_bounds_is_a_configuration_error() {
        for depth in [0, 1, 65, 128] {
            let cfg = StrategyConfig { depth, ..Default::default() };
            assert!(matches!(
                cfg.validate(),
                Err(CoreError::InvalidConfiguration(field, _)) if field == "strategy.depth"
            ));
        }
        for depth in [2, 64] {
            StrategyConfig { depth, ..Default::default() }.validate().unwrap();
        }
    }

    #[test]
    fn decay_rate_must_stay_near_one() {
        let cfg = StrategyConfig { decay_rate: 0.85, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = StrategyConfig { decay_rate: 1.0, ..Default::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn position_size_cannot_exceed_balance() {
        let cfg = StrategyConfig { position_size_pct: dec!(1.5), ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
