use core_types::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which `BacktestMetrics` field a study maximizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMetric {
    #[default]
    #[serde(alias = "calmar_ratio")]
    Calmar,
    #[serde(alias = "sharpe_ratio")]
    Sharpe,
    #[serde(alias = "total_return_pct")]
    TotalReturn,
}

impl fmt::Display for ObjectiveMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectiveMetric::Calmar => "calmar_ratio",
            ObjectiveMetric::Sharpe => "sharpe_ratio",
            ObjectiveMetric::TotalReturn => "total_return_pct",
        };
        f.write_str(name)
    }
}

/// How the next trial's parameters are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    #[default]
    Tpe,
    Random,
    Grid,
}

/// Defines an optimization study. Deserialized from the `[optimizer]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub n_trials: usize,
    pub objective: ObjectiveMetric,
    /// Trials finishing with fewer trades than this are pruned.
    pub min_trades: usize,
    pub sampler: SamplerKind,
    pub seed: u64,
    /// Trials suggested before their results are fed back to the sampler.
    /// Independent of `concurrency`, so a seeded study is machine-independent.
    pub batch_size: usize,
    /// Worker threads; defaults to the number of logical CPUs.
    pub concurrency: Option<usize>,
    /// Fraction of the dataset that must be replayed before a trial may be pruned early.
    pub prune_warmup_fraction: f64,
    /// Ticks between early-pruning checkpoints. `None` disables early pruning.
    pub prune_check_interval: Option<usize>,
    /// Points per axis when `sampler = "grid"`.
    pub grid_points: usize,
    pub parameter_space: ParameterSpace,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            n_trials: 50,
            objective: ObjectiveMetric::default(),
            min_trades: 5,
            sampler: SamplerKind::default(),
            seed: 42,
            batch_size: 4,
            concurrency: None,
            prune_warmup_fraction: 0.5,
            prune_check_interval: Some(1000),
            grid_points: 3,
            parameter_space: ParameterSpace::default(),
        }
    }
}

impl OptimizerSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.n_trials == 0 {
            return Err(CoreError::configuration("optimizer.n_trials", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(CoreError::configuration("optimizer.batch_size", "must be at least 1"));
        }
        if self.concurrency == Some(0) {
            return Err(CoreError::configuration(
                "optimizer.concurrency",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.prune_warmup_fraction) {
            return Err(CoreError::configuration(
                "optimizer.prune_warmup_fraction",
                "must be within [0, 1]",
            ));
        }
        if self.prune_check_interval == Some(0) {
            return Err(CoreError::configuration(
                "optimizer.prune_check_interval",
                "must be at least 1",
            ));
        }
        if self.grid_points == 0 {
            return Err(CoreError::configuration("optimizer.grid_points", "must be at least 1"));
        }
        self.parameter_space.validate()
    }
}

/// An inclusive `[low, high]` interval for one tunable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ParamRange<T> {
    pub low: T,
    pub high: T,
}

impl<T> ParamRange<T> {
    pub const fn new(low: T, high: T) -> Self {
        Self { low, high }
    }
}

/// The searchable region of `StrategyConfig`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParameterSpace {
    pub depth: ParamRange<i64>,
    pub confidence_threshold: ParamRange<f64>,
    pub position_size_pct: ParamRange<f64>,
    pub stop_loss_pct: ParamRange<f64>,
    pub take_profit_pct: ParamRange<f64>,
    pub decay_rate: ParamRange<f64>,
    pub min_observations: ParamRange<i64>,
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self {
            depth: ParamRange::new(6, 12),
            confidence_threshold: ParamRange::new(0.05, 0.20),
            position_size_pct: ParamRange::new(0.01, 0.05),
            stop_loss_pct: ParamRange::new(0.003, 0.015),
            take_profit_pct: ParamRange::new(0.005, 0.025),
            decay_rate: ParamRange::new(0.990, 0.999),
            min_observations: ParamRange::new(3, 10),
        }
    }
}

impl ParameterSpace {
    pub fn validate(&self) -> Result<(), CoreError> {
        let ints = [
            ("depth", &self.depth),
            ("min_observations", &self.min_observations),
        ];
        for (name, r) in ints {
            if r.low > r.high {
                return Err(CoreError::configuration(
                    format!("optimizer.parameter_space.{name}"),
                    format!("low {} exceeds high {}", r.low, r.high),
                ));
            }
        }
        let floats = [
            ("confidence_threshold", &self.confidence_threshold),
            ("position_size_pct", &self.position_size_pct),
            ("stop_loss_pct", &self.stop_loss_pct),
            ("take_profit_pct", &self.take_profit_pct),
            ("decay_rate", &self.decay_rate),
        ];
        for (name, r) in floats {
            if !(r.low.is_finite() && r.high.is_finite()) || r.low > r.high {
                return Err(CoreError::configuration(
                    format!("optimizer.parameter_space.{name}"),
                    format!("invalid range [{}, {}]", r.low, r.high),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_is_rejected() {
        let space = ParameterSpace {
            depth: ParamRange::new(12, 6),
            ..Default::default()
        };
        assert!(space.validate().is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let settings = OptimizerSettings {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(CoreError::InvalidConfiguration(field, _)) if field == "optimizer.batch_size"
        ));
    }

    #[test]
    fn objective_accepts_metric_field_names() {
        let m: ObjectiveMetric = serde_json::from_str("\"sharpe_ratio\"").unwrap();
        assert_eq!(m, ObjectiveMetric::Sharpe);
        let m: ObjectiveMetric = serde_json::from_str("\"total_return\"").unwrap();
        assert_eq!(m, ObjectiveMetric::TotalReturn);
    }
}
