use crate::error::OptimizerError;
use configuration::{ParameterSpace, StrategyConfig};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// One searchable dimension, expressed in `f64` for the samplers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub name: &'static str,
    pub low: f64,
    pub high: f64,
    pub integer: bool,
}

impl Axis {
    /// A zero-width axis is not sampled; it always yields `low`.
    pub fn is_fixed(&self) -> bool {
        (self.high - self.low).abs() < 1e-12
    }

    /// Interval the samplers draw from. Integer axes are widened by half a step
    /// on each side so that rounding gives the end values a full share.
    pub fn sample_bounds(&self) -> (f64, f64) {
        if self.integer {
            (self.low - 0.5, self.high + 0.5)
        } else {
            (self.low, self.high)
        }
    }

    /// Clamps a raw sample into the axis, rounding integer axes.
    pub fn snap(&self, raw: f64) -> f64 {
        let value = if self.integer { raw.round() } else { raw };
        value.clamp(self.low, self.high)
    }
}

/// The axes of a parameter space, in the fixed order used by every sampler.
pub fn axes(space: &ParameterSpace) -> Vec<Axis> {
    let int = |name, low: i64, high: i64| Axis {
        name,
        low: low as f64,
        high: high as f64,
        integer: true,
    };
    let float = |name, low, high| Axis {
        name,
        low,
        high,
        integer: false,
    };
    vec![
        int("depth", space.depth.low, space.depth.high),
        float(
            "confidence_threshold",
            space.confidence_threshold.low,
            space.confidence_threshold.high,
        ),
        float(
            "position_size_pct",
            space.position_size_pct.low,
            space.position_size_pct.high,
        ),
        float("stop_loss_pct", space.stop_loss_pct.low, space.stop_loss_pct.high),
        float(
            "take_profit_pct",
            space.take_profit_pct.low,
            space.take_profit_pct.high,
        ),
        float("decay_rate", space.decay_rate.low, space.decay_rate.high),
        int(
            "min_observations",
            space.min_observations.low,
            space.min_observations.high,
        ),
    ]
}

/// The tunable subset of `StrategyConfig` chosen for one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialParams {
    pub depth: usize,
    pub confidence_threshold: f64,
    pub position_size_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub decay_rate: f64,
    pub min_observations: u32,
}

impl TrialParams {
    /// Builds parameters from raw sampler output, one value per axis in `axes()` order.
    pub fn from_raw(axes: &[Axis], raw: &[f64]) -> Result<Self, OptimizerError> {
        if axes.len() != 7 || raw.len() != axes.len() {
            return Err(OptimizerError::Sampler {
                axis: "*",
                reason: format!("expected 7 values, got {}", raw.len()),
            });
        }
        let v: Vec<f64> = axes.iter().zip(raw).map(|(a, &r)| a.snap(r)).collect();
        Ok(Self {
            depth: v[0] as usize,
            confidence_threshold: v[1],
            position_size_pct: to_decimal(axes[2].name, v[2])?,
            stop_loss_pct: to_decimal(axes[3].name, v[3])?,
            take_profit_pct: to_decimal(axes[4].name, v[4])?,
            decay_rate: v[5],
            min_observations: v[6] as u32,
        })
    }

    /// Overlays these parameters on a base configuration.
    pub fn apply(&self, base: &StrategyConfig) -> StrategyConfig {
        StrategyConfig {
            depth: self.depth,
            confidence_threshold: self.confidence_threshold,
            position_size_pct: self.position_size_pct,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            decay_rate: self.decay_rate,
            min_observations: self.min_observations,
            ..base.clone()
        }
    }
}

fn to_decimal(axis: &'static str, value: f64) -> Result<Decimal, OptimizerError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(6))
        .ok_or_else(|| OptimizerError::Sampler {
            axis,
            reason: format!("{value} is not representable as a decimal"),
        })
}
