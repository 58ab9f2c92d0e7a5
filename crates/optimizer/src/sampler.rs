use crate::error::OptimizerError;
use crate::generator::generate_grid;
use crate::params::Axis;
use configuration::{OptimizerSettings, SamplerKind};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Chooses parameters for upcoming trials and learns from finished ones.
///
/// Values are raw, one per axis; callers snap them with `TrialParams::from_raw`.
/// Scores passed to `observe` are maximized.
pub trait TrialSuggester {
    /// `None` means the sampler has nothing left to propose.
    fn suggest(&mut self) -> Result<Option<Vec<f64>>, OptimizerError>;

    fn observe(&mut self, raw: &[f64], score: f64) -> Result<(), OptimizerError>;

    fn name(&self) -> &'static str;
}

/// Builds the sampler selected in the settings.
pub fn build_suggester(
    settings: &OptimizerSettings,
    axes: Vec<Axis>,
) -> Result<Box<dyn TrialSuggester>, OptimizerError> {
    Ok(match settings.sampler {
        SamplerKind::Tpe => Box::new(TpeSuggester::new(axes, settings.seed)?),
        SamplerKind::Random => Box::new(RandomSuggester::new(axes, settings.seed)),
        SamplerKind::Grid => Box::new(GridSuggester::new(&axes, settings.grid_points)),
    })
}

struct TpeAxis {
    axis: Axis,
    // `None` for fixed axes
    optimizer: Option<tpe::TpeOptimizer>,
}

/// Tree-structured Parzen Estimator, one univariate estimator per axis.
pub struct TpeSuggester {
    axes: Vec<TpeAxis>,
    rng: ChaCha8Rng,
}

impl TpeSuggester {
    pub fn new(axes: Vec<Axis>, seed: u64) -> Result<Self, OptimizerError> {
        let axes = axes
            .into_iter()
            .map(|axis| {
                let optimizer = if axis.is_fixed() {
                    None
                } else {
                    let (low, high) = axis.sample_bounds();
                    let range = tpe::range(low, high).map_err(|e| OptimizerError::Sampler {
                        axis: axis.name,
                        reason: format!("{e:?}"),
                    })?;
                    Some(tpe::TpeOptimizer::new(tpe::parzen_estimator(), range))
                };
                Ok(TpeAxis { axis, optimizer })
            })
            .collect::<Result<Vec<_>, OptimizerError>>()?;
        Ok(Self {
            axes,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

impl TrialSuggester for TpeSuggester {
    fn suggest(&mut self) -> Result<Option<Vec<f64>>, OptimizerError> {
        let mut values = Vec::with_capacity(self.axes.len());
        for entry in &mut self.axes {
            let value = match entry.optimizer.as_mut() {
                Some(optimizer) => optimizer.ask(&mut self.rng).map_err(|e| OptimizerError::Sampler {
                    axis: entry.axis.name,
                    reason: format!("{e:?}"),
                })?,
                None => entry.axis.low,
            };
            values.push(value);
        }
        Ok(Some(values))
    }

    fn observe(&mut self, raw: &[f64], score: f64) -> Result<(), OptimizerError> {
        // the estimator minimizes
        let objective = -score;
        for (entry, &value) in self.axes.iter_mut().zip(raw) {
            if let Some(optimizer) = entry.optimizer.as_mut() {
                optimizer.tell(value, objective).map_err(|e| OptimizerError::Sampler {
                    axis: entry.axis.name,
                    reason: format!("{e:?}"),
                })?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tpe"
    }
}

/// Independent uniform draws per axis from a seeded generator.
pub struct RandomSuggester {
    axes: Vec<Axis>,
    rng: ChaCha8Rng,
}

impl RandomSuggester {
    pub fn new(axes: Vec<Axis>, seed: u64) -> Self {
        Self {
            axes,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl TrialSuggester for RandomSuggester {
    fn suggest(&mut self) -> Result<Option<Vec<f64>>, OptimizerError> {
        let values = self
            .axes
            .iter()
            .map(|axis| {
                if axis.is_fixed() {
                    axis.low
                } else if axis.integer {
                    let (low, high) = axis.sample_bounds();
                    self.rng.gen_range(low..high)
                } else {
                    self.rng.gen_range(axis.low..=axis.high)
                }
            })
            .collect();
        Ok(Some(values))
    }

    fn observe(&mut self, _raw: &[f64], _score: f64) -> Result<(), OptimizerError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Walks the Cartesian grid in order, then reports exhaustion.
pub struct GridSuggester {
    points: std::vec::IntoIter<Vec<f64>>,
}

impl GridSuggester {
    pub fn new(axes: &[Axis], points_per_axis: usize) -> Self {
        Self {
            points: generate_grid(axes, points_per_axis).into_iter(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.points.len()
    }
}

impl TrialSuggester for GridSuggester {
    fn suggest(&mut self) -> Result<Option<Vec<f64>>, OptimizerError> {
        Ok(self.points.next())
    }

    fn observe(&mut self, _raw: &[f64], _score: f64) -> Result<(), OptimizerError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}
