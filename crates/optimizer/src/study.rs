use crate::error::OptimizerError;
use crate::params::TrialParams;
use analytics::BacktestMetrics;
use configuration::{ObjectiveMetric, SamplerKind, StrategyConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use uuid::Uuid;

/// Score recorded for trials that failed, and fed back to samplers for pruned ones.
pub const FAILED_SCORE: f64 = -999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrialState {
    Completed,
    /// Too few trades; recorded but never eligible as best.
    Pruned,
    Failed,
}

/// Reads the optimized field out of a run's metrics.
pub fn objective_value(metric: ObjectiveMetric, metrics: &BacktestMetrics) -> f64 {
    match metric {
        ObjectiveMetric::Calmar => metrics.calmar_ratio,
        ObjectiveMetric::Sharpe => metrics.sharpe_ratio,
        ObjectiveMetric::TotalReturn => metrics.total_return_pct,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    pub number: usize,
    /// Sampler output before snapping.
    pub raw: Vec<f64>,
    pub params: Option<TrialParams>,
    pub state: TrialState,
    pub value: f64,
    pub ticks_processed: usize,
    pub total_trades: usize,
    pub metrics: Option<BacktestMetrics>,
    pub error: Option<String>,
}

impl TrialRecord {
    pub fn failed(number: usize, raw: &[f64], params: Option<TrialParams>, error: String) -> Self {
        Self {
            number,
            raw: raw.to_vec(),
            params,
            state: TrialState::Failed,
            value: FAILED_SCORE,
            ticks_processed: 0,
            total_trades: 0,
            metrics: None,
            error: Some(error),
        }
    }

    /// The score samplers learn from.
    pub fn feedback(&self) -> f64 {
        match self.state {
            TrialState::Completed => self.value,
            TrialState::Pruned | TrialState::Failed => FAILED_SCORE,
        }
    }
}

/// Headline results of a study.
#[derive(Debug, Clone, Serialize)]
pub struct StudySummary {
    pub study_id: Uuid,
    pub objective: ObjectiveMetric,
    pub sampler: SamplerKind,
    pub total_trials: usize,
    pub completed_trials: usize,
    pub pruned_trials: usize,
    pub failed_trials: usize,
    pub best_trial: Option<usize>,
    pub best_value: Option<f64>,
    pub best_params: Option<TrialParams>,
    /// Value of the first completed trial.
    pub baseline_value: Option<f64>,
    /// `(best - baseline) / |baseline| * 100`; 0 when the baseline is 0 or missing.
    pub improvement_pct: f64,
}

#[derive(Serialize)]
struct StudyExport<'a> {
    #[serde(flatten)]
    summary: StudySummary,
    all_trials: &'a [TrialRecord],
}

/// Every trial of one optimization run, in trial-number order.
#[derive(Debug, Clone)]
pub struct Study {
    pub study_id: Uuid,
    pub objective: ObjectiveMetric,
    pub sampler: SamplerKind,
    pub base_config: StrategyConfig,
    pub trials: Vec<TrialRecord>,
}

impl Study {
    pub fn count(&self, state: TrialState) -> usize {
        self.trials.iter().filter(|t| t.state == state).count()
    }

    /// Highest-valued completed trial; the lower trial number wins ties.
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        self.trials
            .iter()
            .filter(|t| t.state == TrialState::Completed)
            .fold(None, |best: Option<&TrialRecord>, t| match best {
                Some(b) if b.value >= t.value => Some(b),
                _ => Some(t),
            })
    }

    pub fn baseline(&self) -> Option<&TrialRecord> {
        self.trials.iter().find(|t| t.state == TrialState::Completed)
    }

    /// The base configuration with the best trial's parameters applied.
    pub fn best_config(&self) -> Option<StrategyConfig> {
        let params = self.best_trial()?.params.as_ref()?;
        Some(params.apply(&self.base_config))
    }

    pub fn summary(&self) -> StudySummary {
        let best = self.best_trial();
        let baseline_value = self.baseline().map(|t| t.value);
        let improvement_pct = match (best, baseline_value) {
            (Some(best), Some(base)) if base != 0.0 => (best.value - base) / base.abs() * 100.0,
            _ => 0.0,
        };
        StudySummary {
            study_id: self.study_id,
            objective: self.objective,
            sampler: self.sampler,
            total_trials: self.trials.len(),
            completed_trials: self.count(TrialState::Completed),
            pruned_trials: self.count(TrialState::Pruned),
            failed_trials: self.count(TrialState::Failed),
            best_trial: best.map(|t| t.number),
            best_value: best.map(|t| t.value),
            best_params: best.and_then(|t| t.params.clone()),
            baseline_value,
            improvement_pct,
        }
    }

    /// Writes the summary plus every trial as pretty-printed JSON.
    pub fn export_json(&self, path: &Path) -> Result<(), OptimizerError> {
        if self.trials.is_empty() {
            return Err(OptimizerError::EmptyStudy);
        }
        let writer = BufWriter::new(File::create(path)?);
        let export = StudyExport {
            summary: self.summary(),
            all_trials: &self.trials,
        };
        serde_json::to_writer_pretty(writer, &export)?;
        tracing::info!(path = %path.display(), trials = self.trials.len(), "Exported study");
        Ok(())
    }
}
