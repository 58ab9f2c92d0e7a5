//! # ASMBTR Optimizer
//!
//! Searches the strategy parameter space by running many independent backtests.
//!
//! Trials are proposed in batches of `batch_size` by a `TrialSuggester` (TPE,
//! random or grid), evaluated in parallel on a bounded `rayon` pool over a shared
//! `Arc<[Tick]>`, and fed back to the suggester before the next batch is drawn.
//! The batch size never depends on the pool size, so a seeded study proposes
//! the same trials on every machine. Every trial builds its own encoder, table,
//! strategy and backtester.

use crate::params::Axis;
use crate::sampler::build_suggester;
use crate::study::objective_value;
use backtester::{Backtester, RunOutcome};
use configuration::{BacktestSettings, OptimizerSettings, StrategyConfig};
use core_types::{check_ticks, Tick};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::ops::ControlFlow;
use std::sync::Arc;
use uuid::Uuid;

pub mod error;
pub mod generator;
pub mod params;
pub mod sampler;
pub mod study;

pub use error::OptimizerError;
pub use params::TrialParams;
pub use sampler::{GridSuggester, RandomSuggester, TpeSuggester, TrialSuggester};
pub use study::{Study, StudySummary, TrialRecord, TrialState, FAILED_SCORE};

pub struct Optimizer {
    study_id: Uuid,
    settings: OptimizerSettings,
    backtest: BacktestSettings,
    base_config: StrategyConfig,
    show_progress: bool,
}

impl Optimizer {
    pub fn new(
        settings: OptimizerSettings,
        backtest: BacktestSettings,
        base_config: StrategyConfig,
    ) -> Result<Self, OptimizerError> {
        settings.validate()?;
        backtest.validate()?;
        Ok(Self {
            study_id: Uuid::new_v4(),
            settings,
            backtest,
            base_config,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn study_id(&self) -> Uuid {
        self.study_id
    }

    /// Runs the study to completion. Individual trial failures never abort it.
    pub fn run(&self, ticks: Arc<[Tick]>) -> Result<Study, OptimizerError> {
        check_ticks(&ticks).map_err(OptimizerError::Data)?;

        let axes = params::axes(&self.settings.parameter_space);
        let mut suggester = build_suggester(&self.settings, axes.clone())?;
        let n_trials = self.settings.n_trials;
        let batch_limit = self.settings.batch_size;
        let threads = self.settings.concurrency.unwrap_or_else(num_cpus::get).max(1);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;

        tracing::info!(
            study_id = %self.study_id,
            trials = n_trials,
            sampler = suggester.name(),
            objective = %self.settings.objective,
            threads,
            batch_size = batch_limit,
            ticks = ticks.len(),
            "Starting optimization"
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(n_trials as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                    .progress_chars("=>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut trials: Vec<TrialRecord> = Vec::with_capacity(n_trials);
        while trials.len() < n_trials {
            let batch_size = batch_limit.min(n_trials - trials.len());
            let mut batch = Vec::with_capacity(batch_size);
            for offset in 0..batch_size {
                match suggester.suggest()? {
                    Some(raw) => batch.push((trials.len() + offset, raw)),
                    None => break,
                }
            }
            if batch.is_empty() {
                tracing::info!(completed = trials.len(), "Sampler exhausted before n_trials");
                break;
            }

            let records: Vec<TrialRecord> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|(number, raw)| self.evaluate_trial(*number, raw, &axes, &ticks))
                    .collect()
            });

            for record in records {
                suggester.observe(&record.raw, record.feedback())?;
                if record.number % 10 == 0 {
                    tracing::info!(
                        trial = record.number,
                        state = ?record.state,
                        value = record.value,
                        trades = record.total_trades,
                        "Trial finished"
                    );
                }
                progress_bar.inc(1);
                trials.push(record);
            }
        }
        progress_bar.finish_with_message("Optimization complete.");

        let study = Study {
            study_id: self.study_id,
            objective: self.settings.objective,
            sampler: self.settings.sampler,
            base_config: self.base_config.clone(),
            trials,
        };
        let summary = study.summary();
        tracing::info!(
            study_id = %self.study_id,
            completed = summary.completed_trials,
            pruned = summary.pruned_trials,
            failed = summary.failed_trials,
            best = ?summary.best_value,
            "Optimization finished"
        );
        Ok(study)
    }

    /// Runs one trial; simulation errors become a failed record.
    fn evaluate_trial(&self, number: usize, raw: &[f64], axes: &[Axis], ticks: &[Tick]) -> TrialRecord {
        let params = match TrialParams::from_raw(axes, raw) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(trial = number, error = %e, "Trial parameters rejected");
                return TrialRecord::failed(number, raw, None, e.to_string());
            }
        };

        match self.simulate(&params, ticks) {
            Ok((outcome, ticks_processed)) => self.record(number, raw, params, outcome, ticks_processed),
            Err(e) => {
                tracing::warn!(trial = number, error = %e, "Trial failed");
                TrialRecord::failed(number, raw, Some(params), e.to_string())
            }
        }
    }

    fn simulate(&self, params: &TrialParams, ticks: &[Tick]) -> Result<(RunOutcome, usize), OptimizerError> {
        let config = params.apply(&self.base_config);
        config.validate()?;
        let mut backtester = Backtester::from_config(self.backtest.clone(), config)?;

        let outcome = match self.settings.prune_check_interval {
            Some(every) => {
                let warmup = (self.settings.prune_warmup_fraction * ticks.len() as f64).ceil() as usize;
                let min_trades = self.settings.min_trades;
                backtester.run_with_checkpoints(ticks, every, |cp| {
                    if cp.ticks_processed < warmup {
                        return ControlFlow::Continue(());
                    }
                    // Linear projection of the final trade count.
                    let projected = cp.trades_completed * cp.total_ticks / cp.ticks_processed;
                    if projected < min_trades {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                })?
            }
            None => RunOutcome::Completed(backtester.run(ticks)?),
        };
        Ok((outcome, backtester.ticks_processed()))
    }

    fn record(
        &self,
        number: usize,
        raw: &[f64],
        params: TrialParams,
        outcome: RunOutcome,
        ticks_processed: usize,
    ) -> TrialRecord {
        let (state, value, total_trades, metrics) = match outcome {
            RunOutcome::Stopped(cp) => (TrialState::Pruned, FAILED_SCORE, cp.trades_completed, None),
            RunOutcome::Completed(metrics) => {
                let value = objective_value(self.settings.objective, &metrics);
                let state = if metrics.total_trades < self.settings.min_trades {
                    TrialState::Pruned
                } else if !value.is_finite() {
                    TrialState::Failed
                } else {
                    TrialState::Completed
                };
                let value = if value.is_finite() { value } else { FAILED_SCORE };
                (state, value, metrics.total_trades, Some(metrics))
            }
        };
        TrialRecord {
            number,
            raw: raw.to_vec(),
            params: Some(params),
            state,
            value,
            ticks_processed,
            total_trades,
            metrics,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtester::data::generate_random_walk;
    use configuration::SamplerKind;

    fn settings(n_trials: usize, sampler: SamplerKind) -> OptimizerSettings {
        OptimizerSettings {
            n_trials,
            sampler,
            concurrency: Some(2),
            min_trades: 1_000_000,
            prune_check_interval: Some(100),
            ..Default::default()
        }
    }

    #[test]
    fn impossible_trade_floor_prunes_every_trial() {
        let ticks: Arc<[Tick]> = generate_random_walk(1_000, 5).unwrap().into();
        let optimizer = Optimizer::new(
            settings(4, SamplerKind::Random),
            BacktestSettings::default(),
            StrategyConfig::default(),
        )
        .unwrap();
        let study = optimizer.run(ticks).unwrap();
        assert_eq!(study.trials.len(), 4);
        assert!(study.trials.iter().all(|t| t.state == TrialState::Pruned));
        // early pruning stops right after warmup
        assert!(study.trials.iter().all(|t| t.ticks_processed == 500));
        assert!(study.best_trial().is_none());
    }

    #[test]
    fn grid_sampler_stops_when_exhausted() {
        let mut s = settings(50, SamplerKind::Grid);
        s.grid_points = 1;
        let ticks: Arc<[Tick]> = generate_random_walk(300, 1).unwrap().into();
        let optimizer = Optimizer::new(s, BacktestSettings::default(), StrategyConfig::default()).unwrap();
        let study = optimizer.run(ticks).unwrap();
        assert_eq!(study.trials.len(), 1);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let optimizer = Optimizer::new(
            settings(1, SamplerKind::Tpe),
            BacktestSettings::default(),
            StrategyConfig::default(),
        )
        .unwrap();
        let ticks: Arc<[Tick]> = Vec::new().into();
        assert!(matches!(optimizer.run(ticks), Err(OptimizerError::Data(_))));
    }
}
