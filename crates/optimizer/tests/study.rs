use backtester::data::generate_random_walk;
use configuration::optimizer_config::ParamRange;
use configuration::{
    BacktestSettings, ObjectiveMetric, OptimizerSettings, ParameterSpace, SamplerKind, StrategyConfig,
};
use core_types::Tick;
use optimizer::{Optimizer, Study, TrialState, FAILED_SCORE};
use std::sync::Arc;

fn dataset() -> Arc<[Tick]> {
    generate_random_walk(4_000, 21).unwrap().into()
}

fn settings(sampler: SamplerKind) -> OptimizerSettings {
    OptimizerSettings {
        n_trials: 20,
        objective: ObjectiveMetric::Calmar,
        min_trades: 5,
        sampler,
        seed: 42,
        concurrency: Some(4),
        ..Default::default()
    }
}

/// Shallow, low-confidence strategies that trade on every reversal, so every
/// trial clears the five-trade floor on the synthetic walk.
fn active_space() -> ParameterSpace {
    ParameterSpace {
        depth: ParamRange::new(3, 5),
        confidence_threshold: ParamRange::new(0.0, 0.05),
        min_observations: ParamRange::new(1, 3),
        ..Default::default()
    }
}

fn run_study(settings: OptimizerSettings) -> Study {
    Optimizer::new(settings, BacktestSettings::default(), StrategyConfig::default())
        .unwrap()
        .run(dataset())
        .unwrap()
}

#[test]
fn twenty_trial_study_accounts_for_every_trial() {
    let study = run_study(OptimizerSettings {
        parameter_space: active_space(),
        ..settings(SamplerKind::Tpe)
    });
    let summary = study.summary();

    assert_eq!(summary.total_trials, 20);
    assert_eq!(
        summary.completed_trials + summary.pruned_trials + summary.failed_trials,
        20
    );
    let numbers: Vec<usize> = study.trials.iter().map(|t| t.number).collect();
    assert_eq!(numbers, (0..20).collect::<Vec<_>>());

    assert!(summary.completed_trials > 0);
    let best = summary.best_value.expect("a completed trial has a value");
    let baseline = summary.baseline_value.expect("the first completed trial is the baseline");
    assert!(best >= baseline);
    assert!(summary.improvement_pct >= 0.0);
    study.best_config().unwrap().validate().unwrap();
    for trial in &study.trials {
        if trial.state == TrialState::Completed {
            assert!(trial.total_trades >= 5);
        }
    }
}

#[test]
fn random_study_is_reproducible_for_a_seed() {
    let run = || {
        let optimizer = Optimizer::new(
            OptimizerSettings { n_trials: 6, ..settings(SamplerKind::Random) },
            BacktestSettings::default(),
            StrategyConfig::default(),
        )
        .unwrap();
        optimizer.run(dataset()).unwrap()
    };
    let (a, b) = (run(), run());
    let params = |s: &Study| s.trials.iter().map(|t| t.params.clone()).collect::<Vec<_>>();
    let values = |s: &Study| s.trials.iter().map(|t| t.value).collect::<Vec<_>>();
    assert_eq!(params(&a), params(&b));
    assert_eq!(values(&a), values(&b));
}

#[test]
fn export_contains_summary_and_all_trials() {
    let optimizer = Optimizer::new(
        OptimizerSettings { n_trials: 4, ..settings(SamplerKind::Random) },
        BacktestSettings::default(),
        StrategyConfig::default(),
    )
    .unwrap();
    let study = optimizer.run(dataset()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.json");
    study.export_json(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["total_trials"], 4);
    assert_eq!(json["objective"], "calmar");
    assert_eq!(json["all_trials"].as_array().unwrap().len(), 4);
}

#[test]
fn unreachable_trade_floor_still_records_every_trial() {
    let study = run_study(OptimizerSettings {
        min_trades: 1_000_000,
        ..settings(SamplerKind::Tpe)
    });
    let summary = study.summary();

    assert_eq!(study.trials.len(), 20);
    assert_eq!(summary.pruned_trials + summary.failed_trials, 20);
    assert!(study.trials.iter().all(|t| t.value == FAILED_SCORE));
    assert!(summary.best_value.is_none());
    assert!(study.best_config().is_none());
}

#[test]
fn seeded_tpe_study_does_not_depend_on_thread_count() {
    let run = |concurrency| {
        run_study(OptimizerSettings {
            n_trials: 12,
            concurrency: Some(concurrency),
            parameter_space: active_space(),
            ..settings(SamplerKind::Tpe)
        })
    };
    let (single, wide) = (run(1), run(8));
    let params = |s: &Study| s.trials.iter().map(|t| t.params.clone()).collect::<Vec<_>>();
    assert_eq!(params(&single), params(&wide));
    let values = |s: &Study| s.trials.iter().map(|t| t.value).collect::<Vec<_>>();
    assert_eq!(values(&single), values(&wide));
}
