use configuration::StrategyConfig;
use evaluator::{
    collect_labeled_predictions, unzip_samples, Correction, ConfusionMatrix, Label, ModelEvaluator,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use strategies::AdaptiveModel;

fn label() -> impl Strategy<Value = Label> {
    prop_oneof![Just(Label::Sell), Just(Label::Hold), Just(Label::Buy)]
}

fn pairs() -> impl Strategy<Value = (Vec<Label>, Vec<Label>)> {
    prop::collection::vec((label(), label()), 1..200).prop_map(|v| v.into_iter().unzip())
}

proptest! {
    #[test]
    fn matrix_marginals_count_each_side((actual, predicted) in pairs()) {
        let m = ConfusionMatrix::from_labels(&actual, &predicted).unwrap();
        prop_assert_eq!(m.total() as usize, actual.len());
        for l in Label::ALL {
            let actual_count = actual.iter().filter(|&&a| a == l).count() as u64;
            let predicted_count = predicted.iter().filter(|&&p| p == l).count() as u64;
            prop_assert_eq!(m.row_totals()[l.index()], actual_count);
            prop_assert_eq!(m.column_totals()[l.index()], predicted_count);
        }
    }

    #[test]
    fn scores_are_fractions((actual, predicted) in pairs()) {
        let r = ModelEvaluator::default()
            .evaluate(&actual, &predicted, Correction::Bonferroni, 4)
            .unwrap();
        for v in [r.accuracy, r.precision, r.recall, r.f1, r.directional_accuracy, r.hold_accuracy] {
            prop_assert!((0.0..=1.0).contains(&v));
        }
        prop_assert!((0.0..=1.0).contains(&r.p_value));
        prop_assert!(r.adjusted_p_value >= r.p_value && r.adjusted_p_value <= 1.0);
    }
}

/// A price path that repeats up, up, down, so depth-3 states are perfectly predictive.
fn periodic_prices(n: usize) -> Vec<Decimal> {
    let mut price = Decimal::new(10_000, 2);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(price);
        price += if i % 3 == 2 { Decimal::new(-1, 1) } else { Decimal::new(1, 1) };
    }
    out
}

#[test]
fn learned_pattern_is_significant_per_state() {
    let mut model = AdaptiveModel::new(&StrategyConfig {
        depth: 3,
        min_observations: 3,
        decay_rate: 1.0,
        ..Default::default()
    })
    .unwrap();
    let samples = collect_labeled_predictions(&mut model, periodic_prices(600), 0.5).unwrap();
    let (states, actual, predicted) = unzip_samples(&samples);

    let evaluator = ModelEvaluator::default();
    let overall = evaluator.evaluate(&actual, &predicted, Correction::None, 1).unwrap();
    assert!(overall.accuracy > 0.95);
    assert!(overall.significant);

    let per_state = evaluator
        .evaluate_states(&states, &actual, &predicted, Correction::BenjaminiHochberg)
        .unwrap();
    // the period-3 walk only ever visits three states
    assert_eq!(per_state.len(), 3);
    assert!(per_state.windows(2).all(|w| w[0].accuracy >= w[1].accuracy));
    assert!(per_state.iter().all(|s| s.sample_count >= 5));
}
