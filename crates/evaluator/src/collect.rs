use crate::labels::Label;
use core_types::CoreError;
use rust_decimal::Decimal;
use strategies::{AdaptiveModel, BinaryState};

/// A prediction made from `state`, paired with the movement that followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledPrediction {
    pub state: BinaryState,
    pub predicted: Label,
    pub actual: Label,
}

/// Walks `prices` through `model`, predicting each next movement before learning it.
///
/// A prediction below `confidence_threshold`, or one the table cannot make yet,
/// counts as `Hold`. An unchanged price is an actual `Hold`. Prices seen before
/// the window fills produce no sample.
pub fn collect_labeled_predictions<I>(
    model: &mut AdaptiveModel,
    prices: I,
    confidence_threshold: f64,
) -> Result<Vec<LabeledPrediction>, CoreError>
where
    I: IntoIterator<Item = Decimal>,
{
    let mut samples = Vec::new();
    for price in prices {
        let state = model.current_state();
        let predicted = model
            .predict()
            .filter(|p| p.confidence >= confidence_threshold)
            .map_or(Label::Hold, |p| Label::from(p.direction));
        let step = model.observe_price(price)?;

        if let Some(state) = state {
            let actual = match step.movement {
                Some(true) => Label::Buy,
                Some(false) => Label::Sell,
                None => Label::Hold,
            };
            samples.push(LabeledPrediction {
                state,
                predicted,
                actual,
            });
        }
    }
    tracing::debug!(samples = samples.len(), "Collected labelled predictions");
    Ok(samples)
}

/// Splits samples into the parallel vectors the evaluator consumes.
pub fn unzip_samples(samples: &[LabeledPrediction]) -> (Vec<BinaryState>, Vec<Label>, Vec<Label>) {
    let mut states = Vec::with_capacity(samples.len());
    let mut actual = Vec::with_capacity(samples.len());
    let mut predicted = Vec::with_capacity(samples.len());
    for s in samples {
        states.push(s.state);
        actual.push(s.actual);
        predicted.push(s.predicted);
    }
    (states, actual, predicted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::StrategyConfig;
    use rust_decimal_macros::dec;

    fn model() -> AdaptiveModel {
        AdaptiveModel::new(&StrategyConfig {
            depth: 4,
            min_observations: 2,
            decay_rate: 1.0,
            ..Default::default()
        })
        .unwrap()
    }

    fn alternating(n: usize) -> Vec<Decimal> {
        (0..n).map(|i| if i % 2 == 0 { dec!(1.0) } else { dec!(1.1) }).collect()
    }

    #[test]
    fn alternating_prices_become_perfect_calls() {
        let mut model = model();
        let samples = collect_labeled_predictions(&mut model, alternating(100), 0.5).unwrap();
        // one priming price and four movements to fill the window
        assert_eq!(samples.len(), 95);
        for s in &samples[samples.len() - 50..] {
            assert_ne!(s.predicted, Label::Hold);
            assert_eq!(s.predicted, s.actual);
        }
    }

    #[test]
    fn untrained_model_holds() {
        let mut model = model();
        let samples = collect_labeled_predictions(&mut model, alternating(7), 0.0).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.predicted == Label::Hold));
    }

    #[test]
    fn flat_price_is_an_actual_hold() {
        let mut model = model();
        let prices = [dec!(1), dec!(2), dec!(1), dec!(2), dec!(1), dec!(1)];
        let samples = collect_labeled_predictions(&mut model, prices, 0.0).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].actual, Label::Hold);

        let (states, actual, predicted) = unzip_samples(&samples);
        assert_eq!((states.len(), actual.len(), predicted.len()), (1, 1, 1));
    }
}
