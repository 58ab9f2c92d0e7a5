use crate::btr::BinaryState;
use crate::encoder::StateEncoder;
use crate::error::StrategyError;
use crate::predictor::{PredictionTable, StatePrediction};
use configuration::StrategyConfig;
use core_types::CoreError;
use rust_decimal::Decimal;

/// Result of feeding one price into an `AdaptiveModel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// The movement derived from the price, if it differed from the previous one.
    pub movement: Option<bool>,
    /// The state that was credited with `movement`, if the window was full before it.
    pub learned_from: Option<BinaryState>,
    /// The state after the movement was applied.
    pub state: Option<BinaryState>,
}

/// An encoder and prediction table learning together, online.
///
/// Every movement is first credited to the state that preceded it, then pushed
/// into the window. Decay is tick-count driven: the table is scaled by
/// `decay_rate` once every `decay_interval` learned movements.
#[derive(Debug, Clone)]
pub struct AdaptiveModel {
    encoder: StateEncoder,
    table: PredictionTable,
    decay_rate: f64,
    decay_interval: u64,
    min_observations: u32,
    learned_since_decay: u64,
}

impl AdaptiveModel {
    pub fn new(config: &StrategyConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Self::with_parts(
            StateEncoder::new(config.depth)?,
            PredictionTable::new(config.depth)?,
            config,
        )
    }

    /// Wires an existing encoder and table (e.g. a restored snapshot) into a model.
    pub fn with_parts(
        encoder: StateEncoder,
        table: PredictionTable,
        config: &StrategyConfig,
    ) -> Result<Self, StrategyError> {
        config.validate()?;
        if encoder.depth() != table.depth() || encoder.depth() != config.depth {
            return Err(StrategyError::DepthMismatch {
                encoder: encoder.depth(),
                table: table.depth(),
                config: config.depth,
            });
        }
        Ok(Self {
            encoder,
            table,
            decay_rate: config.decay_rate,
            decay_interval: config.decay_interval,
            min_observations: config.min_observations,
            learned_since_decay: 0,
        })
    }

    /// Feeds one price: learns from the resulting movement and advances the window.
    pub fn observe_price(&mut self, price: Decimal) -> Result<Step, CoreError> {
        let before = self.encoder.get_state();
        let Some(is_up) = self.encoder.process_price(price) else {
            return Ok(Step {
                movement: None,
                learned_from: None,
                state: before,
            });
        };
        if let Some(prev) = before {
            self.learn(&prev, is_up)?;
        }
        Ok(Step {
            movement: Some(is_up),
            learned_from: before,
            state: self.encoder.get_state(),
        })
    }

    /// Same as `observe_price`, for an already-derived movement.
    pub fn observe_movement(&mut self, is_up: bool) -> Result<Step, CoreError> {
        let before = self.encoder.get_state();
        if let Some(prev) = before {
            self.learn(&prev, is_up)?;
        }
        self.encoder.add_movement(is_up);
        Ok(Step {
            movement: Some(is_up),
            learned_from: before,
            state: self.encoder.get_state(),
        })
    }

    fn learn(&mut self, state: &BinaryState, is_up: bool) -> Result<(), CoreError> {
        self.table.observe(state, is_up);
        self.learned_since_decay += 1;
        if self.learned_since_decay >= self.decay_interval {
            self.table.apply_decay(self.decay_rate)?;
            self.learned_since_decay = 0;
        }
        Ok(())
    }

    pub fn train<I>(&mut self, prices: I) -> Result<usize, CoreError>
    where
        I: IntoIterator<Item = Decimal>,
    {
        let mut learned = 0;
        for price in prices {
            if self.observe_price(price)?.learned_from.is_some() {
                learned += 1;
            }
        }
        Ok(learned)
    }

    pub fn current_state(&self) -> Option<BinaryState> {
        self.encoder.get_state()
    }

    /// Prediction for the current window, honouring `min_observations`.
    pub fn predict(&self) -> Option<StatePrediction> {
        let state = self.encoder.get_state()?;
        self.table.predict(&state, self.min_observations)
    }

    pub fn predict_state(&self, state: &BinaryState) -> Option<StatePrediction> {
        self.table.predict(state, self.min_observations)
    }

    pub fn encoder(&self) -> &StateEncoder {
        &self.encoder
    }

    pub fn table(&self) -> &PredictionTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut PredictionTable {
        &mut self.table
    }

    pub fn reset_window(&mut self) {
        self.encoder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::Direction;
    use rust_decimal_macros::dec;

    fn config(depth: usize) -> StrategyConfig {
        StrategyConfig {
            depth,
            decay_rate: 1.0,
            min_observations: 1,
            ..Default::default()
        }
    }

    #[test]
    fn movement_is_credited_to_previous_state() {
        let mut model = AdaptiveModel::new(&config(2)).unwrap();
        model.train([dec!(1), dec!(2), dec!(1)]).unwrap();
        // window "10" is ready, nothing learned yet
        assert!(model.table().is_empty());
        let step = model.observe_price(dec!(2)).unwrap();
        assert_eq!(step.learned_from.unwrap().to_string(), "10");
        assert_eq!(step.state.unwrap().to_string(), "01");
        let counts = model.table().counts(&step.learned_from.unwrap()).unwrap();
        assert_eq!(counts.up_count, 1.0);
    }

    #[test]
    fn unchanged_price_learns_nothing() {
        let mut model = AdaptiveModel::new(&config(2)).unwrap();
        model.train([dec!(1), dec!(2), dec!(3)]).unwrap();
        let step = model.observe_price(dec!(3)).unwrap();
        assert!(step.movement.is_none());
        assert!(step.learned_from.is_none());
        assert!(step.state.is_some());
    }

    #[test]
    fn decay_runs_every_interval() {
        let cfg = StrategyConfig {
            depth: 2,
            decay_rate: 0.9,
            decay_interval: 2,
            min_observations: 1,
            ..Default::default()
        };
        let mut model = AdaptiveModel::new(&cfg).unwrap();
        for up in [true, true, true, true, true, true] {
            model.observe_movement(up).unwrap();
        }
        // four movements were learned, so two decay cycles ran
        assert_eq!(model.table().statistics().decay_cycles, 2);
        let p = model.predict().unwrap();
        assert_eq!(p.direction, Direction::Up);
        assert!((p.up_count - ((1.0 + 1.0) * 0.9 + 1.0 + 1.0) * 0.9).abs() < 1e-12);
    }

    #[test]
    fn mismatched_parts_are_rejected() {
        let err = AdaptiveModel::with_parts(
            StateEncoder::new(4).unwrap(),
            PredictionTable::new(5).unwrap(),
            &config(4),
        )
        .unwrap_err();
        assert!(matches!(err, StrategyError::DepthMismatch { .. }));
    }
}
