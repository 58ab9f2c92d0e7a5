use crate::error::StrategyError;
use crate::learner::AdaptiveModel;
use crate::predictor::Direction;
use crate::Strategy;
use configuration::StrategyConfig;
use core_types::{Side, SignalType, Tick, TradingSignal};

/// Position state of a single-position account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl From<Option<Side>> for PositionState {
    fn from(side: Option<Side>) -> Self {
        match side {
            None => PositionState::Flat,
            Some(Side::Long) => PositionState::Long,
            Some(Side::Short) => PositionState::Short,
        }
    }
}

/// What the account must do in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Open(Side),
    /// Close the current position, then open `Side`.
    Reverse(Side),
}

/// The FLAT/LONG/SHORT transition table.
///
/// A signal in the direction already held is ignored; positions are never
/// pyramided.
pub fn plan_transition(state: PositionState, signal: SignalType) -> Transition {
    match (state, signal) {
        (_, SignalType::Hold) => Transition::Stay,
        (PositionState::Flat, SignalType::Buy) => Transition::Open(Side::Long),
        (PositionState::Flat, SignalType::Sell) => Transition::Open(Side::Short),
        (PositionState::Long, SignalType::Sell) => Transition::Reverse(Side::Short),
        (PositionState::Short, SignalType::Buy) => Transition::Reverse(Side::Long),
        (PositionState::Long, SignalType::Buy) | (PositionState::Short, SignalType::Sell) => {
            Transition::Stay
        }
    }
}

/// The adaptive state-based strategy.
///
/// It learns on every tick and only signals on ticks that produced a new state
/// whose prediction clears both `min_observations` and `confidence_threshold`.
pub struct AsmbtrStrategy {
    config: StrategyConfig,
    model: AdaptiveModel,
    signals_emitted: u64,
}

impl AsmbtrStrategy {
    pub fn new(config: StrategyConfig) -> Result<Self, StrategyError> {
        let model = AdaptiveModel::new(&config)?;
        Ok(Self {
            config,
            model,
            signals_emitted: 0,
        })
    }

    /// Builds a strategy around an already trained model.
    pub fn with_model(config: StrategyConfig, model: AdaptiveModel) -> Result<Self, StrategyError> {
        config.validate()?;
        if model.encoder().depth() != config.depth {
            return Err(StrategyError::DepthMismatch {
                encoder: model.encoder().depth(),
                table: model.table().depth(),
                config: config.depth,
            });
        }
        Ok(Self {
            config,
            model,
            signals_emitted: 0,
        })
    }

    pub fn model(&self) -> &AdaptiveModel {
        &self.model
    }

    pub fn signals_emitted(&self) -> u64 {
        self.signals_emitted
    }
}

impl Strategy for AsmbtrStrategy {
    fn evaluate(&mut self, tick: &Tick) -> Result<TradingSignal, StrategyError> {
        let step = self.model.observe_price(tick.last)?;
        let mut signal = TradingSignal::hold(tick.last, tick.timestamp);

        if step.movement.is_none() {
            return Ok(signal);
        }
        let Some(state) = step.state else {
            return Ok(signal);
        };
        signal.state = Some(state.to_decimal());

        let Some(prediction) = self.model.predict_state(&state) else {
            return Ok(signal);
        };
        signal.confidence = prediction.confidence;

        if prediction.confidence < self.config.confidence_threshold {
            return Ok(signal);
        }

        signal.signal_type = match prediction.direction {
            Direction::Up => SignalType::Buy,
            Direction::Down => SignalType::Sell,
            Direction::Neutral => SignalType::Hold,
        };
        if signal.is_actionable() {
            self.signals_emitted += 1;
            tracing::debug!(
                state = %state,
                confidence = prediction.confidence,
                observations = prediction.observations,
                "Signal {:?} at {}",
                signal.signal_type,
                tick.last
            );
        }
        Ok(signal)
    }

    fn config(&self) -> &StrategyConfig {
        &self.config
    }
}
