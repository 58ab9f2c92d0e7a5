use crate::error::StrategyError;
use crate::learner::AdaptiveModel;
use crate::predictor::StatePrediction;
use configuration::StrategyConfig;
use core_types::{Candle, Tick};
use std::collections::HashMap;

/// Long-lived per-symbol models for periodic re-prediction.
///
/// Each symbol owns its encoder window and table, so state persists between
/// scheduling cycles. The registry is plain owned state: share it across threads
/// behind a lock.
#[derive(Debug)]
pub struct SymbolPredictorRegistry {
    config: StrategyConfig,
    models: HashMap<String, AdaptiveModel>,
}

impl SymbolPredictorRegistry {
    pub fn new(config: StrategyConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self {
            config,
            models: HashMap::new(),
        })
    }

    fn model_mut(&mut self, symbol: &str) -> Result<&mut AdaptiveModel, StrategyError> {
        if !self.models.contains_key(symbol) {
            tracing::info!(symbol, depth = self.config.depth, "Creating predictor");
            self.models
                .insert(symbol.to_owned(), AdaptiveModel::new(&self.config)?);
        }
        self.models
            .get_mut(symbol)
            .ok_or_else(|| StrategyError::UnknownSymbol(symbol.to_owned()))
    }

    /// Feeds ticks for `symbol`, in order. Returns how many movements were learned.
    pub fn feed_ticks(&mut self, symbol: &str, ticks: &[Tick]) -> Result<usize, StrategyError> {
        let model = self.model_mut(symbol)?;
        Ok(model.train(ticks.iter().map(|t| t.last))?)
    }

    /// Candles are fed as one tick per close.
    pub fn feed_candles(&mut self, symbol: &str, candles: &[Candle]) -> Result<usize, StrategyError> {
        let model = self.model_mut(symbol)?;
        Ok(model.train(candles.iter().map(|c| c.close))?)
    }

    /// Routes a mixed stream by each tick's `symbol`. Ticks without one are skipped.
    pub fn ingest(&mut self, ticks: &[Tick]) -> Result<usize, StrategyError> {
        let mut learned = 0;
        for tick in ticks {
            let Some(symbol) = tick.symbol.as_deref() else {
                tracing::warn!(timestamp = %tick.timestamp, "Tick has no symbol; skipped");
                continue;
            };
            let model = self.model_mut(symbol)?;
            if model.observe_price(tick.last)?.learned_from.is_some() {
                learned += 1;
            }
        }
        Ok(learned)
    }

    pub fn predict(&self, symbol: &str) -> Option<StatePrediction> {
        self.models.get(symbol)?.predict()
    }

    pub fn model(&self, symbol: &str) -> Option<&AdaptiveModel> {
        self.models.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Clears the window of one symbol, or of every symbol when `None`.
    /// Learned tables are kept.
    pub fn reset(&mut self, symbol: Option<&str>) {
        match symbol {
            Some(s) => {
                if let Some(model) = self.models.get_mut(s) {
                    model.reset_window();
                }
            }
            None => self.models.values_mut().for_each(AdaptiveModel::reset_window),
        }
    }
}
