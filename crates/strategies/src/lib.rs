//! # ASMBTR Strategy Library
//!
//! This crate contains the prediction and signal logic of the system: binary state
//! encoding, the decay-weighted prediction table, and the strategy that turns
//! predictions into trading signals.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of files,
//!   execution or accounts. It depends only on `core-types` and `configuration`.
//! - **Injected State:** Encoders and tables are owned by the strategy or model that
//!   uses them. Nothing is global, so optimizer trials and symbols never share state.
//! - **Strategy Agnostic Engine:** The `backtester` drives any `Strategy`; the
//!   position transition table lives here as the pure `plan_transition` function.
//!
//! ## Public API
//!
//! - `BinaryState`, `create_all_states`: the state representation.
//! - `StateEncoder`: the sliding movement window.
//! - `PredictionTable`, `StatePrediction`: learned next-move probabilities.
//! - `AdaptiveModel`: encoder + table learning online with tick-count decay.
//! - `AsmbtrStrategy`, `Strategy`, `plan_transition`: signal generation.
//! - `SymbolPredictorRegistry`: long-lived per-symbol models.

// Declare all the modules that constitute this crate.
pub mod asmbtr;
pub mod btr;
pub mod encoder;
pub mod error;
pub mod learner;
pub mod predictor;
pub mod registry;

// Re-export the key components to create a clean, public-facing API.
pub use asmbtr::{plan_transition, AsmbtrStrategy, PositionState, Transition};
pub use btr::{check_depth, create_all_states, AllStates, BinaryState};
pub use encoder::StateEncoder;
pub use error::StrategyError;
pub use learner::{AdaptiveModel, Step};
pub use predictor::{
    Direction, PredictionTable, RankBy, StateCounts, StatePrediction, TableSnapshot,
    TableStatistics,
};
pub use registry::SymbolPredictorRegistry;

use configuration::StrategyConfig;
use core_types::{Tick, TradingSignal};

/// The core trait that all trading strategies must implement.
///
/// The `&mut self` in `evaluate` is crucial: the strategy learns from every tick.
/// The `Send + Sync` bounds are required to allow strategies to be moved into
/// the optimizer's worker threads.
pub trait Strategy: Send + Sync {
    /// Consumes the next tick and returns exactly one signal (possibly `Hold`).
    fn evaluate(&mut self, tick: &Tick) -> Result<TradingSignal, StrategyError>;

    /// Sizing and exit parameters used by whoever executes the signals.
    fn config(&self) -> &StrategyConfig;
}
