pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{ExitReason, Side, SignalType};
pub use error::CoreError;
pub use structs::{
    check_ticks, validate_ticks, Candle, EquityPoint, Position, RawTick, Tick, Trade,
    TradingSignal,
};
