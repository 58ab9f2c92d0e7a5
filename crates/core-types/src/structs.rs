use crate::enums::{ExitReason, Side, SignalType};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single price observation. This is the unit of replay for the backtester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub last: Decimal,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, last: Decimal) -> Self {
        Self {
            timestamp,
            last,
            volume: None,
            symbol: None,
        }
    }
}

/// An unvalidated tick as it arrives from a file or feed. Every field is optional
/// so that malformed rows can be rejected with a precise error instead of a
/// deserializer panic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTick {
    pub timestamp: Option<DateTime<Utc>>,
    pub last: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl RawTick {
    /// Converts the row into a `Tick`, rejecting missing or non-positive prices.
    pub fn into_tick(self, index: usize) -> Result<Tick, CoreError> {
        let timestamp = self
            .timestamp
            .ok_or_else(|| CoreError::input(format!("tick[{index}].timestamp"), "missing"))?;
        let last = self
            .last
            .ok_or_else(|| CoreError::input(format!("tick[{index}].last"), "missing"))?;
        if last <= Decimal::ZERO {
            return Err(CoreError::input(
                format!("tick[{index}].last"),
                format!("price must be positive, got {last}"),
            ));
        }
        Ok(Tick {
            timestamp,
            last,
            volume: self.volume,
            symbol: self.symbol,
        })
    }
}

/// Validates a full batch of raw ticks before any simulation starts.
///
/// The whole batch is rejected on the first bad row: a skipped tick would shift
/// every subsequent encoder state.
pub fn validate_ticks(raw: Vec<RawTick>) -> Result<Vec<Tick>, CoreError> {
    if raw.is_empty() {
        return Err(CoreError::input("ticks", "tick list is empty"));
    }
    let ticks = raw
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.into_tick(i))
        .collect::<Result<Vec<_>, _>>()?;
    ensure_ordered(&ticks)?;
    Ok(ticks)
}

/// Checks an already-typed tick slice: non-empty, positive prices, time-ordered.
pub fn check_ticks(ticks: &[Tick]) -> Result<(), CoreError> {
    if ticks.is_empty() {
        return Err(CoreError::input("ticks", "tick list is empty"));
    }
    if let Some((i, t)) = ticks.iter().enumerate().find(|(_, t)| t.last <= Decimal::ZERO) {
        return Err(CoreError::input(
            format!("tick[{i}].last"),
            format!("price must be positive, got {}", t.last),
        ));
    }
    ensure_ordered(ticks)
}

fn ensure_ordered(ticks: &[Tick]) -> Result<(), CoreError> {
    for (i, pair) in ticks.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(CoreError::input(
                format!("tick[{}].timestamp", i + 1),
                format!(
                    "timestamps must be non-decreasing ({} < {})",
                    pair[1].timestamp, pair[0].timestamp
                ),
            ));
        }
    }
    Ok(())
}

/// An OHLCV bar. Candles enter the system as one tick at their close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

impl Candle {
    pub fn to_tick(&self, symbol: Option<&str>) -> Tick {
        Tick {
            timestamp: self.open_time,
            last: self.close,
            volume: Some(self.volume),
            symbol: symbol.map(str::to_owned),
        }
    }
}

/// What the strategy wants to do after seeing a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub signal_type: SignalType,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Decimal value of the state that produced the signal, if one was available.
    pub state: Option<u64>,
    pub confidence: f64,
}

impl TradingSignal {
    pub fn hold(price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            signal_type: SignalType::Hold,
            price,
            timestamp,
            state: None,
            confidence: 0.0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.signal_type != SignalType::Hold
    }
}

/// The single open position of a simulated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    /// Base-asset quantity.
    pub size: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Commission already paid on entry; folded into the trade's pnl on close.
    pub entry_fee: Decimal,
}

impl Position {
    /// Gross pnl if the position were closed at `price`, before any fees.
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        match self.side {
            Side::Long => (price - self.entry_price) * self.size,
            Side::Short => (self.entry_price - price) * self.size,
        }
    }

    pub fn notional(&self) -> Decimal {
        self.entry_price * self.size
    }

    pub fn is_stop_hit(&self, price: Decimal) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        }
    }

    pub fn is_target_hit(&self, price: Decimal) -> bool {
        match self.side {
            Side::Long => price >= self.take_profit,
            Side::Short => price <= self.take_profit,
        }
    }
}

/// A completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: Uuid,
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub size: Decimal,
    /// Realized pnl net of entry and exit commission.
    pub pnl: Decimal,
    /// `pnl` as a fraction of entry notional.
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
    pub duration_seconds: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < Decimal::ZERO
    }
}

/// One sample of the account's value over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub balance: Decimal,
    pub equity: Decimal,
    pub peak: Decimal,
    pub drawdown: Decimal,
    /// Fraction of the running peak, always within `[0, 1]`.
    pub drawdown_pct: f64,
}
