use crate::error::ExecutorError;
use chrono::{DateTime, Utc};
use configuration::BacktestSettings;
use core_types::{Position, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a fill opens or closes a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillAction {
    Open,
    Close,
}

/// The receipt of a simulated fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub side: Side,
    pub action: FillAction,
    /// Price after slippage.
    pub price: Decimal,
    pub quantity: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// A generic trait for an execution engine.
///
/// The executor is a pure calculator: it determines fill price, quantity and fee
/// but **does not modify any account state**. The caller applies the returned
/// `Execution` to its `Portfolio`.
pub trait Executor: Send + Sync {
    /// Fills a new position worth `notional` in quote currency.
    fn open(
        &self,
        side: Side,
        reference_price: Decimal,
        notional: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Execution, ExecutorError>;

    /// Fills the full size of `position`.
    fn close(
        &self,
        position: &Position,
        reference_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Execution, ExecutorError>;
}

/// The "virtual exchange" for backtesting.
///
/// Slippage moves each fill against the trader by a fixed fraction of price and
/// commission is a fixed fraction of filled notional.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    commission: Decimal,
    slippage: Decimal,
}

impl SimulatedExecutor {
    pub fn new(commission: Decimal, slippage: Decimal) -> Self {
        Self { commission, slippage }
    }

    pub fn from_settings(settings: &BacktestSettings) -> Self {
        Self::new(settings.commission, settings.slippage)
    }

    /// Calculates the execution price, modeling for slippage.
    ///
    /// Buying (long entry, short exit) fills higher; selling fills lower.
    pub fn slipped_price(&self, side: Side, action: FillAction, price: Decimal) -> Decimal {
        let buying = matches!(
            (side, action),
            (Side::Long, FillAction::Open) | (Side::Short, FillAction::Close)
        );
        let result = if buying {
            price * (Decimal::ONE + self.slippage)
        } else {
            price * (Decimal::ONE - self.slippage)
        };
        tracing::debug!(%side, ?action, %price, slipped = %result, "Slippage applied");
        result
    }

    pub fn commission_on(&self, price: Decimal, quantity: Decimal) -> Decimal {
        price * quantity * self.commission
    }
}

impl Executor for SimulatedExecutor {
    fn open(
        &self,
        side: Side,
        reference_price: Decimal,
        notional: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Execution, ExecutorError> {
        if reference_price <= Decimal::ZERO {
            return Err(ExecutorError::InvalidOrder(format!(
                "reference price must be positive, got {reference_price}"
            )));
        }
        if notional <= Decimal::ZERO {
            return Err(ExecutorError::InvalidOrder(format!(
                "notional must be positive, got {notional}"
            )));
        }
        let price = self.slipped_price(side, FillAction::Open, reference_price);
        let quantity = notional / price;
        let fee = self.commission_on(price, quantity);
        tracing::debug!(%side, %price, %quantity, %fee, "Simulated entry fill");
        Ok(Execution {
            side,
            action: FillAction::Open,
            price,
            quantity,
            fee,
            timestamp,
        })
    }

    fn close(
        &self,
        position: &Position,
        reference_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Execution, ExecutorError> {
        if reference_price <= Decimal::ZERO {
            return Err(ExecutorError::InvalidOrder(format!(
                "reference price must be positive, got {reference_price}"
            )));
        }
        let price = self.slipped_price(position.side, FillAction::Close, reference_price);
        let fee = self.commission_on(price, position.size);
        tracing::debug!(side = %position.side, %price, quantity = %position.size, %fee, "Simulated exit fill");
        Ok(Execution {
            side: position.side,
            action: FillAction::Close,
            price,
            quantity: position.size,
            fee,
            timestamp,
        })
    }
}
