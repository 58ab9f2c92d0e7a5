use crate::error::ExecutorError;
use crate::exchange::{Execution, FillAction};
use core_types::{ExitReason, Position, Trade};
use rust_decimal::prelude::*;
use uuid::Uuid;

/// Manages the state of a single-position trading account.
///
/// Position notional is not debited from `balance`; only fees and realized pnl
/// move it. Entry fees are charged at open and folded into the trade's pnl at
/// close, so `balance == initial + sum(trade.pnl)` whenever the account is flat.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub balance: Decimal,
    position: Option<Position>,
}

impl Portfolio {
    /// Creates a new `Portfolio` with a given amount of starting capital.
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            balance: initial_balance,
            position: None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Applies an entry fill. Fails if a position is already open.
    pub fn open(
        &mut self,
        execution: &Execution,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Result<&Position, ExecutorError> {
        if execution.action != FillAction::Open {
            return Err(ExecutorError::InvalidOrder("expected an entry fill".to_string()));
        }
        if let Some(existing) = &self.position {
            return Err(ExecutorError::PositionAlreadyOpen(existing.side));
        }
        if execution.fee > self.balance {
            return Err(ExecutorError::InsufficientBalance {
                required: execution.fee.to_string(),
                available: self.balance.to_string(),
            });
        }
        self.balance -= execution.fee;
        Ok(self.position.insert(Position {
            side: execution.side,
            entry_price: execution.price,
            entry_time: execution.timestamp,
            size: execution.quantity,
            stop_loss,
            take_profit,
            entry_fee: execution.fee,
        }))
    }

    /// Applies an exit fill and returns the completed trade.
    pub fn close(&mut self, execution: &Execution, reason: ExitReason) -> Result<Trade, ExecutorError> {
        if execution.action != FillAction::Close {
            return Err(ExecutorError::InvalidOrder("expected an exit fill".to_string()));
        }
        let position = self.position.take().ok_or(ExecutorError::NoOpenPosition)?;

        let gross = position.unrealized_pnl(execution.price);
        self.balance += gross - execution.fee;
        let pnl = gross - position.entry_fee - execution.fee;

        let notional = position.notional();
        let pnl_percent = if notional.is_zero() {
            0.0
        } else {
            (pnl / notional).to_f64().unwrap_or_default()
        };
        let duration = execution.timestamp - position.entry_time;

        Ok(Trade {
            trade_id: Uuid::new_v4(),
            side: position.side,
            entry_time: position.entry_time,
            exit_time: execution.timestamp,
            entry_price: position.entry_price,
            exit_price: execution.price,
            size: position.size,
            pnl,
            pnl_percent,
            exit_reason: reason,
            duration_seconds: duration.num_milliseconds() as f64 / 1000.0,
        })
    }

    /// Balance plus unrealized pnl of the open position marked at `price`.
    pub fn equity(&self, price: Decimal) -> Decimal {
        self.balance
            + self
                .position
                .as_ref()
                .map_or(Decimal::ZERO, |p| p.unrealized_pnl(price))
    }
}
