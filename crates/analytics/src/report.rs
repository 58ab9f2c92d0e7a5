use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate statistics of one backtest run.
///
/// This is a flat, JSON-serializable record. Money fields are `Decimal`; ratios
/// and fractions (`win_rate`, `total_return_pct`, drawdown pct) are `f64`, with
/// percentages expressed as fractions (0.05 = 5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // I. Trade-Level Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    // II. Core Profitability Metrics
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub total_pnl: Decimal,
    pub total_return_pct: f64,
    pub annualized_return: f64,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub avg_win: Decimal,
    /// Magnitude of the average losing trade.
    pub avg_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    /// 0 when there are no losing trades.
    pub profit_factor: f64,
    pub payoff_ratio: f64,

    // III. Risk and Drawdown
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    /// 0 when there was no drawdown.
    pub calmar_ratio: f64,

    // IV. Time-Based Metrics
    pub avg_trade_duration_seconds: f64,
    pub trades_per_day: f64,
}

impl BacktestMetrics {
    /// Creates a zeroed report for an account that never traded.
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            initial_balance,
            final_balance: initial_balance,
            total_pnl: Decimal::ZERO,
            total_return_pct: 0.0,
            annualized_return: 0.0,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            largest_win: Decimal::ZERO,
            largest_loss: Decimal::ZERO,
            profit_factor: 0.0,
            payoff_ratio: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: 0.0,
            calmar_ratio: 0.0,
            avg_trade_duration_seconds: 0.0,
            trades_per_day: 0.0,
        }
    }
}

impl Default for BacktestMetrics {
    fn default() -> Self {
        Self::new(Decimal::ZERO)
    }
}
