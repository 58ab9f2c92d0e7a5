use crate::equity::drawdown;
use crate::error::AnalyticsError;
use crate::report::BacktestMetrics;
use core_types::{EquityPoint, Trade};
use rust_decimal::prelude::*;

/// Trading days used to annualize per-trade Sharpe and Sortino.
pub const ANNUALIZATION_PERIODS: f64 = 252.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// A stateless calculator for deriving performance metrics from trading activity.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating performance metrics.
    ///
    /// # Arguments
    ///
    /// * `trades` - All completed `Trade`s of a run, in exit order.
    /// * `equity_curve` - The sampled equity points of the run.
    /// * `initial_balance` - The starting balance.
    /// * `final_balance` - The balance after the last trade was closed.
    pub fn calculate(
        &self,
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_balance: Decimal,
        final_balance: Decimal,
    ) -> Result<BacktestMetrics, AnalyticsError> {
        if initial_balance <= Decimal::ZERO {
            return Err(AnalyticsError::InvalidInput(format!(
                "initial balance must be positive, got {initial_balance}"
            )));
        }
        let mut report = BacktestMetrics::new(initial_balance);
        report.final_balance = final_balance;
        report.total_return_pct = ((final_balance - initial_balance) / initial_balance)
            .to_f64()
            .unwrap_or_default();

        self.calculate_drawdown(equity_curve, initial_balance, &mut report);
        self.calculate_annualized_return(equity_curve, &mut report);

        if trades.is_empty() {
            // With no trades, most metrics stay zero; drawdown and return still apply.
            return Ok(report);
        }

        self.calculate_profitability(trades, &mut report);
        self.calculate_ratios(trades, &mut report);
        self.calculate_time_metrics(trades, &mut report);

        Ok(report)
    }

    /// Calculates all profitability-related metrics.
    fn calculate_profitability(&self, trades: &[Trade], report: &mut BacktestMetrics) {
        report.total_trades = trades.len();

        for trade in trades {
            report.total_pnl += trade.pnl;
            if trade.is_win() {
                report.gross_profit += trade.pnl;
                report.winning_trades += 1;
                report.largest_win = report.largest_win.max(trade.pnl);
            } else if trade.is_loss() {
                report.gross_loss += trade.pnl.abs();
                report.losing_trades += 1;
                report.largest_loss = report.largest_loss.max(trade.pnl.abs());
            }
        }

        report.win_rate = report.winning_trades as f64 / report.total_trades as f64;

        if report.winning_trades > 0 {
            report.avg_win = report.gross_profit / Decimal::from(report.winning_trades);
        }
        if report.losing_trades > 0 {
            report.avg_loss = report.gross_loss / Decimal::from(report.losing_trades);
        }
        if report.gross_loss > Decimal::ZERO {
            report.profit_factor = ratio(report.gross_profit, report.gross_loss);
        }
        if report.avg_loss > Decimal::ZERO {
            report.payoff_ratio = ratio(report.avg_win, report.avg_loss);
        }
    }

    /// Maximum drawdown, recomputed from the equity series.
    fn calculate_drawdown(
        &self,
        equity_curve: &[EquityPoint],
        initial_balance: Decimal,
        report: &mut BacktestMetrics,
    ) {
        let mut peak = initial_balance;
        for point in equity_curve {
            peak = peak.max(point.equity);
            let (dd, dd_pct) = drawdown(peak, point.equity);
            if dd > report.max_drawdown {
                report.max_drawdown = dd;
            }
            if dd_pct > report.max_drawdown_pct {
                report.max_drawdown_pct = dd_pct;
            }
        }

        if report.max_drawdown_pct > 0.0 {
            report.calmar_ratio = report.total_return_pct / report.max_drawdown_pct;
        }
    }

    fn calculate_annualized_return(&self, equity_curve: &[EquityPoint], report: &mut BacktestMetrics) {
        let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
            return;
        };
        let days = (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_DAY;
        let growth = 1.0 + report.total_return_pct;
        if days > 0.0 && growth > 0.0 {
            report.annualized_return = growth.powf(365.0 / days) - 1.0;
        }
    }

    /// Sharpe and Sortino on per-trade returns, annualized by sqrt(252).
    fn calculate_ratios(&self, trades: &[Trade], report: &mut BacktestMetrics) {
        if trades.len() < 2 {
            return;
        }
        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_percent).collect();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;

        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if std_dev > 0.0 {
            report.sharpe_ratio = mean / std_dev * ANNUALIZATION_PERIODS.sqrt();
        }

        let downside = (returns.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>() / n).sqrt();
        if downside > 0.0 {
            report.sortino_ratio = mean / downside * ANNUALIZATION_PERIODS.sqrt();
        }
    }

    /// Calculates time-based metrics.
    fn calculate_time_metrics(&self, trades: &[Trade], report: &mut BacktestMetrics) {
        let total_secs: f64 = trades.iter().map(|t| t.duration_seconds).sum();
        report.avg_trade_duration_seconds = total_secs / trades.len() as f64;

        if trades.len() < 2 {
            return;
        }
        let first_entry = trades.iter().map(|t| t.entry_time).min();
        let last_exit = trades.iter().map(|t| t.exit_time).max();
        if let (Some(start), Some(end)) = (first_entry, last_exit) {
            let days = (end - start).num_seconds() as f64 / SECONDS_PER_DAY;
            if days > 0.0 {
                report.trades_per_day = trades.len() as f64 / days;
            }
        }
    }
}

fn ratio(num: Decimal, den: Decimal) -> f64 {
    if den.is_zero() {
        return 0.0;
    }
    (num / den).to_f64().unwrap_or_default()
}
