use crate::error::BacktestError;
use analytics::{AnalyticsEngine, BacktestMetrics, EquityTracker};
use configuration::{BacktestSettings, StrategyConfig};
use core_types::{
    check_ticks, validate_ticks, EquityPoint, ExitReason, Position, RawTick, Side, Tick, Trade,
    TradingSignal,
};
use executor::{Executor, Portfolio, SimulatedExecutor};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::ops::ControlFlow;
use strategies::{plan_transition, AsmbtrStrategy, PositionState, Strategy, Transition};
use uuid::Uuid;

pub mod data;
pub mod error;
pub mod export;

pub use export::BacktestSummary;

/// Progress of a run, handed to checkpoint callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub ticks_processed: usize,
    pub total_ticks: usize,
    pub trades_completed: usize,
    pub equity: Decimal,
}

impl Checkpoint {
    pub fn progress(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.ticks_processed as f64 / self.total_ticks as f64
        }
    }
}

/// How a checkpointed run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(BacktestMetrics),
    /// The checkpoint callback asked to stop; no end-of-data close was performed.
    Stopped(Checkpoint),
}

/// The tick-replay backtesting engine.
///
/// One instance replays exactly one dataset. Processing is strictly sequential:
/// strategy, then stop-loss/take-profit, then signal execution, then equity.
pub struct Backtester {
    // --- Context ---
    run_id: Uuid,
    settings: BacktestSettings,
    // --- Components ---
    portfolio: Portfolio,
    strategy: Box<dyn Strategy>,
    executor: Box<dyn Executor>,
    analytics_engine: AnalyticsEngine,
    // --- Results ---
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    ticks_processed: usize,
    started: bool,
    show_progress: bool,
}

impl Backtester {
    pub fn new(
        settings: BacktestSettings,
        strategy: Box<dyn Strategy>,
        executor: Box<dyn Executor>,
    ) -> Result<Self, BacktestError> {
        settings.validate()?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            portfolio: Portfolio::new(settings.initial_balance),
            settings,
            strategy,
            executor,
            analytics_engine: AnalyticsEngine::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            ticks_processed: 0,
            started: false,
            show_progress: false,
        })
    }

    /// Wires a fresh `AsmbtrStrategy` and `SimulatedExecutor` from configuration.
    pub fn from_config(
        settings: BacktestSettings,
        strategy_config: StrategyConfig,
    ) -> Result<Self, BacktestError> {
        let executor = SimulatedExecutor::from_settings(&settings);
        let strategy = AsmbtrStrategy::new(strategy_config)?;
        Self::new(settings, Box::new(strategy), Box::new(executor))
    }

    /// Shows an `indicatif` progress bar while replaying.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }

    pub fn strategy_config(&self) -> &StrategyConfig {
        self.strategy.config()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn balance(&self) -> Decimal {
        self.portfolio.balance
    }

    pub fn open_position(&self) -> Option<&Position> {
        self.portfolio.position()
    }

    pub fn ticks_processed(&self) -> usize {
        self.ticks_processed
    }

    /// Validates raw rows, then replays them.
    pub fn run_raw(&mut self, raw: Vec<RawTick>) -> Result<BacktestMetrics, BacktestError> {
        let ticks = validate_ticks(raw)?;
        self.run(&ticks)
    }

    /// Replays every tick and returns the run's metrics.
    pub fn run(&mut self, ticks: &[Tick]) -> Result<BacktestMetrics, BacktestError> {
        match self.replay(ticks, None, |_| ControlFlow::Continue(()))? {
            None => self.metrics(),
            Some(_) => Err(BacktestError::AlreadyRun),
        }
    }

    /// Replays ticks, invoking `on_checkpoint` every `interval` ticks.
    ///
    /// Returning `ControlFlow::Break` abandons the run at that checkpoint.
    pub fn run_with_checkpoints<F>(
        &mut self,
        ticks: &[Tick],
        interval: usize,
        on_checkpoint: F,
    ) -> Result<RunOutcome, BacktestError>
    where
        F: FnMut(&Checkpoint) -> ControlFlow<()>,
    {
        match self.replay(ticks, Some(interval.max(1)), on_checkpoint)? {
            None => Ok(RunOutcome::Completed(self.metrics()?)),
            Some(cp) => Ok(RunOutcome::Stopped(cp)),
        }
    }

    fn replay<F>(
        &mut self,
        ticks: &[Tick],
        checkpoint_every: Option<usize>,
        mut on_checkpoint: F,
    ) -> Result<Option<Checkpoint>, BacktestError>
    where
        F: FnMut(&Checkpoint) -> ControlFlow<()>,
    {
        if self.started {
            return Err(BacktestError::AlreadyRun);
        }
        check_ticks(ticks)?;
        self.started = true;

        tracing::info!(
            run_id = %self.run_id,
            ticks = ticks.len(),
            initial_balance = %self.settings.initial_balance,
            "Starting backtest"
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(ticks.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                    .progress_chars("=>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut tracker = EquityTracker::new(self.settings.initial_balance);
        let last_index = ticks.len() - 1;
        let interval = self.settings.equity_sample_interval;

        for (i, tick) in ticks.iter().enumerate() {
            // --- 1. STRATEGY EVALUATION ---
            let signal = self.strategy.evaluate(tick)?;

            // --- 2. STOP-LOSS / TAKE-PROFIT ---
            self.check_exits(tick)?;

            // --- 3. SIGNAL PROCESSING ---
            if signal.is_actionable() {
                self.execute_signal(&signal, tick)?;
            }

            // --- 4. RECORD EQUITY ---
            if i % interval == 0 && i != last_index {
                self.record_equity(&mut tracker, tick);
            }

            self.ticks_processed = i + 1;
            progress_bar.inc(1);

            if let Some(every) = checkpoint_every {
                if self.ticks_processed % every == 0 && i != last_index {
                    let cp = Checkpoint {
                        ticks_processed: self.ticks_processed,
                        total_ticks: ticks.len(),
                        trades_completed: self.trades.len(),
                        equity: self.portfolio.equity(tick.last),
                    };
                    if on_checkpoint(&cp).is_break() {
                        progress_bar.abandon_with_message("Stopped at checkpoint");
                        tracing::debug!(run_id = %self.run_id, ticks = cp.ticks_processed, "Backtest stopped early");
                        return Ok(Some(cp));
                    }
                }
            }
        }

        // Close any open position at the end of the data.
        let last_tick = &ticks[last_index];
        if self.portfolio.position().is_some() {
            self.close_position(last_tick, ExitReason::EndOfData)?;
        }
        self.record_equity(&mut tracker, last_tick);

        progress_bar.finish_with_message("Simulation complete.");
        tracing::info!(
            run_id = %self.run_id,
            trades = self.trades.len(),
            final_balance = %self.portfolio.balance,
            "Backtest complete"
        );
        Ok(None)
    }

    /// Stop-loss is checked before take-profit, both against the tick price.
    fn check_exits(&mut self, tick: &Tick) -> Result<(), BacktestError> {
        let Some(position) = self.portfolio.position() else {
            return Ok(());
        };
        let reason = if position.is_stop_hit(tick.last) {
            Some(ExitReason::StopLoss)
        } else if position.is_target_hit(tick.last) {
            Some(ExitReason::TakeProfit)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.close_position(tick, reason)?;
        }
        Ok(())
    }

    fn execute_signal(&mut self, signal: &TradingSignal, tick: &Tick) -> Result<(), BacktestError> {
        let state = PositionState::from(self.portfolio.position().map(|p| p.side));
        match plan_transition(state, signal.signal_type) {
            Transition::Stay => {}
            Transition::Open(side) => self.open_new_position(side, tick)?,
            Transition::Reverse(side) => {
                self.close_position(tick, ExitReason::Signal)?;
                self.open_new_position(side, tick)?;
            }
        }
        Ok(())
    }

    fn open_new_position(&mut self, side: Side, tick: &Tick) -> Result<(), BacktestError> {
        let config = self.strategy.config();
        let notional = self.portfolio.balance * config.position_size_pct;
        if notional <= Decimal::ZERO {
            tracing::warn!(run_id = %self.run_id, balance = %self.portfolio.balance, "Balance exhausted; entry skipped");
            return Ok(());
        }
        let (sl_pct, tp_pct) = (config.stop_loss_pct, config.take_profit_pct);

        let execution = self.executor.open(side, tick.last, notional, tick.timestamp)?;
        let (stop_loss, take_profit) = exit_levels(side, execution.price, sl_pct, tp_pct);
        let position = self.portfolio.open(&execution, stop_loss, take_profit)?;
        tracing::debug!(
            %side,
            entry = %position.entry_price,
            size = %position.size,
            %stop_loss,
            %take_profit,
            "Opened position"
        );
        Ok(())
    }

    fn close_position(&mut self, tick: &Tick, reason: ExitReason) -> Result<(), BacktestError> {
        let Some(position) = self.portfolio.position() else {
            return Ok(());
        };
        let execution = self.executor.close(position, tick.last, tick.timestamp)?;
        let trade = self.portfolio.close(&execution, reason)?;
        tracing::debug!(
            side = %trade.side,
            pnl = %trade.pnl,
            %reason,
            balance = %self.portfolio.balance,
            "Closed position"
        );
        self.trades.push(trade);
        Ok(())
    }

    fn record_equity(&mut self, tracker: &mut EquityTracker, tick: &Tick) {
        let point = tracker.record(
            tick.timestamp,
            self.portfolio.balance,
            self.portfolio.equity(tick.last),
        );
        self.equity_curve.push(point);
    }

    /// Aggregate metrics of everything replayed so far.
    pub fn metrics(&self) -> Result<BacktestMetrics, BacktestError> {
        Ok(self.analytics_engine.calculate(
            &self.trades,
            &self.equity_curve,
            self.settings.initial_balance,
            self.portfolio.balance,
        )?)
    }
}

/// Stop-loss and take-profit prices around an entry fill.
pub fn exit_levels(side: Side, entry: Decimal, stop_loss_pct: Decimal, take_profit_pct: Decimal) -> (Decimal, Decimal) {
    match side {
        Side::Long => (
            entry * (Decimal::ONE - stop_loss_pct),
            entry * (Decimal::ONE + take_profit_pct),
        ),
        Side::Short => (
            entry * (Decimal::ONE + stop_loss_pct),
            entry * (Decimal::ONE - take_profit_pct),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use core_types::SignalType;
    use rust_decimal_macros::dec;
    use strategies::StrategyError;

    /// Emits a fixed signal per tick index.
    struct Scripted {
        config: StrategyConfig,
        script: Vec<SignalType>,
        cursor: usize,
    }

    impl Strategy for Scripted {
        fn evaluate(&mut self, tick: &Tick) -> Result<TradingSignal, StrategyError> {
            let signal_type = self.script.get(self.cursor).copied().unwrap_or(SignalType::Hold);
            self.cursor += 1;
            let mut signal = TradingSignal::hold(tick.last, tick.timestamp);
            signal.signal_type = signal_type;
            Ok(signal)
        }

        fn config(&self) -> &StrategyConfig {
            &self.config
        }
    }

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap()
    }

    fn ticks(prices: &[Decimal]) -> Vec<Tick> {
        prices.iter().enumerate().map(|(i, p)| Tick::new(ts(i as i64), *p)).collect()
    }

    fn frictionless() -> BacktestSettings {
        BacktestSettings {
            initial_balance: dec!(10000),
            commission: Decimal::ZERO,
            slippage: Decimal::ZERO,
            equity_sample_interval: 1,
        }
    }

    fn backtester(settings: BacktestSettings, script: Vec<SignalType>) -> Backtester {
        let config = StrategyConfig {
            position_size_pct: dec!(0.02),
            stop_loss_pct: dec!(0.005),
            take_profit_pct: dec!(0.01),
            ..Default::default()
        };
        let executor = SimulatedExecutor::from_settings(&settings);
        Backtester::new(settings, Box::new(Scripted { config, script, cursor: 0 }), Box::new(executor)).unwrap()
    }

    #[test]
    fn take_profit_pnl_is_exact_without_costs() {
        use SignalType::*;
        let mut bt = backtester(frictionless(), vec![Buy, Hold, Hold]);
        bt.run(&ticks(&[dec!(100), dec!(100.5), dec!(101)])).unwrap();

        let trade = &bt.trades()[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_eq!(trade.size, dec!(2));
        assert_eq!(trade.exit_price, trade.entry_price * (Decimal::ONE + dec!(0.01)));
        assert_eq!(trade.pnl, trade.size * trade.entry_price * dec!(0.01));
        assert_eq!(bt.balance(), dec!(10002));
    }

    #[test]
    fn stop_loss_is_checked_before_signal() {
        use SignalType::*;
        // the Sell on tick 2 arrives when the stop has already closed the long
        let mut bt = backtester(frictionless(), vec![Buy, Hold, Sell]);
        bt.run(&ticks(&[dec!(100), dec!(99.9), dec!(99.4), dec!(99.4)])).unwrap();
        let reasons: Vec<_> = bt.trades().iter().map(|t| t.exit_reason).collect();
        assert_eq!(reasons, vec![ExitReason::StopLoss, ExitReason::EndOfData]);
        assert_eq!(bt.trades()[1].side, Side::Short);
    }

    #[test]
    fn opposite_signal_reverses() {
        use SignalType::*;
        let mut bt = backtester(frictionless(), vec![Buy, Sell, Buy]);
        bt.run(&ticks(&[dec!(100), dec!(100.1), dec!(100.2)])).unwrap();
        let trades = bt.trades();
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].exit_reason, ExitReason::Signal);
        assert_eq!(trades[1].exit_reason, ExitReason::Signal);
        assert_eq!(trades[2].exit_reason, ExitReason::EndOfData);
        assert_eq!(trades[1].side, Side::Short);
    }

    #[test]
    fn same_side_signal_does_not_pyramid() {
        use SignalType::*;
        let mut bt = backtester(frictionless(), vec![Buy, Buy, Buy]);
        bt.run(&ticks(&[dec!(100), dec!(100.1), dec!(100.2)])).unwrap();
        assert_eq!(bt.trades().len(), 1);
    }

    #[test]
    fn costs_reduce_balance_by_both_fees() {
        use SignalType::*;
        let settings = BacktestSettings {
            commission: dec!(0.001),
            slippage: dec!(0.001),
            ..frictionless()
        };
        let mut bt = backtester(settings, vec![Buy]);
        bt.run(&ticks(&[dec!(100), dec!(100)])).unwrap();
        let trade = &bt.trades()[0];
        assert_eq!(trade.entry_price, dec!(100.1));
        assert_eq!(trade.exit_price, dec!(99.9));
        assert!(trade.pnl < Decimal::ZERO);
        assert!((bt.balance() - (dec!(10000) + trade.pnl)).abs() < dec!(0.000000001));
    }

    #[test]
    fn empty_ticks_fail_before_simulation() {
        let mut bt = backtester(frictionless(), vec![]);
        assert!(matches!(bt.run(&[]), Err(BacktestError::InvalidInput(_))));
        // a rejected dataset does not consume the backtester
        bt.run(&ticks(&[dec!(1), dec!(2)])).unwrap();
        assert!(matches!(bt.run(&ticks(&[dec!(1)])), Err(BacktestError::AlreadyRun)));
    }

    #[test]
    fn raw_tick_without_price_aborts() {
        let mut bt = backtester(frictionless(), vec![]);
        let raw = vec![
            RawTick { timestamp: Some(ts(0)), last: Some(dec!(1)), ..Default::default() },
            RawTick { timestamp: Some(ts(1)), last: None, ..Default::default() },
        ];
        assert!(matches!(bt.run_raw(raw), Err(BacktestError::InvalidInput(_))));
        assert_eq!(bt.ticks_processed(), 0);
    }

    #[test]
    fn checkpoint_break_stops_the_run() {
        let mut bt = backtester(frictionless(), vec![SignalType::Buy]);
        let prices: Vec<Decimal> = (0..50).map(|i| dec!(100) + Decimal::from(i % 3)).collect();
        let outcome = bt
            .run_with_checkpoints(&ticks(&prices), 10, |cp| {
                if cp.ticks_processed >= 20 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
            })
            .unwrap();
        match outcome {
            RunOutcome::Stopped(cp) => {
                assert_eq!(cp.ticks_processed, 20);
                assert!((cp.progress() - 0.4).abs() < 1e-12);
            }
            RunOutcome::Completed(_) => panic!("run should have stopped"),
        }
    }

    #[test]
    fn exit_levels_mirror_for_shorts() {
        let (sl, tp) = exit_levels(Side::Short, dec!(200), dec!(0.01), dec!(0.02));
        assert_eq!(sl, dec!(202));
        assert_eq!(tp, dec!(196));
    }
}
