use backtester::data::generate_random_walk;
use backtester::Backtester;
use configuration::{BacktestSettings, StrategyConfig};
use core_types::ExitReason;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn strategy_config() -> StrategyConfig {
    StrategyConfig {
        depth: 4,
        confidence_threshold: 0.05,
        min_observations: 3,
        ..Default::default()
    }
}

fn run_walk(n: usize, seed: u64) -> Backtester {
    let ticks = generate_random_walk(n, seed).unwrap();
    let settings = BacktestSettings {
        equity_sample_interval: 10,
        ..Default::default()
    };
    let mut bt = Backtester::from_config(settings, strategy_config()).unwrap();
    bt.run(&ticks).unwrap();
    bt
}

#[test]
fn balance_equals_initial_plus_realized_pnl() {
    let bt = run_walk(5_000, 1);
    let realized: Decimal = bt.trades().iter().map(|t| t.pnl).sum();
    assert!(!bt.trades().is_empty());
    // Decimal rounds at 28 significant digits, so compare within a tolerance
    assert!((bt.balance() - (dec!(10000) + realized)).abs() < dec!(0.000000001));
    assert!(bt.open_position().is_none());
}

#[test]
fn at_most_one_position_at_a_time() {
    let bt = run_walk(5_000, 2);
    for pair in bt.trades().windows(2) {
        assert!(pair[1].entry_time >= pair[0].exit_time);
    }
    let end_of_data = bt
        .trades()
        .iter()
        .filter(|t| t.exit_reason == ExitReason::EndOfData)
        .count();
    assert!(end_of_data <= 1);
}

#[test]
fn equity_curve_is_bounded_and_ends_on_last_tick() {
    let bt = run_walk(2_001, 3);
    let curve = bt.equity_curve();
    // samples at 0, 10, ..., 1990 plus the final tick
    assert_eq!(curve.len(), 201);
    assert!(curve.windows(2).all(|w| w[1].peak >= w[0].peak));
    assert!(curve.iter().all(|p| (0.0..=1.0).contains(&p.drawdown_pct)));
    assert_eq!(curve.last().unwrap().equity, bt.balance());

    let metrics = bt.metrics().unwrap();
    assert!((0.0..=1.0).contains(&metrics.max_drawdown_pct));
    assert_eq!(metrics.total_trades, bt.trades().len());
    assert!(metrics.winning_trades + metrics.losing_trades <= metrics.total_trades);
}

#[test]
fn identical_inputs_replay_identically() {
    let a = run_walk(3_000, 9);
    let b = run_walk(3_000, 9);
    assert_eq!(a.balance(), b.balance());
    assert_eq!(a.trades().len(), b.trades().len());
}

#[test]
fn exports_write_trades_equity_and_summary() {
    let bt = run_walk(2_000, 4);
    let dir = tempfile::tempdir().unwrap();

    let trades_path = dir.path().join("trades.json");
    bt.export_trades(&trades_path).unwrap();
    let trades: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&trades_path).unwrap()).unwrap();
    assert_eq!(trades.as_array().unwrap().len(), bt.trades().len());

    let equity_path = dir.path().join("equity.csv");
    bt.export_equity_curve(&equity_path).unwrap();
    let csv = std::fs::read_to_string(&equity_path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("timestamp,balance,equity,drawdown,drawdown_pct"));
    assert_eq!(lines.count(), bt.equity_curve().len());

    let summary = bt.summary().unwrap();
    assert_eq!(summary.ticks_processed, 2_000);
    assert_eq!(summary.strategy.depth, 4);
}
