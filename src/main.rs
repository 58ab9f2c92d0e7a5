use anyhow::{Context, Result};
use backtester::data::{load_candles_csv, load_ticks_csv, RandomWalk};
use backtester::Backtester;
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use configuration::{load_config, Config, ObjectiveMetric, SamplerKind};
use core_types::Tick;
use evaluator::report::{render_corrections, render_evaluation, render_states, render_variants};
use evaluator::{
    collect_labeled_predictions, compare_corrections, unzip_samples, Correction, EvaluationResult,
    Label, ModelEvaluator, StateEvaluation, VariantComparison,
};
use optimizer::{Optimizer, StudySummary};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strategies::AdaptiveModel;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// The main entry point for the ASMBTR research toolkit.
fn main() -> Result<()> {
    // A missing .env file is fine; everything has a default.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref())?;
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Backtest(args) => handle_backtest(args, config),
        Commands::Optimize(args) => handle_optimize(args, config),
        Commands::Evaluate(args) => handle_evaluate(args, config),
        Commands::Generate(args) => handle_generate(args),
    }
}

/// Console logging filtered by `RUST_LOG` (default `info`), plus an optional
/// daily-rolling file. The returned guard must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "asmbtr.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).try_init()?;
            Ok(None)
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Adaptive state-based binary-trend research: backtest, optimize and evaluate.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./asmbtr.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a daily-rolling file in this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay ticks through the strategy and report performance.
    Backtest(BacktestArgs),
    /// Search the strategy parameter space.
    Optimize(OptimizeArgs),
    /// Measure prediction quality and its statistical significance.
    Evaluate(EvaluateArgs),
    /// Write a synthetic random-walk tick file.
    Generate(GenerateArgs),
}

/// Where ticks come from. Without a file, a seeded random walk is used.
#[derive(Args)]
struct DataArgs {
    /// Tick CSV with `timestamp,last[,volume,symbol]` columns.
    #[arg(long, conflicts_with = "candles")]
    ticks: Option<PathBuf>,

    /// OHLCV candle CSV; each close becomes one tick.
    #[arg(long)]
    candles: Option<PathBuf>,

    /// Symbol attached to candle-derived ticks.
    #[arg(long)]
    symbol: Option<String>,

    /// Number of synthetic ticks when no file is given.
    #[arg(long, default_value_t = 10_000)]
    synthetic: usize,

    /// Seed of the synthetic series.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl DataArgs {
    fn load(&self) -> Result<Vec<Tick>> {
        let ticks = match (&self.ticks, &self.candles) {
            (Some(path), _) => load_ticks_csv(path)
                .with_context(|| format!("Failed to load ticks from {}", path.display()))?,
            (None, Some(path)) => load_candles_csv(path, self.symbol.as_deref())
                .with_context(|| format!("Failed to load candles from {}", path.display()))?,
            (None, None) => RandomWalk::default().generate(self.synthetic, self.seed)?,
        };
        tracing::info!(ticks = ticks.len(), "Market data loaded");
        Ok(ticks)
    }
}

/// Per-run overrides of the `[strategy]` section.
#[derive(Args)]
struct StrategyOverrides {
    #[arg(long)]
    depth: Option<usize>,

    #[arg(long)]
    confidence_threshold: Option<f64>,
}

impl StrategyOverrides {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(depth) = self.depth {
            config.strategy.depth = depth;
        }
        if let Some(threshold) = self.confidence_threshold {
            config.strategy.confidence_threshold = threshold;
        }
        config.strategy.validate()?;
        Ok(())
    }
}

#[derive(Parser)]
struct BacktestArgs {
    #[command(flatten)]
    data: DataArgs,

    #[command(flatten)]
    strategy: StrategyOverrides,

    /// Write closed trades as JSON.
    #[arg(long)]
    trades_out: Option<PathBuf>,

    /// Write the equity curve as CSV.
    #[arg(long)]
    equity_out: Option<PathBuf>,

    /// Write settings and metrics as JSON.
    #[arg(long)]
    summary_out: Option<PathBuf>,

    #[arg(long)]
    progress: bool,
}

#[derive(Parser)]
struct OptimizeArgs {
    #[command(flatten)]
    data: DataArgs,

    #[arg(long)]
    trials: Option<usize>,

    #[arg(long, value_enum)]
    objective: Option<ObjectiveMetric>,

    #[arg(long, value_enum)]
    sampler: Option<SamplerKind>,

    /// Sampler seed.
    #[arg(long)]
    sampler_seed: Option<u64>,

    /// Worker threads (defaults to the number of CPUs).
    #[arg(long)]
    concurrency: Option<usize>,

    /// Trials suggested per batch before results are fed back (overrides config).
    #[arg(long)]
    batch_size: Option<usize>,

    /// Write the study with every trial as JSON.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the best strategy configuration as JSON.
    #[arg(long)]
    best_config_out: Option<PathBuf>,

    #[arg(long)]
    progress: bool,
}

#[derive(Parser)]
struct EvaluateArgs {
    #[command(flatten)]
    data: DataArgs,

    #[command(flatten)]
    strategy: StrategyOverrides,

    #[arg(long, value_enum, default_value_t = Correction::Bonferroni)]
    correction: Correction,

    #[arg(long, default_value_t = evaluator::DEFAULT_ALPHA)]
    alpha: f64,

    /// Extra confidence thresholds to compare against the configured one.
    #[arg(long, value_delimiter = ',')]
    thresholds: Vec<f64>,

    /// Number of states shown in the per-state table.
    #[arg(long, default_value_t = 20)]
    top: usize,

    /// Write the full evaluation as JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct GenerateArgs {
    #[arg(long, default_value_t = 10_000)]
    count: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long)]
    base_price: Option<Decimal>,

    /// Standard deviation of each step, in price units.
    #[arg(long)]
    volatility: Option<f64>,

    #[arg(long)]
    symbol: Option<String>,

    #[arg(long)]
    output: PathBuf,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_backtest(args: BacktestArgs, mut config: Config) -> Result<()> {
    args.strategy.apply(&mut config)?;
    let ticks = args.data.load()?;

    let mut backtester =
        Backtester::from_config(config.backtest, config.strategy)?.with_progress(args.progress);
    let metrics = backtester.run(&ticks)?;

    let mut table = new_table(vec!["Metric", "Value"]);
    for (name, value) in [
        ("Total trades", metrics.total_trades.to_string()),
        ("Win rate", format!("{:.2}%", metrics.win_rate * 100.0)),
        ("Initial balance", metrics.initial_balance.round_dp(2).to_string()),
        ("Final balance", metrics.final_balance.round_dp(2).to_string()),
        ("Total PnL", metrics.total_pnl.round_dp(2).to_string()),
        ("Total return", format!("{:.4}%", metrics.total_return_pct * 100.0)),
        ("Profit factor", format!("{:.3}", metrics.profit_factor)),
        ("Payoff ratio", format!("{:.3}", metrics.payoff_ratio)),
        ("Sharpe ratio", format!("{:.3}", metrics.sharpe_ratio)),
        ("Sortino ratio", format!("{:.3}", metrics.sortino_ratio)),
        ("Max drawdown", format!("{:.4}%", metrics.max_drawdown_pct * 100.0)),
        ("Calmar ratio", format!("{:.3}", metrics.calmar_ratio)),
        ("Avg trade duration (s)", format!("{:.1}", metrics.avg_trade_duration_seconds)),
        ("Trades per day", format!("{:.2}", metrics.trades_per_day)),
    ] {
        table.add_row(vec![name.to_string(), value]);
    }
    println!("Backtest {}\n{table}", backtester.run_id());

    if let Some(path) = &args.trades_out {
        backtester.export_trades(path)?;
        tracing::info!(path = %path.display(), "Trades exported");
    }
    if let Some(path) = &args.equity_out {
        backtester.export_equity_curve(path)?;
        tracing::info!(path = %path.display(), "Equity curve exported");
    }
    if let Some(path) = &args.summary_out {
        backtester.export_summary(path)?;
        tracing::info!(path = %path.display(), "Summary exported");
    }
    Ok(())
}

fn handle_optimize(args: OptimizeArgs, mut config: Config) -> Result<()> {
    let settings = &mut config.optimizer;
    if let Some(trials) = args.trials {
        settings.n_trials = trials;
    }
    if let Some(objective) = args.objective {
        settings.objective = objective;
    }
    if let Some(sampler) = args.sampler {
        settings.sampler = sampler;
    }
    if let Some(seed) = args.sampler_seed {
        settings.seed = seed;
    }
    if args.concurrency.is_some() {
        settings.concurrency = args.concurrency;
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size;
    }

    let ticks: Arc<[Tick]> = args.data.load()?.into();
    let optimizer = Optimizer::new(config.optimizer, config.backtest, config.strategy)?
        .with_progress(args.progress);
    let study = optimizer.run(ticks)?;
    print_study(&study.summary());

    if let Some(path) = &args.output {
        study.export_json(path)?;
        tracing::info!(path = %path.display(), "Study exported");
    }
    if let Some(path) = &args.best_config_out {
        match study.best_config() {
            Some(best) => {
                std::fs::write(path, serde_json::to_string_pretty(&best)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "Best configuration exported");
            }
            None => tracing::warn!("No completed trial; best configuration not written"),
        }
    }
    Ok(())
}

fn print_study(summary: &StudySummary) {
    let fmt_opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    let mut table = new_table(vec!["Study", "Value"]);
    table
        .add_row(vec!["Objective".to_string(), summary.objective.to_string()])
        .add_row(vec!["Trials".to_string(), summary.total_trials.to_string()])
        .add_row(vec![
            "Completed / pruned / failed".to_string(),
            format!(
                "{} / {} / {}",
                summary.completed_trials, summary.pruned_trials, summary.failed_trials
            ),
        ])
        .add_row(vec!["Baseline".to_string(), fmt_opt(summary.baseline_value)])
        .add_row(vec!["Best".to_string(), fmt_opt(summary.best_value)])
        .add_row(vec!["Improvement".to_string(), format!("{:.2}%", summary.improvement_pct)]);
    println!("Study {}\n{table}", summary.study_id);

    if let Some(p) = &summary.best_params {
        let mut params = new_table(vec!["Parameter", "Best"]);
        params
            .add_row(vec!["depth".to_string(), p.depth.to_string()])
            .add_row(vec!["confidence_threshold".to_string(), format!("{:.4}", p.confidence_threshold)])
            .add_row(vec!["position_size_pct".to_string(), p.position_size_pct.to_string()])
            .add_row(vec!["stop_loss_pct".to_string(), p.stop_loss_pct.to_string()])
            .add_row(vec!["take_profit_pct".to_string(), p.take_profit_pct.to_string()])
            .add_row(vec!["decay_rate".to_string(), format!("{:.5}", p.decay_rate)])
            .add_row(vec!["min_observations".to_string(), p.min_observations.to_string()]);
        println!("{params}");
    }
}

#[derive(Serialize)]
struct EvaluationExport<'a> {
    overall: &'a EvaluationResult,
    states: &'a [StateEvaluation<String>],
    variants: &'a [VariantComparison],
}

fn handle_evaluate(args: EvaluateArgs, mut config: Config) -> Result<()> {
    args.strategy.apply(&mut config)?;
    let evaluator = ModelEvaluator::new(args.alpha)?;
    let prices: Vec<Decimal> = args.data.load()?.iter().map(|t| t.last).collect();

    let predict = |threshold: f64| -> Result<_> {
        let mut model = AdaptiveModel::new(&config.strategy)?;
        let samples = collect_labeled_predictions(&mut model, prices.iter().copied(), threshold)?;
        Ok(unzip_samples(&samples))
    };

    let (states, actual, predicted) = predict(config.strategy.confidence_threshold)?;
    // The configured threshold and every compared one form one family.
    let n_tests = 1 + args.thresholds.len();
    let overall = evaluator.evaluate(&actual, &predicted, args.correction, n_tests)?;

    let state_keys: Vec<String> = states.iter().map(ToString::to_string).collect();
    let per_state = evaluator.evaluate_states(&state_keys, &actual, &predicted, args.correction)?;

    let mut variants: Vec<(String, Vec<Label>)> = vec![(
        format!("threshold {:.3} (configured)", config.strategy.confidence_threshold),
        predicted,
    )];
    for &threshold in &args.thresholds {
        let (_, _, variant) = predict(threshold)?;
        variants.push((format!("threshold {threshold:.3}"), variant));
    }
    let ranked = evaluator.compare_variants(&actual, &variants)?;

    println!("{}\n", render_evaluation(&overall));
    println!("{}\n", render_states(&per_state, args.top));
    println!("{}", render_variants(&ranked));
    if !per_state.is_empty() {
        let p_values: Vec<f64> = per_state.iter().map(|s| s.p_value).collect();
        println!("\n{}", render_corrections(&compare_corrections(&p_values, args.alpha)?));
    }

    if let Some(path) = &args.output {
        let export = EvaluationExport {
            overall: &overall,
            states: &per_state,
            variants: &ranked,
        };
        std::fs::write(path, serde_json::to_string_pretty(&export)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Evaluation exported");
    }
    Ok(())
}

fn handle_generate(args: GenerateArgs) -> Result<()> {
    let mut walk = RandomWalk::default();
    if let Some(base) = args.base_price {
        walk.base_price = base;
    }
    if let Some(volatility) = args.volatility {
        walk.volatility = volatility;
    }
    let mut ticks = walk.generate(args.count, args.seed)?;
    if let Some(symbol) = &args.symbol {
        for tick in &mut ticks {
            tick.symbol = Some(symbol.clone());
        }
    }

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    for tick in &ticks {
        writer.serialize(tick)?;
    }
    writer.flush()?;
    tracing::info!(ticks = ticks.len(), path = %args.output.display(), "Synthetic ticks written");
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}
