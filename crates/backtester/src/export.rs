use crate::error::BacktestError;
use crate::Backtester;
use analytics::BacktestMetrics;
use configuration::{BacktestSettings, StrategyConfig};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use uuid::Uuid;

/// A self-contained, serializable record of one run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestSummary {
    pub run_id: Uuid,
    pub settings: BacktestSettings,
    pub strategy: StrategyConfig,
    pub ticks_processed: usize,
    pub metrics: BacktestMetrics,
}

#[derive(Serialize)]
struct EquityRow {
    timestamp: String,
    balance: Decimal,
    equity: Decimal,
    drawdown: Decimal,
    drawdown_pct: f64,
}

impl Backtester {
    /// Writes all completed trades as a pretty-printed JSON array.
    pub fn export_trades(&self, path: &Path) -> Result<(), BacktestError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self.trades())?;
        tracing::info!(path = %path.display(), trades = self.trades().len(), "Exported trades");
        Ok(())
    }

    /// Writes the sampled equity curve as CSV.
    pub fn export_equity_curve(&self, path: &Path) -> Result<(), BacktestError> {
        let mut writer = csv::Writer::from_path(path)?;
        for point in self.equity_curve() {
            writer.serialize(EquityRow {
                timestamp: point.timestamp.to_rfc3339(),
                balance: point.balance,
                equity: point.equity,
                drawdown: point.drawdown,
                drawdown_pct: point.drawdown_pct,
            })?;
        }
        writer.flush()?;
        tracing::info!(path = %path.display(), points = self.equity_curve().len(), "Exported equity curve");
        Ok(())
    }

    pub fn summary(&self) -> Result<BacktestSummary, BacktestError> {
        Ok(BacktestSummary {
            run_id: self.run_id(),
            settings: self.settings().clone(),
            strategy: self.strategy_config().clone(),
            ticks_processed: self.ticks_processed(),
            metrics: self.metrics()?,
        })
    }

    pub fn export_summary(&self, path: &Path) -> Result<(), BacktestError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.summary()?)?;
        Ok(())
    }
}
