use crate::error::BacktestError;
use chrono::{DateTime, Duration, Utc};
use core_types::{validate_ticks, Candle, CoreError, RawTick, Tick};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::f64::consts::PI;
use std::path::Path;

/// Loads ticks from a CSV file with a `timestamp,last[,volume][,symbol]` header.
///
/// The file is validated as a whole; one bad row rejects it.
pub fn load_ticks_csv(path: &Path) -> Result<Vec<Tick>, BacktestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let raw = reader
        .deserialize::<RawTick>()
        .collect::<Result<Vec<_>, _>>()?;
    let ticks = validate_ticks(raw)?;
    tracing::info!(path = %path.display(), ticks = ticks.len(), "Loaded ticks");
    Ok(ticks)
}

/// Loads OHLCV candles and turns each into one tick at its close.
pub fn load_candles_csv(path: &Path, symbol: Option<&str>) -> Result<Vec<Tick>, BacktestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut candles = reader
        .deserialize::<Candle>()
        .collect::<Result<Vec<_>, _>>()?;
    candles.sort_by_key(|c| c.open_time);
    let ticks: Vec<Tick> = candles.iter().map(|c| c.to_tick(symbol)).collect();
    core_types::check_ticks(&ticks)?;
    tracing::info!(path = %path.display(), candles = ticks.len(), "Loaded candles");
    Ok(ticks)
}

/// Parameters of a synthetic Gaussian random walk.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    pub base_price: Decimal,
    /// Standard deviation of each additive step, in price units.
    pub volatility: f64,
    pub start: DateTime<Utc>,
    pub spacing: Duration,
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self {
            base_price: dec!(1.08500),
            volatility: 0.0001,
            start: DateTime::<Utc>::UNIX_EPOCH,
            spacing: Duration::seconds(1),
        }
    }
}

impl RandomWalk {
    /// Generates `n` ticks. The same seed always yields the same series.
    pub fn generate(&self, n: usize, seed: u64) -> Result<Vec<Tick>, BacktestError> {
        if self.base_price <= Decimal::ZERO {
            return Err(CoreError::input("base_price", "must be positive").into());
        }
        if !(self.volatility.is_finite() && self.volatility >= 0.0) {
            return Err(CoreError::input("volatility", "must be a finite, non-negative number").into());
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        // Prices never reach zero; steps that would cross it are clamped.
        let floor = dec!(0.00000001);
        let mut price = self.base_price;
        let mut ticks = Vec::with_capacity(n);

        let mut timestamp = self.start;
        for i in 0..n {
            if i > 0 {
                timestamp = timestamp.checked_add_signed(self.spacing).ok_or_else(|| {
                    CoreError::input("spacing", format!("timestamp of tick {i} is out of range"))
                })?;
            }
            ticks.push(Tick::new(timestamp, price));
            let step = standard_normal(&mut rng) * self.volatility;
            let change = Decimal::from_f64(step).unwrap_or(Decimal::ZERO).round_dp(8);
            price = (price + change).max(floor);
        }
        Ok(ticks)
    }
}

/// Shorthand for `RandomWalk::default().generate(n, seed)`.
pub fn generate_random_walk(n: usize, seed: u64) -> Result<Vec<Tick>, BacktestError> {
    RandomWalk::default().generate(n, seed)
}

/// Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.r#gen::<f64>().max(1e-10);
    let u2: f64 = rng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn timestamp_overflow_is_an_input_error() {
        let walk = RandomWalk {
            start: DateTime::<Utc>::MAX_UTC - Duration::seconds(2),
            ..Default::default()
        };
        assert_eq!(walk.generate(3, 1).unwrap().len(), 3);
        assert!(matches!(
            walk.generate(10, 1),
            Err(BacktestError::InvalidInput(CoreError::InvalidInput(field, _))) if field == "spacing"
        ));
    }

    #[test]
    fn random_walk_is_deterministic_per_seed() {
        let a = generate_random_walk(500, 7).unwrap();
        let b = generate_random_walk(500, 7).unwrap();
        let c = generate_random_walk(500, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 500);
        assert_eq!(a[0].last, dec!(1.08500));
        assert!(a.windows(2).all(|w| w[1].timestamp > w[0].timestamp));
        assert!(a.iter().all(|t| t.last > Decimal::ZERO));
    }

    #[test]
    fn csv_ticks_load_and_validate() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,last,volume,symbol").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,1.1000,5,EURUSD").unwrap();
        writeln!(file, "2024-01-01T00:00:01Z,1.1002,,EURUSD").unwrap();
        file.flush().unwrap();

        let ticks = load_ticks_csv(file.path()).unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[1].last, dec!(1.1002));
        assert_eq!(ticks[1].volume, None);
        assert_eq!(ticks[0].symbol.as_deref(), Some("EURUSD"));
    }

    #[test]
    fn csv_row_without_price_rejects_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,last").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,1.1").unwrap();
        writeln!(file, "2024-01-01T00:00:01Z,").unwrap();
        file.flush().unwrap();

        assert!(matches!(load_ticks_csv(file.path()), Err(BacktestError::InvalidInput(_))));
    }

    #[test]
    fn candles_become_close_ticks() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "open_time,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-01T00:01:00Z,2,3,1,2.5,10").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,1,2,1,2,10").unwrap();
        file.flush().unwrap();

        let ticks = load_candles_csv(file.path(), Some("BTCUSDT")).unwrap();
        assert_eq!(ticks.iter().map(|t| t.last).collect::<Vec<_>>(), vec![dec!(2), dec!(2.5)]);
        assert!(ticks.iter().all(|t| t.symbol.as_deref() == Some("BTCUSDT")));
    }
}
