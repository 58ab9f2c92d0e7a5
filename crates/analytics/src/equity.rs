use chrono::{DateTime, Utc};
use core_types::EquityPoint;
use rust_decimal::prelude::*;

/// Builds equity points while tracking the running peak.
///
/// The peak never decreases, and `drawdown_pct` is clamped to `[0, 1]` even when
/// equity goes negative.
#[derive(Debug, Clone)]
pub struct EquityTracker {
    peak: Decimal,
    max_drawdown: Decimal,
    max_drawdown_pct: f64,
}

impl EquityTracker {
    pub fn new(initial_equity: Decimal) -> Self {
        Self {
            peak: initial_equity,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: 0.0,
        }
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, balance: Decimal, equity: Decimal) -> EquityPoint {
        if equity > self.peak {
            self.peak = equity;
        }
        let (drawdown, drawdown_pct) = drawdown(self.peak, equity);
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
        if drawdown_pct > self.max_drawdown_pct {
            self.max_drawdown_pct = drawdown_pct;
        }
        EquityPoint {
            timestamp,
            balance,
            equity,
            peak: self.peak,
            drawdown,
            drawdown_pct,
        }
    }

    pub fn peak(&self) -> Decimal {
        self.peak
    }

    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown_pct
    }
}

/// Absolute and fractional distance of `equity` below `peak`.
pub fn drawdown(peak: Decimal, equity: Decimal) -> (Decimal, f64) {
    let dd = (peak - equity).max(Decimal::ZERO);
    if peak <= Decimal::ZERO {
        return (dd, 0.0);
    }
    let pct = (dd / peak).to_f64().unwrap_or_default().clamp(0.0, 1.0);
    (dd, pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn peak_is_monotone_and_drawdown_bounded() {
        let t = Utc.timestamp_opt(0, 0).unwrap();
        let mut tracker = EquityTracker::new(dec!(100));
        let points: Vec<_> = [dec!(110), dec!(99), dec!(120), dec!(-5), dec!(60)]
            .into_iter()
            .map(|e| tracker.record(t, e, e))
            .collect();

        assert!(points.windows(2).all(|w| w[1].peak >= w[0].peak));
        assert!(points.iter().all(|p| (0.0..=1.0).contains(&p.drawdown_pct)));
        assert_eq!(points[1].drawdown, dec!(11));
        assert_eq!(points[3].drawdown_pct, 1.0);
        assert_eq!(tracker.max_drawdown(), dec!(125));
        assert_eq!(tracker.peak(), dec!(120));
    }
}
