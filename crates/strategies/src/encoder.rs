use crate::btr::{check_depth, mask, BinaryState};
use core_types::CoreError;
use rust_decimal::Decimal;

/// Sliding window of the last `depth` price movements.
///
/// The window is a shift register: pushing a movement shifts the oldest one out
/// of the masked `u64`, so eviction is O(1) and no buffer is reallocated.
#[derive(Debug, Clone)]
pub struct StateEncoder {
    depth: usize,
    window: u64,
    filled: usize,
    last_price: Option<Decimal>,
    movements_seen: u64,
}

impl StateEncoder {
    pub fn new(depth: usize) -> Result<Self, CoreError> {
        check_depth(depth)?;
        Ok(Self {
            depth,
            window: 0,
            filled: 0,
            last_price: None,
            movements_seen: 0,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pushes one movement, evicting the oldest once the window is full.
    pub fn add_movement(&mut self, is_up: bool) {
        self.window = ((self.window << 1) | u64::from(is_up)) & mask(self.depth);
        self.filled = (self.filled + 1).min(self.depth);
        self.movements_seen += 1;
    }

    /// The current state, available once `depth` movements have been seen.
    pub fn get_state(&self) -> Option<BinaryState> {
        if !self.is_ready() {
            return None;
        }
        BinaryState::from_decimal(self.window, self.depth).ok()
    }

    /// Converts a raw price into a movement against the previous price.
    ///
    /// The first price only primes the encoder, and an unchanged price produces no
    /// movement. Returns the movement pushed, if any.
    pub fn process_price(&mut self, price: Decimal) -> Option<bool> {
        let previous = self.last_price.replace(price)?;
        if price == previous {
            return None;
        }
        let is_up = price > previous;
        self.add_movement(is_up);
        Some(is_up)
    }

    pub fn is_ready(&self) -> bool {
        self.filled == self.depth
    }

    /// Number of movements currently held (at most `depth`).
    pub fn history_len(&self) -> usize {
        self.filled
    }

    pub fn movements_seen(&self) -> u64 {
        self.movements_seen
    }

    pub fn last_price(&self) -> Option<Decimal> {
        self.last_price
    }

    pub fn reset(&mut self) {
        self.window = 0;
        self.filled = 0;
        self.last_price = None;
        self.movements_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn state_only_after_window_fills() {
        let mut enc = StateEncoder::new(3).unwrap();
        enc.add_movement(true);
        enc.add_movement(false);
        assert!(enc.get_state().is_none());
        enc.add_movement(true);
        assert_eq!(enc.get_state().unwrap().to_string(), "101");
    }

    #[test]
    fn oldest_movement_is_evicted() {
        let mut enc = StateEncoder::new(3).unwrap();
        for up in [true, true, false, false] {
            enc.add_movement(up);
        }
        assert_eq!(enc.get_state().unwrap().to_string(), "100");
        assert_eq!(enc.history_len(), 3);
        assert_eq!(enc.movements_seen(), 4);
    }

    #[test]
    fn prices_become_movements() {
        let mut enc = StateEncoder::new(2).unwrap();
        assert_eq!(enc.process_price(dec!(1.0)), None);
        assert_eq!(enc.process_price(dec!(1.1)), Some(true));
        assert_eq!(enc.process_price(dec!(1.1)), None);
        assert_eq!(enc.process_price(dec!(1.05)), Some(false));
        assert_eq!(enc.get_state().unwrap().to_string(), "10");
    }

    #[test]
    fn reset_clears_history() {
        let mut enc = StateEncoder::new(2).unwrap();
        enc.process_price(dec!(1));
        enc.process_price(dec!(2));
        enc.process_price(dec!(3));
        assert!(enc.is_ready());
        enc.reset();
        assert!(!enc.is_ready());
        assert!(enc.last_price().is_none());
    }

    #[test]
    fn rejects_invalid_depth() {
        assert!(StateEncoder::new(1).is_err());
        assert!(StateEncoder::new(65).is_err());
    }
}
