//! Binary state representation.
//!
//! A `BinaryState` is a fixed-length sequence of up/down movements packed into a
//! `u64`. The sequence is ordered oldest-first; the most recent movement is the
//! least significant bit, so appending a movement is a shift-left.

use core_types::CoreError;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

pub const MIN_DEPTH: usize = configuration::MIN_DEPTH;
pub const MAX_DEPTH: usize = configuration::MAX_DEPTH;

/// Fails with `InvalidConfiguration` when `depth` is outside `[2, 64]`.
pub fn check_depth(depth: usize) -> Result<(), CoreError> {
    if (MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        Ok(())
    } else {
        Err(CoreError::configuration(
            "depth",
            format!("must be within [{MIN_DEPTH}, {MAX_DEPTH}], got {depth}"),
        ))
    }
}

/// Bit mask selecting the low `depth` bits.
pub(crate) fn mask(depth: usize) -> u64 {
    if depth >= 64 {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinaryState {
    bits: u64,
    depth: u8,
}

impl BinaryState {
    /// Builds a state from an oldest-first movement sequence (`true` = up).
    pub fn from_sequence(sequence: &[bool]) -> Result<Self, CoreError> {
        check_depth(sequence.len())?;
        let bits = sequence
            .iter()
            .fold(0u64, |acc, &up| (acc << 1) | u64::from(up));
        Ok(Self {
            bits,
            depth: sequence.len() as u8,
        })
    }

    /// Builds a state from its decimal value, zero-padded to `depth` movements.
    pub fn from_decimal(value: u64, depth: usize) -> Result<Self, CoreError> {
        check_depth(depth)?;
        if value & !mask(depth) != 0 {
            return Err(CoreError::input(
                "value",
                format!("{value} does not fit in {depth} bits"),
            ));
        }
        Ok(Self {
            bits: value,
            depth: depth as u8,
        })
    }

    /// Parses a string such as `"01101"`.
    pub fn from_binary_str(s: &str) -> Result<Self, CoreError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoreError::input("binary_sequence", "empty sequence"));
        }
        let sequence = s
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(CoreError::input(
                    "binary_sequence",
                    format!("unexpected character '{other}', only '0' and '1' are allowed"),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&sequence.len()) {
            return Err(CoreError::input(
                "binary_sequence",
                format!("length {} is outside [{MIN_DEPTH}, {MAX_DEPTH}]", sequence.len()),
            ));
        }
        Self::from_sequence(&sequence)
    }

    /// Encodes raw price deltas, oldest first. A zero or negative delta counts as down.
    pub fn from_deltas(deltas: &[Decimal]) -> Result<Self, CoreError> {
        let sequence: Vec<bool> = deltas.iter().map(|d| *d > Decimal::ZERO).collect();
        Self::from_sequence(&sequence)
    }

    pub fn to_decimal(&self) -> u64 {
        self.bits
    }

    pub fn depth(&self) -> usize {
        usize::from(self.depth)
    }

    /// Movement at position `index` (0 = oldest).
    pub fn movement(&self, index: usize) -> Option<bool> {
        let depth = self.depth();
        (index < depth).then(|| (self.bits >> (depth - 1 - index)) & 1 == 1)
    }

    /// The most recent movement.
    pub fn latest(&self) -> bool {
        self.bits & 1 == 1
    }

    pub fn sequence(&self) -> Vec<bool> {
        (0..self.depth())
            .filter_map(|i| self.movement(i))
            .collect()
    }

    /// The state that follows once `is_up` is observed: oldest movement drops out.
    pub fn shifted(&self, is_up: bool) -> Self {
        Self {
            bits: ((self.bits << 1) | u64::from(is_up)) & mask(self.depth()),
            depth: self.depth,
        }
    }

    /// `2^depth`, as `u128` so that depth 64 is representable.
    pub fn total_states(depth: usize) -> u128 {
        1u128 << depth
    }
}

impl fmt::Display for BinaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$b}", self.bits, width = self.depth())
    }
}

impl FromStr for BinaryState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_binary_str(s)
    }
}

/// Lazily enumerates every state of a depth in increasing decimal order.
#[derive(Debug, Clone)]
pub struct AllStates {
    depth: usize,
    next: u128,
    end: u128,
}

impl AllStates {
    /// Number of states the iterator yields in total.
    pub fn total(&self) -> u128 {
        BinaryState::total_states(self.depth)
    }

    pub fn remaining(&self) -> u128 {
        self.end - self.next
    }
}

impl Iterator for AllStates {
    type Item = BinaryState;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let state = BinaryState {
            bits: self.next as u64,
            depth: self.depth as u8,
        };
        self.next += 1;
        Some(state)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Every possible state for `depth`, from `00..0` to `11..1`.
pub fn create_all_states(depth: usize) -> Result<AllStates, CoreError> {
    check_depth(depth)?;
    Ok(AllStates {
        depth,
        next: 0,
        end: BinaryState::total_states(depth),
    })
}
