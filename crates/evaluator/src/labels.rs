use crate::error::EvaluatorError;
use core_types::SignalType;
use serde::{Deserialize, Serialize};
use std::fmt;
use strategies::Direction;

/// A three-way class: sell/down, hold/flat, buy/up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Label {
    Sell = -1,
    Hold = 0,
    Buy = 1,
}

impl Label {
    /// Matrix order: -1, 0, 1.
    pub const ALL: [Label; 3] = [Label::Sell, Label::Hold, Label::Buy];

    pub fn index(self) -> usize {
        match self {
            Label::Sell => 0,
            Label::Hold => 1,
            Label::Buy => 2,
        }
    }

    pub fn value(self) -> i8 {
        self as i8
    }

    pub fn name(self) -> &'static str {
        match self {
            Label::Sell => "Sell",
            Label::Hold => "Hold",
            Label::Buy => "Buy",
        }
    }

    /// Sign of a price change; exact zero is `Hold`.
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Label::Buy
        } else if change < 0.0 {
            Label::Sell
        } else {
            Label::Hold
        }
    }
}

impl TryFrom<i8> for Label {
    type Error = EvaluatorError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Label::Sell),
            0 => Ok(Label::Hold),
            1 => Ok(Label::Buy),
            other => Err(EvaluatorError::InvalidLabel(other)),
        }
    }
}

impl From<Label> for i8 {
    fn from(label: Label) -> Self {
        label.value()
    }
}

impl From<SignalType> for Label {
    fn from(signal: SignalType) -> Self {
        match signal {
            SignalType::Buy => Label::Buy,
            SignalType::Sell => Label::Sell,
            SignalType::Hold => Label::Hold,
        }
    }
}

impl From<Direction> for Label {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Label::Buy,
            Direction::Down => Label::Sell,
            Direction::Neutral => Label::Hold,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Converts raw integers, rejecting anything outside -1/0/1.
pub fn labels_from_values(values: &[i8]) -> Result<Vec<Label>, EvaluatorError> {
    values.iter().map(|&v| Label::try_from(v)).collect()
}

/// Labels price changes; moves smaller than `threshold` in magnitude are `Hold`.
pub fn labels_from_price_changes(changes: &[f64], threshold: f64) -> Vec<Label> {
    changes
        .iter()
        .map(|&change| {
            if change.abs() < threshold {
                Label::Hold
            } else {
                Label::from_change(change)
            }
        })
        .collect()
}
