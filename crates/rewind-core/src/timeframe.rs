//! Timeframe types and bar alignment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Timeframe enumeration for the supported chart periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour4,
    Day1,
    Week1,
}

impl Timeframe {
    /// Returns the duration of this timeframe in seconds.
    pub const fn seconds(&self) -> i64 {
        match self {
            Timeframe::Min1 => 60,
            Timeframe::Min5 => 60 * 5,
            Timeframe::Min15 => 60 * 15,
            Timeframe::Min30 => 60 * 30,
            Timeframe::Hour1 => 60 * 60,
            Timeframe::Hour4 => 60 * 60 * 4,
            Timeframe::Day1 => 60 * 60 * 24,
            Timeframe::Week1 => 60 * 60 * 24 * 7,
        }
    }

    /// Returns a short label for this timeframe.
    pub const fn label(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1m",
            Timeframe::Min5 => "5m",
            Timeframe::Min15 => "15m",
            Timeframe::Min30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
        }
    }

    /// Returns all available timeframes in order.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::Min1,
            Timeframe::Min5,
            Timeframe::Min15,
            Timeframe::Min30,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Day1,
            Timeframe::Week1,
        ]
    }

    /// Floors `time` to the open of the bar containing it.
    pub fn align(&self, time: i64) -> i64 {
        let secs = self.seconds();
        time - time.rem_euclid(secs)
    }

    /// Whether bars of this timeframe are at least `other` long.
    pub fn is_at_least(&self, other: Timeframe) -> bool {
        self.seconds() >= other.seconds()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a timeframe label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeframeError(pub String);

impl fmt::Display for ParseTimeframeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown timeframe: {}", self.0)
    }
}

impl std::error::Error for ParseTimeframeError {}

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Timeframe::all()
            .iter()
            .copied()
            .find(|tf| tf.label() == trimmed)
            .or_else(|| match trimmed.to_ascii_uppercase().as_str() {
                "M1" => Some(Timeframe::Min1),
                "M5" => Some(Timeframe::Min5),
                "M15" => Some(Timeframe::Min15),
                "M30" => Some(Timeframe::Min30),
                "H1" => Some(Timeframe::Hour1),
                "H4" => Some(Timeframe::Hour4),
                "D1" => Some(Timeframe::Day1),
                "W1" => Some(Timeframe::Week1),
                _ => None,
            })
            .ok_or_else(|| ParseTimeframeError(s.to_string()))
    }
}
