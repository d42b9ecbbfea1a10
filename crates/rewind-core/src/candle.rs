//! Candle and point data structures.

use serde::{Deserialize, Serialize};

/// OHLC candle keyed by its open time in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// A flat candle with all four prices equal.
    pub fn flat(time: i64, price: f64) -> Self {
        Self::new(time, price, price, price, price)
    }

    /// Copy of this candle moved to another open time.
    #[must_use]
    pub fn with_time(self, time: i64) -> Self {
        Self { time, ..self }
    }

    /// End of the bar interval `[time, time + bar_seconds)`.
    pub fn end_time(&self, bar_seconds: i64) -> i64 {
        self.time + bar_seconds
    }
}

/// A position in domain space: wall-clock time and price.
///
/// Every drawing anchors to points, never to pixels, so annotations survive
/// zoom, scroll and data reloads.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub time: i64,
    pub price: f64,
}

impl Point {
    pub const fn new(time: i64, price: f64) -> Self {
        Self { time, price }
    }

    /// Translate by a time and price delta.
    #[must_use]
    pub fn translate(self, d_time: i64, d_price: f64) -> Self {
        Self {
            time: self.time + d_time,
            price: self.price + d_price,
        }
    }
}

/// Index of the last candle whose time is at or before `time`.
///
/// Returns `None` when the slice is empty or every candle is newer.
pub fn index_at_or_before(candles: &[Candle], time: i64) -> Option<usize> {
    match candles.binary_search_by_key(&time, |c| c.time) {
        Ok(idx) => Some(idx),
        Err(0) => None,
        Err(idx) => Some(idx - 1),
    }
}
