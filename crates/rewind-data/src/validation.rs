//! Validation utilities for fetched candle data.

use rewind_core::Candle;

/// Validate a candle has reasonable values.
pub fn validate_candle(candle: &Candle) -> bool {
    candle.open.is_finite()
        && candle.high.is_finite()
        && candle.low.is_finite()
        && candle.close.is_finite()
        && candle.high >= candle.low
        && candle.high >= candle.open.max(candle.close)
        && candle.low <= candle.open.min(candle.close)
        && candle.low > 0.0
}

/// Whether candle times are strictly increasing.
pub fn is_strictly_ascending(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].time < w[1].time)
}
