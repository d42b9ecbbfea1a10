//! Magnet snapping and angle constraints for drawing gestures.

use rewind_core::{Candle, Point};

use crate::coords::CoordinateMapper;
use crate::pane::{ChartPane, PaneId};

/// The OHLC value of `candle` nearest to `raw`.
///
/// Ties resolve in the fixed order high, low, close, open.
pub fn nearest_ohlc(candle: &Candle, raw: f64) -> f64 {
    [candle.high, candle.low, candle.close, candle.open]
        .into_iter()
        .fold((candle.high, f64::INFINITY), |(best, best_dist), value| {
            let dist = (value - raw).abs();
            if dist < best_dist {
                (value, dist)
            } else {
                (best, best_dist)
            }
        })
        .0
}

/// Snap a raw price to the candle at `time` when the magnet applies.
///
/// Only the main pane snaps; indicator panes have no OHLC to snap to.
pub fn snap_price<P: ChartPane + ?Sized>(
    mapper: &CoordinateMapper<'_, P>,
    pane: PaneId,
    magnet: bool,
    time: i64,
    raw: f64,
) -> f64 {
    if !magnet || !pane.is_main() {
        return raw;
    }
    mapper
        .candle_at(time)
        .map_or(raw, |candle| nearest_ohlc(candle, raw))
}

/// Lock `current` to a horizontal or vertical line through `anchor`.
///
/// The axis with the larger pixel delta stays free; the other takes the
/// anchor's value. Equal deltas lock the price. Returns `current` unchanged
/// when either point cannot be placed on screen.
pub fn constrain_angle<P: ChartPane + ?Sized>(
    mapper: &CoordinateMapper<'_, P>,
    anchor: Point,
    current: Point,
) -> Point {
    let (Some(a), Some(c)) = (mapper.point_to_pixel(anchor), mapper.point_to_pixel(current)) else {
        return current;
    };

    if (c.x - a.x).abs() >= (c.y - a.y).abs() {
        Point::new(current.time, anchor.price)
    } else {
        Point::new(anchor.time, current.price)
    }
}
