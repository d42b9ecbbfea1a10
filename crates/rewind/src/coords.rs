//! Coordinate mapping between pixels, logical bar index and time/price.
//!
//! Three coordinate spaces are involved:
//!
//! - **Pixels**: positions inside one pane, resolved by its [`ChartPane`]
//! - **Logical index**: fractional bar position, possibly outside the data
//! - **Domain**: wall-clock time (epoch seconds) and price
//!
//! The pixel↔logical leg belongs to the charting library. The logical↔time leg
//! lives here, because candle series are irregular: sessions and weekends leave
//! gaps, so bar index and time are not proportional.

use rewind_core::{index_at_or_before, Candle, Point, Timeframe};

use crate::pane::ChartPane;
use crate::viewport::ScreenPos;

/// A gap up to this many nominal bars is interpolated proportionally.
const PROPORTIONAL_GAP_BARS: f64 = 1.5;

/// Translates between pixel, logical and domain coordinates for one pane.
///
/// Borrowing the pane, candles and timeframe at construction means every
/// conversion sees the current window. Build a new mapper after the data or
/// the timeframe changes.
pub struct CoordinateMapper<'a, P: ChartPane + ?Sized> {
    pane: &'a P,
    candles: &'a [Candle],
    timeframe: Timeframe,
}

impl<'a, P: ChartPane + ?Sized> CoordinateMapper<'a, P> {
    pub fn new(pane: &'a P, candles: &'a [Candle], timeframe: Timeframe) -> Self {
        Self {
            pane,
            candles,
            timeframe,
        }
    }

    pub fn pane(&self) -> &'a P {
        self.pane
    }

    pub fn candles(&self) -> &'a [Candle] {
        self.candles
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Nominal seconds per bar of the active timeframe.
    pub fn bar_seconds(&self) -> i64 {
        self.timeframe.seconds()
    }

    pub fn pixel_to_logical(&self, x: f64) -> Option<f64> {
        self.pane.coordinate_to_logical(x)
    }

    pub fn logical_to_pixel(&self, logical: f64) -> Option<f64> {
        self.pane.logical_to_coordinate(logical)
    }

    /// Time for a logical index.
    ///
    /// Inside the data the nearest candle's own time is returned; outside it the
    /// time is extrapolated by whole bar durations from the nearest boundary.
    pub fn logical_to_time(&self, logical: f64) -> Option<i64> {
        let first = self.candles.first()?;
        let last = self.candles.last()?;
        if !logical.is_finite() {
            return None;
        }

        let last_index = (self.candles.len() - 1) as f64;
        let rounded = logical.round();
        if (0.0..=last_index).contains(&rounded) {
            return Some(self.candles[rounded as usize].time);
        }

        let bar = self.bar_seconds() as f64;
        if rounded < 0.0 {
            Some(first.time + (logical * bar).round() as i64)
        } else {
            Some(last.time + ((logical - last_index) * bar).round() as i64)
        }
    }

    /// Fractional logical index for a time, even between or outside candles.
    ///
    /// Gaps wider than 1.5 bars are treated as runs of empty bars and projected
    /// by bar duration, so annotations keep their shape across weekends.
    pub fn time_to_logical(&self, time: i64) -> Option<f64> {
        let first = self.candles.first()?;
        let last = self.candles.last()?;
        let bar = self.bar_seconds() as f64;

        if time < first.time {
            return Some((time - first.time) as f64 / bar);
        }
        if time > last.time {
            let last_index = (self.candles.len() - 1) as f64;
            return Some(last_index + (time - last.time) as f64 / bar);
        }

        let idx = index_at_or_before(self.candles, time)?;
        let candle = &self.candles[idx];
        if candle.time == time {
            return Some(idx as f64);
        }

        let next = self.candles.get(idx + 1)?;
        let gap = (next.time - candle.time) as f64;
        let offset = (time - candle.time) as f64;
        if gap <= PROPORTIONAL_GAP_BARS * bar {
            Some(idx as f64 + offset / gap)
        } else {
            Some(idx as f64 + offset / bar)
        }
    }

    pub fn time_to_pixel(&self, time: i64) -> Option<f64> {
        self.time_to_logical(time)
            .and_then(|logical| self.pane.logical_to_coordinate(logical))
    }

    pub fn pixel_to_time(&self, x: f64) -> Option<i64> {
        self.pixel_to_logical(x)
            .and_then(|logical| self.logical_to_time(logical))
    }

    pub fn price_to_pixel(&self, price: f64) -> Option<f64> {
        self.pane.price_to_coordinate(price)
    }

    pub fn pixel_to_price(&self, y: f64) -> Option<f64> {
        self.pane.coordinate_to_price(y)
    }

    /// Domain point under a pixel position.
    pub fn pixel_to_point(&self, pos: ScreenPos) -> Option<Point> {
        Some(Point::new(self.pixel_to_time(pos.x)?, self.pixel_to_price(pos.y)?))
    }

    /// Pixel position of a domain point.
    pub fn point_to_pixel(&self, point: Point) -> Option<ScreenPos> {
        Some(ScreenPos::new(
            self.time_to_pixel(point.time)?,
            self.price_to_pixel(point.price)?,
        ))
    }

    /// The candle at or before `time`.
    pub fn candle_at(&self, time: i64) -> Option<&'a Candle> {
        index_at_or_before(self.candles, time).map(|idx| &self.candles[idx])
    }

    /// Pane width in pixels, used for right-extended lines.
    pub fn pane_width(&self) -> f64 {
        self.pane.size().0
    }
}
