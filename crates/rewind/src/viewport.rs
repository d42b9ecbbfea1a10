//! A self-contained linear viewport implementing [`ChartPane`].
//!
//! Hosts that drive a real charting library implement [`ChartPane`] on top of
//! it. Headless hosts (tests, the demo binary, server-side scene rendering) use
//! [`LinearPane`], which maps:
//!
//! - **Screen coordinates** ([`ScreenPos`]): pixels from the pane's top-left
//! - **Logical coordinates**: fractional bar index, linear in X
//! - **Price**: linear in Y, highest price at the top

use crate::pane::{ChartPane, LogicalRange};

/// Screen coordinates in pixels from the top-left corner of a pane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPos {
    pub x: f64,
    pub y: f64,
}

impl ScreenPos {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another screen position.
    #[must_use]
    pub fn distance_to(self, other: ScreenPos) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    /// Calculate squared distance (faster than distance_to when only comparing).
    #[must_use]
    pub fn distance_squared_to(self, other: ScreenPos) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Distance from this point to the segment `a`-`b`.
    #[must_use]
    pub fn distance_to_segment(self, a: ScreenPos, b: ScreenPos) -> f64 {
        let abx = b.x - a.x;
        let aby = b.y - a.y;
        let len_sq = abx * abx + aby * aby;
        if len_sq <= f64::EPSILON {
            return self.distance_to(a);
        }
        let t = (((self.x - a.x) * abx + (self.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
        self.distance_to(ScreenPos::new(a.x + t * abx, a.y + t * aby))
    }
}

impl From<(f64, f64)> for ScreenPos {
    fn from(pos: (f64, f64)) -> Self {
        Self::new(pos.0, pos.1)
    }
}

/// Linear pane viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPane {
    width: f64,
    height: f64,
    range: LogicalRange,
    price_min: f64,
    price_max: f64,
}

impl LinearPane {
    /// A pane of the given pixel size showing bars 0..100 and prices 0..100.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            range: LogicalRange::new(0.0, 100.0),
            price_min: 0.0,
            price_max: 100.0,
        }
    }

    #[must_use]
    pub fn with_range(mut self, from: f64, to: f64) -> Self {
        self.range = LogicalRange::new(from, to);
        self
    }

    #[must_use]
    pub fn with_prices(mut self, min: f64, max: f64) -> Self {
        self.set_price_range(min, max);
        self
    }

    pub fn set_price_range(&mut self, min: f64, max: f64) {
        self.price_min = min.min(max);
        self.price_max = min.max(max);
    }

    /// Update size, ignoring degenerate values.
    pub fn resize(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.width = width;
            self.height = height;
        }
    }

    /// Pixels between consecutive bars.
    pub fn bar_spacing(&self) -> f64 {
        let w = self.range.width();
        if w > 0.0 {
            self.width / w
        } else {
            0.0
        }
    }

    fn usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.range.width() > 0.0
    }
}

impl ChartPane for LinearPane {
    fn coordinate_to_logical(&self, x: f64) -> Option<f64> {
        self.usable()
            .then(|| self.range.from + x / self.width * self.range.width())
    }

    fn logical_to_coordinate(&self, logical: f64) -> Option<f64> {
        self.usable()
            .then(|| (logical - self.range.from) / self.range.width() * self.width)
    }

    fn price_to_coordinate(&self, price: f64) -> Option<f64> {
        let span = self.price_max - self.price_min;
        (self.usable() && span > 0.0)
            .then(|| (self.price_max - price) / span * self.height)
    }

    fn coordinate_to_price(&self, y: f64) -> Option<f64> {
        let span = self.price_max - self.price_min;
        (self.usable() && span > 0.0)
            .then(|| self.price_max - y / self.height * span)
    }

    fn visible_logical_range(&self) -> Option<LogicalRange> {
        Some(self.range)
    }

    fn set_visible_logical_range(&mut self, range: LogicalRange) {
        if range.width() > 0.0 {
            self.range = range;
        }
    }

    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane() -> LinearPane {
        LinearPane::new(1000.0, 500.0)
            .with_range(0.0, 100.0)
            .with_prices(1.0, 2.0)
    }

    #[test]
    fn test_screen_pos_distance() {
        let p1 = ScreenPos::new(0.0, 0.0);
        let p2 = ScreenPos::new(3.0, 4.0);
        assert!((p1.distance_to(p2) - 5.0).abs() < 1e-9);
        assert!((p1.distance_squared_to(p2) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_segment() {
        let a = ScreenPos::new(0.0, 0.0);
        let b = ScreenPos::new(10.0, 0.0);
        assert!((ScreenPos::new(5.0, 3.0).distance_to_segment(a, b) - 3.0).abs() < 1e-9);
        assert!((ScreenPos::new(13.0, 4.0).distance_to_segment(a, b) - 5.0).abs() < 1e-9);
        assert!((ScreenPos::new(1.0, 1.0).distance_to_segment(a, a) - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_logical_roundtrip() {
        let p = pane();
        assert_eq!(p.logical_to_coordinate(50.0), Some(500.0));
        assert_eq!(p.coordinate_to_logical(250.0), Some(25.0));
        assert_eq!(p.bar_spacing(), 10.0);
    }

    #[test]
    fn test_price_axis_inverted() {
        let p = pane();
        assert_eq!(p.price_to_coordinate(2.0), Some(0.0));
        assert_eq!(p.price_to_coordinate(1.0), Some(500.0));
        let price = p.coordinate_to_price(250.0).unwrap();
        assert!((price - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_size_protection() {
        let p = LinearPane::new(0.0, 0.0);
        assert_eq!(p.logical_to_coordinate(1.0), None);
        assert_eq!(p.price_to_coordinate(1.0), None);

        let mut p = pane();
        p.resize(0.0, 100.0);
        assert_eq!(p.size(), (1000.0, 500.0));
    }

    #[test]
    fn test_rejects_empty_range() {
        let mut p = pane();
        p.set_visible_logical_range(LogicalRange::new(10.0, 10.0));
        assert_eq!(p.visible_logical_range(), Some(LogicalRange::new(0.0, 100.0)));
    }
}
