//! Drawing types for interactive chart annotations.

use std::sync::atomic::{AtomicU64, Ordering};

use rewind_config::KillZoneConfig;
use rewind_core::{round_price, Point};
use serde::{Deserialize, Serialize};

use crate::pane::PaneId;

/// Global counter for generating unique drawing IDs. Zero is the ghost.
static NEXT_DRAWING_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DrawingId(pub u64);

impl DrawingId {
    /// Reserved id of the in-progress preview. Never emitted.
    pub const GHOST: DrawingId = DrawingId(0);

    /// Generate a new unique drawing ID.
    pub fn new() -> Self {
        Self(NEXT_DRAWING_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_ghost(&self) -> bool {
        *self == Self::GHOST
    }
}

impl Default for DrawingId {
    fn default() -> Self {
        Self::new()
    }
}

/// Default color for drawings (cyan/teal).
pub const DEFAULT_DRAWING_COLOR: [f32; 4] = [0.0, 0.8, 0.8, 1.0];
/// Preview color (more transparent).
pub const PREVIEW_DRAWING_COLOR: [f32; 4] = [0.0, 0.8, 0.8, 0.5];

pub const TARGET_ZONE_COLOR: [f32; 4] = [0.15, 0.65, 0.6, 0.25];
pub const STOP_ZONE_COLOR: [f32; 4] = [0.94, 0.33, 0.31, 0.25];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: [f32; 4],
    pub width: f32,
    pub style: LineStyle,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: DEFAULT_DRAWING_COLOR,
            width: 1.0,
            style: LineStyle::Solid,
        }
    }
}

/// One retracement level of a fib drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibLevel {
    pub level: f64,
    pub color: [f32; 4],
    pub visible: bool,
}

impl FibLevel {
    pub fn new(level: f64, color: [f32; 4]) -> Self {
        Self {
            level,
            color,
            visible: true,
        }
    }
}

pub fn default_fib_levels() -> Vec<FibLevel> {
    vec![
        FibLevel::new(0.0, [0.47, 0.53, 0.6, 1.0]),
        FibLevel::new(0.236, [0.94, 0.33, 0.31, 1.0]),
        FibLevel::new(0.382, [0.51, 0.78, 0.52, 1.0]),
        FibLevel::new(0.5, [0.3, 0.69, 0.31, 1.0]),
        FibLevel::new(0.618, [0.0, 0.59, 0.53, 1.0]),
        FibLevel::new(0.786, [0.25, 0.76, 0.96, 1.0]),
        FibLevel::new(1.0, [0.47, 0.53, 0.6, 1.0]),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

/// Target and stop of a position tool. Both are always present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub target: f64,
    pub stop: f64,
}

/// Below this distance from entry (as a fraction of entry) a default bracket is used.
const MIN_BRACKET_FRACTION: f64 = 0.0005;
/// Risk of the default bracket as a fraction of entry.
const DEFAULT_RISK_FRACTION: f64 = 0.002;
const REWARD_RATIO: f64 = 2.0;

impl Bracket {
    /// Bracket for a position anchored at `entry` with the pointer at `current`.
    ///
    /// Dragging toward profit sets the target and puts the stop at half that
    /// distance. Dragging toward loss sets the stop and puts the target at twice
    /// the distance.
    pub fn from_drag(side: Side, entry: f64, current: f64) -> Self {
        let d = (current - entry).abs();
        if d < MIN_BRACKET_FRACTION * entry {
            let risk = DEFAULT_RISK_FRACTION * entry;
            return match side {
                Side::Long => Bracket {
                    target: entry + REWARD_RATIO * risk,
                    stop: entry - risk,
                },
                Side::Short => Bracket {
                    target: entry - REWARD_RATIO * risk,
                    stop: entry + risk,
                },
            };
        }

        match side {
            Side::Long if current > entry => Bracket {
                target: current,
                stop: entry - d / REWARD_RATIO,
            },
            Side::Long => Bracket {
                target: entry + REWARD_RATIO * d,
                stop: current,
            },
            Side::Short if current < entry => Bracket {
                target: current,
                stop: entry + d / REWARD_RATIO,
            },
            Side::Short => Bracket {
                target: entry - REWARD_RATIO * d,
                stop: current,
            },
        }
    }
}

/// Variant-specific drawing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawingKind {
    Trendline,
    Rectangle,
    Fib { levels: Vec<FibLevel> },
    Text { text: String, font_size: f32 },
    KillZone(KillZoneConfig),
    Position { side: Side, bracket: Bracket },
}

impl DrawingKind {
    pub fn name(&self) -> &'static str {
        match self {
            DrawingKind::Trendline => "Trendline",
            DrawingKind::Rectangle => "Rectangle",
            DrawingKind::Fib { .. } => "Fib",
            DrawingKind::Text { .. } => "Text",
            DrawingKind::KillZone(_) => "Kill Zones",
            DrawingKind::Position { side: Side::Long, .. } => "Long Position",
            DrawingKind::Position { side: Side::Short, .. } => "Short Position",
        }
    }
}

/// Part of a drawing grabbed by a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlPoint {
    P1,
    P2,
    /// The whole body.
    All,
    Target,
    Stop,
    Entry,
}

impl ControlPoint {
    /// Whether the magnet applies while dragging this control.
    pub fn snaps(&self) -> bool {
        matches!(self, ControlPoint::P1 | ControlPoint::P2)
    }
}

/// A chart annotation anchored in domain coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: DrawingId,
    pub symbol: String,
    pub pane: PaneId,
    pub p1: Point,
    pub p2: Point,
    pub stroke: Stroke,
    pub visible: bool,
    pub locked: bool,
    pub kind: DrawingKind,
}

impl Drawing {
    pub fn new(kind: DrawingKind, symbol: &str, pane: PaneId, p1: Point, p2: Point) -> Self {
        Self {
            id: DrawingId::new(),
            symbol: symbol.to_string(),
            pane,
            p1,
            p2,
            stroke: Stroke::default(),
            visible: true,
            locked: false,
            kind,
        }
    }

    /// Same drawing under another id.
    #[must_use]
    pub fn with_id(mut self, id: DrawingId) -> Self {
        self.id = id;
        self
    }

    pub fn is_ghost(&self) -> bool {
        self.id.is_ghost()
    }

    /// Move every point of the drawing, brackets included.
    #[must_use]
    pub fn translated(&self, d_time: i64, d_price: f64) -> Self {
        let mut moved = self.clone();
        moved.p1 = self.p1.translate(d_time, d_price);
        moved.p2 = self.p2.translate(d_time, d_price);
        if let DrawingKind::Position { bracket, .. } = &mut moved.kind {
            bracket.target += d_price;
            bracket.stop += d_price;
        }
        moved
    }

    /// Round every price to the symbol's tick precision.
    pub fn round_prices(&mut self) {
        let symbol = self.symbol.as_str();
        self.p1.price = round_price(symbol, self.p1.price);
        self.p2.price = round_price(symbol, self.p2.price);
        if let DrawingKind::Position { bracket, .. } = &mut self.kind {
            bracket.target = round_price(symbol, bracket.target);
            bracket.stop = round_price(symbol, bracket.stop);
        }
    }

    /// Draggable handles in domain coordinates.
    pub fn handles(&self) -> Vec<(ControlPoint, Point)> {
        match &self.kind {
            DrawingKind::Trendline | DrawingKind::Rectangle | DrawingKind::Fib { .. } => {
                vec![(ControlPoint::P1, self.p1), (ControlPoint::P2, self.p2)]
            }
            DrawingKind::Text { .. } | DrawingKind::KillZone(_) => vec![(ControlPoint::P1, self.p1)],
            DrawingKind::Position { bracket, .. } => vec![
                (ControlPoint::Entry, self.p1),
                (ControlPoint::Target, Point::new(self.p1.time, bracket.target)),
                (ControlPoint::Stop, Point::new(self.p1.time, bracket.stop)),
                (ControlPoint::P2, Point::new(self.p2.time, self.p1.price)),
            ],
        }
    }

    /// Time span covered by the drawing, earliest first.
    pub fn time_span(&self) -> (i64, i64) {
        (self.p1.time.min(self.p2.time), self.p1.time.max(self.p2.time))
    }

    /// Price span covered by the drawing body, lowest first.
    pub fn price_span(&self) -> (f64, f64) {
        match &self.kind {
            DrawingKind::Position { bracket, .. } => (
                bracket.target.min(bracket.stop).min(self.p1.price),
                bracket.target.max(bracket.stop).max(self.p1.price),
            ),
            _ => (self.p1.price.min(self.p2.price), self.p1.price.max(self.p2.price)),
        }
    }
}

/// Price of a fib level. Level 0 sits at `p2`, level 1 at `p1`.
pub fn fib_price(p1: Point, p2: Point, level: f64) -> f64 {
    p2.price + (p1.price - p2.price) * level
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ids_are_unique_and_never_ghost() {
        let a = DrawingId::new();
        let b = DrawingId::new();
        assert_ne!(a, b);
        assert!(!a.is_ghost());
        assert!(DrawingId::GHOST.is_ghost());
    }

    #[test]
    fn test_bracket_default_when_too_close() {
        let b = Bracket::from_drag(Side::Long, 100.0, 100.02);
        assert!(approx(b.stop, 99.8));
        assert!(approx(b.target, 100.4));

        let s = Bracket::from_drag(Side::Short, 100.0, 99.99);
        assert!(approx(s.stop, 100.2));
        assert!(approx(s.target, 99.6));
    }

    #[test]
    fn test_bracket_threshold_is_exclusive() {
        // 0.0005 * 1000 is exactly 0.5.
        let b = Bracket::from_drag(Side::Long, 1000.0, 1000.5);
        assert!(approx(b.target, 1000.5));
        assert!(approx(b.stop, 999.75));

        let s = Bracket::from_drag(Side::Short, 1000.0, 999.5);
        assert!(approx(s.target, 999.5));
        assert!(approx(s.stop, 1000.25));

        let near = Bracket::from_drag(Side::Long, 1000.0, 1000.49);
        assert!(approx(near.stop, 998.0));
        assert!(approx(near.target, 1004.0));
    }

    #[test]
    fn test_bracket_long() {
        let b = Bracket::from_drag(Side::Long, 100.0, 110.0);
        assert!(approx(b.target, 110.0));
        assert!(approx(b.stop, 95.0));

        let b = Bracket::from_drag(Side::Long, 100.0, 96.0);
        assert!(approx(b.stop, 96.0));
        assert!(approx(b.target, 108.0));
    }

    #[test]
    fn test_bracket_short_mirrors_long() {
        let b = Bracket::from_drag(Side::Short, 100.0, 90.0);
        assert!(approx(b.target, 90.0));
        assert!(approx(b.stop, 105.0));

        let b = Bracket::from_drag(Side::Short, 100.0, 104.0);
        assert!(approx(b.stop, 104.0));
        assert!(approx(b.target, 92.0));
    }

    #[test]
    fn test_translate_moves_bracket() {
        let d = Drawing::new(
            DrawingKind::Position {
                side: Side::Long,
                bracket: Bracket {
                    target: 1.2,
                    stop: 1.05,
                },
            },
            "EURUSD",
            PaneId::Main,
            Point::new(0, 1.1),
            Point::new(600, 1.1),
        );
        let moved = d.translated(60, 0.01);
        assert_eq!(moved.p1.time, 60);
        assert_eq!(moved.p2.time, 660);
        match moved.kind {
            DrawingKind::Position { bracket, .. } => {
                assert!(approx(bracket.target, 1.21));
                assert!(approx(bracket.stop, 1.06));
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(moved.id, d.id);
    }

    #[test]
    fn test_round_prices_by_symbol() {
        let mut d = Drawing::new(
            DrawingKind::Trendline,
            "USDJPY",
            PaneId::Main,
            Point::new(0, 151.23456),
            Point::new(60, 150.0004),
        );
        d.round_prices();
        assert_eq!(d.p1.price, 151.235);
        assert_eq!(d.p2.price, 150.0);
    }

    #[test]
    fn test_fib_price() {
        let p1 = Point::new(0, 100.0);
        let p2 = Point::new(60, 200.0);
        assert_eq!(fib_price(p1, p2, 0.0), 200.0);
        assert_eq!(fib_price(p1, p2, 1.0), 100.0);
        assert!(approx(fib_price(p1, p2, 0.5), 150.0));
    }

    #[test]
    fn test_position_handles() {
        let d = Drawing::new(
            DrawingKind::Position {
                side: Side::Short,
                bracket: Bracket {
                    target: 90.0,
                    stop: 105.0,
                },
            },
            "EURUSD",
            PaneId::Main,
            Point::new(0, 100.0),
            Point::new(600, 100.0),
        );
        let handles = d.handles();
        assert_eq!(handles.len(), 4);
        assert_eq!(handles[1], (ControlPoint::Target, Point::new(0, 90.0)));
        assert_eq!(d.price_span(), (90.0, 105.0));
    }
}
