//! Pixel-space hit testing for drawings.

use crate::coords::CoordinateMapper;
use crate::pane::ChartPane;
use crate::viewport::ScreenPos;

use super::types::{fib_price, ControlPoint, Drawing, DrawingKind};

/// Handles are grabbed within this many pixels.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Approximate glyph width relative to font size, for text bounds.
const GLYPH_WIDTH_RATIO: f64 = 0.6;

/// Which part of `drawing` lies under `pos`, if any.
///
/// Handles win over the body. Parts that cannot be placed on screen are not
/// hittable.
pub fn hit_test<P: ChartPane + ?Sized>(
    drawing: &Drawing,
    mapper: &CoordinateMapper<'_, P>,
    pos: ScreenPos,
    tolerance: f64,
) -> Option<ControlPoint> {
    if !drawing.visible {
        return None;
    }

    let handle = drawing
        .handles()
        .into_iter()
        .filter_map(|(control, point)| {
            let px = mapper.point_to_pixel(point)?;
            let dist = px.distance_to(pos);
            (dist <= HANDLE_RADIUS_PX).then_some((control, dist))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((control, _)) = handle {
        return Some(control);
    }

    body_hit(drawing, mapper, pos, tolerance).then_some(ControlPoint::All)
}

fn body_hit<P: ChartPane + ?Sized>(
    drawing: &Drawing,
    mapper: &CoordinateMapper<'_, P>,
    pos: ScreenPos,
    tolerance: f64,
) -> bool {
    let (Some(a), Some(b)) = (mapper.point_to_pixel(drawing.p1), mapper.point_to_pixel(drawing.p2)) else {
        return false;
    };

    match &drawing.kind {
        DrawingKind::Trendline => pos.distance_to_segment(a, b) <= tolerance,
        DrawingKind::Rectangle => inside(pos, a, b, tolerance),
        DrawingKind::Fib { levels } => {
            inside(pos, a, b, tolerance)
                || levels.iter().filter(|l| l.visible).any(|l| {
                    mapper
                        .price_to_pixel(fib_price(drawing.p1, drawing.p2, l.level))
                        .is_some_and(|y| {
                            (pos.y - y).abs() <= tolerance
                                && pos.x >= a.x.min(b.x) - tolerance
                                && pos.x <= a.x.max(b.x) + tolerance
                        })
                })
        }
        DrawingKind::Text { text, font_size } => {
            let size = f64::from(*font_size);
            let width = text.chars().count() as f64 * size * GLYPH_WIDTH_RATIO;
            inside(pos, a, ScreenPos::new(a.x + width, a.y - size), tolerance)
        }
        // Session boxes are derived from data; only the anchor handle selects them.
        DrawingKind::KillZone(_) => false,
        DrawingKind::Position { .. } => {
            let (low, high) = drawing.price_span();
            match (mapper.price_to_pixel(low), mapper.price_to_pixel(high)) {
                (Some(y_low), Some(y_high)) => inside(
                    pos,
                    ScreenPos::new(a.x, y_low),
                    ScreenPos::new(b.x, y_high),
                    tolerance,
                ),
                _ => false,
            }
        }
    }
}

/// Whether `pos` lies in the box spanned by corners `a` and `b`, grown by `pad`.
fn inside(pos: ScreenPos, a: ScreenPos, b: ScreenPos, pad: f64) -> bool {
    pos.x >= a.x.min(b.x) - pad
        && pos.x <= a.x.max(b.x) + pad
        && pos.y >= a.y.min(b.y) - pad
        && pos.y <= a.y.max(b.y) + pad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::types::{Bracket, Side};
    use crate::pane::PaneId;
    use crate::viewport::LinearPane;
    use rewind_core::{Candle, Point, Timeframe};

    // 10 px per bar, 10 px per price unit, price 100 at the top.
    fn setup() -> (LinearPane, Vec<Candle>) {
        let pane = LinearPane::new(1000.0, 1000.0)
            .with_range(0.0, 100.0)
            .with_prices(0.0, 100.0);
        let candles = (0..100).map(|i| Candle::flat(i * 60, 50.0)).collect();
        (pane, candles)
    }

    fn drawing(kind: DrawingKind, p1: Point, p2: Point) -> Drawing {
        Drawing::new(kind, "EURUSD", PaneId::Main, p1, p2)
    }

    #[test]
    fn test_trendline_handles_and_body() {
        let (pane, candles) = setup();
        let mapper = CoordinateMapper::new(&pane, &candles, Timeframe::Min1);
        // (100, 500) to (300, 500)
        let line = drawing(DrawingKind::Trendline, Point::new(600, 50.0), Point::new(1800, 50.0));

        assert_eq!(hit_test(&line, &mapper, ScreenPos::new(103.0, 503.0), 6.0), Some(ControlPoint::P1));
        assert_eq!(hit_test(&line, &mapper, ScreenPos::new(296.0, 500.0), 6.0), Some(ControlPoint::P2));
        assert_eq!(hit_test(&line, &mapper, ScreenPos::new(200.0, 504.0), 6.0), Some(ControlPoint::All));
        assert_eq!(hit_test(&line, &mapper, ScreenPos::new(200.0, 520.0), 6.0), None);
    }

    #[test]
    fn test_hidden_drawing_is_not_hit() {
        let (pane, candles) = setup();
        let mapper = CoordinateMapper::new(&pane, &candles, Timeframe::Min1);
        let mut rect = drawing(DrawingKind::Rectangle, Point::new(600, 60.0), Point::new(1800, 40.0));
        assert_eq!(hit_test(&rect, &mapper, ScreenPos::new(200.0, 500.0), 6.0), Some(ControlPoint::All));
        rect.visible = false;
        assert_eq!(hit_test(&rect, &mapper, ScreenPos::new(200.0, 500.0), 6.0), None);
    }

    #[test]
    fn test_position_target_handle() {
        let (pane, candles) = setup();
        let mapper = CoordinateMapper::new(&pane, &candles, Timeframe::Min1);
        let pos = drawing(
            DrawingKind::Position {
                side: Side::Long,
                bracket: Bracket {
                    target: 70.0,
                    stop: 40.0,
                },
            },
            Point::new(600, 50.0),
            Point::new(1800, 50.0),
        );
        // Target handle at (100, 300)
        assert_eq!(hit_test(&pos, &mapper, ScreenPos::new(102.0, 302.0), 6.0), Some(ControlPoint::Target));
        assert_eq!(hit_test(&pos, &mapper, ScreenPos::new(100.0, 600.0), 6.0), Some(ControlPoint::Stop));
        // Inside the stop zone, away from handles.
        assert_eq!(hit_test(&pos, &mapper, ScreenPos::new(250.0, 550.0), 6.0), Some(ControlPoint::All));
    }
}
