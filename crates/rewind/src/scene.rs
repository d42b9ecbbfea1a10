//! Scene building: turns drawings, kill zones and trade lines into
//! per-pane pixel primitives for the host to paint.
//!
//! Anything whose pixel position cannot be resolved is left out of the scene.

use std::collections::BTreeMap;

use rewind_core::{price_decimals, Candle, Point, Timeframe};

use crate::coords::CoordinateMapper;
use crate::drawing::{
    fib_price, Drawing, DrawingKind, DrawingManager, LineStyle, PREVIEW_DRAWING_COLOR, STOP_ZONE_COLOR,
    TARGET_ZONE_COLOR,
};
use crate::killzone::compute_kill_zones;
use crate::pane::{ChartPane, PaneId};
use crate::trades::{Trade, TradeLineKind, TradeOverlay};
use crate::viewport::ScreenPos;

const RECT_FILL_ALPHA: f32 = 0.15;
const LABEL_SIZE: f32 = 11.0;
const LABEL_PAD_PX: f64 = 4.0;
const HANDLE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const ENTRY_LINE_COLOR: [f32; 4] = [0.16, 0.38, 1.0, 1.0];
const STOP_LINE_COLOR: [f32; 4] = [0.94, 0.33, 0.31, 1.0];
const TARGET_LINE_COLOR: [f32; 4] = [0.15, 0.65, 0.6, 1.0];
const AFFORDANCE_COLOR: [f32; 4] = [0.6, 0.6, 0.6, 1.0];

/// One thing to paint, in pane pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawPrimitive {
    Line {
        from: ScreenPos,
        to: ScreenPos,
        color: [f32; 4],
        width: f32,
        style: LineStyle,
    },
    Rect {
        min: ScreenPos,
        max: ScreenPos,
        fill: Option<[f32; 4]>,
        border: Option<[f32; 4]>,
    },
    Label {
        pos: ScreenPos,
        text: String,
        color: [f32; 4],
        size: f32,
    },
    /// A drag handle of the selected drawing.
    Handle { pos: ScreenPos, color: [f32; 4] },
}

pub type Scene = BTreeMap<PaneId, Vec<DrawPrimitive>>;

/// Everything the scene is built from, borrowed for one frame.
pub struct SceneInput<'a> {
    pub symbol: &'a str,
    pub timeframe: Timeframe,
    /// The loaded window, warm-up included.
    pub candles: &'a [Candle],
    /// Leading warm-up bars in `candles`. Kill zones ignore them.
    pub warmup_len: usize,
    pub drawings: &'a [Drawing],
    pub manager: &'a DrawingManager,
    pub trades: &'a [Trade],
    pub overlay: &'a TradeOverlay,
}

/// Build primitives for each pane. Trade lines only go on the main pane.
pub fn build_scene<P: ChartPane + ?Sized>(panes: &[(PaneId, &P)], input: &SceneInput<'_>) -> Scene {
    let mut scene = Scene::new();
    for &(pane_id, pane) in panes {
        let mapper = CoordinateMapper::new(pane, input.candles, input.timeframe);
        let mut out = Vec::new();
        let preview = input.manager.drag_preview().filter(|d| d.pane == pane_id);

        for drawing in input
            .drawings
            .iter()
            .filter(|d| d.pane == pane_id && d.symbol == input.symbol && d.visible)
        {
            let shown = preview.filter(|p| p.id == drawing.id).unwrap_or(drawing);
            push_drawing(&mut out, shown, &mapper, input, None);
        }
        // A duplicate being dragged has no stored counterpart yet.
        if let Some(duplicate) = preview.filter(|p| !input.drawings.iter().any(|d| d.id == p.id)) {
            push_drawing(&mut out, duplicate, &mapper, input, None);
        }
        if let Some(ghost) = input.manager.ghost(pane_id) {
            push_drawing(&mut out, ghost, &mapper, input, Some(PREVIEW_DRAWING_COLOR));
        }

        if let Some(selected) = input.manager.selected() {
            let target = preview
                .filter(|p| p.id == selected)
                .or_else(|| input.drawings.iter().find(|d| d.id == selected && d.pane == pane_id));
            if let Some(drawing) = target {
                push_handles(&mut out, drawing, &mapper);
            }
        }

        if pane_id.is_main() {
            push_trade_lines(&mut out, &mapper, input);
        }
        scene.insert(pane_id, out);
    }
    scene
}

fn push_drawing<P: ChartPane + ?Sized>(
    out: &mut Vec<DrawPrimitive>,
    drawing: &Drawing,
    mapper: &CoordinateMapper<'_, P>,
    input: &SceneInput<'_>,
    color_override: Option<[f32; 4]>,
) {
    let color = color_override.unwrap_or(drawing.stroke.color);
    let decimals = price_decimals(&drawing.symbol) as usize;

    match &drawing.kind {
        DrawingKind::Trendline => {
            let (Some(a), Some(b)) = (mapper.point_to_pixel(drawing.p1), mapper.point_to_pixel(drawing.p2)) else {
                return;
            };
            out.push(DrawPrimitive::Line {
                from: a,
                to: b,
                color,
                width: drawing.stroke.width,
                style: drawing.stroke.style,
            });
        }
        DrawingKind::Rectangle => {
            if let Some((min, max)) = pixel_box(mapper, drawing.p1, drawing.p2) {
                out.push(DrawPrimitive::Rect {
                    min,
                    max,
                    fill: Some(with_alpha(color, RECT_FILL_ALPHA)),
                    border: Some(color),
                });
            }
        }
        DrawingKind::Fib { levels } => {
            let (Some(x1), Some(x2)) = (mapper.time_to_pixel(drawing.p1.time), mapper.time_to_pixel(drawing.p2.time))
            else {
                return;
            };
            let (left, right) = (x1.min(x2), x1.max(x2));
            for level in levels.iter().filter(|l| l.visible) {
                let price = fib_price(drawing.p1, drawing.p2, level.level);
                let Some(y) = mapper.price_to_pixel(price) else {
                    continue;
                };
                let level_color = color_override.unwrap_or(level.color);
                out.push(DrawPrimitive::Line {
                    from: ScreenPos::new(left, y),
                    to: ScreenPos::new(right, y),
                    color: level_color,
                    width: drawing.stroke.width,
                    style: drawing.stroke.style,
                });
                out.push(DrawPrimitive::Label {
                    pos: ScreenPos::new(left + LABEL_PAD_PX, y - LABEL_PAD_PX),
                    text: format!("{} ({:.*})", level.level, decimals, price),
                    color: level_color,
                    size: LABEL_SIZE,
                });
            }
        }
        DrawingKind::Text { text, font_size } => {
            if let Some(pos) = mapper.point_to_pixel(drawing.p1) {
                out.push(DrawPrimitive::Label {
                    pos,
                    text: text.clone(),
                    color,
                    size: *font_size,
                });
            }
        }
        DrawingKind::KillZone(config) => {
            let visible = input.candles.get(input.warmup_len..).unwrap_or_default();
            for zone in compute_kill_zones(config, visible, input.timeframe) {
                let (Some(x1), Some(y1), Some(y2)) = (
                    mapper.time_to_pixel(zone.start),
                    mapper.price_to_pixel(zone.high),
                    mapper.price_to_pixel(zone.low),
                ) else {
                    continue;
                };
                let x2 = if zone.extend_right {
                    Some(mapper.pane_width())
                } else {
                    mapper.time_to_pixel(zone.end)
                };
                let Some(x2) = x2 else {
                    continue;
                };
                let color = color_override.unwrap_or(zone.color);
                let (min, max) = normalized(ScreenPos::new(x1, y1), ScreenPos::new(x2, y2));
                out.push(DrawPrimitive::Rect {
                    min,
                    max,
                    fill: Some(with_alpha(color, RECT_FILL_ALPHA)),
                    border: Some(color),
                });
                if let Some(y) = zone.mid.and_then(|mid| mapper.price_to_pixel(mid)) {
                    out.push(DrawPrimitive::Line {
                        from: ScreenPos::new(min.x, y),
                        to: ScreenPos::new(max.x, y),
                        color,
                        width: 1.0,
                        style: LineStyle::Dashed,
                    });
                }
                if let Some(label) = zone.label {
                    out.push(DrawPrimitive::Label {
                        pos: ScreenPos::new(min.x + LABEL_PAD_PX, min.y - LABEL_PAD_PX),
                        text: label,
                        color,
                        size: LABEL_SIZE,
                    });
                }
            }
        }
        DrawingKind::Position { bracket, .. } => {
            let entry = drawing.p1.price;
            let end = Point::new(drawing.p2.time, entry);
            let zones = [
                (bracket.target, TARGET_ZONE_COLOR, "Target"),
                (bracket.stop, STOP_ZONE_COLOR, "Stop"),
            ];
            for (level, zone_color, name) in zones {
                let Some((min, max)) = pixel_box(mapper, drawing.p1, Point::new(end.time, level)) else {
                    continue;
                };
                out.push(DrawPrimitive::Rect {
                    min,
                    max,
                    fill: Some(color_override.unwrap_or(zone_color)),
                    border: None,
                });
                let y = mapper.price_to_pixel(level).unwrap_or(min.y);
                out.push(DrawPrimitive::Label {
                    pos: ScreenPos::new(min.x + LABEL_PAD_PX, y),
                    text: format!("{} {:.*}", name, decimals, level),
                    color,
                    size: LABEL_SIZE,
                });
            }
            let (Some(a), Some(b)) = (mapper.point_to_pixel(drawing.p1), mapper.point_to_pixel(end)) else {
                return;
            };
            out.push(DrawPrimitive::Line {
                from: a,
                to: b,
                color,
                width: drawing.stroke.width,
                style: LineStyle::Solid,
            });
            let risk = (entry - bracket.stop).abs();
            if risk > 0.0 {
                let reward = (bracket.target - entry).abs();
                out.push(DrawPrimitive::Label {
                    pos: ScreenPos::new(a.x.min(b.x) + LABEL_PAD_PX, a.y + LABEL_PAD_PX),
                    text: format!("R:R {:.2}", reward / risk),
                    color,
                    size: LABEL_SIZE,
                });
            }
        }
    }
}

fn push_handles<P: ChartPane + ?Sized>(
    out: &mut Vec<DrawPrimitive>,
    drawing: &Drawing,
    mapper: &CoordinateMapper<'_, P>,
) {
    for (_, point) in drawing.handles() {
        if let Some(pos) = mapper.point_to_pixel(point) {
            out.push(DrawPrimitive::Handle {
                pos,
                color: HANDLE_COLOR,
            });
        }
    }
}

fn push_trade_lines<P: ChartPane + ?Sized>(
    out: &mut Vec<DrawPrimitive>,
    mapper: &CoordinateMapper<'_, P>,
    input: &SceneInput<'_>,
) {
    let width = mapper.pane_width();
    let decimals = price_decimals(input.symbol) as usize;

    for line in input.overlay.lines(input.trades) {
        let Some(y) = mapper.price_to_pixel(line.price) else {
            continue;
        };
        let color = match line.kind {
            TradeLineKind::Entry => ENTRY_LINE_COLOR,
            TradeLineKind::StopLoss => STOP_LINE_COLOR,
            TradeLineKind::TakeProfit => TARGET_LINE_COLOR,
            TradeLineKind::AddStopLoss | TradeLineKind::AddTakeProfit => AFFORDANCE_COLOR,
        };

        // Add buttons are only a label on the entry price.
        if !line.kind.is_affordance() {
            out.push(DrawPrimitive::Line {
                from: ScreenPos::new(0.0, y),
                to: ScreenPos::new(width, y),
                color,
                width: 1.0,
                style: if line.dragging { LineStyle::Dashed } else { LineStyle::Solid },
            });
        }
        let text = if line.kind.is_affordance() {
            line.kind.label().to_string()
        } else {
            format!("{} {:.*}", line.kind.label(), decimals, line.price)
        };
        out.push(DrawPrimitive::Label {
            pos: ScreenPos::new(width - LABEL_PAD_PX, y),
            text,
            color,
            size: LABEL_SIZE,
        });
    }
}

fn pixel_box<P: ChartPane + ?Sized>(
    mapper: &CoordinateMapper<'_, P>,
    a: Point,
    b: Point,
) -> Option<(ScreenPos, ScreenPos)> {
    Some(normalized(mapper.point_to_pixel(a)?, mapper.point_to_pixel(b)?))
}

fn normalized(a: ScreenPos, b: ScreenPos) -> (ScreenPos, ScreenPos) {
    (
        ScreenPos::new(a.x.min(b.x), a.y.min(b.y)),
        ScreenPos::new(a.x.max(b.x), a.y.max(b.y)),
    )
}

fn with_alpha(color: [f32; 4], alpha: f32) -> [f32; 4] {
    [color[0], color[1], color[2], alpha]
}
