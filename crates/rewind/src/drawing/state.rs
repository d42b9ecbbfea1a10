//! Drawing state management.
//!
//! The [`DrawingManager`] owns only interaction state: the active tool, each
//! pane's anchor, the ghost preview, selection and the active drag. Drawings
//! themselves belong to the host, which passes them in through an
//! [`InteractionContext`] and applies the emitted [`DrawingEvent`]s.

use std::collections::HashMap;

use rewind_config::KillZoneConfig;
use rewind_core::Point;

use crate::coords::CoordinateMapper;
use crate::events::{DrawingEvent, EventBus, Modifiers};
use crate::pane::{ChartPane, PaneId};
use crate::snap::{constrain_angle, snap_price};
use crate::viewport::ScreenPos;

use super::hit::hit_test;
use super::types::{
    default_fib_levels, Bracket, ControlPoint, Drawing, DrawingId, DrawingKind, FibLevel, Side,
    Stroke, PREVIEW_DRAWING_COLOR,
};

/// Available drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawingTool {
    #[default]
    Cursor,
    Trendline,
    Rectangle,
    Fib,
    Text,
    KillZone,
    LongPosition,
    ShortPosition,
}

impl DrawingTool {
    /// Get the display name for this tool.
    pub fn name(&self) -> &'static str {
        match self {
            DrawingTool::Cursor => "Cursor",
            DrawingTool::Trendline => "Trendline",
            DrawingTool::Rectangle => "Box",
            DrawingTool::Fib => "Fib",
            DrawingTool::Text => "Text",
            DrawingTool::KillZone => "Kill Zones",
            DrawingTool::LongPosition => "Long",
            DrawingTool::ShortPosition => "Short",
        }
    }

    /// Check if this tool creates drawings.
    pub fn is_drawing_tool(&self) -> bool {
        !matches!(self, DrawingTool::Cursor)
    }

    /// Tools that commit on the first click.
    pub fn is_single_click(&self) -> bool {
        matches!(self, DrawingTool::Text | DrawingTool::KillZone)
    }

    /// Tools whose second point obeys the angle constraint.
    pub fn is_line_tool(&self) -> bool {
        matches!(self, DrawingTool::Trendline)
    }

    /// Get all available tools.
    pub fn all() -> &'static [DrawingTool] {
        &[
            DrawingTool::Cursor,
            DrawingTool::Trendline,
            DrawingTool::Rectangle,
            DrawingTool::Fib,
            DrawingTool::Text,
            DrawingTool::KillZone,
            DrawingTool::LongPosition,
            DrawingTool::ShortPosition,
        ]
    }
}

/// Per-pane tool state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ToolState {
    #[default]
    Idle,
    /// First point placed, waiting for the second click.
    Anchored { anchor: Point },
}

/// Everything a handler needs from the host for one pointer event.
pub struct InteractionContext<'a, P: ChartPane + ?Sized> {
    pub mapper: CoordinateMapper<'a, P>,
    /// The host's drawings, in paint order (last on top).
    pub drawings: &'a [Drawing],
    pub symbol: &'a str,
    pub magnet: bool,
    pub modifiers: Modifiers,
    /// Body hit tolerance in pixels.
    pub hit_tolerance: f64,
}

impl<'a, P: ChartPane + ?Sized> InteractionContext<'a, P> {
    pub fn new(mapper: CoordinateMapper<'a, P>, drawings: &'a [Drawing], symbol: &'a str) -> Self {
        Self {
            mapper,
            drawings,
            symbol,
            magnet: false,
            modifiers: Modifiers::default(),
            hit_tolerance: 6.0,
        }
    }

    #[must_use]
    pub fn with_magnet(mut self, magnet: bool) -> Self {
        self.magnet = magnet;
        self
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub fn with_hit_tolerance(mut self, px: f64) -> Self {
        self.hit_tolerance = px;
        self
    }

    fn find(&self, id: DrawingId) -> Option<&'a Drawing> {
        self.drawings.iter().find(|d| d.id == id)
    }
}

#[derive(Debug, Clone)]
struct DragState {
    pane: PaneId,
    control: ControlPoint,
    /// Geometry captured at drag start. A clone already carries its fresh id.
    initial: Drawing,
    /// Pointer position in domain space at drag start.
    anchor: Point,
    current: Drawing,
    duplicate: bool,
    moved: bool,
}

/// Manager for all drawing interaction state.
#[derive(Debug)]
pub struct DrawingManager {
    /// Currently selected drawing tool.
    tool: DrawingTool,
    tool_states: HashMap<PaneId, ToolState>,
    ghosts: HashMap<PaneId, Drawing>,
    /// Currently selected drawing.
    selected: Option<DrawingId>,
    drag: Option<DragState>,
    /// Style and parameters given to new drawings.
    pub stroke: Stroke,
    pub fib_levels: Vec<FibLevel>,
    pub kill_zone: KillZoneConfig,
    pub default_text: String,
    pub font_size: f32,
}

impl Default for DrawingManager {
    fn default() -> Self {
        Self {
            tool: DrawingTool::Cursor,
            tool_states: HashMap::new(),
            ghosts: HashMap::new(),
            selected: None,
            drag: None,
            stroke: Stroke::default(),
            fib_levels: default_fib_levels(),
            kill_zone: KillZoneConfig::default(),
            default_text: "Text".to_string(),
            font_size: 14.0,
        }
    }
}

impl DrawingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> DrawingTool {
        self.tool
    }

    pub fn selected(&self) -> Option<DrawingId> {
        self.selected
    }

    pub fn tool_state(&self, pane: PaneId) -> ToolState {
        self.tool_states.get(&pane).copied().unwrap_or_default()
    }

    /// The preview of the drawing being placed on `pane`.
    pub fn ghost(&self, pane: PaneId) -> Option<&Drawing> {
        self.ghosts.get(&pane)
    }

    /// Live geometry of the drawing being dragged.
    pub fn drag_preview(&self) -> Option<&Drawing> {
        self.drag.as_ref().filter(|d| d.moved).map(|d| &d.current)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Check if currently in an interaction (placing or dragging).
    pub fn is_interacting(&self) -> bool {
        self.drag.is_some()
            || self
                .tool_states
                .values()
                .any(|s| matches!(s, ToolState::Anchored { .. }))
    }

    /// Set the active tool.
    ///
    /// Any in-progress placement is dropped. Choosing the cursor clears the
    /// selection.
    pub fn set_tool(&mut self, tool: DrawingTool, bus: &mut EventBus) {
        self.tool_states.clear();
        self.ghosts.clear();
        self.tool = tool;
        if tool == DrawingTool::Cursor {
            self.set_selected(None, bus);
        }
    }

    /// Cancel the current operation (escape).
    pub fn cancel(&mut self, bus: &mut EventBus) {
        self.tool_states.clear();
        self.ghosts.clear();
        self.drag = None;
        self.set_selected(None, bus);
    }

    /// Select a drawing, or clear the selection.
    pub fn select(&mut self, id: Option<DrawingId>, bus: &mut EventBus) {
        self.set_selected(id, bus);
    }

    /// Delete the selected drawing unless it is locked.
    pub fn delete_selected(&mut self, drawings: &[Drawing], bus: &mut EventBus) -> bool {
        let Some(id) = self.selected else {
            return false;
        };
        match drawings.iter().find(|d| d.id == id) {
            Some(d) if d.locked => {
                log::debug!("Drawing {:?} is locked, not deleting", id);
                false
            }
            Some(_) => {
                self.selected = None;
                bus.emit(DrawingEvent::Deleted(id));
                bus.emit(DrawingEvent::SelectionChanged(None));
                true
            }
            None => {
                self.set_selected(None, bus);
                false
            }
        }
    }

    /// Handle a pointer press. Returns `true` if the event was consumed.
    pub fn pointer_down<P: ChartPane + ?Sized>(
        &mut self,
        pane: PaneId,
        pos: ScreenPos,
        ctx: &InteractionContext<'_, P>,
        bus: &mut EventBus,
    ) -> bool {
        if self.tool.is_drawing_tool() {
            return self.place(pane, pos, ctx, bus);
        }

        match self.hit(pane, pos, ctx) {
            Some((drawing, control)) => {
                self.set_selected(Some(drawing.id), bus);
                if drawing.locked {
                    return true;
                }
                let Some(anchor) = ctx.mapper.pixel_to_point(pos) else {
                    return true;
                };
                self.start_drag(pane, drawing, control, anchor, ctx.modifiers.duplicates());
                true
            }
            None => {
                self.set_selected(None, bus);
                false
            }
        }
    }

    /// Handle pointer movement.
    pub fn pointer_move<P: ChartPane + ?Sized>(
        &mut self,
        pane: PaneId,
        pos: ScreenPos,
        ctx: &InteractionContext<'_, P>,
        bus: &mut EventBus,
    ) -> bool {
        if self.drag.is_some() {
            return self.update_drag(pane, pos, ctx, bus);
        }

        let ToolState::Anchored { anchor } = self.tool_state(pane) else {
            return false;
        };
        let Some(point) = self.resolve(pane, pos, ctx, Some(anchor)) else {
            return false;
        };
        if let Some(ghost) = self.build(pane, ctx.symbol, anchor, point) {
            let mut ghost = ghost.with_id(DrawingId::GHOST);
            ghost.stroke.color = PREVIEW_DRAWING_COLOR;
            self.ghosts.insert(pane, ghost);
        }
        true
    }

    /// Handle pointer release, committing any drag that moved.
    pub fn pointer_up<P: ChartPane + ?Sized>(
        &mut self,
        pane: PaneId,
        ctx: &InteractionContext<'_, P>,
        bus: &mut EventBus,
    ) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if drag.pane != pane {
            self.drag = Some(drag);
            return false;
        }
        if !drag.duplicate && ctx.find(drag.initial.id).is_none() {
            log::debug!("Drag target {:?} disappeared, dropping drag", drag.initial.id);
            return false;
        }
        if !drag.moved {
            return true;
        }

        let mut committed = drag.current;
        committed.round_prices();
        log::debug!("Committing drag of {:?} ({:?})", committed.id, drag.control);
        if drag.duplicate {
            self.selected = Some(committed.id);
            bus.emit(DrawingEvent::Created(committed.clone()));
            bus.emit(DrawingEvent::SelectionChanged(Some(committed.id)));
        } else {
            bus.emit(DrawingEvent::Updated(committed));
        }
        true
    }

    /// A double click on a drawing requests its editor.
    pub fn double_click<P: ChartPane + ?Sized>(
        &mut self,
        pane: PaneId,
        pos: ScreenPos,
        ctx: &InteractionContext<'_, P>,
        bus: &mut EventBus,
    ) -> bool {
        match self.hit(pane, pos, ctx) {
            Some((drawing, _)) => {
                self.set_selected(Some(drawing.id), bus);
                bus.emit(DrawingEvent::EditRequested(drawing.id));
                true
            }
            None => false,
        }
    }

    /// Begin dragging `control` of `drawing` from the domain point `anchor`.
    ///
    /// With `duplicate` the drawing is cloned under a fresh id and the clone is
    /// dragged, leaving the original untouched.
    pub fn start_drag(
        &mut self,
        pane: PaneId,
        drawing: &Drawing,
        control: ControlPoint,
        anchor: Point,
        duplicate: bool,
    ) {
        let initial = if duplicate {
            drawing.clone().with_id(DrawingId::new())
        } else {
            drawing.clone()
        };
        self.drag = Some(DragState {
            pane,
            control,
            current: initial.clone(),
            initial,
            anchor,
            duplicate,
            moved: false,
        });
    }

    fn update_drag<P: ChartPane + ?Sized>(
        &mut self,
        pane: PaneId,
        pos: ScreenPos,
        ctx: &InteractionContext<'_, P>,
        bus: &mut EventBus,
    ) -> bool {
        let Some(drag) = self.drag.as_ref() else {
            return false;
        };
        if drag.pane != pane {
            return false;
        }
        let original = if drag.duplicate {
            // The clone is not in the host's list yet; its source must be.
            Some(&drag.initial)
        } else {
            ctx.find(drag.initial.id)
        };
        if original.is_none() {
            log::debug!("Drag target {:?} disappeared, dropping drag", drag.initial.id);
            self.drag = None;
            return false;
        }

        let Some(raw) = ctx.mapper.pixel_to_point(pos) else {
            return false;
        };
        let pointer = if drag.control.snaps() {
            let snapped = Point::new(
                raw.time,
                snap_price(&ctx.mapper, pane, ctx.magnet, raw.time, raw.price),
            );
            let other = match drag.control {
                ControlPoint::P1 => drag.initial.p2,
                _ => drag.initial.p1,
            };
            if ctx.modifiers.constrains_angle() && matches!(drag.initial.kind, DrawingKind::Trendline) {
                constrain_angle(&ctx.mapper, other, snapped)
            } else {
                snapped
            }
        } else {
            raw
        };

        let next = dragged(&drag.initial, drag.control, drag.anchor, pointer);
        if let Some(drag) = self.drag.as_mut() {
            drag.moved = drag.moved || next != drag.initial;
            drag.current = next.clone();
        }
        bus.emit(DrawingEvent::DragPreview(next));
        true
    }

    /// Tool click: anchor, commit, or commit immediately for single-click tools.
    fn place<P: ChartPane + ?Sized>(
        &mut self,
        pane: PaneId,
        pos: ScreenPos,
        ctx: &InteractionContext<'_, P>,
        bus: &mut EventBus,
    ) -> bool {
        let anchor = match self.tool_state(pane) {
            ToolState::Anchored { anchor } => Some(anchor),
            ToolState::Idle => None,
        };
        let Some(point) = self.resolve(pane, pos, ctx, anchor) else {
            return false;
        };

        if self.tool.is_single_click() {
            if let Some(drawing) = self.build(pane, ctx.symbol, point, point) {
                bus.emit(DrawingEvent::Created(drawing));
            }
            return true;
        }

        match anchor {
            None => {
                self.tool_states.insert(pane, ToolState::Anchored { anchor: point });
                true
            }
            Some(anchor) => {
                self.tool_states.insert(pane, ToolState::Idle);
                self.ghosts.remove(&pane);
                if anchor == point && !self.is_position_tool() {
                    log::debug!("Zero-size {} discarded", self.tool.name());
                    return true;
                }
                if let Some(drawing) = self.build(pane, ctx.symbol, anchor, point) {
                    bus.emit(DrawingEvent::Created(drawing));
                }
                true
            }
        }
    }

    /// Domain point under the pointer with magnet and angle constraint applied.
    fn resolve<P: ChartPane + ?Sized>(
        &self,
        pane: PaneId,
        pos: ScreenPos,
        ctx: &InteractionContext<'_, P>,
        anchor: Option<Point>,
    ) -> Option<Point> {
        let raw = ctx.mapper.pixel_to_point(pos)?;
        let snapped = Point::new(
            raw.time,
            snap_price(&ctx.mapper, pane, ctx.magnet, raw.time, raw.price),
        );
        Some(match anchor {
            Some(anchor) if ctx.modifiers.constrains_angle() && self.tool.is_line_tool() => {
                constrain_angle(&ctx.mapper, anchor, snapped)
            }
            _ => snapped,
        })
    }

    /// Topmost visible drawing of `pane` under the pointer.
    ///
    /// The selected drawing's handles are checked first so overlapping
    /// drawings do not steal them.
    fn hit<'c, P: ChartPane + ?Sized>(
        &self,
        pane: PaneId,
        pos: ScreenPos,
        ctx: &InteractionContext<'c, P>,
    ) -> Option<(&'c Drawing, ControlPoint)> {
        let on_pane = |d: &&Drawing| d.pane == pane && d.symbol == ctx.symbol;

        if let Some(selected) = self.selected.and_then(|id| ctx.find(id)).filter(on_pane) {
            if let Some(control) = hit_test(selected, &ctx.mapper, pos, ctx.hit_tolerance) {
                return Some((selected, control));
            }
        }

        ctx.drawings
            .iter()
            .rev()
            .filter(on_pane)
            .find_map(|d| hit_test(d, &ctx.mapper, pos, ctx.hit_tolerance).map(|c| (d, c)))
    }

    fn build(&self, pane: PaneId, symbol: &str, p1: Point, p2: Point) -> Option<Drawing> {
        let kind = match self.tool {
            DrawingTool::Cursor => return None,
            DrawingTool::Trendline => DrawingKind::Trendline,
            DrawingTool::Rectangle => DrawingKind::Rectangle,
            DrawingTool::Fib => DrawingKind::Fib {
                levels: self.fib_levels.clone(),
            },
            DrawingTool::Text => DrawingKind::Text {
                text: self.default_text.clone(),
                font_size: self.font_size,
            },
            DrawingTool::KillZone => DrawingKind::KillZone(self.kill_zone.clone()),
            DrawingTool::LongPosition => DrawingKind::Position {
                side: Side::Long,
                bracket: Bracket::from_drag(Side::Long, p1.price, p2.price),
            },
            DrawingTool::ShortPosition => DrawingKind::Position {
                side: Side::Short,
                bracket: Bracket::from_drag(Side::Short, p1.price, p2.price),
            },
        };
        let mut drawing = Drawing::new(kind, symbol, pane, p1, p2);
        drawing.stroke = self.stroke;
        Some(drawing)
    }

    fn is_position_tool(&self) -> bool {
        matches!(self.tool, DrawingTool::LongPosition | DrawingTool::ShortPosition)
    }

    fn set_selected(&mut self, id: Option<DrawingId>, bus: &mut EventBus) {
        if self.selected != id {
            self.selected = id;
            bus.emit(DrawingEvent::SelectionChanged(id));
        }
    }
}

/// Geometry of `initial` with `control` dragged from `anchor` to `pointer`.
fn dragged(initial: &Drawing, control: ControlPoint, anchor: Point, pointer: Point) -> Drawing {
    match control {
        ControlPoint::All => {
            initial.translated(pointer.time - anchor.time, pointer.price - anchor.price)
        }
        ControlPoint::P1 => {
            let mut next = initial.clone();
            next.p1 = pointer;
            next
        }
        ControlPoint::P2 => {
            let mut next = initial.clone();
            next.p2 = pointer;
            next
        }
        ControlPoint::Entry => {
            let mut next = initial.clone();
            next.p1.price = pointer.price;
            next.p2.price = pointer.price;
            next
        }
        ControlPoint::Target | ControlPoint::Stop => {
            let mut next = initial.clone();
            if let DrawingKind::Position { bracket, .. } = &mut next.kind {
                if control == ControlPoint::Target {
                    bracket.target = pointer.price;
                } else {
                    bracket.stop = pointer.price;
                }
            }
            next
        }
    }
}
