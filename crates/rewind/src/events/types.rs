//! Outbound event type definitions.
//!
//! This core never persists drawings or mutates trades. Everything it wants the
//! host to do is expressed as a [`ChartEvent`]:
//! - [`DrawingEvent`] - drawing lifecycle (create, update, delete, selection)
//! - [`TradeEvent`] - proposed price edits for trades and pending orders
//! - [`ViewEvent`] - requests concerning panes and data

use crate::drawing::{Drawing, DrawingId};
use crate::pane::IndicatorKind;
use crate::trades::{TradeHandle, TradeId};

/// Keyboard modifier state at the time of a pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Modifier that locks line tools to horizontal/vertical.
    #[must_use]
    pub fn constrains_angle(&self) -> bool {
        self.shift
    }

    /// Modifier that turns a drag into duplicate-and-drag.
    #[must_use]
    pub fn duplicates(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }

    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    #[must_use]
    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

/// Drawing lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingEvent {
    /// A tool committed a new drawing, or a duplicate-drag finished.
    Created(Drawing),
    /// A drag committed new geometry for an existing drawing.
    Updated(Drawing),
    /// The user asked to edit a drawing's properties.
    EditRequested(DrawingId),
    /// Selection moved to another drawing, or was cleared.
    SelectionChanged(Option<DrawingId>),
    /// The user deleted a drawing.
    Deleted(DrawingId),
    /// Live geometry while a drag is in progress. Not a commit.
    DragPreview(Drawing),
}

/// Proposed trade edits.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    /// New stop-loss/take-profit pair. The side that was not dragged keeps its value.
    ModifyTrade {
        trade_id: TradeId,
        stop_loss: f64,
        take_profit: f64,
    },
    /// New entry price for a pending order.
    ModifyOrderEntry { trade_id: TradeId, price: f64 },
    /// Live price while a trade line is dragged. Not a commit.
    DragPreview {
        trade_id: TradeId,
        handle: TradeHandle,
        price: f64,
    },
}

/// Requests about panes and data.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The view scrolled close to the oldest loaded bar.
    LoadMoreHistory,
    /// The user closed an indicator pane.
    RemoveIndicator(IndicatorKind),
}

/// Any event emitted by the interaction core.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartEvent {
    Drawing(DrawingEvent),
    Trade(TradeEvent),
    View(ViewEvent),
}

impl From<DrawingEvent> for ChartEvent {
    fn from(event: DrawingEvent) -> Self {
        ChartEvent::Drawing(event)
    }
}

impl From<TradeEvent> for ChartEvent {
    fn from(event: TradeEvent) -> Self {
        ChartEvent::Trade(event)
    }
}

impl From<ViewEvent> for ChartEvent {
    fn from(event: ViewEvent) -> Self {
        ChartEvent::View(event)
    }
}
