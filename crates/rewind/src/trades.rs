//! Trade overlay: entry, stop-loss and take-profit lines with drag editing.
//!
//! Trades belong to the host. The overlay only proposes edits through
//! [`TradeEvent`]s and never mutates a trade itself.

use crate::events::{EventBus, TradeEvent};
use crate::pane::ChartPane;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Pending,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    pub fn label(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::StopLimit => "STOP LIMIT",
        }
    }
}

/// A trade or pending order. A stop-loss or take-profit of `0.0` is unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: TradeId,
    pub status: TradeStatus,
    pub order_type: OrderType,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Trade {
    pub fn has_stop_loss(&self) -> bool {
        self.stop_loss != 0.0
    }

    pub fn has_take_profit(&self) -> bool {
        self.take_profit != 0.0
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TradeStatus::Open | TradeStatus::Pending)
    }
}

/// Draggable line of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeHandle {
    StopLoss,
    TakeProfit,
    Entry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeLineKind {
    Entry,
    StopLoss,
    TakeProfit,
    /// Button that starts dragging out a new stop-loss.
    AddStopLoss,
    /// Button that starts dragging out a new take-profit.
    AddTakeProfit,
}

impl TradeLineKind {
    /// The handle a drag on this line grabs.
    pub fn handle(&self) -> TradeHandle {
        match self {
            TradeLineKind::Entry => TradeHandle::Entry,
            TradeLineKind::StopLoss | TradeLineKind::AddStopLoss => TradeHandle::StopLoss,
            TradeLineKind::TakeProfit | TradeLineKind::AddTakeProfit => TradeHandle::TakeProfit,
        }
    }

    pub fn is_affordance(&self) -> bool {
        matches!(self, TradeLineKind::AddStopLoss | TradeLineKind::AddTakeProfit)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TradeLineKind::Entry => "ENTRY",
            TradeLineKind::StopLoss => "SL",
            TradeLineKind::TakeProfit => "TP",
            TradeLineKind::AddStopLoss => "+SL",
            TradeLineKind::AddTakeProfit => "+TP",
        }
    }
}

/// A horizontal line (or add button) to render for a trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLine {
    pub trade_id: TradeId,
    pub kind: TradeLineKind,
    pub price: f64,
    pub dragging: bool,
}

#[derive(Debug, Clone, Copy)]
struct TradeDrag {
    trade_id: TradeId,
    handle: TradeHandle,
    price: Option<f64>,
}

/// Drag controller for trade lines.
#[derive(Debug, Default)]
pub struct TradeOverlay {
    drag: Option<TradeDrag>,
}

impl TradeOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Lines for every open or pending trade.
    ///
    /// The entry line is drawn for pending orders only. A stop-loss or
    /// take-profit line appears when the level is set or being dragged;
    /// otherwise an add button sits at the entry price.
    pub fn lines(&self, trades: &[Trade]) -> Vec<TradeLine> {
        let mut lines = Vec::new();
        for trade in trades.iter().filter(|t| t.is_active()) {
            let dragged = |handle: TradeHandle| {
                self.drag
                    .filter(|d| d.trade_id == trade.id && d.handle == handle)
                    .and_then(|d| d.price)
            };

            if trade.status == TradeStatus::Pending {
                let price = dragged(TradeHandle::Entry);
                lines.push(TradeLine {
                    trade_id: trade.id,
                    kind: TradeLineKind::Entry,
                    price: price.unwrap_or(trade.entry_price),
                    dragging: price.is_some(),
                });
            }

            for (handle, level, line, add) in [
                (TradeHandle::StopLoss, trade.stop_loss, TradeLineKind::StopLoss, TradeLineKind::AddStopLoss),
                (TradeHandle::TakeProfit, trade.take_profit, TradeLineKind::TakeProfit, TradeLineKind::AddTakeProfit),
            ] {
                let (kind, price, dragging) = match dragged(handle) {
                    Some(price) => (line, price, true),
                    None if level != 0.0 => (line, level, false),
                    None => (add, trade.entry_price, false),
                };
                lines.push(TradeLine {
                    trade_id: trade.id,
                    kind,
                    price,
                    dragging,
                });
            }
        }
        lines
    }

    /// The line nearest to pixel row `y` within `tolerance`.
    pub fn line_at<P: ChartPane + ?Sized>(
        &self,
        trades: &[Trade],
        pane: &P,
        y: f64,
        tolerance: f64,
    ) -> Option<TradeLine> {
        self.lines(trades)
            .into_iter()
            .filter_map(|line| {
                let dist = (pane.price_to_coordinate(line.price)? - y).abs();
                (dist <= tolerance).then_some((line, dist))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(line, _)| line)
    }

    /// Grab `handle` of `trade`. Entries of filled trades cannot move.
    pub fn start_drag(&mut self, trade: &Trade, handle: TradeHandle) -> bool {
        let allowed = match handle {
            TradeHandle::Entry => trade.status == TradeStatus::Pending,
            TradeHandle::StopLoss | TradeHandle::TakeProfit => trade.is_active(),
        };
        if !allowed {
            return false;
        }
        self.drag = Some(TradeDrag {
            trade_id: trade.id,
            handle,
            price: None,
        });
        true
    }

    /// Move the grabbed line to `price` and publish a preview.
    pub fn drag_to(&mut self, price: f64, bus: &mut EventBus) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        drag.price = Some(price);
        bus.emit(TradeEvent::DragPreview {
            trade_id: drag.trade_id,
            handle: drag.handle,
            price,
        });
        true
    }

    /// Commit the drag. The side that was not dragged keeps its current value.
    pub fn release(&mut self, trades: &[Trade], bus: &mut EventBus) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        let Some(price) = drag.price else {
            return false;
        };
        let Some(trade) = trades.iter().find(|t| t.id == drag.trade_id) else {
            log::debug!("Trade {:?} vanished during drag", drag.trade_id);
            return false;
        };

        match drag.handle {
            TradeHandle::Entry => bus.emit(TradeEvent::ModifyOrderEntry {
                trade_id: trade.id,
                price,
            }),
            TradeHandle::StopLoss => bus.emit(TradeEvent::ModifyTrade {
                trade_id: trade.id,
                stop_loss: price,
                take_profit: trade.take_profit,
            }),
            TradeHandle::TakeProfit => bus.emit(TradeEvent::ModifyTrade {
                trade_id: trade.id,
                stop_loss: trade.stop_loss,
                take_profit: price,
            }),
        }
        true
    }

    pub fn cancel(&mut self) {
        self.drag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChartEvent;
    use crate::viewport::LinearPane;

    fn open_trade() -> Trade {
        Trade {
            id: TradeId(1),
            status: TradeStatus::Open,
            order_type: OrderType::Market,
            entry_price: 1.1000,
            stop_loss: 1.0950,
            take_profit: 0.0,
        }
    }

    fn pending_order() -> Trade {
        Trade {
            id: TradeId(2),
            status: TradeStatus::Pending,
            order_type: OrderType::Limit,
            entry_price: 1.0900,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }

    #[test]
    fn test_lines_for_open_and_pending() {
        let overlay = TradeOverlay::new();
        let mut closed = open_trade();
        closed.id = TradeId(3);
        closed.status = TradeStatus::Closed;

        let lines = overlay.lines(&[open_trade(), pending_order(), closed]);
        let kinds: Vec<(TradeId, TradeLineKind)> = lines.iter().map(|l| (l.trade_id, l.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (TradeId(1), TradeLineKind::StopLoss),
                (TradeId(1), TradeLineKind::AddTakeProfit),
                (TradeId(2), TradeLineKind::Entry),
                (TradeId(2), TradeLineKind::AddStopLoss),
                (TradeId(2), TradeLineKind::AddTakeProfit),
            ]
        );
    }

    #[test]
    fn test_drag_tp_preserves_sl() {
        let trades = vec![open_trade()];
        let mut overlay = TradeOverlay::new();
        let mut bus = EventBus::new();

        assert!(overlay.start_drag(&trades[0], TradeHandle::TakeProfit));
        overlay.drag_to(1.1080, &mut bus);
        // While dragging, the add button turns into a real line.
        assert!(overlay
            .lines(&trades)
            .iter()
            .any(|l| l.kind == TradeLineKind::TakeProfit && l.dragging && l.price == 1.1080));

        overlay.drag_to(1.1100, &mut bus);
        assert!(overlay.release(&trades, &mut bus));
        assert!(!overlay.is_dragging());

        let events = bus.take();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            ChartEvent::Trade(TradeEvent::ModifyTrade {
                trade_id: TradeId(1),
                stop_loss: 1.0950,
                take_profit: 1.1100,
            })
        );
    }

    #[test]
    fn test_entry_drag_only_for_pending() {
        let mut overlay = TradeOverlay::new();
        let mut bus = EventBus::new();
        assert!(!overlay.start_drag(&open_trade(), TradeHandle::Entry));

        let trades = vec![pending_order()];
        assert!(overlay.start_drag(&trades[0], TradeHandle::Entry));
        overlay.drag_to(1.0875, &mut bus);
        overlay.release(&trades, &mut bus);
        assert_eq!(
            bus.take().last(),
            Some(&ChartEvent::Trade(TradeEvent::ModifyOrderEntry {
                trade_id: TradeId(2),
                price: 1.0875,
            }))
        );
    }

    #[test]
    fn test_release_without_move_or_trade() {
        let trades = vec![open_trade()];
        let mut overlay = TradeOverlay::new();
        let mut bus = EventBus::new();

        overlay.start_drag(&trades[0], TradeHandle::StopLoss);
        assert!(!overlay.release(&trades, &mut bus));

        overlay.start_drag(&trades[0], TradeHandle::StopLoss);
        overlay.drag_to(1.0940, &mut bus);
        assert!(!overlay.release(&[], &mut bus));
        assert_eq!(bus.len(), 1);
        assert!(!overlay.is_dragging());
    }

    #[test]
    fn test_line_at() {
        let trades = vec![open_trade()];
        let overlay = TradeOverlay::new();
        let pane = LinearPane::new(800.0, 1000.0).with_prices(1.09, 1.11);
        // SL at 1.0950 sits at y = 750.
        let line = overlay.line_at(&trades, &pane, 748.0, 5.0).unwrap();
        assert_eq!(line.kind, TradeLineKind::StopLoss);
        assert!(overlay.line_at(&trades, &pane, 100.0, 5.0).is_none());
    }
}
