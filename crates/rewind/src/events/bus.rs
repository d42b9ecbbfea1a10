//! Event bus for queuing outbound events.
//!
//! The [`EventBus`] collects events while a gesture is processed; the host
//! drains them afterwards and forwards each one to its own callbacks.

use std::collections::VecDeque;

use super::types::ChartEvent;

/// A FIFO queue of [`ChartEvent`]s.
///
/// # Usage Pattern
///
/// ```ignore
/// let mut bus = EventBus::new();
/// engine.pointer_down(PaneId::Main, x, y, &ctx, &mut bus);
///
/// for event in bus.drain() {
///     match event {
///         ChartEvent::Drawing(DrawingEvent::Created(d)) => store.insert(d),
///         _ => {}
///     }
/// }
/// ```
#[derive(Debug, Default)]
pub struct EventBus {
    events: VecDeque<ChartEvent>,
}

impl EventBus {
    /// Create a new empty event bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Emit an event.
    pub fn emit(&mut self, event: impl Into<ChartEvent>) {
        self.events.push_back(event.into());
    }

    /// Drain all pending events in FIFO order.
    pub fn drain(&mut self) -> impl Iterator<Item = ChartEvent> + '_ {
        self.events.drain(..)
    }

    /// Take all pending events, leaving the queue empty.
    #[must_use]
    pub fn take(&mut self) -> Vec<ChartEvent> {
        std::mem::take(&mut self.events).into_iter().collect()
    }

    /// Check if there are any pending events.
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get the number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all pending events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::ViewEvent;
    use crate::pane::IndicatorKind;

    #[test]
    fn test_new_bus_is_empty() {
        let bus = EventBus::new();
        assert!(!bus.has_events());
        assert_eq!(bus.len(), 0);
    }

    #[test]
    fn test_fifo_order() {
        let mut bus = EventBus::new();
        bus.emit(ViewEvent::LoadMoreHistory);
        bus.emit(ViewEvent::RemoveIndicator(IndicatorKind::Rsi));

        let mut events = bus.drain();
        assert!(matches!(
            events.next(),
            Some(ChartEvent::View(ViewEvent::LoadMoreHistory))
        ));
        assert!(matches!(
            events.next(),
            Some(ChartEvent::View(ViewEvent::RemoveIndicator(IndicatorKind::Rsi)))
        ));
        assert!(events.next().is_none());
    }

    #[test]
    fn test_take_and_clear() {
        let mut bus = EventBus::new();
        bus.emit(ViewEvent::LoadMoreHistory);
        bus.emit(ViewEvent::LoadMoreHistory);
        assert_eq!(bus.take().len(), 2);
        assert!(bus.is_empty());

        bus.emit(ViewEvent::LoadMoreHistory);
        bus.clear();
        assert!(!bus.has_events());
    }
}
