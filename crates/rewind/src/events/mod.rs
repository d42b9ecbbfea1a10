//! Outbound events emitted by the interaction core.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{ChartEvent, DrawingEvent, Modifiers, TradeEvent, ViewEvent};
