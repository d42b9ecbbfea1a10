//! Rewind - interaction and playback core for a chart replay tool.
//!
//! This crate sits between a charting library and the host application:
//! - `coords` / `viewport` - pixel, logical and time/price conversions
//! - `snap` - magnet snapping and angle constraints
//! - `drawing` - annotation tools, hit testing, selection and drags
//! - `killzone` - trading session boxes
//! - `trades` - draggable entry, stop-loss and take-profit lines
//! - `playback` - bar-by-bar replay engine and its async driver
//! - `pane` - pane identity, range sync and the chart adapter trait
//! - `scene` - per-pane primitives for the host to paint
//!
//! Nothing here persists data. Changes the host should apply are published as
//! [`ChartEvent`]s on an [`EventBus`].

pub mod coords;
pub mod drawing;
pub mod error;
pub mod events;
pub mod killzone;
pub mod pane;
pub mod playback;
pub mod scene;
pub mod snap;
pub mod trades;
pub mod viewport;

pub use coords::CoordinateMapper;
pub use drawing::{Drawing, DrawingId, DrawingKind, DrawingManager, DrawingTool, InteractionContext};
pub use error::ReplayError;
pub use events::{ChartEvent, DrawingEvent, EventBus, Modifiers, TradeEvent, ViewEvent};
pub use killzone::{compute_kill_zones, KillZoneBox};
pub use pane::{ChartPane, IndicatorKind, LogicalRange, PaneId, PaneRegistry};
pub use playback::{LoadParams, Phase, PlaybackCommand, PlaybackDriver, PlaybackEngine, PlaybackEvent};
pub use scene::{build_scene, DrawPrimitive, Scene, SceneInput};
pub use snap::{constrain_angle, snap_price};
pub use trades::{Trade, TradeId, TradeOverlay};
pub use viewport::{LinearPane, ScreenPos};
