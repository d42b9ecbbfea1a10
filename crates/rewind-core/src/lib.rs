//! Core types for the rewind replay engine.
//!
//! This crate provides the fundamental data structures shared by every layer:
//! - `Candle` - OHLC candle data
//! - `Point` - a time/price anchor
//! - `Timeframe` - chart period enumeration and bar alignment
//! - price precision per instrument

pub mod candle;
pub mod instrument;
pub mod timeframe;

pub use candle::{index_at_or_before, Candle, Point};
pub use instrument::{price_decimals, round_price};
pub use timeframe::{ParseTimeframeError, Timeframe};
