//! Bar-by-bar replay of historical candles.

mod driver;
mod engine;
mod window;

pub use driver::{PlaybackCommand, PlaybackDriver, PlaybackEvent};
pub use engine::{
    fetch_backfill, fetch_forward, fetch_load, BackfillRequest, ForwardRequest, LoadParams, LoadTicket,
    LoadedData, Phase, PlaybackEngine, SimulationState, MAX_SPEED_MS, MIN_SPEED_MS,
};
pub use window::{merge_by_time, synthetic_bars, CandleWindow};
