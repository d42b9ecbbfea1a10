//! Replay error types.

use rewind_core::Timeframe;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("no candle data available for {symbol} {timeframe}")]
    DataUnavailable { symbol: String, timeframe: Timeframe },

    /// A newer load superseded this one. Never shown to the user.
    #[error("fetch cancelled")]
    FetchCancelled,

    #[error(transparent)]
    Fetch(#[from] anyhow::Error),
}

impl ReplayError {
    /// Cancellations are expected and dropped without a trace.
    pub fn is_silent(&self) -> bool {
        matches!(self, ReplayError::FetchCancelled)
    }
}
