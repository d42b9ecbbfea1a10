//! Candle source trait definition.

use std::future::Future;

use rewind_core::{Candle, Timeframe};

use crate::CancelToken;

/// Asynchronous provider of historical candle ranges.
///
/// Every method returns candles in ascending time order. An empty vector means
/// "no more data in that direction", never an error. Errors use `anyhow::Result`
/// so network, file and database backends can report their own causes.
pub trait CandleSource {
    /// Up to `count` most recent candles with `time <= before`.
    fn fetch_context(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        before: i64,
        count: usize,
        cancel: &CancelToken,
    ) -> impl Future<Output = anyhow::Result<Vec<Candle>>>;

    /// Up to `count` earliest candles with `time >= after`.
    fn fetch_future(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        after: i64,
        count: usize,
        cancel: Option<&CancelToken>,
    ) -> impl Future<Output = anyhow::Result<Vec<Candle>>>;

    /// The first candle the dataset holds, if any.
    fn fetch_first(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        cancel: Option<&CancelToken>,
    ) -> impl Future<Output = anyhow::Result<Option<Candle>>>;

    /// Up to `count` most recent candles with `time < before`.
    fn fetch_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        before: i64,
        count: usize,
    ) -> impl Future<Output = anyhow::Result<Vec<Candle>>>;
}
