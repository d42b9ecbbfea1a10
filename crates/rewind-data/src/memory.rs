//! In-memory candle source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use rewind_core::{Candle, Timeframe};

use crate::validation::is_strictly_ascending;
use crate::{CancelToken, CandleSource};

/// Serves fixed candle sets keyed by symbol and timeframe.
///
/// Used by headless hosts (the CSV loader builds one) and by tests, which can
/// inspect how many fetches were issued.
#[derive(Debug, Default)]
pub struct MemorySource {
    series: HashMap<(String, Timeframe), Vec<Candle>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register candles for a symbol/timeframe pair.
    ///
    /// Input is sorted and deduplicated by time, keeping the last occurrence.
    pub fn insert(&mut self, symbol: &str, timeframe: Timeframe, mut candles: Vec<Candle>) {
        if !is_strictly_ascending(&candles) {
            candles.sort_by_key(|c| c.time);
            candles.reverse();
            candles.dedup_by_key(|c| c.time);
            candles.reverse();
        }
        self.series.insert((symbol.to_string(), timeframe), candles);
    }

    /// Builder-style variant of [`MemorySource::insert`].
    #[must_use]
    pub fn with_series(mut self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.insert(symbol, timeframe, candles);
        self
    }

    /// Candles registered for a pair.
    pub fn candles(&self, symbol: &str, timeframe: Timeframe) -> &[Candle] {
        self.series
            .get(&(symbol.to_string(), timeframe))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of fetch calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn record(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }
}

fn check(cancel: Option<&CancelToken>) -> anyhow::Result<()> {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        bail!("fetch cancelled");
    }
    Ok(())
}

impl CandleSource for MemorySource {
    async fn fetch_context(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        before: i64,
        count: usize,
        cancel: &CancelToken,
    ) -> anyhow::Result<Vec<Candle>> {
        self.record();
        check(Some(cancel))?;
        let candles = self.candles(symbol, timeframe);
        let end = candles.partition_point(|c| c.time <= before);
        let start = end.saturating_sub(count);
        Ok(candles[start..end].to_vec())
    }

    async fn fetch_future(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        after: i64,
        count: usize,
        cancel: Option<&CancelToken>,
    ) -> anyhow::Result<Vec<Candle>> {
        self.record();
        check(cancel)?;
        let candles = self.candles(symbol, timeframe);
        let start = candles.partition_point(|c| c.time < after);
        let end = (start + count).min(candles.len());
        Ok(candles[start..end].to_vec())
    }

    async fn fetch_first(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        cancel: Option<&CancelToken>,
    ) -> anyhow::Result<Option<Candle>> {
        self.record();
        check(cancel)?;
        Ok(self.candles(symbol, timeframe).first().copied())
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        before: i64,
        count: usize,
    ) -> anyhow::Result<Vec<Candle>> {
        self.record();
        let candles = self.candles(symbol, timeframe);
        let end = candles.partition_point(|c| c.time < before);
        let start = end.saturating_sub(count);
        Ok(candles[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemorySource {
        let candles = (0..10).map(|i| Candle::flat(i * 60, i as f64)).collect();
        MemorySource::new().with_series("EURUSD", Timeframe::Min1, candles)
    }

    #[tokio::test]
    async fn test_context_is_inclusive() {
        let src = source();
        let token = CancelToken::new();
        let got = src
            .fetch_context("EURUSD", Timeframe::Min1, 300, 3, &token)
            .await
            .unwrap();
        let times: Vec<i64> = got.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![180, 240, 300]);
    }

    #[tokio::test]
    async fn test_future_and_history() {
        let src = source();
        let fut = src
            .fetch_future("EURUSD", Timeframe::Min1, 450, 2, None)
            .await
            .unwrap();
        assert_eq!(fut.iter().map(|c| c.time).collect::<Vec<_>>(), vec![480, 540]);

        let hist = src.fetch_history("EURUSD", Timeframe::Min1, 120, 10).await.unwrap();
        assert_eq!(hist.iter().map(|c| c.time).collect::<Vec<_>>(), vec![0, 60]);
        assert_eq!(src.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_empty() {
        let src = source();
        let first = src.fetch_first("GBPUSD", Timeframe::Min1, None).await.unwrap();
        assert!(first.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_fetch_fails() {
        let src = source();
        let token = CancelToken::new();
        token.cancel();
        let result = src.fetch_context("EURUSD", Timeframe::Min1, 300, 3, &token).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_insert_dedups() {
        let mut src = MemorySource::new();
        src.insert(
            "X",
            Timeframe::Min1,
            vec![Candle::flat(60, 1.0), Candle::flat(0, 0.5), Candle::flat(60, 2.0)],
        );
        let candles = src.candles("X", Timeframe::Min1);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 2.0);
    }
}
