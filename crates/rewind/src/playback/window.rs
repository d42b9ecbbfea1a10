//! The loaded candle window: warm-up history plus the playable range.

use std::collections::BTreeMap;

use rewind_core::Candle;

/// Merge two ascending runs by time. On equal times the `forward` copy wins.
pub fn merge_by_time(backward: Vec<Candle>, forward: Vec<Candle>) -> Vec<Candle> {
    let mut by_time: BTreeMap<i64, Candle> = backward.into_iter().map(|c| (c.time, c)).collect();
    for candle in forward {
        by_time.insert(candle.time, candle);
    }
    by_time.into_values().collect()
}

/// `count` copies of `reference` stepped back one bar at a time, oldest first.
pub fn synthetic_bars(reference: &Candle, count: usize, bar_seconds: i64) -> Vec<Candle> {
    (1..=count as i64)
        .rev()
        .map(|k| reference.with_time(reference.time - k * bar_seconds))
        .collect()
}

/// Warm-up candles feed indicators but are never played. The first
/// `synthetic` of them are padding, not market data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleWindow {
    warmup: Vec<Candle>,
    visible: Vec<Candle>,
    synthetic: usize,
}

impl CandleWindow {
    /// Split ascending `candles` at `session_start`. Bars strictly before it
    /// become warm-up, keeping only the latest `max_warmup`.
    pub fn split(candles: Vec<Candle>, session_start: i64, max_warmup: usize) -> Self {
        let at = candles.partition_point(|c| c.time < session_start);
        let mut warmup = candles;
        let visible = warmup.split_off(at);
        let excess = warmup.len().saturating_sub(max_warmup);
        warmup.drain(..excess);
        Self {
            warmup,
            visible,
            synthetic: 0,
        }
    }

    pub fn warmup(&self) -> &[Candle] {
        &self.warmup
    }

    pub fn visible(&self) -> &[Candle] {
        &self.visible
    }

    pub(crate) fn visible_mut(&mut self) -> &mut [Candle] {
        &mut self.visible
    }

    pub fn synthetic_count(&self) -> usize {
        self.synthetic
    }

    pub fn real_warmup(&self) -> &[Candle] {
        &self.warmup[self.synthetic..]
    }

    /// Oldest candle that came from the data source.
    pub fn oldest_real(&self) -> Option<&Candle> {
        self.real_warmup().first().or_else(|| self.visible.first())
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Warm-up followed by the playable range, for rendering and indicators.
    pub fn all(&self) -> Vec<Candle> {
        let mut all = Vec::with_capacity(self.warmup.len() + self.visible.len());
        all.extend_from_slice(&self.warmup);
        all.extend_from_slice(&self.visible);
        all
    }

    /// Replace any padding so that warm-up holds at least `min` bars.
    pub fn pad_warmup(&mut self, min: usize, bar_seconds: i64) {
        self.warmup.drain(..self.synthetic);
        self.synthetic = 0;
        if self.warmup.len() >= min {
            return;
        }
        let Some(reference) = self.oldest_real().copied() else {
            return;
        };
        let padding = synthetic_bars(&reference, min - self.warmup.len(), bar_seconds);
        self.synthetic = padding.len();
        self.warmup.splice(0..0, padding);
    }

    /// Append candles strictly newer than the last playable one.
    pub fn append(&mut self, candles: Vec<Candle>) -> usize {
        let last = self.visible.last().map(|c| c.time);
        let before = self.visible.len();
        self.visible
            .extend(candles.into_iter().filter(|c| last.map_or(true, |t| c.time > t)));
        self.visible.len() - before
    }

    /// Prepend a history batch that ends before the oldest real candle.
    ///
    /// The oldest `warmup_bars` of the batch become the new warm-up; the rest
    /// of the batch and the previous real warm-up slide into the playable
    /// range. Candles at or after the current boundary are ignored, so
    /// applying the same batch twice is harmless. Returns how many candles
    /// were inserted in front of the playable range.
    pub fn prepend_history(
        &mut self,
        batch: Vec<Candle>,
        warmup_bars: usize,
        min_warmup: usize,
        bar_seconds: i64,
    ) -> usize {
        let Some(boundary) = self.oldest_real().map(|c| c.time) else {
            return 0;
        };
        let mut oldest: Vec<Candle> = batch.into_iter().filter(|c| c.time < boundary).collect();
        if oldest.is_empty() {
            return 0;
        }

        let rest = oldest.split_off(warmup_bars.min(oldest.len()));
        let previous: Vec<Candle> = self.warmup.drain(self.synthetic..).collect();
        let inserted = rest.len() + previous.len();

        self.warmup = oldest;
        self.synthetic = 0;
        self.visible.splice(0..0, rest.into_iter().chain(previous));
        self.pad_warmup(min_warmup, bar_seconds);
        inserted
    }
}
