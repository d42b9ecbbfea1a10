//! Session kill zone boxes.
//!
//! Sessions are configured in a fixed reference timezone. For each calendar
//! day (in that zone) touched by the loaded candles, every enabled session
//! becomes a box spanning the high and low of the bars it overlaps.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use rewind_config::{KillZoneConfig, SessionConfig};
use rewind_core::{Candle, Timeframe};

const DAY_SECONDS: i64 = 86_400;

/// One rendered session box.
#[derive(Debug, Clone, PartialEq)]
pub struct KillZoneBox {
    pub session: String,
    /// Calendar day in the reference timezone.
    pub day: NaiveDate,
    pub start: i64,
    pub end: i64,
    pub high: f64,
    pub low: f64,
    pub mid: Option<f64>,
    pub extend_right: bool,
    pub color: [f32; 4],
    pub label: Option<String>,
}

/// Compute session boxes for `candles`.
///
/// Intraday sessions mean nothing on 4h and coarser bars, so nothing is
/// produced there. From 1h upward the box edges snap to bar boundaries.
pub fn compute_kill_zones(config: &KillZoneConfig, candles: &[Candle], timeframe: Timeframe) -> Vec<KillZoneBox> {
    if candles.is_empty() || timeframe.is_at_least(Timeframe::Hour4) {
        return Vec::new();
    }
    let Some(offset) = FixedOffset::east_opt(config.utc_offset_hours * 3600) else {
        log::warn!("Invalid kill zone UTC offset {}h", config.utc_offset_hours);
        return Vec::new();
    };

    let days: BTreeSet<NaiveDate> = candles
        .iter()
        .filter_map(|c| DateTime::from_timestamp(c.time, 0))
        .map(|utc| utc.with_timezone(&offset).date_naive())
        .collect();

    let mut boxes = Vec::new();
    for day in days {
        for session in config.sessions.iter().filter(|s| s.enabled) {
            if let Some(b) = session_box(config, session, day, offset, candles, timeframe) {
                boxes.push(b);
            }
        }
    }
    boxes
}

/// Epoch-second window `[start, end)` of a session on `day`.
///
/// A session whose end is not after its start wraps past midnight.
pub fn session_window(session: &SessionConfig, day: NaiveDate, offset: FixedOffset) -> (i64, i64) {
    let shift = i64::from(offset.local_minus_utc());
    let start = day.and_time(session.start).and_utc().timestamp() - shift;
    let mut end = day.and_time(session.end).and_utc().timestamp() - shift;
    if end <= start {
        end += DAY_SECONDS;
    }
    (start, end)
}

fn session_box(
    config: &KillZoneConfig,
    session: &SessionConfig,
    day: NaiveDate,
    offset: FixedOffset,
    candles: &[Candle],
    timeframe: Timeframe,
) -> Option<KillZoneBox> {
    let bar = timeframe.seconds();
    let (start, end) = session_window(session, day, offset);

    // Candles are sorted, so the overlapping bars form one contiguous run.
    let lo = candles.partition_point(|c| c.end_time(bar) <= start);
    let hi = candles.partition_point(|c| c.time < end);
    let selected = candles.get(lo..hi).filter(|s| !s.is_empty())?;

    let high = selected.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = selected.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    let (start, end) = if timeframe.is_at_least(Timeframe::Hour1) {
        (selected[0].time, selected[selected.len() - 1].end_time(bar))
    } else {
        (start, end)
    };

    Some(KillZoneBox {
        session: session.name.clone(),
        day,
        start,
        end,
        high,
        low,
        mid: config.show_midline.then_some((high + low) / 2.0),
        extend_right: config.extend_right,
        color: session.color,
        label: session.show_label.then(|| session.name.clone()),
    })
}
