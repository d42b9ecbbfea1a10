//! Replay a synthetic session end to end: load, play, buffer, backfill, seek.

use rewind::playback::{LoadParams, Phase, PlaybackEngine};
use rewind::{compute_kill_zones, ReplayError};
use rewind_config::{KillZoneConfig, PlaybackConfig};
use rewind_core::{Candle, Timeframe};
use rewind_data::MemorySource;

/// 2024-01-01 00:00:00 UTC.
const JAN_1: i64 = 1_704_067_200;
const BAR: i64 = 900;

fn quarter_hours(days: i64) -> Vec<Candle> {
    (0..days * 96)
        .map(|i| {
            let base = 1.1 + (i % 96) as f64 * 0.0001;
            Candle::new(JAN_1 + i * BAR, base, base + 0.0004, base - 0.0004, base + 0.0001)
        })
        .collect()
}

fn config() -> PlaybackConfig {
    PlaybackConfig {
        speed_ms: 50,
        visible_bars: 96,
        warmup_bars: 48,
        min_warmup_bars: 48,
        buffer_threshold: 10,
        forward_batch: 96,
        backfill_batch: 96,
    }
}

fn source() -> MemorySource {
    MemorySource::new().with_series("EURUSD", Timeframe::Min15, quarter_hours(5))
}

#[tokio::test]
async fn test_session_replay() {
    let src = source();
    let mut engine = PlaybackEngine::new(config());
    let day_two = JAN_1 + 86_400;
    assert!(
        engine
            .load(&src, LoadParams::new("EURUSD", Timeframe::Min15, day_two, day_two))
            .await
    );
    assert_eq!(engine.phase(), Phase::Ready);
    assert_eq!(engine.current_index(), 0);
    assert_eq!(engine.window().warmup().len(), 48);
    assert_eq!(engine.window().synthetic_count(), 0);

    // Nothing before the clock is playable, warm-up included.
    assert!(engine.candles().iter().all(|c| c.time >= day_two));

    assert!(engine.play());
    let mut buffered = 0;
    for _ in 0..150 {
        if !engine.tick() {
            break;
        }
        buffered += engine.buffer_forward(&src).await;
    }
    assert!(buffered > 0);
    assert_eq!(engine.current_index(), 150);
    assert!(engine.max_index() > engine.current_index());
    let times: Vec<i64> = engine.candles().iter().map(|c| c.time).collect();
    assert!(times.windows(2).all(|w| w[0] < w[1]));

    // Kill zones over the loaded window: three sessions per local day.
    let zones = compute_kill_zones(&KillZoneConfig::default(), &engine.window().all(), Timeframe::Min15);
    assert!(zones.len() >= 3);
    assert!(zones.iter().all(|z| z.high >= z.low && z.end > z.start));

    engine.pause();
    let current = engine.current_candle().copied();
    let inserted = engine.backfill(&src).await;
    assert_eq!(inserted, 48);
    assert_eq!(engine.current_candle().copied(), current);
    // Day one is now fully loaded; nothing older exists.
    assert_eq!(engine.backfill(&src).await, 0);
    assert_eq!(engine.window().synthetic_count(), 0);
    assert_eq!(engine.window().warmup()[0].time, JAN_1);
}

#[tokio::test]
async fn test_seek_and_missing_data() {
    let src = source();
    let mut engine = PlaybackEngine::new(config());
    let day_three = JAN_1 + 2 * 86_400;
    engine
        .load(&src, LoadParams::new("EURUSD", Timeframe::Min15, day_three, day_three))
        .await;

    let target = day_three + 86_400 + 7 * BAR;
    let ticket = engine.seek(target).expect("session is loaded");
    assert!(engine.finish_load(&src, ticket).await);
    assert_eq!(engine.current_candle().map(|c| c.time), Some(target));
    // A full day of context stays on screen left of the clock, over real warm-up.
    assert_eq!(engine.current_index(), 95);
    assert_eq!(engine.window().warmup().len(), 48);
    assert_eq!(engine.window().synthetic_count(), 0);

    // Past the end of the data: parks on the last candle.
    let last = JAN_1 + (5 * 96 - 1) * BAR;
    let ticket = engine.seek(JAN_1 + 30 * 86_400).expect("session is loaded");
    engine.finish_load(&src, ticket).await;
    assert_eq!(engine.phase(), Phase::Ready);
    assert_eq!(engine.current_candle().map(|c| c.time), Some(last));
    assert_eq!(engine.current_index(), engine.max_index() - 1);
    assert!(!engine.play());

    // A session that starts after all data falls back to the first candle.
    let mut late = PlaybackEngine::new(config());
    let day_thirty = JAN_1 + 30 * 86_400;
    late.load(&src, LoadParams::new("EURUSD", Timeframe::Min15, day_thirty, day_thirty))
        .await;
    assert_eq!(late.phase(), Phase::Ready);
    assert_eq!(late.current_candle().map(|c| c.time), Some(JAN_1));

    let mut other = PlaybackEngine::new(config());
    other
        .load(&src, LoadParams::new("USDJPY", Timeframe::Min15, JAN_1, JAN_1))
        .await;
    assert_eq!(other.phase(), Phase::Error);
    assert!(matches!(other.error(), Some(ReplayError::DataUnavailable { .. })));
}
