//! Headless replay demo
//!
//! Loads a replay session, plays a few bars through the playback driver,
//! places a couple of drawings and logs what the scene would paint.
//!
//! Usage: replay_demo [csv_path] [--symbol S] [--timeframe TF] [--ticks N]
//!
//! Without a CSV path a synthetic series is generated. Run with
//! `RUST_LOG=info` (or `debug`) to see the output.

use std::env;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rewind::drawing::{Bracket, Side};
use rewind::playback::{LoadParams, Phase, PlaybackCommand, PlaybackDriver, PlaybackEngine, PlaybackEvent};
use rewind::trades::{OrderType, Trade, TradeId, TradeStatus};
use rewind::{
    build_scene, DrawPrimitive, Drawing, DrawingKind, DrawingManager, LinearPane, PaneId, SceneInput,
    TradeOverlay,
};
use rewind_config::Config;
use rewind_core::{Candle, Point, Timeframe};
use rewind_data::{CsvLoader, MemorySource};

const DEFAULT_SYMBOL: &str = "EURUSD";
const DEFAULT_TICKS: usize = 20;
/// Three days of synthetic bars.
const SYNTHETIC_SECONDS: i64 = 3 * 86_400;
/// 2024-01-01 00:00:00 UTC.
const SYNTHETIC_START: i64 = 1_704_067_200;

struct Args {
    csv_path: Option<String>,
    symbol: String,
    timeframe: Timeframe,
    ticks: usize,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        csv_path: None,
        symbol: DEFAULT_SYMBOL.to_string(),
        timeframe: Timeframe::Min15,
        ticks: DEFAULT_TICKS,
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--symbol" => args.symbol = iter.next().context("--symbol needs a value")?,
            "--timeframe" => {
                let value = iter.next().context("--timeframe needs a value")?;
                args.timeframe = value.parse().with_context(|| format!("bad timeframe {value}"))?;
            }
            "--ticks" => {
                let value = iter.next().context("--ticks needs a value")?;
                args.ticks = value.parse().with_context(|| format!("bad tick count {value}"))?;
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            path => args.csv_path = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn synthetic_candles(timeframe: Timeframe) -> Vec<Candle> {
    let bar = timeframe.seconds();
    let count = SYNTHETIC_SECONDS / bar;
    let mut close = 1.1000;
    (0..count)
        .map(|i| {
            let open = close;
            close = 1.1000 + 0.004 * ((i as f64) / 12.0).sin() + 0.0003 * ((i as f64) / 2.0).cos();
            let high = open.max(close) + 0.0002;
            let low = open.min(close) - 0.0002;
            Candle::new(SYNTHETIC_START + i * bar, open, high, low, close)
        })
        .collect()
}

fn build_source(args: &Args) -> Result<MemorySource> {
    let mut source = MemorySource::new();
    match &args.csv_path {
        Some(path) => {
            let count = CsvLoader::new(path)
                .load_into(&mut source, &args.symbol, args.timeframe)
                .with_context(|| format!("failed to load {path}"))?;
            log::info!("Loaded {} candles from {}", count, path);
        }
        None => {
            let candles = synthetic_candles(args.timeframe);
            log::info!("Generated {} synthetic {} candles", candles.len(), args.timeframe);
            source.insert(&args.symbol, args.timeframe, candles);
        }
    }
    Ok(source)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let started = Instant::now();

    let args = parse_args()?;
    let config = Config::load_default();
    let source = build_source(&args)?;

    let first = source
        .candles(&args.symbol, args.timeframe)
        .first()
        .copied()
        .with_context(|| format!("no candles for {} {}", args.symbol, args.timeframe))?;
    let session_start = first.time + 86_400;
    let params = LoadParams::new(&args.symbol, args.timeframe, session_start, session_start);

    let (driver, commands, mut events) = PlaybackDriver::new(PlaybackEngine::new(config.playback.clone()), source);
    let ticks = args.ticks;
    let host = async move {
        commands.send(PlaybackCommand::SetSpeed(10)).await?;
        commands.send(PlaybackCommand::Load(params)).await?;
        let mut seen = 0;
        let mut playing = false;
        while let Some(event) = events.recv().await {
            match event {
                PlaybackEvent::Loaded { state, sim_time } => {
                    log::info!("Session ready at {} ({} playable bars)", sim_time, state.max_index);
                    commands.send(PlaybackCommand::Play).await?;
                }
                PlaybackEvent::Tick { index, candle, .. } => {
                    log::debug!("Bar {}: close {:.5}", index, candle.close);
                    seen += 1;
                    if seen >= ticks {
                        break;
                    }
                }
                PlaybackEvent::Error(message) => bail!("playback failed: {message}"),
                PlaybackEvent::PhaseChanged(Phase::Playing) => playing = true,
                PlaybackEvent::PhaseChanged(Phase::Ready) if playing => {
                    log::info!("Reached the end of the loaded data");
                    break;
                }
                PlaybackEvent::PhaseChanged(phase) => log::debug!("Phase: {:?}", phase),
                other => log::debug!("{:?}", other),
            }
        }
        commands.send(PlaybackCommand::Shutdown).await?;
        anyhow::Ok(seen)
    };
    let (engine, played) = tokio::join!(driver.run(), host);
    let played = played?;
    log::info!("Played {} bars, now at index {}", played, engine.current_index());

    let window = engine.window().all();
    let current = engine
        .current_candle()
        .copied()
        .context("engine has no current candle")?;
    let (low, high) = window
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), c| (lo.min(c.low), hi.max(c.high)));
    let pane = LinearPane::new(1200.0, 600.0)
        .with_range(0.0, window.len() as f64)
        .with_prices(low, high);

    let bar = args.timeframe.seconds();
    let drawings = vec![
        Drawing::new(
            DrawingKind::KillZone(config.kill_zone.clone()),
            &args.symbol,
            PaneId::Main,
            Point::new(window[0].time, window[0].close),
            Point::new(window[0].time, window[0].close),
        ),
        Drawing::new(
            DrawingKind::Position {
                side: Side::Long,
                bracket: Bracket::from_drag(Side::Long, current.close, current.close * 1.002),
            },
            &args.symbol,
            PaneId::Main,
            Point::new(current.time, current.close),
            Point::new(current.time + 20 * bar, current.close),
        ),
    ];
    let trades = vec![Trade {
        id: TradeId(1),
        status: TradeStatus::Open,
        order_type: OrderType::Market,
        entry_price: current.close,
        stop_loss: current.close * 0.998,
        take_profit: 0.0,
    }];

    let manager = DrawingManager::new();
    let overlay = TradeOverlay::new();
    let input = SceneInput {
        symbol: &args.symbol,
        timeframe: args.timeframe,
        candles: &window,
        warmup_len: engine.window().warmup().len(),
        drawings: &drawings,
        manager: &manager,
        trades: &trades,
        overlay: &overlay,
    };
    let scene = build_scene(&[(PaneId::Main, &pane)], &input);

    for (pane_id, primitives) in &scene {
        let count = |f: fn(&DrawPrimitive) -> bool| primitives.iter().filter(|p| f(p)).count();
        log::info!(
            "Pane {}: {} lines, {} boxes, {} labels",
            pane_id,
            count(|p| matches!(p, DrawPrimitive::Line { .. })),
            count(|p| matches!(p, DrawPrimitive::Rect { .. })),
            count(|p| matches!(p, DrawPrimitive::Label { .. })),
        );
    }
    log::info!("Done in {:.2?}", started.elapsed());
    Ok(())
}
