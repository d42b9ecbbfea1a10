//! Async driver that runs a [`PlaybackEngine`] off a command channel.
//!
//! The host sends [`PlaybackCommand`]s and listens for [`PlaybackEvent`]s.
//! Ticks come from a tokio interval at the engine's speed; loads and buffer
//! fetches run concurrently with commands and ticks, and a newer load simply
//! drops the older one.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rewind_config::PlaybackConfig;
use rewind_core::Candle;
use rewind_data::CandleSource;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::error::ReplayError;

use super::engine::{
    fetch_backfill, fetch_forward, fetch_load, BackfillRequest, ForwardRequest, LoadParams, LoadTicket,
    LoadedData, Phase, PlaybackEngine, SimulationState,
};

const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    Load(LoadParams),
    Play,
    Pause,
    Toggle,
    Step,
    SetSpeed(u64),
    Seek(i64),
    SeekToStart,
    SetLivePrice(f64),
    LoadMoreHistory,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    PhaseChanged(Phase),
    Loaded { state: SimulationState, sim_time: i64 },
    Tick { index: usize, sim_time: i64, candle: Candle },
    /// The current candle changed in place (live price update).
    CandleUpdated { index: usize, candle: Candle },
    ForwardBuffered { added: usize },
    HistoryPrepended { inserted: usize, current_index: usize },
    Error(String),
}

type Slot<'a, T> = Option<Pin<Box<dyn Future<Output = T> + 'a>>>;

/// Owns the engine and the data source for the lifetime of a session.
pub struct PlaybackDriver<S> {
    engine: PlaybackEngine,
    source: S,
    commands: mpsc::Receiver<PlaybackCommand>,
    events: mpsc::Sender<PlaybackEvent>,
}

impl<S: CandleSource> PlaybackDriver<S> {
    pub fn new(
        engine: PlaybackEngine,
        source: S,
    ) -> (Self, mpsc::Sender<PlaybackCommand>, mpsc::Receiver<PlaybackEvent>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let driver = Self {
            engine,
            source,
            commands: command_rx,
            events: event_tx,
        };
        (driver, command_tx, event_rx)
    }

    /// Process commands until [`PlaybackCommand::Shutdown`] or until every
    /// command sender is dropped. Returns the engine in its final state.
    ///
    /// Candle sources are not required to be `Send`, so run this on the
    /// host's task (or a `LocalSet`) rather than spawning it.
    pub async fn run(self) -> PlaybackEngine {
        let Self {
            mut engine,
            source,
            mut commands,
            events,
        } = self;
        let source = &source;

        let mut ticker = ticker(engine.speed_ms());
        let mut load: Slot<'_, (LoadTicket, Result<LoadedData, ReplayError>)> = None;
        let mut forward: Slot<'_, (ForwardRequest, anyhow::Result<Vec<Candle>>)> = None;
        let mut backfill: Slot<'_, (BackfillRequest, anyhow::Result<Vec<Candle>>)> = None;
        let mut phase = engine.phase();
        let mut outbox = Vec::new();

        log::debug!("Playback driver started");
        loop {
            tokio::select! {
                // Commands first: the latest user intent supersedes pending work.
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    log::trace!("Playback command {:?}", command);
                    match command {
                        PlaybackCommand::Load(params) => {
                            let ticket = engine.begin_load(params);
                            load = Some(load_future(source, ticket, engine.config().clone()));
                            forward = None;
                            backfill = None;
                        }
                        PlaybackCommand::Seek(time) => {
                            if let Some(ticket) = engine.seek(time) {
                                load = Some(load_future(source, ticket, engine.config().clone()));
                                forward = None;
                                backfill = None;
                            }
                        }
                        PlaybackCommand::SeekToStart => {
                            if let Some(ticket) = engine.seek_to_start() {
                                load = Some(load_future(source, ticket, engine.config().clone()));
                                forward = None;
                                backfill = None;
                            }
                        }
                        PlaybackCommand::Play => {
                            if engine.play() {
                                ticker.reset();
                            }
                        }
                        PlaybackCommand::Pause => {
                            engine.pause();
                        }
                        PlaybackCommand::Toggle => {
                            if engine.toggle() {
                                ticker.reset();
                            }
                        }
                        PlaybackCommand::Step => {
                            if engine.step() {
                                outbox.extend(tick_event(&engine));
                            }
                        }
                        PlaybackCommand::SetSpeed(ms) => {
                            ticker = self::ticker(engine.set_speed(ms));
                        }
                        PlaybackCommand::SetLivePrice(price) => {
                            engine.set_live_price(price);
                            if let Some(candle) = engine.current_candle() {
                                outbox.push(PlaybackEvent::CandleUpdated {
                                    index: engine.current_index(),
                                    candle: *candle,
                                });
                            }
                        }
                        PlaybackCommand::LoadMoreHistory => {
                            if backfill.is_none() {
                                if let Some(request) = engine.backfill_request() {
                                    backfill = Some(backfill_future(source, request));
                                }
                            }
                        }
                        PlaybackCommand::Shutdown => break,
                    }
                }

                (ticket, result) = poll_slot(&mut load) => {
                    load = None;
                    if engine.apply_load(ticket, result) {
                        match engine.error() {
                            Some(err) => outbox.push(PlaybackEvent::Error(err.to_string())),
                            None => outbox.push(PlaybackEvent::Loaded {
                                state: engine.state(),
                                sim_time: engine.sim_time(),
                            }),
                        }
                    }
                }

                _ = ticker.tick(), if engine.is_playing() => {
                    if engine.tick() {
                        outbox.extend(tick_event(&engine));
                    }
                }

                (request, result) = poll_slot(&mut forward) => {
                    forward = None;
                    let added = engine.apply_forward(request, result);
                    if added > 0 {
                        outbox.push(PlaybackEvent::ForwardBuffered { added });
                    }
                }

                (request, result) = poll_slot(&mut backfill) => {
                    backfill = None;
                    let inserted = engine.apply_backfill(request, result);
                    if inserted > 0 {
                        outbox.push(PlaybackEvent::HistoryPrepended {
                            inserted,
                            current_index: engine.current_index(),
                        });
                    }
                }
            }

            if forward.is_none() {
                if let Some(request) = engine.forward_request() {
                    forward = Some(forward_future(source, request));
                }
            }
            if engine.phase() != phase {
                phase = engine.phase();
                outbox.push(PlaybackEvent::PhaseChanged(phase));
            }
            for event in outbox.drain(..) {
                if events.send(event).await.is_err() {
                    log::debug!("Playback event receiver dropped");
                }
            }
        }

        log::debug!("Playback driver stopped");
        engine
    }
}

fn ticker(speed_ms: u64) -> Interval {
    let period = Duration::from_millis(speed_ms);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn tick_event(engine: &PlaybackEngine) -> Option<PlaybackEvent> {
    let candle = *engine.current_candle()?;
    Some(PlaybackEvent::Tick {
        index: engine.current_index(),
        sim_time: engine.sim_time(),
        candle,
    })
}

/// Resolve the slot's future, or never if the slot is empty.
async fn poll_slot<T>(slot: &mut Slot<'_, T>) -> T {
    match slot.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

fn load_future<'a, S: CandleSource + 'a>(
    source: &'a S,
    ticket: LoadTicket,
    config: PlaybackConfig,
) -> Pin<Box<dyn Future<Output = (LoadTicket, Result<LoadedData, ReplayError>)> + 'a>> {
    Box::pin(async move {
        let result = fetch_load(source, &ticket, &config).await;
        (ticket, result)
    })
}

fn forward_future<'a, S: CandleSource + 'a>(
    source: &'a S,
    request: ForwardRequest,
) -> Pin<Box<dyn Future<Output = (ForwardRequest, anyhow::Result<Vec<Candle>>)> + 'a>> {
    Box::pin(async move {
        let result = fetch_forward(source, &request).await;
        (request, result)
    })
}

fn backfill_future<'a, S: CandleSource + 'a>(
    source: &'a S,
    request: BackfillRequest,
) -> Pin<Box<dyn Future<Output = (BackfillRequest, anyhow::Result<Vec<Candle>>)> + 'a>> {
    Box::pin(async move {
        let result = fetch_backfill(source, &request).await;
        (request, result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::Timeframe;
    use rewind_data::MemorySource;

    const T0: i64 = 1_704_067_200;

    fn source(count: i64) -> MemorySource {
        let candles = (0..count)
            .map(|i| Candle::new(T0 + i * 60, 1.0, 1.5, 0.5, 1.2))
            .collect();
        MemorySource::new().with_series("EURUSD", Timeframe::Min1, candles)
    }

    fn engine() -> PlaybackEngine {
        PlaybackEngine::new(PlaybackConfig {
            speed_ms: 100,
            visible_bars: 20,
            warmup_bars: 5,
            min_warmup_bars: 5,
            buffer_threshold: 5,
            forward_batch: 10,
            backfill_batch: 8,
        })
    }

    fn params(session: i64, sim: i64) -> LoadParams {
        LoadParams::new("EURUSD", Timeframe::Min1, T0 + session * 60, T0 + sim * 60)
    }

    async fn wait_for_load(events: &mut mpsc::Receiver<PlaybackEvent>) -> PlaybackEvent {
        loop {
            match events.recv().await {
                Some(event @ (PlaybackEvent::Loaded { .. } | PlaybackEvent::Error(_))) => return event,
                Some(_) => {}
                None => panic!("driver stopped before loading"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_last_bar() {
        let (driver, commands, mut events) = PlaybackDriver::new(engine(), source(70));
        let host = async move {
            commands.send(PlaybackCommand::Load(params(50, 60))).await.unwrap();
            wait_for_load(&mut events).await;
            commands.send(PlaybackCommand::Play).await.unwrap();

            let mut ticks = Vec::new();
            let mut playing = false;
            loop {
                match events.recv().await.unwrap() {
                    PlaybackEvent::PhaseChanged(Phase::Playing) => playing = true,
                    PlaybackEvent::Tick { index, .. } => ticks.push(index),
                    PlaybackEvent::PhaseChanged(Phase::Ready) if playing => break,
                    _ => {}
                }
            }
            commands.send(PlaybackCommand::Shutdown).await.unwrap();
            ticks
        };

        let (engine, ticks) = tokio::join!(driver.run(), host);
        assert_eq!(ticks, (11..20).collect::<Vec<_>>());
        assert_eq!(engine.current_index(), 19);
        assert!(!engine.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_load_wins() {
        let (driver, commands, mut events) = PlaybackDriver::new(engine(), source(200));
        let host = async move {
            commands.send(PlaybackCommand::Load(params(50, 60))).await.unwrap();
            commands.send(PlaybackCommand::Load(params(100, 110))).await.unwrap();
            let loaded = wait_for_load(&mut events).await;
            commands.send(PlaybackCommand::Shutdown).await.unwrap();

            let mut more = 0;
            while let Some(event) = events.recv().await {
                if matches!(event, PlaybackEvent::Loaded { .. }) {
                    more += 1;
                }
            }
            (loaded, more)
        };

        let (engine, (loaded, more)) = tokio::join!(driver.run(), host);
        assert!(matches!(loaded, PlaybackEvent::Loaded { sim_time, .. } if sim_time == T0 + 110 * 60));
        assert_eq!(more, 0);
        assert_eq!(engine.current_candle().map(|c| c.time), Some(T0 + 110 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_and_errors_reported() {
        let (driver, commands, mut events) = PlaybackDriver::new(engine(), source(200));
        let host = async move {
            commands.send(PlaybackCommand::Load(params(50, 60))).await.unwrap();
            wait_for_load(&mut events).await;
            commands.send(PlaybackCommand::LoadMoreHistory).await.unwrap();
            let prepended = loop {
                if let PlaybackEvent::HistoryPrepended { inserted, current_index } = events.recv().await.unwrap() {
                    break (inserted, current_index);
                }
            };

            let missing = LoadParams::new("GBPUSD", Timeframe::Min1, T0, T0);
            commands.send(PlaybackCommand::Load(missing)).await.unwrap();
            let failed = wait_for_load(&mut events).await;
            commands.send(PlaybackCommand::Shutdown).await.unwrap();
            (prepended, failed)
        };

        let (engine, (prepended, failed)) = tokio::join!(driver.run(), host);
        assert_eq!(prepended, (8, 18));
        assert!(matches!(failed, PlaybackEvent::Error(_)));
        assert_eq!(engine.phase(), Phase::Error);
    }
}
