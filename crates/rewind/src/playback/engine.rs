//! Playback state machine for bar-by-bar replay.
//!
//! The engine itself never awaits while holding state that a newer request
//! could invalidate. Every fetch is split in three steps:
//!
//! 1. a `*_request` / `begin_load` call that snapshots what to fetch together
//!    with the current [`CancelToken`]
//! 2. a free `fetch_*` function that only touches the [`CandleSource`]
//! 3. an `apply_*` call that drops the result if its token is stale
//!
//! The async helpers on [`PlaybackEngine`] chain the three for callers that
//! do not need to interleave other work.

use rewind_config::PlaybackConfig;
use rewind_core::{index_at_or_before, Candle, Timeframe};
use rewind_data::{CancelToken, CandleSource};

use crate::error::ReplayError;

use super::window::{merge_by_time, CandleWindow};

pub const MIN_SPEED_MS: u64 = 10;
pub const MAX_SPEED_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Playing,
    Error,
}

/// Snapshot of the playback clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationState {
    pub is_playing: bool,
    pub speed_ms: u64,
    pub current_index: usize,
    pub max_index: usize,
}

/// What to load: the replay session and where its clock stands.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadParams {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Bars strictly before this become warm-up.
    pub session_start: i64,
    pub sim_time: i64,
}

impl LoadParams {
    pub fn new(symbol: &str, timeframe: Timeframe, session_start: i64, sim_time: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            session_start,
            sim_time,
        }
    }
}

/// A load in flight.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub params: LoadParams,
    pub token: CancelToken,
    /// Skip the context fetch and start at the first available candle.
    from_first: bool,
}

/// Raw result of a load before it is split into warm-up and playable bars.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub candles: Vec<Candle>,
    pub session_start: i64,
    pub sim_time: i64,
}

#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub after: i64,
    pub count: usize,
    pub token: CancelToken,
}

#[derive(Debug, Clone)]
pub struct BackfillRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub before: i64,
    pub count: usize,
    pub token: CancelToken,
}

/// Fetch the candles for a load.
///
/// Gets `visible + warmup` bars up to the aligned sim time plus a forward
/// window from there. When nothing playable comes back (no candle at or after
/// the session start) it restarts from the first candle the source holds.
/// A full context that starts after the session start keeps its oldest
/// `warmup` bars as warm-up.
/// Failed fetches count as empty so the fallback still runs; the error only
/// surfaces if nothing was found at all.
pub async fn fetch_load<S: CandleSource + ?Sized>(
    source: &S,
    ticket: &LoadTicket,
    config: &PlaybackConfig,
) -> Result<LoadedData, ReplayError> {
    let params = &ticket.params;
    let token = &ticket.token;
    let mut failure = None;

    if !ticket.from_first {
        let aligned = params.timeframe.align(params.sim_time);
        let backward = settle(
            source
                .fetch_context(
                    &params.symbol,
                    params.timeframe,
                    aligned,
                    config.visible_bars + config.warmup_bars,
                    token,
                )
                .await,
            token,
            &mut failure,
        )?;
        let forward = settle(
            source
                .fetch_future(&params.symbol, params.timeframe, aligned, config.forward_batch, Some(token))
                .await,
            token,
            &mut failure,
        )?;

        let context = config.visible_bars + config.warmup_bars;
        let session_start = match backward.get(config.warmup_bars) {
            Some(candle) if backward.len() >= context => params.session_start.max(candle.time),
            _ => params.session_start,
        };
        let candles = merge_by_time(backward, forward);
        if candles.last().is_some_and(|c| c.time >= session_start) {
            return Ok(LoadedData {
                candles,
                session_start,
                sim_time: params.sim_time,
            });
        }
        log::info!(
            "No {} {} data around {}, falling back to the first candle",
            params.symbol,
            params.timeframe,
            params.sim_time
        );
    }

    let first = settle(
        source.fetch_first(&params.symbol, params.timeframe, Some(token)).await,
        token,
        &mut failure,
    )?;
    let Some(first) = first else {
        return Err(unavailable(params, failure));
    };
    let candles = settle(
        source
            .fetch_future(
                &params.symbol,
                params.timeframe,
                first.time,
                config.visible_bars + config.forward_batch,
                Some(token),
            )
            .await,
        token,
        &mut failure,
    )?;
    if candles.is_empty() {
        return Err(unavailable(params, failure));
    }
    Ok(LoadedData {
        candles,
        session_start: first.time,
        sim_time: first.time,
    })
}

pub async fn fetch_forward<S: CandleSource + ?Sized>(
    source: &S,
    request: &ForwardRequest,
) -> anyhow::Result<Vec<Candle>> {
    source
        .fetch_future(
            &request.symbol,
            request.timeframe,
            request.after,
            request.count,
            Some(&request.token),
        )
        .await
}

pub async fn fetch_backfill<S: CandleSource + ?Sized>(
    source: &S,
    request: &BackfillRequest,
) -> anyhow::Result<Vec<Candle>> {
    source
        .fetch_history(&request.symbol, request.timeframe, request.before, request.count)
        .await
}

/// Cancellation wins over any result. Other failures are logged and read as
/// "no data", remembering the first one.
fn settle<T: Default>(
    result: anyhow::Result<T>,
    token: &CancelToken,
    failure: &mut Option<anyhow::Error>,
) -> Result<T, ReplayError> {
    if token.is_cancelled() {
        return Err(ReplayError::FetchCancelled);
    }
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            log::warn!("Candle fetch failed: {:#}", err);
            failure.get_or_insert(err);
            Ok(T::default())
        }
    }
}

fn unavailable(params: &LoadParams, failure: Option<anyhow::Error>) -> ReplayError {
    match failure {
        Some(err) => ReplayError::Fetch(err),
        None => ReplayError::DataUnavailable {
            symbol: params.symbol.clone(),
            timeframe: params.timeframe,
        },
    }
}

/// The candle under the clock, synthesized from the live price, and the
/// stored candle it replaced.
#[derive(Debug, Clone, Copy)]
struct Forming {
    index: usize,
    original: Candle,
}

/// Replays a candle window one bar at a time.
#[derive(Debug)]
pub struct PlaybackEngine {
    config: PlaybackConfig,
    params: Option<LoadParams>,
    phase: Phase,
    error: Option<ReplayError>,
    speed_ms: u64,
    window: CandleWindow,
    current_index: usize,
    sim_time: i64,
    live_price: Option<f64>,
    forming: Option<Forming>,
    cancel: CancelToken,
    forward_pending: bool,
    forward_exhausted: bool,
    backfill_pending: bool,
    history_exhausted: bool,
}

impl PlaybackEngine {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            speed_ms: config.speed_ms.clamp(MIN_SPEED_MS, MAX_SPEED_MS),
            config,
            params: None,
            phase: Phase::Loading,
            error: None,
            window: CandleWindow::default(),
            current_index: 0,
            sim_time: 0,
            live_price: None,
            forming: None,
            cancel: CancelToken::new(),
            forward_pending: false,
            forward_exhausted: false,
            backfill_pending: false,
            history_exhausted: false,
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Why the engine is in [`Phase::Error`].
    pub fn error(&self) -> Option<&ReplayError> {
        self.error.as_ref()
    }

    pub fn params(&self) -> Option<&LoadParams> {
        self.params.as_ref()
    }

    pub fn timeframe(&self) -> Option<Timeframe> {
        self.params.as_ref().map(|p| p.timeframe)
    }

    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    /// Playable candles. Index 0 is the session start.
    pub fn candles(&self) -> &[Candle] {
        self.window.visible()
    }

    pub fn current_candle(&self) -> Option<&Candle> {
        self.window.visible().get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn max_index(&self) -> usize {
        self.window.visible().len()
    }

    pub fn sim_time(&self) -> i64 {
        self.sim_time
    }

    pub fn speed_ms(&self) -> u64 {
        self.speed_ms
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    pub fn state(&self) -> SimulationState {
        SimulationState {
            is_playing: self.is_playing(),
            speed_ms: self.speed_ms,
            current_index: self.current_index,
            max_index: self.max_index(),
        }
    }

    fn bar_seconds(&self) -> i64 {
        self.timeframe().map_or(60, |tf| tf.seconds())
    }

    /// Start a new load, cancelling whatever load was in flight.
    pub fn begin_load(&mut self, params: LoadParams) -> LoadTicket {
        self.start_ticket(params, false)
    }

    /// Reload the current session with the clock moved to `time`. The session
    /// start only moves back, so the bars ahead of it stay playable.
    pub fn seek(&mut self, time: i64) -> Option<LoadTicket> {
        let mut params = self.params.clone()?;
        params.session_start = params.session_start.min(time);
        params.sim_time = time;
        Some(self.start_ticket(params, false))
    }

    /// Reload the current session from the first available candle.
    pub fn seek_to_start(&mut self) -> Option<LoadTicket> {
        let params = self.params.clone()?;
        Some(self.start_ticket(params, true))
    }

    /// Cancels the load in flight and records `params` as the session, so a
    /// seek after a failed load retries what was asked for.
    fn start_ticket(&mut self, params: LoadParams, from_first: bool) -> LoadTicket {
        self.cancel.cancel();
        self.cancel = CancelToken::new();
        self.phase = Phase::Loading;
        self.forward_pending = false;
        self.backfill_pending = false;

        let same_series = self
            .params
            .as_ref()
            .is_some_and(|p| p.symbol == params.symbol && p.timeframe == params.timeframe);
        if !same_series {
            self.restore_forming();
            self.live_price = None;
        }
        self.params = Some(params.clone());

        log::debug!("Loading {} {} at {}", params.symbol, params.timeframe, params.sim_time);
        LoadTicket {
            params,
            token: self.cancel.clone(),
            from_first,
        }
    }

    fn is_current(&self, token: &CancelToken) -> bool {
        token.same_as(&self.cancel) && !token.is_cancelled()
    }

    /// Install the result of a load. Returns `false` if it was stale or
    /// cancelled and therefore dropped.
    pub fn apply_load(&mut self, ticket: LoadTicket, result: Result<LoadedData, ReplayError>) -> bool {
        if !self.is_current(&ticket.token) {
            log::debug!(
                "Dropping stale load of {} {}",
                ticket.params.symbol,
                ticket.params.timeframe
            );
            return false;
        }

        let data = match result {
            Ok(data) => data,
            Err(err) if err.is_silent() => return false,
            Err(err) => {
                self.enter_error(err);
                return true;
            }
        };

        let params = ticket.params;
        let bar = params.timeframe.seconds();
        let mut window = CandleWindow::split(data.candles, data.session_start, self.config.warmup_bars);
        if window.is_empty() {
            self.enter_error(ReplayError::DataUnavailable {
                symbol: params.symbol,
                timeframe: params.timeframe,
            });
            return true;
        }
        window.pad_warmup(self.config.min_warmup_bars, bar);

        self.current_index = index_at_or_before(window.visible(), data.sim_time).unwrap_or(0);
        self.sim_time = window
            .visible()
            .first()
            .map_or(data.sim_time, |first| data.sim_time.max(first.time));
        self.window = window;
        self.forming = None;
        self.forward_exhausted = false;
        self.history_exhausted = false;
        self.error = None;
        self.phase = Phase::Ready;
        log::info!(
            "Loaded {} {}: {} bars ({} warm-up, {} synthetic), at index {}",
            params.symbol,
            params.timeframe,
            self.window.visible().len(),
            self.window.warmup().len(),
            self.window.synthetic_count(),
            self.current_index
        );
        self.params = Some(LoadParams {
            session_start: data.session_start,
            sim_time: data.sim_time,
            ..params
        });
        self.synthesize_forming();
        true
    }

    fn enter_error(&mut self, err: ReplayError) {
        log::warn!("Playback load failed: {}", err);
        self.window = CandleWindow::default();
        self.forming = None;
        self.current_index = 0;
        self.error = Some(err);
        self.phase = Phase::Error;
    }

    pub fn play(&mut self) -> bool {
        if self.phase != Phase::Ready || self.current_index + 1 >= self.max_index() {
            return false;
        }
        self.phase = Phase::Playing;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        self.phase = Phase::Ready;
        true
    }

    /// Play if paused, pause if playing. Returns whether playback now runs.
    pub fn toggle(&mut self) -> bool {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
        self.is_playing()
    }

    /// Set milliseconds per tick, clamped to a sane range.
    pub fn set_speed(&mut self, ms: u64) -> u64 {
        self.speed_ms = ms.clamp(MIN_SPEED_MS, MAX_SPEED_MS);
        self.speed_ms
    }

    /// Advance one bar on a playback tick.
    pub fn tick(&mut self) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        self.advance()
    }

    /// Advance one bar by hand, playing or paused.
    pub fn step(&mut self) -> bool {
        match self.phase {
            Phase::Ready | Phase::Playing => self.advance(),
            Phase::Loading | Phase::Error => false,
        }
    }

    fn advance(&mut self) -> bool {
        let max = self.max_index();
        if self.current_index + 1 >= max {
            self.stop_at_end();
            return false;
        }

        self.restore_forming();
        self.current_index += 1;
        self.sim_time = self.window.visible()[self.current_index].end_time(self.bar_seconds());
        if self.current_index + 1 >= max {
            self.stop_at_end();
        }
        true
    }

    fn stop_at_end(&mut self) {
        if self.phase == Phase::Playing {
            log::info!("Playback reached the last loaded bar");
            self.phase = Phase::Ready;
        }
    }

    /// Feed the latest live price. If the clock sits inside the current bar,
    /// that bar is shown as forming: its open, the price as close, and the
    /// range between them.
    pub fn set_live_price(&mut self, price: f64) {
        if !price.is_finite() {
            return;
        }
        self.live_price = Some(price);
        self.synthesize_forming();
    }

    fn synthesize_forming(&mut self) {
        let Some(price) = self.live_price else {
            return;
        };
        if !matches!(self.phase, Phase::Ready | Phase::Playing) {
            return;
        }
        let index = self.current_index;
        let original = match self.forming {
            Some(forming) if forming.index == index => forming.original,
            _ => {
                self.restore_forming();
                match self.window.visible().get(index) {
                    Some(candle) => *candle,
                    None => return,
                }
            }
        };
        if self.sim_time <= original.time || self.sim_time >= original.end_time(self.bar_seconds()) {
            return;
        }

        if let Some(slot) = self.window.visible_mut().get_mut(index) {
            *slot = Candle::new(
                original.time,
                original.open,
                original.open.max(price),
                original.open.min(price),
                price,
            );
            self.forming = Some(Forming { index, original });
        }
    }

    fn restore_forming(&mut self) {
        if let Some(forming) = self.forming.take() {
            if let Some(slot) = self.window.visible_mut().get_mut(forming.index) {
                *slot = forming.original;
            }
        }
    }

    /// A forward fetch, if fewer than `buffer_threshold` bars remain ahead.
    pub fn forward_request(&mut self) -> Option<ForwardRequest> {
        if !matches!(self.phase, Phase::Ready | Phase::Playing)
            || self.forward_pending
            || self.forward_exhausted
        {
            return None;
        }
        let params = self.params.as_ref()?;
        let last = self.window.visible().last()?;
        let remaining = self.max_index() - 1 - self.current_index;
        if remaining >= self.config.buffer_threshold {
            return None;
        }

        let request = ForwardRequest {
            symbol: params.symbol.clone(),
            timeframe: params.timeframe,
            after: last.time + 1,
            count: self.config.forward_batch,
            token: self.cancel.clone(),
        };
        self.forward_pending = true;
        Some(request)
    }

    /// Append a forward batch. Returns the number of new bars.
    pub fn apply_forward(&mut self, request: ForwardRequest, result: anyhow::Result<Vec<Candle>>) -> usize {
        if !self.is_current(&request.token) {
            return 0;
        }
        self.forward_pending = false;
        match result {
            Ok(candles) => {
                let added = self.window.append(candles);
                if added == 0 {
                    log::debug!("No candles after {}, forward buffer exhausted", request.after);
                    self.forward_exhausted = true;
                }
                added
            }
            Err(err) => {
                log::warn!("Forward fetch failed: {:#}", err);
                self.forward_exhausted = true;
                0
            }
        }
    }

    /// A history fetch ending before the oldest real candle.
    pub fn backfill_request(&mut self) -> Option<BackfillRequest> {
        if !matches!(self.phase, Phase::Ready | Phase::Playing)
            || self.backfill_pending
            || self.history_exhausted
        {
            return None;
        }
        let params = self.params.as_ref()?;
        let oldest = self.window.oldest_real()?;

        let request = BackfillRequest {
            symbol: params.symbol.clone(),
            timeframe: params.timeframe,
            before: oldest.time,
            count: self.config.backfill_batch,
            token: self.cancel.clone(),
        };
        self.backfill_pending = true;
        Some(request)
    }

    /// Prepend a history batch. Returns how many bars were inserted ahead of
    /// the playable range; the current index moves by the same amount.
    pub fn apply_backfill(&mut self, request: BackfillRequest, result: anyhow::Result<Vec<Candle>>) -> usize {
        if !self.is_current(&request.token) {
            return 0;
        }
        self.backfill_pending = false;
        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                log::warn!("History fetch failed: {:#}", err);
                return 0;
            }
        };
        if batch.is_empty() {
            log::debug!("No history before {}", request.before);
            self.history_exhausted = true;
            return 0;
        }

        let inserted = self.window.prepend_history(
            batch,
            self.config.warmup_bars,
            self.config.min_warmup_bars,
            request.timeframe.seconds(),
        );
        self.current_index += inserted;
        if let Some(forming) = self.forming.as_mut() {
            forming.index += inserted;
        }
        inserted
    }

    /// Load `params` and wait for the result.
    pub async fn load<S: CandleSource + ?Sized>(&mut self, source: &S, params: LoadParams) -> bool {
        let ticket = self.begin_load(params);
        self.finish_load(source, ticket).await
    }

    /// Fetch and apply a ticket from [`begin_load`](Self::begin_load),
    /// [`seek`](Self::seek) or [`seek_to_start`](Self::seek_to_start).
    pub async fn finish_load<S: CandleSource + ?Sized>(&mut self, source: &S, ticket: LoadTicket) -> bool {
        let result = fetch_load(source, &ticket, &self.config).await;
        self.apply_load(ticket, result)
    }

    /// Top up the forward buffer if it runs low.
    pub async fn buffer_forward<S: CandleSource + ?Sized>(&mut self, source: &S) -> usize {
        let Some(request) = self.forward_request() else {
            return 0;
        };
        let result = fetch_forward(source, &request).await;
        self.apply_forward(request, result)
    }

    /// Fetch and prepend one batch of older history.
    pub async fn backfill<S: CandleSource + ?Sized>(&mut self, source: &S) -> usize {
        let Some(request) = self.backfill_request() else {
            return 0;
        };
        let result = fetch_backfill(source, &request).await;
        self.apply_backfill(request, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_data::MemorySource;

    const T0: i64 = 1_704_067_200;

    fn minute(i: i64) -> i64 {
        T0 + i * 60
    }

    fn series(count: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle::new(minute(i), base, base + 0.5, base - 0.5, base + 0.2)
            })
            .collect()
    }

    fn source(count: i64) -> MemorySource {
        MemorySource::new().with_series("EURUSD", Timeframe::Min1, series(count))
    }

    fn config() -> PlaybackConfig {
        PlaybackConfig {
            speed_ms: 100,
            visible_bars: 20,
            warmup_bars: 5,
            min_warmup_bars: 5,
            buffer_threshold: 5,
            forward_batch: 10,
            backfill_batch: 8,
        }
    }

    fn params() -> LoadParams {
        LoadParams::new("EURUSD", Timeframe::Min1, minute(50), minute(60))
    }

    #[tokio::test]
    async fn test_load_splits_window() {
        let src = source(200);
        let mut engine = PlaybackEngine::new(config());
        assert!(engine.load(&src, params()).await);

        assert_eq!(engine.phase(), Phase::Ready);
        let warmup: Vec<i64> = engine.window().warmup().iter().map(|c| c.time).collect();
        assert_eq!(warmup, (45..50).map(minute).collect::<Vec<_>>());
        assert_eq!(engine.candles().first().map(|c| c.time), Some(minute(50)));
        assert_eq!(engine.max_index(), 20);
        assert_eq!(engine.current_index(), 10);
        assert_eq!(engine.current_candle().map(|c| c.time), Some(minute(60)));
        assert_eq!(engine.window().synthetic_count(), 0);
    }

    #[tokio::test]
    async fn test_playing_stops_before_max_index() {
        let src = source(70);
        let mut engine = PlaybackEngine::new(config());
        engine.load(&src, params()).await;

        assert!(engine.play());
        let mut ticks = 0;
        while engine.tick() {
            ticks += 1;
            assert!(engine.current_index() < engine.max_index());
        }
        assert_eq!(ticks, 9);
        assert_eq!(engine.phase(), Phase::Ready);
        assert_eq!(engine.current_index(), engine.max_index() - 1);
        assert_eq!(engine.sim_time(), minute(69) + 60);
        assert!(!engine.play());
        assert!(!engine.step());
    }

    #[tokio::test]
    async fn test_step_moves_clock_to_bar_end() {
        let src = source(200);
        let mut engine = PlaybackEngine::new(config());
        engine.load(&src, params()).await;

        assert!(engine.step());
        assert_eq!(engine.current_index(), 11);
        assert_eq!(engine.sim_time(), minute(61) + 60);
        assert_eq!(engine.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_forward_buffer_appends_and_exhausts() {
        let src = source(75);
        let mut engine = PlaybackEngine::new(config());
        engine.load(&src, params()).await;

        // 9 bars ahead: above the threshold.
        assert!(engine.forward_request().is_none());
        for _ in 0..5 {
            engine.step();
        }
        assert_eq!(engine.buffer_forward(&src).await, 5);
        assert_eq!(engine.max_index(), 25);

        for _ in 0..5 {
            engine.step();
        }
        assert_eq!(engine.buffer_forward(&src).await, 0);
        // Source ran dry: no more requests even though the buffer is low.
        assert!(engine.forward_request().is_none());
        assert_eq!(src.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_stale_load_is_dropped() {
        let src = source(200);
        let mut engine = PlaybackEngine::new(config());
        let first = engine.begin_load(params());
        let second = engine.begin_load(LoadParams::new("EURUSD", Timeframe::Min1, minute(100), minute(110)));
        assert!(first.token.is_cancelled());

        let stale = fetch_load(&src, &first, engine.config()).await;
        assert!(matches!(stale, Err(ReplayError::FetchCancelled)));
        assert!(!engine.apply_load(first, stale));
        assert_eq!(engine.phase(), Phase::Loading);

        assert!(engine.finish_load(&src, second).await);
        assert_eq!(engine.current_candle().map(|c| c.time), Some(minute(110)));
    }

    #[tokio::test]
    async fn test_unknown_symbol_enters_error() {
        let src = source(10);
        let mut engine = PlaybackEngine::new(config());
        engine
            .load(&src, LoadParams::new("GBPUSD", Timeframe::Min1, minute(0), minute(0)))
            .await;
        assert_eq!(engine.phase(), Phase::Error);
        assert!(matches!(engine.error(), Some(ReplayError::DataUnavailable { .. })));
        assert!(!engine.play());
    }

    #[tokio::test]
    async fn test_seek_to_start_pads_warmup() {
        let src = source(200);
        let mut engine = PlaybackEngine::new(config());
        engine.load(&src, params()).await;
        let ticket = engine.seek_to_start().unwrap();
        assert_eq!(engine.phase(), Phase::Loading);
        engine.finish_load(&src, ticket).await;

        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.current_candle().map(|c| c.time), Some(minute(0)));
        assert_eq!(engine.window().synthetic_count(), 5);
        assert_eq!(engine.window().warmup()[0].time, minute(-5));
        assert_eq!(engine.window().warmup()[0].open, 100.0);
    }

    #[tokio::test]
    async fn test_backfill_preserves_current_candle() {
        let src = source(200);
        let mut engine = PlaybackEngine::new(config());
        engine.load(&src, params()).await;
        let current = engine.current_candle().copied();

        assert_eq!(engine.backfill(&src).await, 8);
        assert_eq!(engine.current_index(), 18);
        assert_eq!(engine.current_candle().copied(), current);
        assert_eq!(engine.window().warmup()[0].time, minute(37));

        // The same batch again inserts nothing.
        let request = engine.backfill_request().unwrap();
        let again = series(200)[37..45].to_vec();
        assert_eq!(engine.apply_backfill(request, Ok(again)), 0);
        assert_eq!(engine.current_candle().copied(), current);
        let all = engine.window().all();
        assert!(all.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[tokio::test]
    async fn test_forming_candle_restored_on_advance() {
        let src = source(200);
        let mut engine = PlaybackEngine::new(config());
        let mid_bar = LoadParams::new("EURUSD", Timeframe::Min1, minute(50), minute(60) + 30);
        engine.load(&src, mid_bar).await;
        let original = engine.current_candle().copied().unwrap();

        engine.set_live_price(161.0);
        let forming = engine.current_candle().copied().unwrap();
        assert_eq!(forming.open, original.open);
        assert_eq!(forming.close, 161.0);
        assert_eq!(forming.high, 161.0);
        assert_eq!(forming.low, original.open);

        engine.step();
        assert_eq!(engine.candles()[10], original);
    }

    #[tokio::test]
    async fn test_seek_keeps_history_before_clock() {
        let src = source(200);
        let mut engine = PlaybackEngine::new(config());
        engine.load(&src, params()).await;

        let ticket = engine.seek(minute(100)).unwrap();
        assert_eq!(ticket.params.session_start, minute(50));
        assert!(engine.finish_load(&src, ticket).await);

        assert_eq!(engine.current_candle().map(|c| c.time), Some(minute(100)));
        assert_eq!(engine.current_index(), 19);
        assert_eq!(engine.candles().first().map(|c| c.time), Some(minute(81)));
        let warmup: Vec<i64> = engine.window().warmup().iter().map(|c| c.time).collect();
        assert_eq!(warmup, (76..81).map(minute).collect::<Vec<_>>());
        assert_eq!(engine.window().synthetic_count(), 0);

        // Seeking back before the session moves the session start with it.
        let ticket = engine.seek(minute(30)).unwrap();
        assert_eq!(ticket.params.session_start, minute(30));
    }

    #[tokio::test]
    async fn test_live_price_dropped_on_symbol_change() {
        let yen: Vec<Candle> = (0..200)
            .map(|i| Candle::new(minute(i), 150.0, 150.5, 149.5, 150.2))
            .collect();
        let src = source(200).with_series("USDJPY", Timeframe::Min1, yen);
        let mut engine = PlaybackEngine::new(config());
        let mid_bar = LoadParams::new("EURUSD", Timeframe::Min1, minute(50), minute(60) + 30);
        engine.load(&src, mid_bar).await;
        engine.set_live_price(1.1234);
        assert_eq!(engine.current_candle().map(|c| c.close), Some(1.1234));

        let yen_mid_bar = LoadParams::new("USDJPY", Timeframe::Min1, minute(50), minute(60) + 30);
        assert!(engine.load(&src, yen_mid_bar).await);
        let current = engine.current_candle().copied().unwrap();
        assert_eq!(current.close, 150.2);
        assert_eq!(current.low, 149.5);

        // Same series: the live price carries over to the reloaded bar.
        engine.set_live_price(150.9);
        let ticket = engine.seek(minute(60) + 30).unwrap();
        engine.finish_load(&src, ticket).await;
        assert_eq!(engine.current_candle().map(|c| c.close), Some(150.9));
    }

    #[tokio::test]
    async fn test_seek_after_failed_load_retries_requested_symbol() {
        let src = source(200);
        let mut engine = PlaybackEngine::new(config());
        engine.load(&src, params()).await;
        engine
            .load(&src, LoadParams::new("GBPUSD", Timeframe::Min1, minute(50), minute(60)))
            .await;
        assert_eq!(engine.phase(), Phase::Error);
        assert!(engine.candles().is_empty());
        assert!(engine.current_candle().is_none());

        let ticket = engine.seek(minute(70)).unwrap();
        assert_eq!(ticket.params.symbol, "GBPUSD");
        assert!(engine.finish_load(&src, ticket).await);
        assert_eq!(engine.phase(), Phase::Error);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut engine = PlaybackEngine::new(config());
        assert_eq!(engine.set_speed(1), MIN_SPEED_MS);
        assert_eq!(engine.set_speed(60_000), MAX_SPEED_MS);
        assert_eq!(engine.set_speed(250), 250);
        assert!(!engine.toggle());
    }
}
