//! Pane identity, the chart adapter seam and the per-pane handle registry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::{EventBus, ViewEvent};

/// Indicator types that get their own sub-pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    Ema,
    Rsi,
    Macd,
}

impl IndicatorKind {
    pub fn key(&self) -> &'static str {
        match self {
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Macd => "MACD",
        }
    }
}

/// Identifies one chart surface. Geometry never crosses panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum PaneId {
    #[default]
    Main,
    Indicator(IndicatorKind),
}

impl PaneId {
    pub fn is_main(&self) -> bool {
        matches!(self, PaneId::Main)
    }

    pub fn key(&self) -> &'static str {
        match self {
            PaneId::Main => "MAIN",
            PaneId::Indicator(kind) => kind.key(),
        }
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Visible span in logical (bar index) units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalRange {
    pub from: f64,
    pub to: f64,
}

impl LogicalRange {
    pub const fn new(from: f64, to: f64) -> Self {
        Self { from, to }
    }

    pub fn width(&self) -> f64 {
        self.to - self.from
    }

    /// Same range within a small tolerance.
    pub fn approx_eq(&self, other: &LogicalRange) -> bool {
        const EPS: f64 = 1e-6;
        (self.from - other.from).abs() < EPS && (self.to - other.to).abs() < EPS
    }
}

/// Narrow interface to one pane of the external charting library.
///
/// Every conversion may fail (pane not laid out yet, value off-scale), in which
/// case callers skip the element instead of erroring.
pub trait ChartPane {
    fn coordinate_to_logical(&self, x: f64) -> Option<f64>;
    fn logical_to_coordinate(&self, logical: f64) -> Option<f64>;
    fn price_to_coordinate(&self, price: f64) -> Option<f64>;
    fn coordinate_to_price(&self, y: f64) -> Option<f64>;
    fn visible_logical_range(&self) -> Option<LogicalRange>;
    fn set_visible_logical_range(&mut self, range: LogicalRange);
    /// Pane size in pixels as `(width, height)`.
    fn size(&self) -> (f64, f64);
}

/// Bars from the left edge at which a history backfill is requested.
pub const HISTORY_TRIGGER_BARS: f64 = 10.0;

struct PaneHandles<C, S> {
    chart: C,
    series: S,
}

/// Registry of live chart/series handles keyed by pane.
///
/// Also keeps every pane's visible range in lockstep. Range changes applied to
/// the other panes echo back through the host's range callbacks. The last
/// broadcast range is the guard: an echo of it is not propagated again.
pub struct PaneRegistry<C, S> {
    panes: BTreeMap<PaneId, PaneHandles<C, S>>,
    last_synced: Option<LogicalRange>,
    history_requested: bool,
}

impl<C, S> Default for PaneRegistry<C, S> {
    fn default() -> Self {
        Self {
            panes: BTreeMap::new(),
            last_synced: None,
            history_requested: false,
        }
    }
}

impl<C, S> PaneRegistry<C, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handles for a pane, returning any handles it replaces.
    pub fn register(&mut self, pane: PaneId, chart: C, series: S) -> Option<(C, S)> {
        self.panes
            .insert(pane, PaneHandles { chart, series })
            .map(|old| (old.chart, old.series))
    }

    /// Remove a pane (e.g. its indicator was closed).
    pub fn unregister(&mut self, pane: PaneId) -> Option<(C, S)> {
        self.panes.remove(&pane).map(|old| (old.chart, old.series))
    }

    /// The `(chart, primary series)` pair of a pane.
    pub fn get(&self, pane: PaneId) -> Option<(&C, &S)> {
        self.panes.get(&pane).map(|h| (&h.chart, &h.series))
    }

    pub fn chart(&self, pane: PaneId) -> Option<&C> {
        self.panes.get(&pane).map(|h| &h.chart)
    }

    pub fn chart_mut(&mut self, pane: PaneId) -> Option<&mut C> {
        self.panes.get_mut(&pane).map(|h| &mut h.chart)
    }

    pub fn series(&self, pane: PaneId) -> Option<&S> {
        self.panes.get(&pane).map(|h| &h.series)
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        self.panes.contains_key(&pane)
    }

    /// Registered panes, main first.
    pub fn pane_ids(&self) -> impl Iterator<Item = PaneId> + '_ {
        self.panes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    /// Re-arm the history trigger after new data arrived.
    pub fn reset_history_trigger(&mut self) {
        self.history_requested = false;
    }
}

impl<C: ChartPane, S> PaneRegistry<C, S> {
    /// Propagate a visible-range change from `source` to every other pane.
    ///
    /// Returns the number of panes updated. Echoes of a range that was just
    /// broadcast are ignored.
    /// Scrolling near the oldest bar emits a single `LoadMoreHistory`.
    pub fn sync_visible_range(
        &mut self,
        source: PaneId,
        range: LogicalRange,
        bus: &mut EventBus,
    ) -> usize {
        if self.last_synced.is_some_and(|last| last.approx_eq(&range)) {
            return 0;
        }

        if range.from <= HISTORY_TRIGGER_BARS && !self.history_requested {
            self.history_requested = true;
            bus.emit(ViewEvent::LoadMoreHistory);
        }

        let mut updated = 0;
        for (pane, handles) in self.panes.iter_mut() {
            if *pane == source {
                continue;
            }
            handles.chart.set_visible_logical_range(range);
            updated += 1;
        }
        self.last_synced = Some(range);

        log::debug!("Synced range {:?} from {} to {} panes", range, source, updated);
        updated
    }

    /// Shift every pane's visible range by `bars`, e.g. after history was
    /// prepended, so the view stays on the same candles.
    pub fn shift_visible_ranges(&mut self, bars: f64) {
        for handles in self.panes.values_mut() {
            if let Some(range) = handles.chart.visible_logical_range() {
                handles
                    .chart
                    .set_visible_logical_range(LogicalRange::new(range.from + bars, range.to + bars));
            }
        }
        self.last_synced = None;
    }
}

/// Emit a request to close an indicator pane.
pub fn request_remove_indicator(kind: IndicatorKind, bus: &mut EventBus) {
    bus.emit(ViewEvent::RemoveIndicator(kind));
}
