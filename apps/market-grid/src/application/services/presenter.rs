//! Presentation Loop
//!
//! The single-threaded presentation context. Data updates and scroll
//! signals arrive as discrete events between refresh ticks; each tick
//! samples whatever the store or ranked view currently holds, narrows it to
//! the viewport window and hands one [`Frame`] to the sink.
//!
//! ```text
//! feed ──apply──> store / ranked ──┐
//!                  data gate ──────┤
//! scroll ─────────> scroll gate ───┼──tick──> window ──> Frame ──> sink
//! clock ───────────────────────────┘
//! ```
//!
//! Neither input frequency drives drawing directly: both only mark a gate,
//! and a gate releases at most once per tick.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::status::StreamStatus;
use crate::application::ports::{ChannelEvent, Frame, FrameRow, FrameSink};
use crate::application::scheduler::{FrameClock, FrameGate, FrameRateMeter};
use crate::domain::ConnectionState;
use crate::domain::ranking::RankedView;
use crate::domain::record::Record;
use crate::domain::store::EntityStore;
use crate::domain::viewport::{DEFAULT_OVERSCAN, ViewportParams, Window, compute_window};
use crate::infrastructure::metrics::{self, Context, Signal};

// =============================================================================
// Configuration
// =============================================================================

/// Container geometry, fixed for the lifetime of a presenter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    /// Row height.
    pub item_height: f64,
    /// Visible container height.
    pub container_height: f64,
    /// Extra rows above and below the visible area.
    pub overscan: usize,
}

impl Default for ViewportGeometry {
    fn default() -> Self {
        Self {
            item_height: 40.0,
            container_height: 600.0,
            overscan: DEFAULT_OVERSCAN,
        }
    }
}

/// Which ordering the grid displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayOrder {
    /// Position-stable storage order.
    Storage,
    /// Top movers first.
    #[default]
    Ranked,
}

impl DisplayOrder {
    /// Parse an order name; anything but `storage` means ranked.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "storage" => Self::Storage,
            _ => Self::Ranked,
        }
    }

    /// Get the order name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Ranked => "ranked",
        }
    }
}

// =============================================================================
// Data Updates
// =============================================================================

/// Input to the data path, from either the inline channel or the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum DataUpdate {
    /// Connection transition.
    Connection(ConnectionState),
    /// Replace the local store.
    Snapshot(Vec<Record>),
    /// Merge into the local store.
    Batch(Vec<Record>),
    /// Replace the displayed ranking with an owned copy produced elsewhere.
    Ranked(RankedView),
    /// An inbound message failed to decode.
    DecodeError(String),
}

impl From<ChannelEvent> for DataUpdate {
    fn from(event: ChannelEvent) -> Self {
        match event {
            ChannelEvent::Connected => Self::Connection(ConnectionState::Connected),
            ChannelEvent::Disconnected => Self::Connection(ConnectionState::Disconnected),
            ChannelEvent::Snapshot(records) => Self::Snapshot(records),
            ChannelEvent::Update(batch) => Self::Batch(batch),
            ChannelEvent::DecodeError(reason) => Self::DecodeError(reason),
        }
    }
}

// =============================================================================
// Presenter
// =============================================================================

/// Owns the presentation-side store and drives one frame per tick.
pub struct Presenter<S> {
    geometry: ViewportGeometry,
    order: DisplayOrder,
    scroll_offset: f64,
    window: Window,
    scroll_gate: FrameGate<f64>,
    data_gate: FrameGate<u64>,
    generation: u64,
    store: EntityStore,
    ranked: Option<RankedView>,
    needs_rank: bool,
    connection: ConnectionState,
    status: Arc<StreamStatus>,
    meter: FrameRateMeter,
    sink: S,
    sequence: u64,
    recomputes: u64,
}

impl<S: FrameSink> Presenter<S> {
    /// Create a presenter drawing into `sink`.
    #[must_use]
    pub fn new(
        geometry: ViewportGeometry,
        order: DisplayOrder,
        sink: S,
        status: Arc<StreamStatus>,
    ) -> Self {
        Self {
            geometry,
            order,
            scroll_offset: 0.0,
            window: Window::empty(),
            scroll_gate: FrameGate::new(),
            data_gate: FrameGate::new(),
            generation: 0,
            store: EntityStore::new(),
            ranked: None,
            needs_rank: false,
            connection: ConnectionState::Disconnected,
            status,
            meter: FrameRateMeter::new(),
            sink,
            sequence: 0,
            recomputes: 0,
        }
    }

    /// Start from a given scroll offset.
    #[must_use]
    pub fn with_scroll_offset(mut self, offset: f64) -> Self {
        self.scroll_offset = clamp_offset(offset);
        self
    }

    /// Record a scroll position. Takes effect on the next tick.
    pub fn on_scroll(&mut self, offset: f64) {
        if !self.scroll_gate.signal(clamp_offset(offset)) {
            metrics::record_signals_coalesced(Signal::Scroll, 1);
        }
    }

    /// Apply one data update.
    ///
    /// Merges run to completion here, between ticks, so a frame never
    /// observes a half-applied batch.
    pub fn apply(&mut self, update: DataUpdate) {
        match update {
            DataUpdate::Connection(state) => self.set_connection(state),
            DataUpdate::Snapshot(records) => {
                let started = std::time::Instant::now();
                let count = self.store.apply_snapshot(records);
                metrics::record_merge(Context::Inline, count, 0, started.elapsed());
                metrics::set_store_records(Context::Inline, count);
                tracing::info!(records = count, "Snapshot applied");

                self.status.increment_messages();
                self.needs_rank = true;
                self.mark_dirty();
            }
            DataUpdate::Batch(batch) => {
                let started = std::time::Instant::now();
                let stats = self.store.apply_batch(batch);
                metrics::record_merge(Context::Inline, stats.applied, stats.ignored, started.elapsed());
                if stats.ignored > 0 {
                    tracing::debug!(ignored = stats.ignored, "Batch referenced unknown identities");
                }

                self.status.increment_messages();
                self.needs_rank = true;
                self.mark_dirty();
            }
            DataUpdate::Ranked(view) => {
                self.status.increment_messages();
                self.ranked = Some(view);
                self.needs_rank = false;
                self.mark_dirty();
            }
            DataUpdate::DecodeError(reason) => {
                self.status.increment_decode_errors();
                tracing::warn!(reason = %reason, "Dropped undecodable stream message");
            }
        }
    }

    /// Run one refresh tick: release the gates, recompute what they ask
    /// for and draw.
    pub fn on_tick(&mut self, now: Instant) {
        let scrolled = self.scroll_gate.on_tick();
        let dirty = self.data_gate.on_tick().is_some();

        if let Some(offset) = scrolled {
            self.scroll_offset = offset;
        }

        if dirty && self.needs_rank && self.order == DisplayOrder::Ranked {
            let started = std::time::Instant::now();
            self.ranked = Some(self.store.rank());
            self.needs_rank = false;
            metrics::record_rank(Context::Inline, started.elapsed());
        }

        if scrolled.is_some() || dirty {
            self.recompute_window();
        }

        self.draw(now);
    }

    /// Revoke anything scheduled for the next tick.
    pub fn teardown(&mut self) {
        let scroll = self.scroll_gate.cancel();
        let data = self.data_gate.cancel();
        tracing::debug!(
            scroll_pending = scroll,
            data_pending = data,
            frames = self.sequence,
            "Presenter torn down"
        );
    }

    /// Drive the presenter until cancelled.
    ///
    /// A closed feed is treated as a disconnect; a closed scroll channel
    /// just stops scroll input. Pending recomputations are revoked before
    /// returning.
    pub async fn run<E>(
        mut self,
        mut feed: mpsc::Receiver<E>,
        mut scroll: mpsc::Receiver<f64>,
        mut clock: FrameClock,
        cancel: CancellationToken,
    ) -> Self
    where
        E: Into<DataUpdate>,
    {
        let mut feed_open = true;
        let mut scroll_open = true;

        tracing::info!(period_ms = clock.period().as_millis(), "Presenter started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                update = feed.recv(), if feed_open => match update {
                    Some(update) => self.apply(update.into()),
                    None => {
                        tracing::info!("Data feed closed");
                        feed_open = false;
                        self.apply(DataUpdate::Connection(ConnectionState::Disconnected));
                    }
                },
                offset = scroll.recv(), if scroll_open => match offset {
                    Some(offset) => self.on_scroll(offset),
                    None => scroll_open = false,
                },
                now = clock.tick() => self.on_tick(now),
            }
        }

        self.teardown();
        self
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if state == self.connection {
            return;
        }
        tracing::info!(state = state.as_str(), "Stream connection changed");

        self.connection = state;
        self.status.set_state(state);
        metrics::set_connected(state.is_connected());

        if !state.is_connected() {
            self.store.clear();
            self.ranked = None;
            self.needs_rank = false;
            self.mark_dirty();
        }
    }

    fn mark_dirty(&mut self) {
        self.generation += 1;
        if !self.data_gate.signal(self.generation) {
            metrics::record_signals_coalesced(Signal::Data, 1);
        }
    }

    fn recompute_window(&mut self) {
        let count = self.displayed().len();
        let params = ViewportParams {
            count,
            item_height: self.geometry.item_height,
            container_height: self.geometry.container_height,
            scroll_offset: self.scroll_offset,
            overscan: self.geometry.overscan,
        };
        self.window = compute_window(&params);
        self.recomputes += 1;
        self.status.set_record_count(count);
    }

    fn draw(&mut self, now: Instant) {
        self.sequence += 1;
        let records = self.displayed();
        let rows = self
            .window
            .items(self.geometry.item_height)
            .filter_map(|item| {
                records.get(item.index).map(|record| FrameRow {
                    index: item.index,
                    offset_top: item.offset_top,
                    trend: record.trend(),
                    heat: record.heat_intensity(),
                    record: record.clone(),
                })
            })
            .collect();

        let frame = Frame {
            sequence: self.sequence,
            window: self.window,
            rows,
            total_count: records.len(),
            fps: self.meter.fps(),
        };
        self.sink.draw(&frame);

        self.status.increment_frames();
        metrics::record_frame_drawn();
        if let Some(fps) = self.meter.record_frame(now) {
            self.status.set_fps(fps);
            tracing::debug!(fps, "Frame rate");
        }
    }

    fn displayed(&self) -> &[Record] {
        match (self.order, &self.ranked) {
            (DisplayOrder::Ranked, Some(view)) => view.records(),
            _ => self.store.records(),
        }
    }

    /// Current window.
    #[must_use]
    pub const fn window(&self) -> &Window {
        &self.window
    }

    /// Scroll offset the current window was computed from.
    #[must_use]
    pub const fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    /// Window recomputations so far.
    #[must_use]
    pub const fn recomputes(&self) -> u64 {
        self.recomputes
    }

    /// Frames drawn so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.sequence
    }

    /// Whether any recomputation is scheduled for the next tick.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.scroll_gate.is_pending() || self.data_gate.is_pending()
    }

    /// Current connection state.
    #[must_use]
    pub const fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Presentation-side store (inline ingest).
    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }
}

fn clamp_offset(offset: f64) -> f64 {
    if offset.is_finite() && offset > 0.0 {
        offset
    } else {
        0.0
    }
}

// =============================================================================
// Tests
// =============================================================================
