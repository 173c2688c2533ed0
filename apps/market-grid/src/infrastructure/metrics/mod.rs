//! Prometheus Metrics Module
//!
//! Exposes pipeline metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Ingest**: messages received by kind, decode errors
//! - **Merge**: batch records applied, unknown identities ignored, merge and
//!   rank durations
//! - **Presentation**: frames drawn, signals coalesced by the frame gate
//! - **Worker**: messages published across the offload boundary
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns `BuildError` if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "market_grid_messages_received_total",
        "Stream messages received, by kind"
    );
    describe_counter!(
        "market_grid_decode_errors_total",
        "Inbound messages that failed to decode"
    );
    describe_counter!(
        "market_grid_records_applied_total",
        "Batch records written into an existing store slot"
    );
    describe_counter!(
        "market_grid_unknown_identities_total",
        "Batch records ignored because their identity is not in the store"
    );
    describe_counter!("market_grid_frames_drawn_total", "Frames handed to the sink");
    describe_counter!(
        "market_grid_signals_coalesced_total",
        "Signals folded into an already pending recomputation"
    );
    describe_counter!(
        "market_grid_worker_messages_total",
        "Messages published by the offload worker"
    );

    describe_gauge!("market_grid_store_records", "Records in the entity store");
    describe_gauge!("market_grid_connected", "1 when the stream is connected");

    describe_histogram!(
        "market_grid_merge_duration_seconds",
        "Time to apply one snapshot or batch"
    );
    describe_histogram!(
        "market_grid_rank_duration_seconds",
        "Time to produce one ranked view"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for inbound stream messages.
#[derive(Debug, Clone, Copy)]
pub enum MessageKind {
    /// Full store replacement.
    Snapshot,
    /// Update batch.
    Update,
}

impl MessageKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Update => "update",
        }
    }
}

/// Metric labels for the context a merge ran on.
#[derive(Debug, Clone, Copy)]
pub enum Context {
    /// Presentation context.
    Inline,
    /// Offload worker thread.
    Worker,
}

impl Context {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Worker => "worker",
        }
    }
}

/// Metric labels for gated signals.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    /// Scroll offset changes.
    Scroll,
    /// Data changed notifications.
    Data,
}

impl Signal {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Scroll => "scroll",
            Self::Data => "data",
        }
    }
}

/// Metric labels for worker outbound messages.
#[derive(Debug, Clone, Copy)]
pub enum WorkerOutbound {
    /// Connection transition.
    Status,
    /// Ranked view.
    Data,
}

impl WorkerOutbound {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Data => "data",
        }
    }
}

/// Record a decoded stream message.
pub fn record_message_received(kind: MessageKind) {
    counter!(
        "market_grid_messages_received_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record an undecodable message.
pub fn record_decode_error(reason: &'static str) {
    counter!("market_grid_decode_errors_total", "reason" => reason).increment(1);
}

/// Record the outcome of one merge.
pub fn record_merge(context: Context, applied: usize, ignored: usize, duration: Duration) {
    counter!(
        "market_grid_records_applied_total",
        "context" => context.as_str()
    )
    .increment(applied as u64);
    if ignored > 0 {
        counter!(
            "market_grid_unknown_identities_total",
            "context" => context.as_str()
        )
        .increment(ignored as u64);
    }
    histogram!(
        "market_grid_merge_duration_seconds",
        "context" => context.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record one rank pass.
pub fn record_rank(context: Context, duration: Duration) {
    histogram!(
        "market_grid_rank_duration_seconds",
        "context" => context.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Update the store size.
#[allow(clippy::cast_precision_loss)]
pub fn set_store_records(context: Context, count: usize) {
    gauge!("market_grid_store_records", "context" => context.as_str()).set(count as f64);
}

/// Update the connection gauge.
pub fn set_connected(connected: bool) {
    gauge!("market_grid_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a drawn frame.
pub fn record_frame_drawn() {
    counter!("market_grid_frames_drawn_total").increment(1);
}

/// Record signals folded into a pending recomputation.
pub fn record_signals_coalesced(signal: Signal, count: u64) {
    if count > 0 {
        counter!(
            "market_grid_signals_coalesced_total",
            "signal" => signal.as_str()
        )
        .increment(count);
    }
}

/// Record a message published by the offload worker.
pub fn record_worker_message(kind: WorkerOutbound) {
    counter!(
        "market_grid_worker_messages_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_values() {
        assert_eq!(MessageKind::Snapshot.as_str(), "snapshot");
        assert_eq!(MessageKind::Update.as_str(), "update");
        assert_eq!(Context::Inline.as_str(), "inline");
        assert_eq!(Context::Worker.as_str(), "worker");
        assert_eq!(Signal::Scroll.as_str(), "scroll");
        assert_eq!(WorkerOutbound::Data.as_str(), "data");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_message_received(MessageKind::Update);
        record_merge(Context::Inline, 3, 1, Duration::from_micros(40));
        record_signals_coalesced(Signal::Scroll, 0);
        record_worker_message(WorkerOutbound::Status);
    }
}
