#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )
)]

//! Market Grid - Delta-Merged Market Data Viewport
//!
//! Consumes a SNAPSHOT/UPDATE market data stream, merges whole-record
//! deltas into an identity-keyed store, ranks the biggest movers and keeps
//! a virtualized window of rows refreshed at most once per display tick.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Records, the entity store, ranking and window math
//!   - `record`: Market record and its derived display values
//!   - `store`: Identity-indexed store with snapshot and batch merge
//!   - `ranking`: Stable descending order by absolute change
//!   - `viewport`: Visible window over a fixed-height list
//!
//! - **Application**: Ports, frame scheduling and the presentation loop
//!   - `ports`: Transport, channel events and the frame sink
//!   - `scheduler`: Frame clock, frame gate and fps meter
//!   - `services`: Presenter and shared stream status
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `stream`: JSON codec, WebSocket and in-memory transports, ingestion channel
//!   - `worker`: Offload worker thread and its message protocol
//!   - `sink`: Tracing frame sink
//!   - `config`, `health`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!                    inline mode
//! WebSocket --> IngestionChannel --ChannelEvent--> Presenter --Frame--> FrameSink
//!                                                     ^
//!                    worker mode                      |
//! WebSocket --> OffloadWorker (merge + rank) --WorkerMessage
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Records, store, ranking and viewport math.
pub mod domain;

/// Application layer - Ports, scheduling and presentation.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::ConnectionState;
pub use domain::ranking::RankedView;
pub use domain::record::{Record, Trend};
pub use domain::store::{EntityStore, MergeStats};
pub use domain::viewport::{ViewportParams, VirtualItem, Window, compute_window};

// Ports
pub use application::ports::{
    ChannelEvent, Connector, Frame, FrameRow, FrameSink, MessageSource, TransportError,
};

// Scheduling and presentation
pub use application::scheduler::{FrameClock, FrameGate, FrameRateMeter};
pub use application::services::{
    DataUpdate, DisplayOrder, Presenter, StreamStatus, ViewportGeometry,
};

// Stream adapters (memory variants for integration tests)
pub use infrastructure::stream::{
    IngestionChannel, MemoryConnector, MemoryFeed, StreamClientError, StreamCodec, StreamMessage,
    WebSocketConnector,
};

// Offload worker
pub use infrastructure::worker::{OffloadWorker, WorkerCommand, WorkerError, WorkerMessage};

// Infrastructure config
pub use infrastructure::config::{ConfigError, GridConfig, IngestMode};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
