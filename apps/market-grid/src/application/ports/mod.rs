//! Port Interfaces
//!
//! Contracts between the application core and its adapters, following the
//! hexagonal layout of the rest of the crate.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`Connector`] / [`MessageSource`]: text-framed transport the ingestion
//!   channel reads from (WebSocket in production, in-memory in tests)
//! - [`FrameSink`]: receives one [`Frame`] per refresh tick
//!
//! ## Events
//!
//! - [`ChannelEvent`]: what the ingestion channel yields to its consumer

use async_trait::async_trait;

use crate::domain::record::{Record, Trend};
use crate::domain::viewport::Window;

// =============================================================================
// Transport
// =============================================================================

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not open the stream.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The open stream failed.
    #[error("transport error: {0}")]
    Stream(String),
}

/// An open, ordered stream of text messages.
#[async_trait]
pub trait MessageSource: Send {
    /// Next text frame.
    ///
    /// `None` means the peer closed the stream.
    async fn next_message(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the stream. Safe to call on an already closed source.
    async fn close(&mut self);
}

/// Opens message sources.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new stream.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the endpoint cannot be reached.
    async fn connect(&self) -> Result<Box<dyn MessageSource>, TransportError>;
}

// =============================================================================
// Channel Events
// =============================================================================

/// Discrete events yielded by the ingestion channel, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The stream opened.
    Connected,
    /// The stream closed or failed. Terminal for the session.
    Disconnected,
    /// Full replacement of the store.
    Snapshot(Vec<Record>),
    /// Batch of whole-record updates.
    Update(Vec<Record>),
    /// One inbound message could not be decoded. The channel stays open.
    DecodeError(String),
}

impl ChannelEvent {
    /// Metric and log label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Snapshot(_) => "snapshot",
            Self::Update(_) => "update",
            Self::DecodeError(_) => "decode_error",
        }
    }
}

// =============================================================================
// Frame Sink
// =============================================================================

/// One materialized row.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    /// Index into the displayed ordering.
    pub index: usize,
    /// Vertical offset within the scrollable extent.
    pub offset_top: f64,
    /// Direction used for coloring.
    pub trend: Trend,
    /// Color intensity in `[0, 1]`.
    pub heat: f64,
    /// Owned copy of the record.
    pub record: Record,
}

/// Everything the draw step hands to the sink on one refresh tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Monotonic frame number.
    pub sequence: u64,
    /// Window the rows were cut from.
    pub window: Window,
    /// Materialized rows in display order.
    pub rows: Vec<FrameRow>,
    /// Records in the displayed ordering.
    pub total_count: usize,
    /// Last measured frames per second.
    pub fps: u32,
}

/// Receives one frame per refresh tick.
///
/// Called on the presentation context; implementations must not block.
pub trait FrameSink: Send {
    /// Draw a frame.
    fn draw(&mut self, frame: &Frame);
}

impl<F> FrameSink for F
where
    F: FnMut(&Frame) + Send,
{
    fn draw(&mut self, frame: &Frame) {
        self(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kinds() {
        assert_eq!(ChannelEvent::Connected.kind(), "connected");
        assert_eq!(ChannelEvent::Update(vec![]).kind(), "update");
        assert_eq!(ChannelEvent::DecodeError("x".into()).kind(), "decode_error");
    }

    #[test]
    fn closures_are_sinks() {
        let mut drawn = 0;
        {
            let mut sink = |frame: &Frame| drawn += frame.rows.len() + 1;
            sink.draw(&Frame {
                sequence: 1,
                window: Window::empty(),
                rows: vec![],
                total_count: 0,
                fps: 0,
            });
        }
        assert_eq!(drawn, 1);
    }
}
