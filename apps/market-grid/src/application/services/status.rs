//! Shared stream status.
//!
//! Written by the presentation loop, read by the health endpoint. Plain
//! atomics and short `parking_lot` critical sections; nothing here is on
//! the merge path.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

use crate::domain::ConnectionState;

/// Observable connection and throughput state.
#[derive(Debug, Default)]
pub struct StreamStatus {
    state: parking_lot::RwLock<ConnectionState>,
    last_connected_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    messages_received: AtomicU64,
    decode_errors: AtomicU64,
    frames_drawn: AtomicU64,
    fps: AtomicU32,
    record_count: AtomicUsize,
}

impl StreamStatus {
    /// Create a disconnected status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection state.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state.is_connected() {
            *self.last_connected_at.write() = Some(Utc::now());
        }
    }

    /// Count one data message (snapshot, update or ranked view).
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one undecodable message.
    pub fn increment_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one drawn frame.
    pub fn increment_frames(&self) {
        self.frames_drawn.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the measured frame rate.
    pub fn set_fps(&self, fps: u32) {
        self.fps.store(fps, Ordering::Relaxed);
    }

    /// Publish the displayed record count.
    pub fn set_record_count(&self, count: usize) {
        self.record_count.store(count, Ordering::Relaxed);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// When the stream last connected.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Data messages received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Undecodable messages received.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Frames drawn.
    #[must_use]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn.load(Ordering::Relaxed)
    }

    /// Last measured frames per second.
    #[must_use]
    pub fn fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }

    /// Records in the displayed ordering.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.record_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_stamps_time() {
        let status = StreamStatus::new();
        assert_eq!(status.state(), ConnectionState::Disconnected);
        assert!(status.last_connected_at().is_none());

        status.set_state(ConnectionState::Connected);
        assert!(status.state().is_connected());
        let stamped = status.last_connected_at();
        assert!(stamped.is_some());

        status.set_state(ConnectionState::Disconnected);
        assert_eq!(status.last_connected_at(), stamped);
    }

    #[test]
    fn counters_accumulate() {
        let status = StreamStatus::new();
        status.increment_messages();
        status.increment_messages();
        status.increment_decode_errors();
        status.increment_frames();
        status.set_fps(58);
        status.set_record_count(10_000);

        assert_eq!(status.messages_received(), 2);
        assert_eq!(status.decode_errors(), 1);
        assert_eq!(status.frames_drawn(), 1);
        assert_eq!(status.fps(), 58);
        assert_eq!(status.record_count(), 10_000);
    }
}
