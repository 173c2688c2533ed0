//! In-Memory Transport
//!
//! A [`Connector`] whose sessions are fed from the same process. Used to
//! replay recorded streams and by the test suites.
//!
//! Each call to [`MemoryConnector::open_session`] queues one session and
//! returns the [`MemoryFeed`] that writes into it; `connect` hands out
//! queued sessions in order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::codec::{CodecError, StreamCodec};
use super::messages::StreamMessage;
use crate::application::ports::{Connector, MessageSource, TransportError};

type Frame = Result<String, TransportError>;

/// Connector serving pre-queued in-process sessions.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    sessions: parking_lot::Mutex<VecDeque<mpsc::Receiver<Frame>>>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    /// Create a connector with no queued sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a session and return its writer.
    pub fn open_session(&self, capacity: usize) -> MemoryFeed {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.sessions.lock().push_back(rx);
        MemoryFeed {
            tx,
            codec: StreamCodec::new(),
        }
    }

    /// Successful `connect` calls so far.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn MessageSource>, TransportError> {
        let rx = self
            .sessions
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::ConnectionFailed("no session queued".to_string()))?;
        self.connects.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemorySource { rx: Some(rx) }))
    }
}

/// Reading end of an in-memory session.
#[derive(Debug)]
pub struct MemorySource {
    rx: Option<mpsc::Receiver<Frame>>,
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn next_message(&mut self) -> Option<Frame> {
        self.rx.as_mut()?.recv().await
    }

    async fn close(&mut self) {
        self.rx = None;
    }
}

/// Writing end of an in-memory session. Dropping it ends the stream.
#[derive(Debug, Clone)]
pub struct MemoryFeed {
    tx: mpsc::Sender<Frame>,
    codec: StreamCodec,
}

/// The reading side went away.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The session was closed by the reader.
    #[error("session closed")]
    Closed,

    /// The message could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl MemoryFeed {
    /// Send a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Closed` if the reader closed the session.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), FeedError> {
        self.tx
            .send(Ok(text.into()))
            .await
            .map_err(|_| FeedError::Closed)
    }

    /// Encode and send a stream message.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the reader closed the session.
    pub async fn send(&self, message: &StreamMessage) -> Result<(), FeedError> {
        let text = self.codec.encode(message)?;
        self.send_text(text).await
    }

    /// Inject a transport failure.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Closed` if the reader closed the session.
    pub async fn fail(&self, error: TransportError) -> Result<(), FeedError> {
        self.tx.send(Err(error)).await.map_err(|_| FeedError::Closed)
    }

    /// Whether the reader closed the session.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_served_in_order() {
        let connector = MemoryConnector::new();
        let first = connector.open_session(4);
        let second = connector.open_session(4);
        first.send_text("one").await.unwrap();
        second.send_text("two").await.unwrap();

        let mut a = connector.connect().await.unwrap();
        let mut b = connector.connect().await.unwrap();

        assert_eq!(a.next_message().await.unwrap().unwrap(), "one");
        assert_eq!(b.next_message().await.unwrap().unwrap(), "two");
        assert_eq!(connector.connects(), 2);
        assert!(connector.connect().await.is_err());
    }

    #[tokio::test]
    async fn dropping_feed_ends_stream() {
        let connector = MemoryConnector::new();
        let feed = connector.open_session(1);
        let mut source = connector.connect().await.unwrap();
        drop(feed);
        assert!(source.next_message().await.is_none());
    }

    #[tokio::test]
    async fn closing_source_is_visible_to_feed() {
        let connector = MemoryConnector::new();
        let feed = connector.open_session(1);
        let mut source = connector.connect().await.unwrap();

        source.close().await;
        source.close().await;

        assert!(feed.is_closed());
        assert!(matches!(feed.send_text("x").await, Err(FeedError::Closed)));
    }
}
