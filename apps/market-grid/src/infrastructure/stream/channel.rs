//! Ingestion Channel
//!
//! Drives one stream session: opens a [`MessageSource`], decodes every
//! inbound frame independently and forwards the result as a
//! [`ChannelEvent`].
//!
//! # Lifecycle
//!
//! ```text
//! connect ──ok──> Connected ──> Snapshot / Update / DecodeError ... ──> Disconnected
//!    └─err──> StreamClientError (no events)
//! ```
//!
//! There is no reconnection: a session ends when the peer closes, the
//! transport fails, the consumer goes away or the channel is cancelled.
//! Callers that want retry layer it above [`IngestionChannel::run`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::codec::StreamCodec;
use super::messages::StreamMessage;
use crate::application::ports::{ChannelEvent, Connector, MessageSource, TransportError};
use crate::infrastructure::metrics::{self, MessageKind};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end an ingestion session.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// The transport could not be opened or failed mid-stream.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The event consumer dropped its receiver.
    #[error("event channel closed")]
    ChannelClosed,
}

// =============================================================================
// Ingestion Channel
// =============================================================================

/// One-session stream reader.
pub struct IngestionChannel {
    connector: Arc<dyn Connector>,
    codec: StreamCodec,
    event_tx: mpsc::Sender<ChannelEvent>,
    cancel: CancellationToken,
}

impl IngestionChannel {
    /// Create a channel that reports to `event_tx`.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        event_tx: mpsc::Sender<ChannelEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            codec: StreamCodec::new(),
            event_tx,
            cancel,
        }
    }

    /// Run one session until the stream ends or the channel is cancelled.
    ///
    /// Cancellation is a clean shutdown and returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns `StreamClientError::Transport` if connecting fails or the
    /// transport fails mid-stream, and `StreamClientError::ChannelClosed` if
    /// the consumer went away.
    pub async fn run(self) -> Result<(), StreamClientError> {
        let connected = tokio::select! {
            () = self.cancel.cancelled() => {
                tracing::info!("Ingestion channel cancelled before connect");
                return Ok(());
            }
            result = self.connector.connect() => result,
        };

        let mut source = match connected {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "Market stream connection failed");
                return Err(e.into());
            }
        };

        tracing::info!("Market stream connected");
        if !self.emit(ChannelEvent::Connected).await {
            return self.stop(source).await;
        }

        let result = self.read_loop(source.as_mut()).await;
        source.close().await;
        result
    }

    async fn read_loop(&self, source: &mut dyn MessageSource) -> Result<(), StreamClientError> {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Ingestion channel cancelled");
                    let _ = self.event_tx.try_send(ChannelEvent::Disconnected);
                    return Ok(());
                }
                frame = source.next_message() => {
                    match frame {
                        Some(Ok(text)) => {
                            if !self.emit(self.decode(&text)).await {
                                return self.closed_result();
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Market stream transport error");
                            self.emit(ChannelEvent::Disconnected).await;
                            return Err(e.into());
                        }
                        None => {
                            tracing::info!("Market stream closed by peer");
                            self.emit(ChannelEvent::Disconnected).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn decode(&self, text: &str) -> ChannelEvent {
        match self.codec.decode(text) {
            Ok(message) => {
                let kind = match &message {
                    StreamMessage::Snapshot(_) => MessageKind::Snapshot,
                    StreamMessage::Update(_) => MessageKind::Update,
                };
                metrics::record_message_received(kind);
                tracing::trace!(
                    message_type = message.type_name(),
                    records = message.len(),
                    "Stream message decoded"
                );
                message.into()
            }
            Err(e) => {
                metrics::record_decode_error(e.reason());
                tracing::warn!(error = %e, bytes = text.len(), "Failed to decode stream message");
                ChannelEvent::DecodeError(e.to_string())
            }
        }
    }

    /// Forward an event, giving up if cancelled while the consumer is full.
    async fn emit(&self, event: ChannelEvent) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            sent = self.event_tx.send(event) => sent.is_ok(),
        }
    }

    async fn stop(&self, mut source: Box<dyn MessageSource>) -> Result<(), StreamClientError> {
        source.close().await;
        self.closed_result()
    }

    fn closed_result(&self) -> Result<(), StreamClientError> {
        if self.cancel.is_cancelled() {
            let _ = self.event_tx.try_send(ChannelEvent::Disconnected);
            Ok(())
        } else {
            Err(StreamClientError::ChannelClosed)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Record;
    use crate::infrastructure::stream::memory::MemoryConnector;

    fn record(id: &str, change: f64) -> Record {
        Record {
            id: id.to_string(),
            symbol: "TSLA".to_string(),
            category: "Automotive".to_string(),
            price: 250.0,
            volume: 77,
            change,
            timestamp: 1,
        }
    }

    async fn drain(rx: &mut mpsc::Receiver<ChannelEvent>) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn yields_events_in_arrival_order() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (tx, mut rx) = mpsc::channel(8);
        let channel = IngestionChannel::new(connector, tx, CancellationToken::new());

        feed.send(&StreamMessage::Snapshot(vec![record("a", 0.0)]))
            .await
            .unwrap();
        feed.send(&StreamMessage::Update(vec![record("a", 0.3)]))
            .await
            .unwrap();
        drop(feed);

        channel.run().await.unwrap();
        let events = drain(&mut rx).await;

        assert_eq!(
            events,
            vec![
                ChannelEvent::Connected,
                ChannelEvent::Snapshot(vec![record("a", 0.0)]),
                ChannelEvent::Update(vec![record("a", 0.3)]),
                ChannelEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn malformed_message_does_not_close_channel() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (tx, mut rx) = mpsc::channel(8);
        let channel = IngestionChannel::new(connector, tx, CancellationToken::new());

        feed.send_text("{\"type\":\"UPDATE\"").await.unwrap();
        feed.send(&StreamMessage::Update(vec![record("b", 1.0)]))
            .await
            .unwrap();
        drop(feed);

        channel.run().await.unwrap();
        let events = drain(&mut rx).await;

        assert_eq!(events.len(), 4);
        assert!(matches!(events[1], ChannelEvent::DecodeError(_)));
        assert_eq!(events[2], ChannelEvent::Update(vec![record("b", 1.0)]));
    }

    #[tokio::test]
    async fn transport_failure_disconnects_with_error() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (tx, mut rx) = mpsc::channel(8);
        let channel = IngestionChannel::new(connector, tx, CancellationToken::new());

        feed.fail(TransportError::Stream("reset".to_string()))
            .await
            .unwrap();

        let result = channel.run().await;
        assert!(matches!(result, Err(StreamClientError::Transport(_))));
        assert_eq!(
            drain(&mut rx).await,
            vec![ChannelEvent::Connected, ChannelEvent::Disconnected]
        );
    }

    #[tokio::test]
    async fn connect_failure_emits_nothing() {
        let connector = Arc::new(MemoryConnector::new());
        let (tx, mut rx) = mpsc::channel(8);
        let channel = IngestionChannel::new(connector, tx, CancellationToken::new());

        assert!(channel.run().await.is_err());
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn cancel_stops_delivery_and_closes_source() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let channel = IngestionChannel::new(connector, tx, cancel.clone());

        let handle = tokio::spawn(channel.run());
        assert_eq!(rx.recv().await, Some(ChannelEvent::Connected));

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(drain(&mut rx).await, vec![ChannelEvent::Disconnected]);
        assert!(feed.is_closed());
    }

    #[tokio::test]
    async fn dropped_consumer_is_reported() {
        let connector = Arc::new(MemoryConnector::new());
        let feed = connector.open_session(8);
        let (tx, rx) = mpsc::channel(8);
        let channel = IngestionChannel::new(connector, tx, CancellationToken::new());
        drop(rx);

        feed.send(&StreamMessage::Update(vec![])).await.unwrap();
        let result = channel.run().await;

        assert!(matches!(result, Err(StreamClientError::ChannelClosed)));
        assert!(feed.is_closed());
    }
}
