//! WebSocket Transport
//!
//! [`Connector`] / [`MessageSource`] adapter over `tokio-tungstenite`.
//! Only text frames are surfaced; pings are answered in place and a close
//! frame ends the stream.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{Connector, MessageSource, TransportError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    /// Create a connector for `url` (`ws://` or `wss://`).
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn MessageSource>, TransportError> {
        tracing::info!(url = %self.url, "Connecting to market stream");

        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Box::new(WebSocketSource {
            socket: Some(socket),
        }))
    }
}

/// An open WebSocket stream.
pub struct WebSocketSource {
    socket: Option<Socket>,
}

#[async_trait]
impl MessageSource for WebSocketSource {
    async fn next_message(&mut self) -> Option<Result<String, TransportError>> {
        let socket = self.socket.as_mut()?;

        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = socket.send(Message::Pong(data)).await {
                        return Some(Err(TransportError::Stream(e.to_string())));
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("Server sent close frame");
                    self.socket = None;
                    return None;
                }
                Some(Ok(_)) => {
                    // Binary and pong frames carry nothing for us
                }
                Some(Err(e)) => return Some(Err(TransportError::Stream(e.to_string()))),
                None => {
                    tracing::info!("WebSocket stream ended");
                    self.socket = None;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                tracing::debug!(error = %e, "WebSocket close failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_keeps_url() {
        let connector = WebSocketConnector::new("ws://localhost:8080");
        assert_eq!(connector.url(), "ws://localhost:8080");
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_to_connect() {
        let connector = WebSocketConnector::new("ws://127.0.0.1:9");
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn closed_source_yields_nothing() {
        let mut source = WebSocketSource { socket: None };
        assert!(source.next_message().await.is_none());
        source.close().await;
    }
}
