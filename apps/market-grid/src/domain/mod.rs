//! Domain Layer - Records, the entity store and the pure algorithms over it.
//!
//! Nothing here performs I/O or knows about threads. The merge engine, the
//! rank stage and the viewport calculator are plain functions over owned
//! data so they can run unchanged on the presentation context or inside
//! the offload worker.

use serde::{Deserialize, Serialize};

/// Market record entity, trend and category default.
pub mod record;

/// Entity store and delta merge engine.
pub mod store;

/// Sort/rank stage producing the top-movers view.
pub mod ranking;

/// Viewport window calculator.
pub mod viewport;

/// Binary connection lifecycle of the ingestion channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// The stream is open and delivering messages.
    Connected,
    /// No stream is open.
    #[default]
    Disconnected,
}

impl ConnectionState {
    /// Whether the stream is open.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Wire and log label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&ConnectionState::Connected).unwrap(),
            "\"CONNECTED\""
        );
        assert_eq!(
            serde_json::from_str::<ConnectionState>("\"DISCONNECTED\"").unwrap(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn connection_state_defaults_to_disconnected() {
        assert!(!ConnectionState::default().is_connected());
    }
}
