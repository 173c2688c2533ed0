//! Worker Control Protocol
//!
//! In-process messages across the offload boundary. Payloads move by
//! value; nothing sent in either direction references worker state.
//!
//! ```json
//! {"type":"CONNECT"}
//! {"type":"STATUS","payload":"CONNECTED"}
//! {"type":"DATA","payload":[{"id":"asset-3",...}]}
//! ```

use serde::{Deserialize, Serialize};

use crate::application::services::DataUpdate;
use crate::domain::ConnectionState;
use crate::domain::ranking::RankedView;

/// Presentation to worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerCommand {
    /// Open a stream session. Ignored while one is live.
    Connect,
}

/// Worker to presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Emitted on every connect/disconnect transition.
    Status(ConnectionState),
    /// Full ranked view after the snapshot and after every merged batch.
    Data(RankedView),
}

impl From<WorkerMessage> for DataUpdate {
    fn from(message: WorkerMessage) -> Self {
        match message {
            WorkerMessage::Status(state) => Self::Connection(state),
            WorkerMessage::Data(view) => Self::Ranked(view),
        }
    }
}
