//! Stream Message Types
//!
//! Text-framed, one JSON object per message:
//!
//! ```json
//! {"type":"SNAPSHOT","data":[{"id":"asset-0",...}]}
//! {"type":"UPDATE","data":[{"id":"asset-7",...}]}
//! ```
//!
//! Update entries always carry the whole record; there are no field diffs.

use serde::{Deserialize, Serialize};

use crate::application::ports::ChannelEvent;
use crate::domain::record::Record;

/// Messages received from the market stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamMessage {
    /// Full replacement, sent once immediately on connect.
    Snapshot(Vec<Record>),
    /// Batch of touched records.
    Update(Vec<Record>),
}

impl StreamMessage {
    /// Wire tag.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "SNAPSHOT",
            Self::Update(_) => "UPDATE",
        }
    }

    /// Records carried by the message.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Snapshot(records) | Self::Update(records) => records.len(),
        }
    }

    /// Whether the message carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<StreamMessage> for ChannelEvent {
    fn from(message: StreamMessage) -> Self {
        match message {
            StreamMessage::Snapshot(records) => Self::Snapshot(records),
            StreamMessage::Update(batch) => Self::Update(batch),
        }
    }
}
