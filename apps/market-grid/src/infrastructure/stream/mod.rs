//! Market Stream Ingestion
//!
//! Text-framed JSON stream turned into discrete [`ChannelEvent`]s.
//!
//! - [`StreamCodec`]: per-frame decoding into [`StreamMessage`]
//! - [`IngestionChannel`]: one-session driver with connect/disconnect events
//! - [`WebSocketConnector`]: production transport
//! - [`MemoryConnector`]: in-process transport for replay and tests
//!
//! [`ChannelEvent`]: crate::application::ports::ChannelEvent

mod channel;
mod codec;
mod memory;
mod messages;
mod websocket;

pub use channel::{IngestionChannel, StreamClientError};
pub use codec::{CodecError, StreamCodec};
pub use memory::{FeedError, MemoryConnector, MemoryFeed, MemorySource};
pub use messages::StreamMessage;
pub use websocket::{WebSocketConnector, WebSocketSource};
