//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `Presenter`: the presentation loop (data path, scroll gate, per-tick draw)
//! - `StreamStatus`: connection and throughput state shared with health checks

mod presenter;
mod status;

pub use presenter::{DataUpdate, DisplayOrder, Presenter, ViewportGeometry};
pub use status::StreamStatus;
