//! Frame-Gated Scheduler
//!
//! Throttles high-frequency signals (scroll positions, "data changed"
//! notifications) to at most one recomputation per display refresh.
//!
//! - [`FrameGate`]: last-value-wins coalescing of one signal
//! - [`FrameClock`]: the refresh tick source
//! - [`FrameRateMeter`]: frames-per-second measurement

mod clock;
mod gate;
mod meter;

pub use clock::{DEFAULT_REFRESH_HZ, FrameClock};
pub use gate::FrameGate;
pub use meter::FrameRateMeter;
