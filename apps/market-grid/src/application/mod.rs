//! Application Layer - Ports, scheduling and the presentation loop.
//!
//! This layer wires the pure domain algorithms to the outside world through
//! port traits and owns the presentation context's timing.

/// Port interfaces for the transport and the frame sink.
pub mod ports;

/// Frame-gated scheduling: coalescing gate, refresh clock, frame-rate meter.
pub mod scheduler;

/// Presentation loop and shared stream status.
pub mod services;
