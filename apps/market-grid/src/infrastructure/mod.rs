//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Market stream ingestion: codec, transports and the ingestion channel.
pub mod stream;

/// Offload worker thread for decoding, merging and ranking.
pub mod worker;

/// Headless frame sink.
pub mod sink;

/// Environment-driven configuration.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
