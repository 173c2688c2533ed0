//! Configuration Module
//!
//! Environment-driven configuration for the grid.

mod settings;

pub use settings::{ConfigError, GridConfig, IngestMode, ServerSettings, ViewportSettings};
