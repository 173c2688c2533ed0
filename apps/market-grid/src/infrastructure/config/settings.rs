//! Grid Configuration Settings
//!
//! Configuration types for the market grid, loaded from environment
//! variables. Every value is optional; unparsable numbers fall back to the
//! default, geometry that cannot produce a window is rejected.

use crate::application::services::{DisplayOrder, ViewportGeometry};

/// Where decoding, merging and ranking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// On the presentation context.
    Inline,
    /// On the offload worker thread.
    #[default]
    Worker,
}

impl IngestMode {
    /// Parse mode from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "inline" => Self::Inline,
            _ => Self::Worker,
        }
    }

    /// Get the mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Worker => "worker",
        }
    }
}

/// Viewport geometry and initial scroll state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSettings {
    /// Row height in pixels.
    pub item_height: f64,
    /// Container height in pixels.
    pub container_height: f64,
    /// Overscan rows on each side.
    pub overscan: usize,
    /// Initial scroll offset.
    pub scroll_offset: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            item_height: 40.0,
            container_height: 600.0,
            overscan: 10,
            scroll_offset: 0.0,
        }
    }
}

impl ViewportSettings {
    /// Geometry for the presenter.
    #[must_use]
    pub const fn geometry(&self) -> ViewportGeometry {
        ViewportGeometry {
            item_height: self.item_height,
            container_height: self.container_height,
            overscan: self.overscan,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8082 }
    }
}

/// Complete grid configuration.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Market stream endpoint.
    pub stream_url: String,
    /// Where the data path runs.
    pub ingest_mode: IngestMode,
    /// Which ordering the grid displays.
    pub display_order: DisplayOrder,
    /// Viewport geometry.
    pub viewport: ViewportSettings,
    /// Refresh ticks per second.
    pub refresh_hz: u32,
    /// Capacity of every bounded queue between contexts.
    pub event_capacity: usize,
    /// Server port settings.
    pub server: ServerSettings,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            ingest_mode: IngestMode::default(),
            display_order: DisplayOrder::default(),
            viewport: ViewportSettings::default(),
            refresh_hz: 60,
            event_capacity: 1024,
            server: ServerSettings::default(),
        }
    }
}

const DEFAULT_STREAM_URL: &str = "ws://localhost:8080";

impl GridConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let stream_url = match lookup("MARKET_GRID_STREAM_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("MARKET_GRID_STREAM_URL".to_string()));
            }
            Some(url) => url.trim().to_string(),
            None => defaults.stream_url,
        };

        let display_order = lookup("MARKET_GRID_DISPLAY_ORDER")
            .map(|s| DisplayOrder::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let ingest_mode = lookup("MARKET_GRID_INGEST_MODE")
            .map(|s| IngestMode::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let viewport = ViewportSettings {
            item_height: parse_or(
                &lookup,
                "MARKET_GRID_ITEM_HEIGHT",
                defaults.viewport.item_height,
            ),
            container_height: parse_or(
                &lookup,
                "MARKET_GRID_CONTAINER_HEIGHT",
                defaults.viewport.container_height,
            ),
            overscan: parse_or(&lookup, "MARKET_GRID_OVERSCAN", defaults.viewport.overscan),
            scroll_offset: parse_or(
                &lookup,
                "MARKET_GRID_SCROLL_OFFSET",
                defaults.viewport.scroll_offset,
            ),
        };

        let config = Self {
            stream_url,
            ingest_mode,
            display_order,
            viewport,
            refresh_hz: parse_or(&lookup, "MARKET_GRID_REFRESH_HZ", defaults.refresh_hz),
            event_capacity: parse_or(
                &lookup,
                "MARKET_GRID_EVENT_CAPACITY",
                defaults.event_capacity,
            ),
            server: ServerSettings {
                health_port: parse_or(
                    &lookup,
                    "MARKET_GRID_HEALTH_PORT",
                    defaults.server.health_port,
                ),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the pipeline degenerate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a non-positive or non-finite
    /// item height, a negative container height, a zero refresh rate, a
    /// zero queue capacity, or storage order combined with worker mode.
    /// The worker only publishes ranked views.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let item_height = self.viewport.item_height;
        if !item_height.is_finite() || item_height <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "MARKET_GRID_ITEM_HEIGHT",
                reason: format!("must be a positive number, got {item_height}"),
            });
        }

        let container_height = self.viewport.container_height;
        if !container_height.is_finite() || container_height < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "MARKET_GRID_CONTAINER_HEIGHT",
                reason: format!("must be zero or positive, got {container_height}"),
            });
        }

        if self.refresh_hz == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MARKET_GRID_REFRESH_HZ",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MARKET_GRID_EVENT_CAPACITY",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.display_order == DisplayOrder::Storage && self.ingest_mode == IngestMode::Worker {
            return Err(ConfigError::InvalidValue {
                key: "MARKET_GRID_DISPLAY_ORDER",
                reason: "storage order requires MARKET_GRID_INGEST_MODE=inline".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Offending variable.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
