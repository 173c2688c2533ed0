//! Market Record Types
//!
//! The domain entity carried by every stream message. A record is always
//! transported whole: updates replace the touched identity field-for-field,
//! there are no partial-field diffs.
//!
//! # Wire Format (JSON)
//! ```json
//! {"id":"asset-1","symbol":"MSFT","category":"Technology","price":412.5,
//!  "volume":8120,"change":-0.42,"timestamp":1718000000000}
//! ```

use serde::{Deserialize, Deserializer, Serialize};

/// Category assigned to records the producer could not classify.
pub const DEFAULT_CATEGORY: &str = "Others";

/// A single market entity as known to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identity (e.g. `"asset-42"`), unique within a store.
    pub id: String,

    /// Ticker symbol.
    pub symbol: String,

    /// Sector classification, `"Others"` when unmapped.
    #[serde(default = "default_category", deserialize_with = "category_or_default")]
    pub category: String,

    /// Last price.
    pub price: f64,

    /// Cumulative traded volume.
    pub volume: u64,

    /// Signed price move of the latest tick. Used for ranking and coloring only.
    pub change: f64,

    /// Producer clock, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Record {
    /// Magnitude of the latest move, the ranking key.
    #[must_use]
    pub fn abs_change(&self) -> f64 {
        self.change.abs()
    }

    /// Direction of the latest move.
    #[must_use]
    pub fn trend(&self) -> Trend {
        Trend::from_change(self.change)
    }

    /// Color intensity in `[0, 1]` for heatmap-style rendering.
    ///
    /// Saturates once the move reaches half a unit.
    #[must_use]
    pub fn heat_intensity(&self) -> f64 {
        let intensity = self.change.abs() * 2.0;
        if intensity.is_nan() {
            0.0
        } else {
            intensity.min(1.0)
        }
    }
}

/// Direction of a record's latest move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Positive change.
    Up,
    /// Negative change.
    Down,
    /// No change (or not a number).
    Flat,
}

impl Trend {
    /// Classify a signed change.
    #[must_use]
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Self::Up
        } else if change < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }

    /// Label used by log and text sinks.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Flat => "flat",
        }
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn category_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let category = Option::<String>::deserialize(deserializer)?;
    Ok(category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(default_category))
}

// =============================================================================
// Tests
// =============================================================================
