//! Viewport Window Calculator
//!
//! Maps scroll state and container geometry onto the contiguous slice of
//! a large ordered collection that must be materialized.
//!
//! ```text
//! start   = max(0, floor(scroll / item_height) - overscan)
//! visible = ceil(container / item_height) + 2 * overscan
//! end     = min(count - 1, start + visible)          (inclusive)
//! extent  = count * item_height
//! ```
//!
//! [`compute_window`] is total and pure: every input combination yields a
//! window, and the window depends on nothing but the five inputs, so
//! recomputations can be coalesced freely.

use std::ops::Range;

/// Overscan used when the caller does not pick one.
pub const DEFAULT_OVERSCAN: usize = 5;

// =============================================================================
// Inputs
// =============================================================================

/// Inputs to the window computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportParams {
    /// Number of items in the collection.
    pub count: usize,
    /// Height of a single row (must be positive and finite).
    pub item_height: f64,
    /// Height of the visible container.
    pub container_height: f64,
    /// Current scroll offset from the top.
    pub scroll_offset: f64,
    /// Extra rows materialized above and below the visible area.
    pub overscan: usize,
}

impl ViewportParams {
    /// Parameters with the default overscan.
    #[must_use]
    pub const fn new(count: usize, item_height: f64, container_height: f64, scroll_offset: f64) -> Self {
        Self {
            count,
            item_height,
            container_height,
            scroll_offset,
            overscan: DEFAULT_OVERSCAN,
        }
    }

    /// Override the overscan.
    #[must_use]
    pub const fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    /// Rows materialized for an unclamped window: visible rows plus
    /// overscan on both sides.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        if !is_valid_extent(self.item_height) {
            return 0;
        }
        let rows = clamp_non_negative(self.container_height) / self.item_height;
        float_to_index(rows.ceil()).saturating_add(self.overscan.saturating_mul(2))
    }
}

// =============================================================================
// Output
// =============================================================================

/// A materialized index range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    /// First index to materialize.
    pub start_index: usize,
    /// Last index to materialize (inclusive), `None` for an empty collection.
    pub end_index: Option<usize>,
    /// Scrollable extent of the whole collection.
    pub total_extent: f64,
}

/// One materialized row and its vertical offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualItem {
    /// Index into the collection.
    pub index: usize,
    /// Offset of the row from the top of the scrollable extent.
    pub offset_top: f64,
}

impl Window {
    /// The window for an empty collection.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            start_index: 0,
            end_index: None,
            total_extent: 0.0,
        }
    }

    /// Half-open index range `[start, end + 1)`.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        match self.end_index {
            Some(end) if end >= self.start_index => self.start_index..end + 1,
            _ => self.start_index..self.start_index,
        }
    }

    /// Number of materialized rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.range().len()
    }

    /// Whether nothing is materialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialized rows with their offsets.
    #[allow(clippy::cast_precision_loss)]
    pub fn items(&self, item_height: f64) -> impl Iterator<Item = VirtualItem> + use<> {
        self.range().map(move |index| VirtualItem {
            index,
            offset_top: index as f64 * item_height,
        })
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Compute the window to materialize.
///
/// A non-positive or non-finite `item_height` yields the empty window.
/// Negative or non-finite scroll offsets and container heights are read
/// as zero.
#[must_use]
pub fn compute_window(params: &ViewportParams) -> Window {
    if params.count == 0 || !is_valid_extent(params.item_height) {
        return Window::empty();
    }

    let scroll = clamp_non_negative(params.scroll_offset);
    let first_visible = float_to_index((scroll / params.item_height).floor());
    let start_index = first_visible.saturating_sub(params.overscan);
    let end_index = (params.count - 1).min(start_index.saturating_add(params.visible_count()));

    #[allow(clippy::cast_precision_loss)]
    let total_extent = params.count as f64 * params.item_height;

    Window {
        start_index,
        end_index: Some(end_index),
        total_extent,
    }
}

fn is_valid_extent(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn clamp_non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn float_to_index(value: f64) -> usize {
    // `as` saturates: negatives and NaN map to 0, overflow to usize::MAX.
    value as usize
}

// =============================================================================
// Tests
// =============================================================================
