//! Coalescing gate.
//!
//! ```text
//! signal(a) signal(b) signal(c) | tick -> Some(c) | tick -> None
//!           ^ pending, value replaced
//! ```

/// Last-value-wins gate that releases at most one value per refresh tick.
///
/// A signal records its value and, if nothing is pending, schedules one
/// recomputation. The value released on the tick is the latest recorded
/// one, not the value at schedule time.
#[derive(Debug)]
pub struct FrameGate<T> {
    latest: Option<T>,
    coalesced: u64,
    released: u64,
}

impl<T> Default for FrameGate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameGate<T> {
    /// Create an idle gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: None,
            coalesced: 0,
            released: 0,
        }
    }

    /// Record a signal.
    ///
    /// Returns `true` when this signal scheduled the next recomputation,
    /// `false` when it was folded into one already pending.
    pub fn signal(&mut self, value: T) -> bool {
        let scheduled = self.latest.is_none();
        if !scheduled {
            self.coalesced += 1;
        }
        self.latest = Some(value);
        scheduled
    }

    /// Release the pending value, if any. Call once per refresh tick.
    pub fn on_tick(&mut self) -> Option<T> {
        let value = self.latest.take();
        if value.is_some() {
            self.released += 1;
        }
        value
    }

    /// Revoke a pending recomputation.
    ///
    /// Returns whether one was pending. After this, the next tick releases
    /// nothing unless a new signal arrives.
    pub fn cancel(&mut self) -> bool {
        self.latest.take().is_some()
    }

    /// Whether a recomputation is scheduled.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.latest.is_some()
    }

    /// Signals folded into an already pending recomputation.
    #[must_use]
    pub const fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Recomputations released.
    #[must_use]
    pub const fn released(&self) -> u64 {
        self.released
    }
}
