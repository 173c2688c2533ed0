//! Sort/Rank Stage
//!
//! Produces the "top movers" view: a full copy of the store ordered by
//! descending magnitude of `change`. The sort is stable, so records with
//! equal magnitude keep their storage order and do not jitter between
//! merges.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::domain::record::Record;

/// Derived, fully reordered copy of the store.
///
/// Owned outright: nothing in a ranked view aliases the store it was
/// produced from, so it can cross an execution-context boundary by value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedView {
    records: Vec<Record>,
}

impl RankedView {
    /// Rank a slice of records by descending `|change|`.
    #[must_use]
    pub fn rank(records: &[Record]) -> Self {
        let mut ranked = records.to_vec();
        ranked.sort_by(|a, b| b.abs_change().total_cmp(&a.abs_change()));
        Self { records: ranked }
    }

    /// Ranked records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Mutable access for the owner of this copy.
    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }
}

impl Deref for RankedView {
    type Target = [Record];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

// =============================================================================
// Tests
// =============================================================================
