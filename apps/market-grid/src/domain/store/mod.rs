//! Entity Store and Delta Merge Engine
//!
//! An ordered, identity-indexed collection of [`Record`]s. The store is
//! replaced wholesale by a snapshot and then mutated in place by update
//! batches.
//!
//! # Invariants
//!
//! - Identity is unique: no two slots carry the same `id`.
//! - Position is stable across merges: batches never reorder, insert or
//!   remove slots. Cardinality only changes on [`EntityStore::apply_snapshot`].
//! - Identities present in a batch but absent from the store are ignored.
//!
//! # Merge Cost
//!
//! The store keeps an `id -> position` index so a batch of `m` records is
//! applied with `m` direct slot writes. [`EntityStore::apply_batch_scan`]
//! is the index-free variant: one linear pass over the `n` slots with O(1)
//! membership tests against a map built from the batch.

use std::collections::HashMap;

use crate::domain::ranking::RankedView;
use crate::domain::record::Record;

// =============================================================================
// Merge Statistics
// =============================================================================

/// Outcome of applying one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Batch entries written into an existing slot.
    pub applied: usize,
    /// Batch entries whose identity is not in the store (no-op).
    pub ignored: usize,
}

impl MergeStats {
    /// Total batch entries examined.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.applied + self.ignored
    }
}

// =============================================================================
// Entity Store
// =============================================================================

/// Position-stable record collection with an identity index.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store populated from a snapshot.
    #[must_use]
    pub fn from_snapshot(records: Vec<Record>) -> Self {
        let mut store = Self::new();
        store.apply_snapshot(records);
        store
    }

    /// Replace the store contents wholesale and rebuild the index.
    ///
    /// A snapshot that repeats an identity keeps the first position and
    /// the last value for it. Returns the resulting cardinality.
    pub fn apply_snapshot(&mut self, records: Vec<Record>) -> usize {
        self.records.clear();
        self.index.clear();
        self.records.reserve(records.len());
        self.index.reserve(records.len());

        for record in records {
            if let Some(&position) = self.index.get(&record.id) {
                self.records[position] = record;
            } else {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }

        self.records.len()
    }

    /// Apply an update batch in place using the identity index.
    ///
    /// Each batch entry whose identity exists overwrites its slot; later
    /// entries for the same identity win. Unknown identities are counted
    /// in [`MergeStats::ignored`] and otherwise skipped.
    pub fn apply_batch(&mut self, batch: Vec<Record>) -> MergeStats {
        let mut stats = MergeStats::default();

        for record in batch {
            match self.index.get(&record.id) {
                Some(&position) => {
                    self.records[position] = record;
                    stats.applied += 1;
                }
                None => stats.ignored += 1,
            }
        }

        stats
    }

    /// Apply an update batch with a single scan over the store.
    ///
    /// Index-free reference merge: the production path is
    /// [`EntityStore::apply_batch`], and the property tests check the two
    /// agree. Produces the same store as [`EntityStore::apply_batch`]. Duplicate
    /// identities inside the batch collapse to the last entry first, so
    /// `applied` counts distinct identities written.
    pub fn apply_batch_scan(&mut self, batch: Vec<Record>) -> MergeStats {
        let mut pending: HashMap<String, Record> = HashMap::with_capacity(batch.len());
        for record in batch {
            pending.insert(record.id.clone(), record);
        }

        let mut stats = MergeStats::default();
        for slot in &mut self.records {
            if pending.is_empty() {
                break;
            }
            if let Some(record) = pending.remove(&slot.id) {
                *slot = record;
                stats.applied += 1;
            }
        }

        stats.ignored = pending.len();
        stats
    }

    /// Produce the ranked view of the current contents.
    #[must_use]
    pub fn rank(&self) -> RankedView {
        RankedView::rank(&self.records)
    }

    /// Current records in storage order.
    ///
    /// This is the sample the presentation reads on each refresh tick.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Look up a record by identity.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&position| &self.records[position])
    }

    /// Storage position of an identity.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all contents (stream closed).
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn record(id: &str, price: f64, change: f64) -> Record {
        Record {
            id: id.to_string(),
            symbol: "AAPL".to_string(),
            category: "Technology".to_string(),
            price,
            volume: 10,
            change,
            timestamp: 1_000,
        }
    }

    fn seeded(n: usize) -> EntityStore {
        EntityStore::from_snapshot(
            (0..n)
                .map(|i| record(&format!("asset-{i}"), 100.0 + i as f64, 0.0))
                .collect(),
        )
    }

    #[test]
    fn snapshot_replaces_contents() {
        let mut store = seeded(5);
        let count = store.apply_snapshot(vec![record("x", 1.0, 0.0), record("y", 2.0, 0.0)]);

        assert_eq!(count, 2);
        assert!(store.get("asset-0").is_none());
        assert_eq!(store.position("y"), Some(1));
    }

    #[test]
    fn snapshot_with_duplicate_identity_keeps_first_position() {
        let store = EntityStore::from_snapshot(vec![
            record("a", 1.0, 0.0),
            record("b", 2.0, 0.0),
            record("a", 3.0, 0.0),
        ]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.position("a"), Some(0));
        assert!((store.get("a").unwrap().price - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn batch_overwrites_known_identities() {
        let mut store = seeded(4);
        let stats = store.apply_batch(vec![record("asset-2", 9.0, 0.5)]);

        assert_eq!(stats, MergeStats { applied: 1, ignored: 0 });
        assert_eq!(store.records()[2], record("asset-2", 9.0, 0.5));
        assert!((store.records()[1].price - 101.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_identities_are_ignored() {
        let mut store = seeded(3);
        let before = store.records().to_vec();
        let stats = store.apply_batch(vec![record("ghost", 1.0, 1.0)]);

        assert_eq!(stats, MergeStats { applied: 0, ignored: 1 });
        assert_eq!(store.records(), before.as_slice());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn later_entry_wins_within_batch() {
        let mut store = seeded(2);
        store.apply_batch(vec![record("asset-1", 5.0, 0.1), record("asset-1", 6.0, 0.2)]);
        assert!((store.get("asset-1").unwrap().price - 6.0).abs() < f64::EPSILON);

        let mut scanned = seeded(2);
        let stats = scanned.apply_batch_scan(vec![
            record("asset-1", 5.0, 0.1),
            record("asset-1", 6.0, 0.2),
        ]);
        assert_eq!(stats.applied, 1);
        assert!((scanned.get("asset-1").unwrap().price - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn batch_on_empty_store_is_noop() {
        let mut store = EntityStore::new();
        let stats = store.apply_batch(vec![record("a", 1.0, 0.0)]);
        assert_eq!(stats.ignored, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_empties_store_and_index() {
        let mut store = seeded(3);
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("asset-0").is_none());
    }

    fn batch_strategy(n: usize) -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(
            (0..n + 5, 0.01f64..1_000.0, -1.5f64..1.5),
            0..40,
        )
        .prop_map(|entries| {
            entries
                .into_iter()
                .map(|(i, price, change)| record(&format!("asset-{i}"), price, change))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn merge_preserves_cardinality_and_order(n in 0usize..60, batch in batch_strategy(60)) {
            let original = seeded(n);
            let mut merged = original.clone();
            merged.apply_batch(batch);

            prop_assert_eq!(merged.len(), original.len());
            for (after, before) in merged.records().iter().zip(original.records()) {
                prop_assert_eq!(&after.id, &before.id);
            }
        }

        #[test]
        fn merge_writes_batch_values_and_leaves_others(n in 1usize..60, batch in batch_strategy(60)) {
            let original = seeded(n);
            let mut merged = original.clone();
            merged.apply_batch(batch.clone());

            let mut latest: HashMap<&str, &Record> = HashMap::new();
            for r in &batch {
                latest.insert(r.id.as_str(), r);
            }

            for before in original.records() {
                let after = merged.get(&before.id).unwrap();
                match latest.get(before.id.as_str()) {
                    Some(expected) => {
                        prop_assert_eq!(after, *expected);
                    }
                    None => {
                        prop_assert_eq!(after, before);
                    }
                }
            }
        }

        #[test]
        fn repeated_batch_is_idempotent(n in 0usize..60, batch in batch_strategy(60)) {
            let mut once = seeded(n);
            once.apply_batch(batch.clone());
            let mut twice = once.clone();
            twice.apply_batch(batch);

            prop_assert_eq!(once.records(), twice.records());
        }

        #[test]
        fn scan_and_index_merges_agree(n in 0usize..60, batch in batch_strategy(60)) {
            let mut indexed = seeded(n);
            let mut scanned = seeded(n);
            let indexed_stats = indexed.apply_batch(batch.clone());
            let scanned_stats = scanned.apply_batch_scan(batch);

            prop_assert_eq!(indexed.records(), scanned.records());
            prop_assert_eq!(indexed_stats.applied > 0, scanned_stats.applied > 0);
        }
    }
}
