// Versioned (table, model, matrix) bundle and the slot readers share it through
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::recommend::{recommend, Recommendation};
use crate::record::RecordTable;
use crate::tfidf::{fit, DocumentTermMatrix, TfidfModel};

/// One fitted generation. Never mutated after construction.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    table: RecordTable,
    model: TfidfModel,
    matrix: DocumentTermMatrix,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    /// Fit a model over `table` and bundle the three together.
    pub fn build(table: RecordTable, generation: u64) -> Self {
        let (model, matrix) = fit(&table);
        debug_assert_eq!(matrix.n_rows(), table.len());
        Self {
            generation,
            table,
            model,
            matrix,
            built_at: Utc::now(),
        }
    }

    /// Generation 0: no records.
    pub fn empty() -> Self {
        Self::build(RecordTable::default(), 0)
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn table(&self) -> &RecordTable {
        &self.table
    }

    #[inline]
    pub fn model(&self) -> &TfidfModel {
        &self.model
    }

    #[inline]
    pub fn matrix(&self) -> &DocumentTermMatrix {
        &self.matrix
    }

    #[inline]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Recommend against this generation only.
    pub fn recommend(&self, query: &str, top_n: usize) -> Vec<Recommendation> {
        recommend(query, &self.model, &self.matrix, &self.table, top_n)
    }
}

/// The single slot holding the current [`Snapshot`].
///
/// Readers clone the `Arc` and keep working on it no matter how many
/// publishes happen meanwhile. The lock is only held for the pointer copy.
pub struct SnapshotHandle {
    current: RwLock<Arc<Snapshot>>,
    // highest generation handed out to a builder
    issued: AtomicU64,
}

impl SnapshotHandle {
    pub fn new(initial: Snapshot) -> Self {
        let issued = AtomicU64::new(initial.generation);
        Self {
            current: RwLock::new(Arc::new(initial)),
            issued,
        }
    }

    /// Reserve the generation number for a build that is about to start.
    /// A build that starts later always gets a higher number, so when two
    /// builds race the one that read the store last wins.
    #[inline]
    pub fn next_generation(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Swap in `snapshot` unless a newer generation is already published.
    /// Returns whether the swap happened.
    pub fn publish(&self, snapshot: Snapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        let mut current = self.current.write();
        if snapshot.generation < current.generation {
            tracing::debug!(
                stale = snapshot.generation,
                current = current.generation,
                "Dropping stale snapshot"
            );
            return false;
        }
        self.issued.fetch_max(snapshot.generation, Ordering::AcqRel);
        *current = snapshot;
        true
    }
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DesignRecord;

    fn table(n: usize) -> RecordTable {
        (0..n)
            .map(|i| DesignRecord::new(format!("R{i}"), "사출금형", format!("부품{i}")))
            .collect()
    }

    #[test]
    fn test_build_aligns_matrix_with_table() {
        for n in [0, 1, 5, 40] {
            let snap = Snapshot::build(table(n), 1);
            assert_eq!(snap.matrix().n_rows(), snap.len());
        }
    }

    #[test]
    fn test_publish_replaces_whole_bundle() {
        let handle = SnapshotHandle::default();
        let before = handle.current();
        assert_eq!(before.generation(), 0);
        assert!(before.is_empty());

        assert!(handle.publish(Snapshot::build(table(3), 1)));
        let after = handle.current();
        assert_eq!(after.generation(), 1);
        assert_eq!(after.len(), 3);
        assert_eq!(after.matrix().n_rows(), 3);

        // readers holding the old Arc are unaffected
        assert!(before.is_empty());
        assert_eq!(before.matrix().n_rows(), 0);
    }

    #[test]
    fn test_stale_publish_is_ignored() {
        let handle = SnapshotHandle::new(Snapshot::build(table(2), 5));
        assert!(!handle.publish(Snapshot::build(table(9), 4)));
        assert_eq!(handle.generation(), 5);
        assert_eq!(handle.current().len(), 2);
    }

    #[test]
    fn test_next_generation_is_monotonic() {
        let handle = SnapshotHandle::new(Snapshot::build(table(1), 3));
        assert_eq!(handle.next_generation(), 4);
        assert_eq!(handle.next_generation(), 5);
        // issuing does not publish
        assert_eq!(handle.generation(), 3);
    }

    #[test]
    fn test_concurrent_readers_see_consistent_generations() {
        let handle = Arc::new(SnapshotHandle::default());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = handle.current();
                        assert_eq!(snap.matrix().n_rows(), snap.table().len());
                        let results = snap.recommend("사출금형 부품1", 5);
                        assert!(results.len() <= 5);
                        assert!(results.iter().all(|r| r.row < snap.len()));
                    }
                })
            })
            .collect();

        for generation in 1..=20 {
            handle.publish(Snapshot::build(table(generation as usize), generation));
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(handle.generation(), 20);
    }
}
