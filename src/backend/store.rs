//! Signal store: bounded per-column time series shared with the viewer
//!
//! The store is the only mutable state shared between the ingestion worker
//! and the UI. It is a cloneable handle over an `RwLock`:
//!
//! - the ingestion worker is the single writer ([`SignalStore::append`],
//!   [`SignalStore::reset`], [`SignalStore::clear`]);
//! - everyone else reads copies ([`SignalStore::snapshot`],
//!   [`SignalStore::snapshot_all`]).
//!
//! A row is appended to every column inside one write critical section, so a
//! reader never sees buffers of different lengths. Snapshots are owned copies,
//! so later evictions cannot invalidate them.
//!
//! # Memory Management
//!
//! Each column is a ring buffer of at most `capacity` samples; the oldest
//! sample is evicted first.

use crate::error::{Result, ScopeError};
use crate::types::{IncrementalStats, Sample, Schema, DEFAULT_CAPACITY};
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Smallest capacity the store accepts
pub const MIN_CAPACITY: usize = 2;

/// Running statistics over the retained window of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: u64,
}

/// Ring buffer of one column
#[derive(Debug)]
struct SignalBuffer {
    samples: VecDeque<Sample>,
    stats: IncrementalStats,
}

impl SignalBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            stats: IncrementalStats::new(),
        }
    }

    fn push(&mut self, sample: Sample, capacity: usize) {
        self.stats.push(sample.value);

        let mut extreme_evicted = false;
        if self.samples.len() >= capacity {
            if let Some(old) = self.samples.pop_front() {
                self.stats.pop(old.value);
                extreme_evicted = old.value <= self.stats.min || old.value >= self.stats.max;
            }
        }
        self.samples.push_back(sample);

        // min/max may name a sample that left the window
        if extreme_evicted {
            self.stats.recalculate_minmax(&self.samples);
        }
    }

    fn stats(&self) -> ColumnStats {
        let (min, max, mean) = self.stats.as_tuple();
        ColumnStats {
            min,
            max,
            mean,
            count: self.stats.count,
        }
    }
}

#[derive(Debug)]
struct StoreInner {
    schema: Schema,
    buffers: Vec<SignalBuffer>,
    capacity: usize,
    /// Bumped on every reset so readers can detect a new schema/session
    generation: u64,
    /// Index assigned to the next appended row
    next_index: u64,
}

impl StoreInner {
    fn install(&mut self, schema: Schema) {
        self.buffers = (0..schema.arity())
            .map(|_| SignalBuffer::new(self.capacity))
            .collect();
        self.schema = schema;
        self.generation += 1;
        self.next_index = 0;
    }
}

/// Owned copy of every column at one instant
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// Store generation the copy was taken from
    pub generation: u64,
    pub schema: Schema,
    /// One sample vector per schema column, all of the same length
    pub columns: Vec<Vec<Sample>>,
    /// Rows appended since the last reset (including evicted ones)
    pub total_rows: u64,
}

impl StoreSnapshot {
    /// Samples of a column by name
    pub fn column(&self, name: &str) -> Option<&[Sample]> {
        self.schema
            .index_of(name)
            .and_then(|i| self.columns.get(i))
            .map(Vec::as_slice)
    }

    /// Number of retained rows
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared handle to the per-column ring buffers
#[derive(Debug, Clone)]
pub struct SignalStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SignalStore {
    /// Create an empty store keeping at most `capacity` samples per column
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                schema: Schema::default(),
                buffers: Vec::new(),
                capacity: capacity.max(MIN_CAPACITY),
                generation: 0,
                next_index: 0,
            })),
        }
    }

    // Every critical section leaves the store consistent, so a poisoned lock is safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one row: one sample per column, sharing `index` and `elapsed`.
    ///
    /// Returns the row index. A slice of the wrong length is rejected without
    /// touching any buffer.
    pub fn append(&self, values: &[f64], elapsed: Duration) -> Result<u64> {
        let mut inner = self.write();
        let expected = inner.schema.arity();
        if expected == 0 || values.len() != expected {
            return Err(ScopeError::Arity {
                expected,
                actual: values.len(),
            });
        }

        let index = inner.next_index;
        let capacity = inner.capacity;
        for (buffer, &value) in inner.buffers.iter_mut().zip(values) {
            buffer.push(Sample::new(index, elapsed, value), capacity);
        }
        inner.next_index += 1;
        Ok(index)
    }

    /// Discard all buffers and allocate fresh ones for `schema`
    pub fn reset(&self, schema: Schema) {
        self.write().install(schema);
    }

    /// Discard all buffers and the schema
    pub fn clear(&self) {
        self.write().install(Schema::default());
    }

    /// Copy of one column, or `None` if the column is unknown
    pub fn snapshot(&self, column: &str) -> Option<Vec<Sample>> {
        let inner = self.read();
        let i = inner.schema.index_of(column)?;
        Some(inner.buffers[i].samples.iter().copied().collect())
    }

    /// Copy of every column, taken under a single read lock
    pub fn snapshot_all(&self) -> StoreSnapshot {
        let inner = self.read();
        StoreSnapshot {
            generation: inner.generation,
            schema: inner.schema.clone(),
            columns: inner
                .buffers
                .iter()
                .map(|b| b.samples.iter().copied().collect())
                .collect(),
            total_rows: inner.next_index,
        }
    }

    /// Running statistics of one column
    pub fn column_stats(&self, column: &str) -> Option<ColumnStats> {
        let inner = self.read();
        let i = inner.schema.index_of(column)?;
        Some(inner.buffers[i].stats())
    }

    pub fn schema(&self) -> Schema {
        self.read().schema.clone()
    }

    /// Number of retained rows (identical for every column)
    pub fn len(&self) -> usize {
        self.read().buffers.first().map_or(0, |b| b.samples.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Rows appended since the last reset
    pub fn total_rows(&self) -> u64 {
        self.read().next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    fn store_with(columns: &str, capacity: usize) -> SignalStore {
        let store = SignalStore::new(capacity);
        store.reset(Schema::from_header(columns));
        store
    }

    #[test]
    fn test_append_fills_every_column() {
        let store = store_with("AccX,AccY,Temp", 100);
        assert_eq!(store.append(&[1.0, 2.0, 25.0], Duration::from_millis(1)).unwrap(), 0);
        assert_eq!(store.append(&[1.5, 2.5, 26.0], Duration::from_millis(2)).unwrap(), 1);

        let temp = store.snapshot("Temp").unwrap();
        assert_eq!(temp.iter().map(|s| s.value).collect::<Vec<_>>(), vec![25.0, 26.0]);
        assert_eq!(temp[1].index, 1);
        assert_eq!(temp[1].elapsed, Duration::from_millis(2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_rows(), 2);
    }

    #[test]
    fn test_wrong_arity_leaves_buffers_untouched() {
        let store = store_with("A,B", 10);
        store.append(&[1.0, 2.0], Duration::ZERO).unwrap();

        let err = store.append(&[1.0], Duration::ZERO).unwrap_err();
        assert!(matches!(err, ScopeError::Arity { expected: 2, actual: 1 }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_rows(), 1);
    }

    #[test]
    fn test_append_without_schema_is_rejected() {
        let store = SignalStore::new(10);
        assert!(store.append(&[], Duration::ZERO).is_err());
        assert!(store.append(&[1.0], Duration::ZERO).is_err());
    }

    #[test]
    fn test_ring_eviction() {
        let store = store_with("v", 4);
        for i in 0..10 {
            store.append(&[i as f64], Duration::ZERO).unwrap();
        }
        let values: Vec<f64> = store.snapshot("v").unwrap().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(store.total_rows(), 10);
    }

    #[test]
    fn test_snapshot_survives_eviction() {
        let store = store_with("v", 3);
        for i in 0..3 {
            store.append(&[i as f64], Duration::ZERO).unwrap();
        }
        let held = store.snapshot("v").unwrap();
        for i in 3..6 {
            store.append(&[i as f64], Duration::ZERO).unwrap();
        }
        assert_eq!(held.iter().map(|s| s.value).collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_reset_discards_history_and_bumps_generation() {
        let store = store_with("A,B,C", 10);
        store.append(&[1.0, 2.0, 3.0], Duration::ZERO).unwrap();
        let generation = store.generation();

        store.reset(Schema::from_header("D,E"));
        assert_eq!(store.schema().columns(), &["D", "E"]);
        assert!(store.is_empty());
        assert_eq!(store.total_rows(), 0);
        assert!(store.snapshot("A").is_none());
        assert_eq!(store.generation(), generation + 1);

        store.clear();
        assert!(store.schema().is_empty());
    }

    #[test]
    fn test_column_stats() {
        let store = store_with("v", 100);
        for i in 1..=10 {
            store.append(&[i as f64], Duration::ZERO).unwrap();
        }
        let stats = store.column_stats("v").unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
        assert!((stats.mean - 5.5).abs() < 1e-9);
        assert_eq!(stats.count, 10);
        assert!(store.column_stats("missing").is_none());
    }

    #[test]
    fn test_column_stats_follow_window_after_extremes_leave() {
        let store = store_with("v", 4);
        for value in [100.0, -100.0, 1.0, 2.0, 3.0, 4.0] {
            store.append(&[value], Duration::ZERO).unwrap();
        }
        let stats = store.column_stats("v").unwrap();
        assert_eq!((stats.min, stats.max), (1.0, 4.0));
        assert!((stats.mean - 2.5).abs() < 1e-9);
        assert_eq!(stats.count, 4);

        // Evicting a non-extreme value keeps the current bounds
        store.append(&[0.5], Duration::ZERO).unwrap();
        let stats = store.column_stats("v").unwrap();
        assert_eq!((stats.min, stats.max), (0.5, 4.0));
    }

    #[test]
    fn test_snapshot_all_by_name() {
        let store = store_with("x,y", 10);
        store.append(&[1.0, 10.0], Duration::ZERO).unwrap();
        let snapshot = store.snapshot_all();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.column("y").unwrap()[0].value, 10.0);
        assert!(snapshot.column("z").is_none());
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_rows() {
        let store = store_with("a,b,c,d", 64);
        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..5_000 {
                    let v = i as f64;
                    store.append(&[v, v, v, v], Duration::ZERO).unwrap();
                }
            })
        };

        for _ in 0..500 {
            let snapshot = store.snapshot_all();
            let len = snapshot.len();
            for column in &snapshot.columns {
                assert_eq!(column.len(), len);
            }
            for i in 0..len {
                let index = snapshot.columns[0][i].index;
                assert!(snapshot.columns.iter().all(|c| c[i].index == index));
            }
        }
        writer.join().unwrap();
        assert_eq!(store.total_rows(), 5_000);
    }

    proptest! {
        #[test]
        fn test_buffers_stay_aligned(
            rows in prop::collection::vec(prop::collection::vec(-1.0e3f64..1.0e3, 3), 0..200),
            capacity in 2usize..64
        ) {
            let store = store_with("a,b,c", capacity);
            for (i, row) in rows.iter().enumerate() {
                store.append(row, Duration::from_millis(i as u64)).unwrap();
            }

            let snapshot = store.snapshot_all();
            prop_assert!(snapshot.len() <= capacity);
            prop_assert_eq!(snapshot.len(), rows.len().min(capacity));
            for i in 0..snapshot.len() {
                let first = snapshot.columns[0][i];
                for column in &snapshot.columns {
                    prop_assert_eq!(column[i].index, first.index);
                    prop_assert_eq!(column[i].elapsed, first.elapsed);
                }
            }
        }

        #[test]
        fn test_column_stats_match_window(
            values in prop::collection::vec(-1.0e3f64..1.0e3, 1..200),
            capacity in 2usize..32
        ) {
            let store = store_with("v", capacity);
            for value in &values {
                store.append(&[*value], Duration::ZERO).unwrap();
            }

            let window = &values[values.len().saturating_sub(capacity)..];
            let min = window.iter().copied().fold(f64::MAX, f64::min);
            let max = window.iter().copied().fold(f64::MIN, f64::max);
            let stats = store.column_stats("v").unwrap();
            prop_assert_eq!(stats.min, min);
            prop_assert_eq!(stats.max, max);
            prop_assert_eq!(stats.count, window.len() as u64);
        }
    }
}
