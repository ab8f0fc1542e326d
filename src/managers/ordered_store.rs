//! Ordered keyed store.
//!
//! Holds a keyed record set together with an explicit, independently mutable
//! display order of those keys. Both live behind a single readers-writer lock so
//! the record/order bijection can be enforced: every key in the order has exactly
//! one record and every record has exactly one position.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use parking_lot::RwLock;
use tracing::error;

use crate::types::errors::{InvariantViolation, OrderError};

/// The (records, order) pair guarded by an [`OrderedKeyedStore`].
///
/// Only reachable through [`OrderedKeyedStore::read_locked`] and
/// [`OrderedKeyedStore::write_locked`]. Every mutating method keeps records and
/// order in step.
#[derive(Debug)]
pub struct OrderedEntries<K, V> {
    records: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> OrderedEntries<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.records.get(key)
    }

    /// Keys in display order.
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    /// Records in no particular order. Cheaper than [`iter`](Self::iter) for aggregates.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.records.values()
    }

    /// Entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order
            .iter()
            .filter_map(move |key| self.records.get(key).map(|value| (key, value)))
    }

    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.order.iter().position(|k| k == key)
    }

    pub fn insert_at_head(&mut self, key: K, value: V) -> Result<(), OrderError> {
        self.insert_at(0, key, value)
    }

    pub fn push_back(&mut self, key: K, value: V) -> Result<(), OrderError> {
        let len = self.order.len();
        self.insert_at(len, key, value)
    }

    /// Inserts a new entry so that it ends up at `index` (`0..=len`).
    pub fn insert_at(&mut self, index: usize, key: K, value: V) -> Result<(), OrderError> {
        if self.records.contains_key(&key) {
            return Err(OrderError::DuplicateKey(format!("{:?}", key)));
        }
        if index > self.order.len() {
            return Err(OrderError::OutOfRange {
                index,
                len: self.order.len(),
            });
        }

        self.order.insert(index, key.clone());
        self.records.insert(key, value);
        Ok(())
    }

    /// Swaps in a new value for an existing key, keeping its position.
    /// Returns the previous value, or `None` (and stores nothing) if the key is absent.
    pub fn replace(&mut self, key: &K, value: V) -> Option<V> {
        let slot = self.records.get_mut(key)?;
        Some(std::mem::replace(slot, value))
    }

    /// Removes an entry from both the records and the order.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.records.remove(key)?;
        if let Some(index) = self.index_of(key) {
            self.order.remove(index);
        }
        Some(value)
    }

    /// Moves the entry at `from` so that it ends up at `to`. Both must be `< len`.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<(), OrderError> {
        let len = self.order.len();
        for index in [from, to] {
            if index >= len {
                return Err(OrderError::OutOfRange { index, len });
            }
        }

        let key = self.order.remove(from);
        self.order.insert(to, key);
        Ok(())
    }

    /// Drops every entry for which `keep` returns false. Returns the removed
    /// keys in display order.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<K>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let removed: Vec<K> = self
            .iter()
            .filter(|(key, value)| !keep(key, value))
            .map(|(key, _)| key.clone())
            .collect();

        if removed.is_empty() {
            return removed;
        }

        let removed_set: HashSet<&K> = removed.iter().collect();
        self.order.retain(|key| !removed_set.contains(key));
        self.records.retain(|key, _| !removed_set.contains(key));
        removed
    }

    /// Removes everything. Returns the removed keys in display order.
    pub fn clear(&mut self) -> Vec<K> {
        self.records.clear();
        std::mem::take(&mut self.order)
    }

    /// Verifies that the order is a duplicate-free permutation of the record keys.
    pub fn check_consistency(&self) -> Result<(), InvariantViolation> {
        if self.records.len() != self.order.len() {
            return Err(InvariantViolation::SizeMismatch {
                records: self.records.len(),
                order: self.order.len(),
            });
        }

        let mut seen = HashSet::with_capacity(self.order.len());
        for key in &self.order {
            if !self.records.contains_key(key) {
                return Err(InvariantViolation::DanglingKey(format!("{:?}", key)));
            }
            if !seen.insert(key) {
                return Err(InvariantViolation::DuplicateKey(format!("{:?}", key)));
            }
        }

        Ok(())
    }
}

/// Concurrency-safe ordered keyed store.
///
/// Readers run concurrently; writers are exclusive. When invariant checking is
/// enabled, every write section is followed by a consistency check and a
/// violation panics instead of being repaired.
#[derive(Debug)]
pub struct OrderedKeyedStore<K, V> {
    entries: RwLock<OrderedEntries<K, V>>,
    check_invariants: bool,
}

impl<K, V> OrderedKeyedStore<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(check_invariants: bool) -> Self {
        Self {
            entries: RwLock::new(OrderedEntries::new()),
            check_invariants,
        }
    }

    /// Runs `f` against a consistent, read-locked view.
    pub fn read_locked<R>(&self, f: impl FnOnce(&OrderedEntries<K, V>) -> R) -> R {
        let guard = self.entries.read();
        f(&guard)
    }

    /// Runs `f` with exclusive access and returns whatever it returns.
    ///
    /// # Panics
    /// Panics if invariant checking is enabled and `f` left the store inconsistent.
    pub fn write_locked<R>(&self, f: impl FnOnce(&mut OrderedEntries<K, V>) -> R) -> R {
        let mut guard = self.entries.write();
        let result = f(&mut guard);

        if self.check_invariants {
            if let Err(violation) = guard.check_consistency() {
                error!(%violation, "ordered store invariant violated");
                drop(guard);
                panic!("ordered store invariant violated: {}", violation);
            }
        }

        result
    }

    /// Checks the record/order bijection under the read lock.
    pub fn assert_consistent(&self) -> Result<(), InvariantViolation> {
        self.read_locked(|entries| entries.check_consistency())
    }

    pub fn move_entry(&self, from: usize, to: usize) -> Result<(), OrderError> {
        self.write_locked(|entries| entries.move_entry(from, to))
    }

    pub fn len(&self) -> usize {
        self.read_locked(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.read_locked(|entries| entries.is_empty())
    }
}
