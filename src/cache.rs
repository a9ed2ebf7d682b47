//! Bounded memoization cache shared by the classifier and the analyzer.
//!
//! This is a performance device, not a correctness mechanism: everything
//! cached here is a pure function of its key and the (immutable) catalog,
//! so [`BoundedCache::clear`] can run at any time, even concurrently with
//! in-flight lookups, without changing observable results.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use crate::types::CacheStats;

/// Default capacity used when a configured capacity of 0 slips through.
const MIN_CAPACITY: usize = 16;

struct Slot<V> {
    value: V,
    last_used: u64,
}

struct Inner<K, V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<K, Slot<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// A fixed-capacity LRU cache with interior mutability.
///
/// Lookups clone the stored value out, so `V` should be cheap-ish to clone
/// (classifications and diagnostic results are small). Eviction is a linear
/// scan for the least-recently-used slot; capacities are small enough that
/// this never shows up in profiles.
pub struct BoundedCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity: capacity.max(MIN_CAPACITY),
                tick: 0,
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Look up `key`, bumping its recency on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.tick = inner.tick.wrapping_add(1);
        let tick = inner.tick;
        match inner.entries.get_mut(key) {
            Some(slot) => {
                slot.last_used = tick;
                inner.hits = inner.hits.saturating_add(1);
                Some(slot.value.clone())
            }
            None => {
                inner.misses = inner.misses.saturating_add(1);
                None
            }
        }
    }

    /// Insert or replace `key`, evicting the least-recently-used entry if
    /// the cache is full.
    pub fn insert(&self, key: K, value: V) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.tick = inner.tick.wrapping_add(1);
        let tick = inner.tick;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= inner.capacity {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest);
                inner.evictions = inner.evictions.saturating_add(1);
            }
        }

        inner.entries.insert(
            key,
            Slot {
                value,
                last_used: tick,
            },
        );
    }

    /// Drop all entries. Counters survive so observability keeps a history.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            capacity: inner.capacity,
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        // A panic while holding the lock leaves only cache bookkeeping
        // behind; recovering the guard is safe.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
