use std::collections::HashMap;
use std::collections::VecDeque;

use geo_core::time::{DurationMs, TimeMs};

use crate::stats::CacheStats;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    timestamp: TimeMs,
}

/// Memoizes one logical value per key with expiry and bounded size.
///
/// Eviction is FIFO by insertion order, not LRU: capacity (tens of entries)
/// comfortably exceeds the working set of a handful of logical keys per
/// upstream service, so recency tracking would buy nothing.
///
/// Expiry is lazy: a stale entry is deleted on the read that observes it,
/// never swept proactively. An entry is readable only while
/// `now - timestamp <= max_age`.
///
/// The insertion order lives in an explicit `VecDeque` rather than relying on
/// any map iteration-order guarantee.
#[derive(Debug)]
pub struct TimeBoundedCache<T> {
    capacity: usize,
    max_age: DurationMs,
    entries: HashMap<String, CacheEntry<T>>,
    order: VecDeque<String>,
    stats: CacheStats,
}

impl<T> TimeBoundedCache<T> {
    pub fn new(capacity: usize, max_age: DurationMs) -> Self {
        Self {
            capacity: capacity.max(1),
            max_age,
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    /// Inserts or replaces the value for `key`. Always succeeds.
    ///
    /// Replacing an existing key keeps its insertion position. A new key at
    /// capacity evicts the single oldest-inserted entry first.
    pub fn set(&mut self, key: impl Into<String>, value: T, now: TimeMs) {
        let key = key.into();
        let entry = CacheEntry {
            data: value,
            timestamp: now,
        };

        if self.entries.contains_key(&key) {
            self.entries.insert(key, entry);
            return;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
    }

    /// Returns the fresh value for `key`, or None.
    ///
    /// A stale entry is deleted here and reads as absent; a second read of
    /// the same key stays absent (idempotent expiry).
    pub fn get(&mut self, key: &str, now: TimeMs) -> Option<&T> {
        let stale = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => now.elapsed_since(entry.timestamp) > self.max_age,
        };

        if stale {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            return None;
        }

        self.stats.hits += 1;
        self.entries.get(key).map(|entry| &entry.data)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
