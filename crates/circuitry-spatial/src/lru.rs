//! Recency tracking for chunk eviction.

use std::collections::BTreeMap;

/// Orders keys by the time they were last touched.
///
/// Each touch stamps the key with a fresh, strictly increasing counter, so
/// iteration from the smallest stamp visits keys least-recently-used first.
/// Deterministic: no wall-clock time is involved.
#[derive(Debug, Clone)]
pub struct RecencyTracker<K: Ord + Copy> {
    stamps: BTreeMap<K, u64>,
    order: BTreeMap<u64, K>,
    next_stamp: u64,
}

impl<K: Ord + Copy> Default for RecencyTracker<K> {
    fn default() -> Self {
        Self {
            stamps: BTreeMap::new(),
            order: BTreeMap::new(),
            next_stamp: 0,
        }
    }
}

impl<K: Ord + Copy> RecencyTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as most recently used.
    pub fn touch(&mut self, key: K) {
        if let Some(old) = self.stamps.insert(key, self.next_stamp) {
            self.order.remove(&old);
        }
        self.order.insert(self.next_stamp, key);
        self.next_stamp += 1;
    }

    /// Forget `key`. Returns `false` if it was not tracked.
    pub fn remove(&mut self, key: K) -> bool {
        match self.stamps.remove(&key) {
            Some(stamp) => {
                self.order.remove(&stamp);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: K) -> bool {
        self.stamps.contains_key(&key)
    }

    /// Keys from least to most recently used.
    pub fn oldest_first(&self) -> impl Iterator<Item = K> + '_ {
        self.order.values().copied()
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
        self.next_stamp = 0;
    }
}
