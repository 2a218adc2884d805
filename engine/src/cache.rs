//! Injected TTL cache for read endpoints.
//!
//! Lives entirely outside the engine's transactional boundary: the service
//! holds it next to the engine, never inside it. Time is passed in as
//! `now_ms`, matching the rest of the crate.

use std::collections::HashMap;
use std::hash::Hash;

pub struct TtlCache<K, V> {
    ttl_ms: u64,
    entries: HashMap<K, (V, u64)>,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V, now_ms: u64) {
        let expires_at = now_ms.saturating_add(self.ttl_ms);
        self.entries.insert(key, (value, expires_at));
    }

    pub fn get(&self, key: &K, now_ms: u64) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(_, expires_at)| now_ms < *expires_at)
            .map(|(value, _)| value)
    }

    /// Drop expired entries, returning how many were evicted.
    pub fn evict_expired(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| now_ms < *expires_at);
        before - self.entries.len()
    }

    /// Explicit full clear.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
