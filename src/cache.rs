//! Per-dispatch memoization.

use std::collections::HashMap;
use std::hash::Hash;

/// Memoizes `key -> result` pairs for the lifetime of one event dispatch.
///
/// Caches live on [`RuntimeEventArgs`](crate::RuntimeEventArgs), never on the
/// objects being evaluated, so concurrent dispatches cannot observe each
/// other's results.
#[derive(Debug, Clone)]
pub struct EvaluationCache<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V: Copy> EvaluationCache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Returns the cached value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).copied()
    }

    /// Stores `value` for `key`, replacing any previous entry.
    pub fn set(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Returns the cached value or computes, stores and returns it.
    pub fn get_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> V {
        *self.entries.entry(key).or_insert_with(f)
    }

    /// Returns true if `key` has a cached value.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Eq + Hash, V: Copy> Default for EvaluationCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
