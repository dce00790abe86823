//! A string-keyed map safe under concurrent mutation and iteration,
//! backing the tools/prompts/resources collections.

use std::ops::ControlFlow;
use std::sync::Arc;

use dashmap::DashMap;

/// A concurrent, string-keyed registry of entries of type `V`.
///
/// Readers may iterate (`range`) concurrently with mutators (`store`/
/// `delete`); a concurrent mutation during iteration won't panic but may
/// or may not be reflected in a given pass.
#[derive(Debug)]
pub struct ConcurrentRegistry<V> {
    entries: DashMap<String, Arc<V>>,
}

impl<V> Default for ConcurrentRegistry<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> ConcurrentRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry at `key`. Returns the previous entry,
    /// if any, so callers can decide whether this was a fresh registration.
    pub fn store(&self, key: impl Into<String>, value: V) -> Option<Arc<V>> {
        self.entries.insert(key.into(), Arc::new(value))
    }

    pub fn load(&self, key: &str) -> Option<Arc<V>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn delete(&self, key: &str) -> Option<Arc<V>> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visit entries in unspecified order, stopping early if the visitor
    /// returns `ControlFlow::Break`.
    pub fn range(&self, mut visitor: impl FnMut(&str, &V) -> ControlFlow<()>) {
        for entry in self.entries.iter() {
            if visitor(entry.key(), entry.value()).is_break() {
                break;
            }
        }
    }

    /// A deterministic, lexicographically key-sorted snapshot of the
    /// registry, used by [`crate::pagination::paginate`].
    pub fn snapshot_sorted(&self) -> Vec<(String, Arc<V>)> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();

        keys.into_iter()
            .filter_map(|key| self.entries.get(&key).map(|e| (key, Arc::clone(e.value()))))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_sorted() {
        let registry = ConcurrentRegistry::new();
        registry.store("c", 3);
        registry.store("a", 1);
        registry.store("b", 2);

        let snapshot = registry.snapshot_sorted();
        let keys: Vec<_> = snapshot.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn delete_removes_entry() {
        let registry = ConcurrentRegistry::new();
        registry.store("a", 1);
        assert!(registry.delete("a").is_some());
        assert!(!registry.contains("a"));
    }

    #[test]
    fn range_stops_on_break() {
        let registry = ConcurrentRegistry::new();
        registry.store("a", 1);
        registry.store("b", 2);
        registry.store("c", 3);

        let mut visited = 0;
        registry.range(|_, _| {
            visited += 1;
            ControlFlow::Break(())
        });
        assert_eq!(visited, 1);
    }
}
