//! Compute-once cache of synthesized types
//!
//! Each key maps to a shared cell. The shard lock is held only long enough to
//! fetch or create the cell; generation runs on the cell, so concurrent
//! first-time lookups of one key wait for a single generator while other keys
//! proceed independently.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::model::ClassId;

/// Thread-safe cache keyed by class
pub struct TypeCache<T> {
    entries: DashMap<ClassId, Arc<OnceCell<Arc<T>>>>,
}

impl<T> TypeCache<T> {
    /// Create a new empty type cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Look up a generated value
    pub fn find(&self, key: ClassId) -> Option<Arc<T>> {
        self.entries
            .get(&key)
            .and_then(|cell| cell.get().cloned())
    }

    /// Return the cached value, generating it on first use
    ///
    /// A failed generation stores nothing; the next call retries.
    pub fn find_or_insert<E, F>(&self, key: ClassId, generate: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(found) = self.find(key) {
            return Ok(found);
        }
        let cell = Arc::clone(&*self.entries.entry(key).or_default());
        cell.get_or_try_init(|| generate().map(Arc::new))
            .map(Arc::clone)
    }

    /// Number of generated entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for TypeCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypeCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_generates_once() {
        let cache = TypeCache::new();
        let key = ClassId::next();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .find_or_insert::<(), _>(key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_leaves_key_empty() {
        let cache: TypeCache<u32> = TypeCache::new();
        let key = ClassId::next();

        assert!(cache.find_or_insert(key, || Err("nope")).is_err());
        assert!(cache.find(key).is_none());
        assert!(cache.is_empty());

        let value = cache.find_or_insert::<&str, _>(key, || Ok(7)).unwrap();
        assert_eq!(*value, 7);
    }

    #[test]
    fn test_concurrent_first_lookup() {
        let cache = Arc::new(TypeCache::new());
        let key = ClassId::next();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .find_or_insert::<(), _>(key, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            Ok(String::from("generated"))
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn test_distinct_keys() {
        let cache = TypeCache::new();
        let a = cache.find_or_insert::<(), _>(ClassId::next(), || Ok(1)).unwrap();
        let b = cache.find_or_insert::<(), _>(ClassId::next(), || Ok(2)).unwrap();
        assert_ne!(*a, *b);
        assert_eq!(cache.len(), 2);
    }
}
