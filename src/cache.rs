//! Process-local value cache.

use std::collections::HashMap;

use parking_lot::RwLock;

/// String-keyed cache of raw stored values.
///
/// Implementations must be safe to call from several tasks at once.
pub trait Cache: Send + Sync + std::fmt::Debug {
    /// Cached value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Inserts or replaces the value for `key`.
    fn set(&self, key: &str, value: &str);

    /// Replaces the value for `key` only if one is already cached, as a
    /// single step with respect to concurrent [`Cache::delete`] calls.
    /// Returns whether a value was replaced.
    fn set_if_present(&self, key: &str, value: &str) -> bool;

    /// Removes `key`. Absent keys are ignored.
    fn delete(&self, key: &str);
}

/// Unbounded map behind a reader-writer lock.
///
/// Reads run concurrently; a write excludes everything else. Entries leave
/// only through [`Cache::delete`] or when the cache is dropped.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn set_if_present(&self, key: &str, value: &str) -> bool {
        match self.entries.write().get_mut(key) {
            Some(entry) => {
                value.clone_into(entry);
                true
            }
            None => false,
        }
    }

    fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_get_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k"), None);
        cache.set("k", "v1");
        cache.set("k", "v2");
        assert_eq!(cache.get("k").as_deref(), Some("v2"));
        cache.delete("k");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("k{t}-{i}");
                        cache.set(&key, "v");
                        assert_eq!(cache.get(&key).as_deref(), Some("v"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 800);
    }

    #[test]
    fn test_set_if_present_never_inserts() {
        let cache = MemoryCache::new();
        assert!(!cache.set_if_present("k", "v"));
        assert!(!cache.contains("k"));

        cache.set("k", "old");
        assert!(cache.set_if_present("k", "new"));
        assert_eq!(cache.get("k").as_deref(), Some("new"));

        cache.delete("k");
        assert!(!cache.set_if_present("k", "newer"));
        assert!(cache.is_empty());
    }
}
