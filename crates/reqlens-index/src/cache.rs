//! Fixed-capacity LRU from entry-id to full entry record (component C3).

use lru::LruCache;
use reqlens_core::Entry;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Thread-safe LRU cache of full entry records, keyed by entry-id.
///
/// Serves body-level post-filters and describe-time body fetches without
/// re-querying upstream. Internally synchronized; callers never need their own
/// lock around it.
pub struct EntryCache {
    inner: Mutex<LruCache<String, Arc<Entry>>>,
}

impl EntryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn put(&self, entry: Arc<Entry>) {
        let mut cache = self.inner.lock().unwrap();
        cache.put(entry.id.clone(), entry);
    }

    pub fn get(&self, entry_id: &str) -> Option<Arc<Entry>> {
        let mut cache = self.inner.lock().unwrap();
        cache.get(entry_id).cloned()
    }

    pub fn contains(&self, entry_id: &str) -> bool {
        let cache = self.inner.lock().unwrap();
        cache.contains(entry_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqlens_core::types::Timings;

    fn entry(id: &str) -> Arc<Entry> {
        Arc::new(Entry {
            id: id.to_string(),
            url: "https://example.com/a".to_string(),
            http_version: "HTTP/1.1".to_string(),
            method: None,
            headers: vec![],
            body_b64: None,
            response: None,
            process: None,
            tls: None,
            h2: None,
            timings: Timings { started_at_ms: 0 },
        })
    }

    #[test]
    fn put_then_get_roundtrips() {
        let cache = EntryCache::new(2);
        cache.put(entry("e1"));
        assert!(cache.contains("e1"));
        assert_eq!(cache.get("e1").unwrap().id, "e1");
    }

    #[test]
    fn evicts_least_recently_used_beyond_capacity() {
        let cache = EntryCache::new(2);
        cache.put(entry("e1"));
        cache.put(entry("e2"));
        cache.put(entry("e3"));
        assert!(!cache.contains("e1"));
        assert!(cache.contains("e2"));
        assert!(cache.contains("e3"));
    }

    #[test]
    fn missing_key_returns_none() {
        let cache = EntryCache::new(2);
        assert!(cache.get("nope").is_none());
    }
}
