//! In-memory store of the entry-ids that made up the most recent extraction
//! for each `(session, cluster_id)`, so the describe engine (C9) can look a
//! cluster back up by id without re-running extraction.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct ClusterStore {
    inner: Mutex<HashMap<(String, String), Vec<String>>>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, session_id: &str, cluster_id: &str, entry_ids: Vec<String>) {
        self.inner
            .lock()
            .unwrap()
            .insert((session_id.to_string(), cluster_id.to_string()), entry_ids);
    }

    pub fn get(&self, session_id: &str, cluster_id: &str) -> Option<Vec<String>> {
        self.inner
            .lock()
            .unwrap()
            .get(&(session_id.to_string(), cluster_id.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let store = ClusterStore::new();
        store.put("s1", "abc123", vec!["e1".to_string(), "e2".to_string()]);
        assert_eq!(store.get("s1", "abc123"), Some(vec!["e1".to_string(), "e2".to_string()]));
    }

    #[test]
    fn different_session_does_not_collide() {
        let store = ClusterStore::new();
        store.put("s1", "abc123", vec!["e1".to_string()]);
        assert_eq!(store.get("s2", "abc123"), None);
    }
}
