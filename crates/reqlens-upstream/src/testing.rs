//! An in-memory [`UpstreamClient`] used across the workspace's test suites so
//! refresher/search/cluster/flow tests don't need a live capture daemon.

use crate::client::UpstreamClient;
use async_trait::async_trait;
use reqlens_core::{Entry, Error, Result, SessionInfo};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct FakeUpstreamClient {
    sessions: Mutex<HashMap<String, SessionInfo>>,
    entries: Mutex<HashMap<(String, String), Entry>>,
}

impl FakeUpstreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_session(&self, session: SessionInfo) {
        self.sessions.lock().unwrap().insert(session.id.clone(), session);
    }

    pub fn put_entry(&self, session_id: &str, entry: Entry) {
        self.entries
            .lock()
            .unwrap()
            .insert((session_id.to_string(), entry.id.clone()), entry);
    }

    /// Update a session's `entry_ids` list in place, e.g. to simulate new
    /// entries arriving between refreshes.
    pub fn set_entry_ids(&self, session_id: &str, entry_ids: Vec<String>) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id) {
            session.entry_ids = entry_ids;
        }
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstreamClient {
    async fn list_sessions(&self, _cancel: &CancellationToken) -> Result<Vec<SessionInfo>> {
        Ok(self.sessions.lock().unwrap().values().cloned().collect())
    }

    async fn get_session(&self, session_id: &str, _cancel: &CancellationToken) -> Result<SessionInfo> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
    }

    async fn get_entry(
        &self,
        session_id: &str,
        entry_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Entry> {
        self.entries
            .lock()
            .unwrap()
            .get(&(session_id.to_string(), entry_id.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))
    }
}
