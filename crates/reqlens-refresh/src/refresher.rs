//! On-demand and background refresh of the index from the upstream capture
//! daemon (component C5).

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use reqlens_core::{Error, Result};
use reqlens_index::{Indexer, SessionState};
use reqlens_upstream::UpstreamClient;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The subset of [`reqlens_core::Config`] the refresher needs.
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    pub freshness_threshold: Duration,
    pub refresh_interval: Duration,
    pub refresh_timeout: Duration,
    pub bootstrap_tail_limit: usize,
    pub fetch_workers: usize,
}

impl From<&reqlens_core::Config> for RefresherConfig {
    fn from(cfg: &reqlens_core::Config) -> Self {
        Self {
            freshness_threshold: cfg.freshness_threshold,
            refresh_interval: cfg.refresh_interval,
            refresh_timeout: cfg.refresh_timeout,
            bootstrap_tail_limit: cfg.bootstrap_tail_limit,
            fetch_workers: cfg.fetch_workers,
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Arc<std::result::Result<SessionState, String>>>>;

struct Inflight {
    generation: u64,
    fut: SharedRefresh,
}

/// Whether a session should be rebuilt from the tail or can be synced by
/// appending only the entries observed since the last refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Rebuild,
    AppendOnly,
}

fn choose_strategy(prior: Option<&SessionState>, new_ids: &[String]) -> Strategy {
    let Some(prior) = prior else {
        return Strategy::Rebuild;
    };
    if prior.last_entry_ids_len == 0 {
        return Strategy::AppendOnly;
    }
    if new_ids.len() < prior.last_entry_ids_len {
        return Strategy::Rebuild;
    }
    let tail_index = prior.last_entry_ids_len - 1;
    match (&prior.last_tail_entry_id, new_ids.get(tail_index)) {
        (Some(recorded), Some(current)) if recorded == current => Strategy::AppendOnly,
        _ => Strategy::Rebuild,
    }
}

/// Drives on-demand refreshes, singleflighted per session, plus an optional
/// background refresh loop.
pub struct Refresher {
    indexer: Arc<Indexer>,
    upstream: Arc<dyn UpstreamClient>,
    config: RefresherConfig,
    inflight: Mutex<HashMap<String, Inflight>>,
    next_generation: AtomicU64,
}

impl Refresher {
    pub fn new(indexer: Arc<Indexer>, upstream: Arc<dyn UpstreamClient>, config: RefresherConfig) -> Self {
        Self {
            indexer,
            upstream,
            config,
            inflight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Refresh `session_id` now, deduplicating concurrent callers for the
    /// same session onto a single in-flight fetch.
    pub async fn refresh_session(&self, session_id: &str) -> Result<SessionState> {
        let (shared, generation) = {
            let mut inflight = self.inflight.lock().unwrap();
            if let Some(existing) = inflight.get(session_id) {
                (existing.fut.clone(), existing.generation)
            } else {
                let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
                let indexer = self.indexer.clone();
                let upstream = self.upstream.clone();
                let config = self.config.clone();
                let session_id_owned = session_id.to_string();
                let fut: BoxFuture<'static, Arc<std::result::Result<SessionState, String>>> =
                    async move {
                        let timeout = config.refresh_timeout;
                        let result = tokio::time::timeout(
                            timeout,
                            do_refresh(indexer, upstream, config, session_id_owned),
                        )
                        .await
                        .unwrap_or_else(|_| Err(Error::Timeout("refresh timed out".to_string())));
                        Arc::new(result.map_err(|e| e.to_string()))
                    }
                    .boxed();
                let shared = fut.shared();
                inflight.insert(
                    session_id.to_string(),
                    Inflight {
                        generation,
                        fut: shared.clone(),
                    },
                );
                (shared, generation)
            }
        };

        let result = shared.await;

        {
            let mut inflight = self.inflight.lock().unwrap();
            if inflight.get(session_id).map(|e| e.generation) == Some(generation) {
                inflight.remove(session_id);
            }
        }

        match &*result {
            Ok(state) => Ok(state.clone()),
            Err(msg) => Err(Error::Upstream(msg.clone())),
        }
    }

    /// Refresh `session_id` only if it has never been synced or its last sync
    /// is older than `freshness_threshold`.
    pub async fn refresh_if_stale(&self, session_id: &str) -> Result<()> {
        let stale = match self.indexer.get_session_state(session_id) {
            None => true,
            Some(state) => match state.last_sync_at_ms {
                None => true,
                Some(last_sync) => {
                    let age_ms = now_ms().saturating_sub(last_sync);
                    age_ms as u128 > self.config.freshness_threshold.as_millis()
                }
            },
        };
        if stale {
            self.refresh_session(session_id).await?;
        }
        Ok(())
    }

    /// Spawn a background task that periodically refreshes every known
    /// session until `cancel` fires.
    pub fn start_background_refresh(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.refresh_interval) => {
                        self.refresh_all_known_sessions(&cancel).await;
                    }
                }
            }
        })
    }

    async fn refresh_all_known_sessions(&self, cancel: &CancellationToken) {
        let sessions = match self.upstream.list_sessions(cancel).await {
            Ok(sessions) => sessions,
            Err(err) => {
                tracing::warn!(error = %err, "background refresh: list_sessions failed");
                return;
            }
        };
        for session in sessions {
            if let Err(err) = self.refresh_session(&session.id).await {
                tracing::warn!(session_id = %session.id, error = %err, "background refresh failed");
            }
        }
    }
}

async fn do_refresh(
    indexer: Arc<Indexer>,
    upstream: Arc<dyn UpstreamClient>,
    config: RefresherConfig,
    session_id: String,
) -> Result<SessionState> {
    let cancel = CancellationToken::new();
    let session = upstream.get_session(&session_id, &cancel).await?;
    let new_ids = session.entry_ids;

    let prior = indexer.get_session_state(&session_id);
    let strategy = choose_strategy(prior.as_ref(), &new_ids);

    let ids_to_fetch: Vec<String> = match (strategy, &prior) {
        (Strategy::AppendOnly, Some(prior)) => new_ids[prior.last_entry_ids_len..].to_vec(),
        (Strategy::AppendOnly, None) => new_ids.clone(),
        (Strategy::Rebuild, _) => {
            let start = new_ids.len().saturating_sub(config.bootstrap_tail_limit);
            new_ids[start..].to_vec()
        }
    };

    let fetch_workers = config.fetch_workers.max(1);
    let fetched: Vec<Option<reqlens_core::Entry>> = stream::iter(ids_to_fetch.into_iter())
        .map(|entry_id| {
            let upstream = upstream.clone();
            let indexer = indexer.clone();
            let session_id = session_id.clone();
            let cancel = cancel.clone();
            async move {
                if let Some(cached) = indexer.cache().get(&entry_id) {
                    return Some((*cached).clone());
                }
                match upstream.get_entry(&session_id, &entry_id, &cancel).await {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        tracing::debug!(entry_id = %entry_id, error = %err, "entry fetch failed, skipping");
                        None
                    }
                }
            }
        })
        .buffer_unordered(fetch_workers)
        .collect()
        .await;

    for entry in fetched.into_iter().flatten() {
        indexer.index(&entry);
    }

    let new_state = SessionState {
        last_entry_ids_len: new_ids.len(),
        last_tail_entry_id: new_ids.last().cloned(),
        last_sync_at_ms: Some(now_ms()),
    };
    indexer.set_session_state(&session_id, new_state.clone());
    Ok(new_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqlens_core::types::{EntryResponse, Timings};
    use reqlens_core::{Entry, SessionInfo};
    use reqlens_index::EntryCache;
    use reqlens_upstream::testing::FakeUpstreamClient;

    fn test_config() -> RefresherConfig {
        RefresherConfig {
            freshness_threshold: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(10),
            bootstrap_tail_limit: 500,
            fetch_workers: 4,
        }
    }

    fn entry(id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            url: format!("https://example.com/{id}"),
            http_version: "HTTP/1.1".to_string(),
            method: Some("GET".to_string()),
            headers: vec![],
            body_b64: None,
            response: Some(EntryResponse {
                status: 200,
                headers: vec![],
                body_b64: None,
            }),
            process: None,
            tls: None,
            h2: None,
            timings: Timings { started_at_ms: 0 },
        }
    }

    fn new_refresher() -> (Arc<Refresher>, Arc<Indexer>, Arc<FakeUpstreamClient>) {
        let indexer = Arc::new(Indexer::new(Arc::new(EntryCache::new(100)), true, 65536));
        let upstream = Arc::new(FakeUpstreamClient::new());
        let refresher = Arc::new(Refresher::new(indexer.clone(), upstream.clone(), test_config()));
        (refresher, indexer, upstream)
    }

    #[tokio::test]
    async fn first_refresh_bootstraps_from_tail() {
        let (refresher, indexer, upstream) = new_refresher();
        upstream.put_session(SessionInfo {
            id: "s1".to_string(),
            name: "s1".to_string(),
            entry_ids: vec!["e1".to_string(), "e2".to_string(), "e3".to_string()],
        });
        upstream.put_entry("s1", entry("e1"));
        upstream.put_entry("s1", entry("e2"));
        upstream.put_entry("s1", entry("e3"));

        let state = refresher.refresh_session("s1").await.unwrap();
        assert_eq!(state.last_entry_ids_len, 3);
        assert_eq!(state.last_tail_entry_id.as_deref(), Some("e3"));
        assert_eq!(indexer.doc_count(), 3);
    }

    #[tokio::test]
    async fn append_only_refresh_fetches_only_new_entries() {
        let (refresher, indexer, upstream) = new_refresher();
        upstream.put_session(SessionInfo {
            id: "s1".to_string(),
            name: "s1".to_string(),
            entry_ids: vec!["e1".to_string(), "e2".to_string(), "e3".to_string()],
        });
        upstream.put_entry("s1", entry("e1"));
        upstream.put_entry("s1", entry("e2"));
        upstream.put_entry("s1", entry("e3"));
        refresher.refresh_session("s1").await.unwrap();
        assert_eq!(indexer.doc_count(), 3);

        upstream.set_entry_ids("s1", vec!["e1".to_string(), "e2".to_string(), "e3".to_string(), "e4".to_string()]);
        upstream.put_entry("s1", entry("e4"));

        let state = refresher.refresh_session("s1").await.unwrap();
        assert_eq!(state.last_entry_ids_len, 4);
        assert_eq!(indexer.doc_count(), 4);
    }

    #[tokio::test]
    async fn shrinking_entry_list_triggers_rebuild() {
        let (refresher, indexer, upstream) = new_refresher();
        upstream.put_session(SessionInfo {
            id: "s1".to_string(),
            name: "s1".to_string(),
            entry_ids: vec!["e1".to_string(), "e2".to_string(), "e3".to_string()],
        });
        for id in ["e1", "e2", "e3"] {
            upstream.put_entry("s1", entry(id));
        }
        refresher.refresh_session("s1").await.unwrap();

        upstream.set_entry_ids("s1", vec!["e1".to_string(), "e2".to_string()]);
        let state = refresher.refresh_session("s1").await.unwrap();
        assert_eq!(state.last_entry_ids_len, 2);
        // Still idempotent: re-indexing e1/e2 doesn't grow doc_count past 3.
        assert_eq!(indexer.doc_count(), 3);
    }

    #[tokio::test]
    async fn changed_tail_with_same_length_triggers_rebuild() {
        let prior = SessionState {
            last_entry_ids_len: 2,
            last_tail_entry_id: Some("e2".to_string()),
            last_sync_at_ms: Some(0),
        };
        let new_ids = vec!["e1".to_string(), "e2-replaced".to_string()];
        assert_eq!(choose_strategy(Some(&prior), &new_ids), Strategy::Rebuild);
    }

    #[tokio::test]
    async fn concurrent_refresh_calls_are_singleflighted() {
        let (refresher, _indexer, upstream) = new_refresher();
        upstream.put_session(SessionInfo {
            id: "s1".to_string(),
            name: "s1".to_string(),
            entry_ids: vec!["e1".to_string()],
        });
        upstream.put_entry("s1", entry("e1"));

        let r1 = refresher.clone();
        let r2 = refresher.clone();
        let (a, b) = tokio::join!(r1.refresh_session("s1"), r2.refresh_session("s1"));
        assert_eq!(a.unwrap().last_entry_ids_len, 1);
        assert_eq!(b.unwrap().last_entry_ids_len, 1);
    }

    #[tokio::test]
    async fn refresh_if_stale_skips_fresh_session() {
        let (refresher, indexer, upstream) = new_refresher();
        upstream.put_session(SessionInfo {
            id: "s1".to_string(),
            name: "s1".to_string(),
            entry_ids: vec!["e1".to_string()],
        });
        upstream.put_entry("s1", entry("e1"));
        refresher.refresh_session("s1").await.unwrap();
        let before = indexer.get_session_state("s1").unwrap().last_sync_at_ms;

        refresher.refresh_if_stale("s1").await.unwrap();
        let after = indexer.get_session_state("s1").unwrap().last_sync_at_ms;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn missing_session_surfaces_not_found() {
        let (refresher, _indexer, _upstream) = new_refresher();
        let err = refresher.refresh_session("nope").await.unwrap_err();
        assert!(matches!(err.kind(), reqlens_core::ErrorKind::Upstream));
    }
}
