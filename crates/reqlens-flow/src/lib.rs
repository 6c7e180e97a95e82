//! Candidate-set construction, edge building, and BFS pruning into a
//! request-flow graph around a seed entry (component C8).

pub mod engine;
pub mod types;

pub use engine::FlowEngine;
pub use types::{FlowEdge, FlowGraph, FlowNode, FlowOptions, FlowRequest};

#[cfg(test)]
mod tests {
    use super::*;
    use reqlens_core::types::{EntryResponse, Timings, TlsInfo};
    use reqlens_core::{Config, Entry, SessionInfo};
    use reqlens_index::{EntryCache, Indexer};
    use reqlens_refresh::{Refresher, RefresherConfig};
    use reqlens_upstream::testing::FakeUpstreamClient;
    use std::sync::Arc;

    fn entry(id: &str, url: &str, started_at_ms: i64, tls_conn: Option<&str>, auth: Option<&str>) -> Entry {
        Entry {
            id: id.to_string(),
            url: url.to_string(),
            http_version: "HTTP/1.1".to_string(),
            method: Some("GET".to_string()),
            headers: auth
                .map(|a| vec![("Authorization".to_string(), a.to_string())])
                .unwrap_or_default(),
            body_b64: None,
            response: Some(EntryResponse {
                status: 200,
                headers: vec![],
                body_b64: None,
            }),
            process: None,
            tls: tls_conn.map(|id| TlsInfo {
                connection_id: Some(id.to_string()),
                ja3: None,
                ja4: None,
            }),
            h2: None,
            timings: Timings { started_at_ms },
        }
    }

    async fn setup() -> (FlowEngine, Arc<FakeUpstreamClient>) {
        let cfg = Config::default();
        let indexer = Arc::new(Indexer::new(
            Arc::new(EntryCache::new(cfg.entry_cache_max_items)),
            cfg.index_body,
            cfg.index_body_max_bytes,
        ));
        let upstream = Arc::new(FakeUpstreamClient::new());
        let refresher = Arc::new(Refresher::new(indexer.clone(), upstream.clone(), RefresherConfig::from(&cfg)));

        upstream.put_session(SessionInfo {
            id: "s1".to_string(),
            name: "s1".to_string(),
            entry_ids: vec!["e1".to_string(), "e2".to_string(), "e3".to_string()],
        });
        upstream.put_entry(
            "s1",
            entry("e1", "https://example.com/login", 1000, Some("tls-1"), Some("Bearer tok")),
        );
        upstream.put_entry(
            "s1",
            entry("e2", "https://example.com/profile", 2000, Some("tls-1"), Some("Bearer tok")),
        );
        upstream.put_entry("s1", entry("e3", "https://other.com/unrelated", 60_000, None, None));

        (FlowEngine::new(indexer, refresher), upstream)
    }

    #[tokio::test]
    async fn same_tls_entries_are_connected() {
        let (engine, _upstream) = setup().await;
        let req = FlowRequest::new("s1", "e1");
        let graph = engine.trace(&req).await.unwrap();
        assert!(graph.nodes.iter().any(|n| n.entry_id == "e2"));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.from == "e1" && e.to == "e2" && e.reason == "same_tls"));
    }

    #[tokio::test]
    async fn unrelated_host_outside_window_is_excluded() {
        let (engine, _upstream) = setup().await;
        let req = FlowRequest::new("s1", "e1");
        let graph = engine.trace(&req).await.unwrap();
        assert!(!graph.nodes.iter().any(|n| n.entry_id == "e3"));
    }

    #[tokio::test]
    async fn missing_seed_is_not_found() {
        let (engine, _upstream) = setup().await;
        let req = FlowRequest::new("s1", "nope");
        let err = engine.trace(&req).await.unwrap_err();
        assert_eq!(err.kind(), reqlens_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn limit_caps_node_count() {
        let (engine, _upstream) = setup().await;
        let mut req = FlowRequest::new("s1", "e1");
        req.limit = 1;
        let graph = engine.trace(&req).await.unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }
}
