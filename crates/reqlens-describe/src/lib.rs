//! Per-cluster summarization over a sample of a cluster's entries: typical
//! headers, auth signals, query-key stability, and body shape (component
//! C9).

pub mod body_analyzer;
pub mod engine;
pub mod types;

pub use body_analyzer::{BodyAnalysis, BodyAnalyzer, FieldShape, JsonSchemaAnalyzer, JsonType};
pub use engine::DescribeEngine;
pub use types::{AuthSignals, DescribeRequest, DescribeResponse, QueryKeyClass, QueryKeyInfo, TypicalHeader};

#[cfg(test)]
mod tests {
    use super::*;
    use reqlens_cluster::ClusterStore;
    use reqlens_core::types::{EntryResponse, Timings};
    use reqlens_core::{Config, Entry, SessionInfo};
    use reqlens_index::{EntryCache, Indexer};
    use reqlens_refresh::{Refresher, RefresherConfig};
    use reqlens_upstream::testing::FakeUpstreamClient;
    use std::sync::Arc;

    fn entry(id: &str, url: &str, headers: Vec<(&str, &str)>, req_body: Option<&str>, resp_body: Option<&str>) -> Entry {
        use base64::Engine;
        Entry {
            id: id.to_string(),
            url: url.to_string(),
            http_version: "HTTP/1.1".to_string(),
            method: Some("GET".to_string()),
            headers: headers.into_iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
            body_b64: req_body.map(|b| base64::engine::general_purpose::STANDARD.encode(b)),
            response: Some(EntryResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body_b64: resp_body.map(|b| base64::engine::general_purpose::STANDARD.encode(b)),
            }),
            process: None,
            tls: None,
            h2: None,
            timings: Timings { started_at_ms: 0 },
        }
    }

    async fn setup() -> (DescribeEngine, Arc<ClusterStore>) {
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
            entry(
                "e1",
                "https://example.com/users?ts=1001&sort=name",
                vec![("Cookie", "session_id=abc"), ("Content-Type", "application/json")],
                Some(r#"{"name": "ada"}"#),
                Some(r#"{"id": 1, "name": "ada"}"#),
            ),
        );
        upstream.put_entry(
            "s1",
            entry(
                "e2",
                "https://example.com/users?ts=1002&sort=name",
                vec![("Authorization", "Bearer tok"), ("Content-Type", "application/json")],
                Some(r#"{"name": "bob", "nickname": "bobby"}"#),
                Some(r#"{"id": 2, "name": "bob"}"#),
            ),
        );
        upstream.put_entry(
            "s1",
            entry(
                "e3",
                "https://example.com/users?ts=1003&sort=name",
                vec![("X-Api-Key", "k1"), ("Content-Type", "application/json")],
                None,
                Some(r#"{"id": 3, "name": "cleo"}"#),
            ),
        );

        let store = Arc::new(ClusterStore::new());
        store.put("s1", "cluster1", vec!["e1".to_string(), "e2".to_string(), "e3".to_string()]);

        let analyzer: Arc<dyn BodyAnalyzer> = Arc::new(JsonSchemaAnalyzer);
        (
            DescribeEngine::new(indexer, refresher, upstream.clone(), store.clone(), analyzer),
            store,
        )
    }

    #[tokio::test]
    async fn unknown_cluster_id_is_not_found() {
        let (engine, _store) = setup().await;
        let req = DescribeRequest::new("s1", "missing");
        let err = engine.describe(&req).await.unwrap_err();
        assert_eq!(err.kind(), reqlens_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn typical_headers_ranks_content_type_highest() {
        let (engine, _store) = setup().await;
        let req = DescribeRequest::new("s1", "cluster1");
        let resp = engine.describe(&req).await.unwrap();
        assert_eq!(resp.typical_headers[0].name, "content-type");
        assert_eq!(resp.typical_headers[0].frequency, 1.0);
    }

    #[tokio::test]
    async fn auth_signals_detect_all_three_kinds() {
        let (engine, _store) = setup().await;
        let req = DescribeRequest::new("s1", "cluster1");
        let resp = engine.describe(&req).await.unwrap();
        assert!(resp.auth_signals.cookies_present);
        assert!(resp.auth_signals.bearer_present);
        assert_eq!(resp.auth_signals.custom_auth_headers.get("x-api-key"), Some(&true));
        assert_eq!(resp.auth_signals.custom_auth_headers.get("x-auth-token"), Some(&false));
    }

    #[tokio::test]
    async fn ts_query_key_is_volatile_by_name() {
        let (engine, _store) = setup().await;
        let req = DescribeRequest::new("s1", "cluster1");
        let resp = engine.describe(&req).await.unwrap();
        let ts = resp.query_keys.iter().find(|k| k.name == "ts").unwrap();
        assert_eq!(ts.classification, Some(QueryKeyClass::Volatile));
    }

    #[tokio::test]
    async fn sort_query_key_is_stable() {
        let (engine, _store) = setup().await;
        let req = DescribeRequest::new("s1", "cluster1");
        let resp = engine.describe(&req).await.unwrap();
        let sort = resp.query_keys.iter().find(|k| k.name == "sort").unwrap();
        assert_eq!(sort.classification, Some(QueryKeyClass::Stable));
    }

    #[tokio::test]
    async fn response_body_shape_infers_required_fields() {
        let (engine, _store) = setup().await;
        let req = DescribeRequest::new("s1", "cluster1");
        let resp = engine.describe(&req).await.unwrap();
        let Some(BodyAnalysis::JsonSchema(JsonType::Object(fields))) = resp.response_body_shape else {
            panic!("expected a response body schema");
        };
        assert_eq!(fields.get("id").unwrap().optional, false);
        assert_eq!(fields.get("name").unwrap().optional, false);
    }

    #[tokio::test]
    async fn request_body_shape_marks_missing_field_optional() {
        let (engine, _store) = setup().await;
        let req = DescribeRequest::new("s1", "cluster1");
        let resp = engine.describe(&req).await.unwrap();
        let Some(BodyAnalysis::JsonSchema(JsonType::Object(fields))) = resp.request_body_shape else {
            panic!("expected a request body schema");
        };
        assert!(fields.get("nickname").unwrap().optional);
    }
}
