//! Dispatches a tool name plus a JSON input to the matching engine call,
//! mirroring the handler names listed in the external tool-protocol surface
//! `search`, `get_entry`, `fingerprint`, `diff`, `extract_endpoints`,
//! `describe_endpoint`, `trace_flow`.

use crate::bootstrap::AppState;
use crate::types::{DiffRequest, FingerprintRequest, FingerprintResponse, GetEntryRequest, diff_entries};
use reqlens_cluster::{classify, cluster_id_for};
use reqlens_core::{Entry, Error, Result};
use reqlens_describe::DescribeRequest;
use reqlens_flow::FlowRequest;
use reqlens_search::SearchRequest;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fetches a single entry cache-first, falling back to the upstream client
/// and populating the cache on success — the same pattern used by the
/// describe engine's `fetch_entries` and the search engine's body-contains
/// post-filter.
async fn fetch_entry(state: &AppState, session_id: &str, entry_id: &str, cancel: &CancellationToken) -> Result<Arc<Entry>> {
    if let Some(entry) = state.indexer().cache().get(entry_id) {
        return Ok(entry);
    }
    let entry = Arc::new(state.upstream().get_entry(session_id, entry_id, cancel).await?);
    state.indexer().cache().put(entry.clone());
    Ok(entry)
}

/// Deserializes a handler's typed input, mapping a malformed request payload
/// to `InvalidInput` rather than the generic `Internal` that `Error`'s
/// blanket `serde_json::Error` conversion would otherwise produce.
fn parse_input<T: serde::de::DeserializeOwned>(input: serde_json::Value) -> Result<T> {
    serde_json::from_value(input).map_err(|e| Error::InvalidInput(format!("malformed input: {e}")))
}

pub async fn dispatch(
    state: &AppState,
    tool: &str,
    input: serde_json::Value,
    cancel: &CancellationToken,
) -> Result<serde_json::Value> {
    match tool {
        "search" => {
            let req: SearchRequest = parse_input(input)?;
            let resp = state.search().search(&req).await?;
            Ok(serde_json::to_value(resp)?)
        }
        "get_entry" => {
            let req: GetEntryRequest = parse_input(input)?;
            let entry = fetch_entry(state, &req.session_id, &req.entry_id, cancel).await?;
            Ok(serde_json::to_value(entry.as_ref())?)
        }
        "fingerprint" => {
            let req: FingerprintRequest = parse_input(input)?;
            let resp = fingerprint(state, &req).await?;
            Ok(serde_json::to_value(resp)?)
        }
        "diff" => {
            let req: DiffRequest = parse_input(input)?;
            let cancel2 = cancel.clone();
            let a = fetch_entry(state, &req.session_id, &req.entry_id_a, &cancel2).await?;
            let b = fetch_entry(state, &req.session_id, &req.entry_id_b, &cancel2).await?;
            Ok(serde_json::to_value(diff_entries(&a, &b))?)
        }
        "extract_endpoints" => {
            let req: reqlens_cluster::ClusterRequest = parse_input(input)?;
            let resp = state.cluster().extract(&req).await?;
            Ok(serde_json::to_value(resp)?)
        }
        "describe_endpoint" => {
            let req: DescribeRequest = parse_input(input)?;
            let resp = state.describe().describe(&req).await?;
            Ok(serde_json::to_value(resp)?)
        }
        "trace_flow" => {
            let req: FlowRequest = parse_input(input)?;
            let resp = state.flow().trace(&req).await?;
            Ok(serde_json::to_value(resp)?)
        }
        other => Err(Error::InvalidInput(format!("unknown tool: {other}"))),
    }
}

/// Derives a single entry's endpoint identity: normalized path template,
/// classification, and the same bit-exact `cluster_id` the cluster engine
/// would assign it, without running a full `extract_endpoints` pass.
async fn fingerprint(state: &AppState, req: &FingerprintRequest) -> Result<FingerprintResponse> {
    state.refresher().refresh_if_stale(&req.session_id).await?;
    let meta = state
        .indexer()
        .get_meta_by_entry_id(&req.entry_id)
        .ok_or_else(|| Error::NotFound(format!("entry {}", req.entry_id)))?;

    let path_template = reqlens_tokenize::normalize_path(&meta.path);
    let mut content_type_hist = HashMap::new();
    if let Some(ct) = &meta.response_content_type {
        content_type_hist.insert(ct.clone(), 1usize);
    }
    let category = classify(&path_template, &content_type_hist);
    let cluster_id = cluster_id_for(&meta.host, &meta.method, &path_template);

    Ok(FingerprintResponse {
        entry_id: req.entry_id.clone(),
        host: meta.host,
        method: meta.method,
        path_template,
        category,
        cluster_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::AppState;
    use reqlens_core::types::{EntryResponse, Timings};
    use reqlens_core::{Config, SessionInfo};
    use reqlens_index::{EntryCache, Indexer};
    use reqlens_upstream::testing::FakeUpstreamClient;

    fn entry(id: &str, url: &str, headers: Vec<(&str, &str)>, status: u16) -> Entry {
        Entry {
            id: id.to_string(),
            url: url.to_string(),
            http_version: "HTTP/1.1".to_string(),
            method: Some("GET".to_string()),
            headers: headers.clone().into_iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
            body_b64: None,
            response: Some(EntryResponse {
                status,
                headers: headers.into_iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
                body_b64: None,
            }),
            process: None,
            tls: None,
            h2: None,
            timings: Timings { started_at_ms: 1000 },
        }
    }

    fn setup() -> (AppState, std::sync::Arc<FakeUpstreamClient>) {
        let cfg = Config::default();
        let indexer = Arc::new(Indexer::new(
            Arc::new(EntryCache::new(cfg.entry_cache_max_items)),
            cfg.index_body,
            cfg.index_body_max_bytes,
        ));
        let upstream = Arc::new(FakeUpstreamClient::new());
        upstream.put_session(SessionInfo {
            id: "s1".to_string(),
            name: "s1".to_string(),
            entry_ids: vec!["e1".to_string(), "e2".to_string()],
        });
        upstream.put_entry("s1", entry("e1", "https://api.example.com/users/1", vec![("Content-Type", "application/json")], 200));
        upstream.put_entry(
            "s1",
            entry("e2", "https://api.example.com/users/1", vec![("Content-Type", "application/json"), ("Authorization", "Bearer t")], 404),
        );

        let upstream_dyn: Arc<dyn reqlens_upstream::UpstreamClient> = upstream.clone();
        (AppState::with_parts(cfg, indexer, upstream_dyn), upstream)
    }

    #[tokio::test]
    async fn fingerprint_derives_cluster_id_without_a_full_extract_pass() {
        let (state, _upstream) = setup();
        let req = FingerprintRequest { session_id: "s1".to_string(), entry_id: "e1".to_string() };
        let resp = fingerprint(&state, &req).await.unwrap();
        assert_eq!(resp.path_template, "/users/{id}");
        assert_eq!(resp.cluster_id.len(), 12);
        assert_eq!(resp.category, reqlens_cluster::ClusterCategory::Api);
    }

    #[tokio::test]
    async fn diff_reports_added_header_and_status_change() {
        let (state, _upstream) = setup();
        let cancel = CancellationToken::new();
        let a = fetch_entry(&state, "s1", "e1", &cancel).await.unwrap();
        let b = fetch_entry(&state, "s1", "e2", &cancel).await.unwrap();
        let diff = diff_entries(&a, &b);
        assert_eq!(diff.headers_added, vec!["authorization".to_string()]);
        assert_eq!(diff.status_changed, Some((Some(200), Some(404))));
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_tool() {
        let (state, _upstream) = setup();
        let cancel = CancellationToken::new();
        let err = dispatch(&state, "nope", serde_json::Value::Null, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), reqlens_core::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn dispatch_get_entry_round_trips_through_json() {
        let (state, _upstream) = setup();
        let cancel = CancellationToken::new();
        let input = serde_json::json!({"session_id": "s1", "entry_id": "e1"});
        let output = dispatch(&state, "get_entry", input, &cancel).await.unwrap();
        assert_eq!(output["id"], "e1");
    }
}
