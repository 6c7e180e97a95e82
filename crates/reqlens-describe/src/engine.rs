//! Per-cluster summarization: header frequency, auth-signal detection,
//! stable/volatile query-key classification, and body shape via the external
//! analyzer interface (component C9).

use crate::body_analyzer::{BodyAnalysis, BodyAnalyzer};
use crate::types::{AuthSignals, DescribeRequest, DescribeResponse, QueryKeyClass, QueryKeyInfo, TypicalHeader};
use reqlens_cluster::ClusterStore;
use reqlens_core::types::{header_value, normalize_content_type};
use reqlens_core::{Entry, Error, Result};
use reqlens_index::Indexer;
use reqlens_refresh::Refresher;
use reqlens_upstream::UpstreamClient;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

const CUSTOM_AUTH_HEADERS: &[&str] = &["x-api-key", "x-auth-token", "x-access-token"];
const VOLATILE_PREFIXES: &[&str] = &["timestamp", "ts", "t", "time", "nonce", "rand", "random", "_"];

pub struct DescribeEngine {
    indexer: Arc<Indexer>,
    refresher: Arc<Refresher>,
    upstream: Arc<dyn UpstreamClient>,
    store: Arc<ClusterStore>,
    analyzer: Arc<dyn BodyAnalyzer>,
}

impl DescribeEngine {
    pub fn new(
        indexer: Arc<Indexer>,
        refresher: Arc<Refresher>,
        upstream: Arc<dyn UpstreamClient>,
        store: Arc<ClusterStore>,
        analyzer: Arc<dyn BodyAnalyzer>,
    ) -> Self {
        Self {
            indexer,
            refresher,
            upstream,
            store,
            analyzer,
        }
    }

    pub async fn describe(&self, req: &DescribeRequest) -> Result<DescribeResponse> {
        self.refresher.refresh_if_stale(&req.session_id).await?;
        let synced_at_ms = self
            .indexer
            .get_session_state(&req.session_id)
            .and_then(|s| s.last_sync_at_ms);

        let entry_ids = self
            .store
            .get(&req.session_id, &req.cluster_id)
            .ok_or_else(|| Error::NotFound(format!("cluster {}", req.cluster_id)))?;

        let max_examples = if req.max_examples == 0 { 5 } else { req.max_examples };
        let entries = self.fetch_entries(&req.session_id, &entry_ids, max_examples).await;
        if entries.is_empty() {
            return Err(Error::NotFound(format!("cluster {} entries", req.cluster_id)));
        }

        let typical_headers = typical_headers(&entries);
        let auth_signals = auth_signals(&entries);
        let query_keys = query_keys(&entries);
        let request_body_shape = body_shape(&entries, true, self.analyzer.as_ref());
        let response_body_shape = body_shape(&entries, false, self.analyzer.as_ref());

        Ok(DescribeResponse {
            cluster_id: req.cluster_id.clone(),
            entries_examined: entries.len(),
            typical_headers,
            auth_signals,
            query_keys,
            request_body_shape,
            response_body_shape,
            synced_at_ms,
        })
    }

    async fn fetch_entries(&self, session_id: &str, entry_ids: &[String], max: usize) -> Vec<Arc<Entry>> {
        let cancel = CancellationToken::new();
        let mut entries = Vec::with_capacity(max.min(entry_ids.len()));
        for id in entry_ids.iter().take(max) {
            if let Some(entry) = self.indexer.cache().get(id) {
                entries.push(entry);
                continue;
            }
            match self.upstream.get_entry(session_id, id, &cancel).await {
                Ok(entry) => {
                    let entry = Arc::new(entry);
                    self.indexer.cache().put(entry.clone());
                    entries.push(entry);
                }
                Err(err) => {
                    tracing::debug!(entry_id = %id, error = %err, "describe: skipping entry fetch failure");
                }
            }
        }
        entries
    }
}

fn typical_headers(entries: &[Arc<Entry>]) -> Vec<TypicalHeader> {
    let total = entries.len();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    for (order, entry) in entries.iter().enumerate() {
        let mut seen_this_entry = HashSet::new();
        for (name, _) in &entry.headers {
            let lower = name.to_ascii_lowercase();
            if seen_this_entry.insert(lower.clone()) {
                *counts.entry(lower.clone()).or_insert(0) += 1;
                first_seen.entry(lower).or_insert(order);
            }
        }
    }

    let mut headers: Vec<TypicalHeader> = counts
        .into_iter()
        .map(|(name, count)| TypicalHeader {
            frequency: count as f64 / total as f64,
            name,
        })
        .collect();

    headers.sort_by(|a, b| {
        b.frequency
            .partial_cmp(&a.frequency)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| first_seen[&a.name].cmp(&first_seen[&b.name]))
    });
    headers.truncate(20);
    headers
}

fn auth_signals(entries: &[Arc<Entry>]) -> AuthSignals {
    let mut cookies_present = false;
    let mut bearer_present = false;
    let mut custom_auth_headers: BTreeMap<String, bool> = CUSTOM_AUTH_HEADERS
        .iter()
        .map(|h| (h.to_string(), false))
        .collect();

    for entry in entries {
        if header_value(&entry.headers, "cookie").is_some() {
            cookies_present = true;
        }
        if let Some(auth) = header_value(&entry.headers, "authorization") {
            if auth.to_ascii_lowercase().starts_with("bearer ") {
                bearer_present = true;
            }
        }
        for name in CUSTOM_AUTH_HEADERS {
            if header_value(&entry.headers, name).is_some() {
                custom_auth_headers.insert(name.to_string(), true);
            }
        }
    }

    AuthSignals {
        cookies_present,
        bearer_present,
        custom_auth_headers,
    }
}

fn query_keys(entries: &[Arc<Entry>]) -> Vec<QueryKeyInfo> {
    let total = entries.len();
    let mut presence: HashMap<String, usize> = HashMap::new();
    let mut distinct: HashMap<String, HashSet<String>> = HashMap::new();

    for entry in entries {
        let Ok(url) = Url::parse(&entry.url) else { continue };
        let mut seen_this_entry = HashSet::new();
        for (key, value) in url.query_pairs() {
            let key = key.to_string();
            if seen_this_entry.insert(key.clone()) {
                *presence.entry(key.clone()).or_insert(0) += 1;
            }
            distinct.entry(key).or_default().insert(value.to_string());
        }
    }

    let mut keys: Vec<QueryKeyInfo> = presence
        .into_iter()
        .map(|(name, presence)| {
            let distinct_values = distinct.get(&name).map(|s| s.len()).unwrap_or(0);
            let classification = classify_query_key(&name, presence, distinct_values, total);
            QueryKeyInfo {
                name,
                presence,
                distinct_values,
                classification,
            }
        })
        .collect();

    keys.sort_by(|a, b| a.name.cmp(&b.name));
    keys
}

fn classify_query_key(name: &str, presence: usize, distinct_values: usize, total: usize) -> Option<QueryKeyClass> {
    let lower = name.to_ascii_lowercase();
    let name_flagged = VOLATILE_PREFIXES.iter().any(|p| lower == *p || lower.starts_with(p));
    let ratio_flagged = presence > 0 && distinct_values as f64 / presence as f64 > 0.8;
    if name_flagged || ratio_flagged {
        return Some(QueryKeyClass::Volatile);
    }
    if total > 0 && presence as f64 / total as f64 >= 0.5 {
        return Some(QueryKeyClass::Stable);
    }
    None
}

fn body_shape(entries: &[Arc<Entry>], is_request: bool, analyzer: &dyn BodyAnalyzer) -> Option<BodyAnalysis> {
    let (content_type, bodies) = collect_body_sample(entries, is_request)?;
    let analysis = analyzer.analyze(&bodies, &content_type);
    if analysis == BodyAnalysis::Skipped {
        None
    } else {
        Some(analysis)
    }
}

fn request_content_type(entry: &Entry) -> Option<String> {
    header_value(&entry.headers, "content-type").map(|v| normalize_content_type(&v))
}

fn collect_body_sample(entries: &[Arc<Entry>], is_request: bool) -> Option<(String, Vec<Vec<u8>>)> {
    let mut hist: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        let ct = if is_request {
            request_content_type(entry)
        } else {
            entry.response_content_type()
        };
        if let Some(ct) = ct {
            *hist.entry(ct).or_insert(0) += 1;
        }
    }
    let dominant = hist.into_iter().max_by_key(|(_, count)| *count).map(|(ct, _)| ct)?;

    let bodies: Vec<Vec<u8>> = entries
        .iter()
        .filter(|entry| {
            let ct = if is_request {
                request_content_type(entry)
            } else {
                entry.response_content_type()
            };
            ct.as_deref() == Some(dominant.as_str())
        })
        .filter_map(|entry| {
            let body = if is_request {
                entry.decoded_request_body()
            } else {
                entry.decoded_response_body()
            };
            body.filter(|b| !b.is_empty())
        })
        .collect();

    if bodies.is_empty() {
        None
    } else {
        Some((dominant, bodies))
    }
}
