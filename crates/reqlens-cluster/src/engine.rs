//! Endpoint extraction: group entries into clusters by (host, method,
//! path-template), classify, score, and paginate (component C7).

use crate::classify::{classify, dominant_content_type};
use crate::store::ClusterStore;
use crate::types::{
    ClusterFilters, ClusterOptions, ClusterRequest, ClusterResponse, ClusterResult, ClusterScope,
};
use reqlens_core::Result;
use reqlens_index::Indexer;
use reqlens_refresh::Refresher;
use reqlens_tokenize::normalize_path;
use roaring::RoaringBitmap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn time_bounds(time_window_ms: i64, since_ms: i64, until_ms: i64, now: i64) -> (i64, i64) {
    if time_window_ms > 0 {
        (now - time_window_ms, now)
    } else {
        let lower = if since_ms > 0 { since_ms } else { i64::MIN };
        let upper = if until_ms > 0 { until_ms } else { i64::MAX };
        (lower, upper)
    }
}

fn hex_prefix(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let full = format!("{digest:x}");
    full[..len.min(full.len())].to_string()
}

/// The bit-exact `cluster_id` formula, exposed so callers outside this
/// crate (the tool server's `fingerprint` handler) can derive the same id for
/// a single entry without re-running the grouping pass.
pub fn cluster_id_for(host: &str, method: &str, path_template: &str) -> String {
    hex_prefix(&format!("{host}\0{method}\0{path_template}"), 12)
}

fn is_scope_nil(scope: &ClusterScope, time_window_ms: i64, since_ms: i64, until_ms: i64, filters: &ClusterFilters) -> bool {
    scope.host.is_none()
        && scope.method.is_none()
        && scope.process_name.is_none()
        && scope.pid.is_none()
        && time_window_ms == 0
        && since_ms == 0
        && until_ms == 0
        && filters.min_count == 0
        && filters.category.is_none()
}

fn scope_hash(scope: &ClusterScope, time_window_ms: i64, since_ms: i64, until_ms: i64, filters: &ClusterFilters) -> String {
    if is_scope_nil(scope, time_window_ms, since_ms, until_ms, filters) {
        return "default".to_string();
    }
    // Field order is bit-exact per the external wire-format contract:
    // host, process-name, pid, time-window-ms, since-ms, until-ms, method,
    // category, min-count.
    let canonical = format!(
        "{}\0{}\0{}\0{}\0{}\0{}\0{}\0{}\0{}",
        scope.host.as_deref().unwrap_or(""),
        scope.process_name.as_deref().unwrap_or(""),
        scope.pid.map(|p| p.to_string()).unwrap_or_default(),
        time_window_ms,
        since_ms,
        until_ms,
        scope.method.as_deref().unwrap_or(""),
        filters.category.map(|c| c.as_str()).unwrap_or(""),
        filters.min_count,
    );
    hex_prefix(&canonical, 16)
}

#[derive(Default)]
struct ClusterAccumulator {
    entry_ids: Vec<String>,
    content_type_hist: HashMap<String, usize>,
    status_hist: HashMap<u16, usize>,
    total_resp_bytes: u64,
    has_auth: bool,
}

pub struct ClusterEngine {
    indexer: Arc<Indexer>,
    refresher: Arc<Refresher>,
    store: Arc<ClusterStore>,
}

impl ClusterEngine {
    pub fn new(indexer: Arc<Indexer>, refresher: Arc<Refresher>, store: Arc<ClusterStore>) -> Self {
        Self { indexer, refresher, store }
    }

    pub async fn extract(&self, req: &ClusterRequest) -> Result<ClusterResponse> {
        self.refresher.refresh_if_stale(&req.session_id).await?;
        let synced_at_ms = self
            .indexer
            .get_session_state(&req.session_id)
            .and_then(|s| s.last_sync_at_ms);

        let options = req.options.clone().clamped();
        let hash = scope_hash(&req.scope, req.time_window_ms, req.since_ms, req.until_ms, &req.filters);

        let Some(candidates) = self.scope_bitmap(&req.scope) else {
            return Ok(ClusterResponse {
                clusters: Vec::new(),
                total_before_truncation: 0,
                truncated: false,
                scope_hash: hash,
                synced_at_ms,
            });
        };

        let now = now_ms();
        let (lower, upper) = time_bounds(req.time_window_ms, req.since_ms, req.until_ms, now);

        let mut groups: HashMap<(String, String, String), ClusterAccumulator> = HashMap::new();
        for doc_id in candidates.iter() {
            let Some(meta) = self.indexer.get_meta(doc_id) else { continue };
            if meta.started_at_ms < lower || meta.started_at_ms > upper {
                continue;
            }
            let path_template = if options.normalize_ids {
                normalize_path(&meta.path)
            } else {
                meta.path.clone()
            };
            let key = (meta.host.clone(), meta.method.clone(), path_template);
            let acc = groups.entry(key).or_default();
            acc.entry_ids.push(meta.entry_id.clone());
            if let Some(ct) = &meta.response_content_type {
                *acc.content_type_hist.entry(ct.clone()).or_insert(0) += 1;
            }
            if let Some(status) = meta.status {
                *acc.status_hist.entry(status).or_insert(0) += 1;
            }
            acc.total_resp_bytes += meta.response_body_bytes;
            acc.has_auth |= meta.has_auth();
        }

        let mut results: Vec<(ClusterResult, Vec<String>)> = groups
            .into_iter()
            .map(|((host, method, path_template), acc)| {
                let entry_ids = acc.entry_ids.clone();
                let result = build_result(&host, &method, &path_template, acc, options.examples_per_cluster);
                (result, entry_ids)
            })
            .filter(|(c, _)| c.count >= req.filters.min_count)
            .filter(|(c, _)| req.filters.category.is_none_or(|wanted| wanted == c.category))
            .collect();

        results.sort_by(|a, b| b.0.count.cmp(&a.0.count));

        let total_before_truncation = results.len();
        let truncated = total_before_truncation > options.max_clusters;
        results.truncate(options.max_clusters);

        for (cluster, entry_ids) in &results {
            self.store.put(&req.session_id, &cluster.cluster_id, entry_ids.clone());
        }

        let limit = if req.limit == 0 { 50 } else { req.limit };
        let start = req.offset.min(results.len());
        let end = (start + limit).min(results.len());
        let page: Vec<ClusterResult> = results[start..end].iter().map(|(c, _)| c.clone()).collect();

        Ok(ClusterResponse {
            clusters: page,
            total_before_truncation,
            truncated,
            scope_hash: hash,
            synced_at_ms,
        })
    }

    fn scope_bitmap(&self, scope: &ClusterScope) -> Option<RoaringBitmap> {
        let mut bitmap = self.indexer.all_doc_ids();
        if let Some(host) = &scope.host {
            bitmap &= self.indexer.get_bitmap_for_host(host)?;
        }
        if let Some(method) = &scope.method {
            bitmap &= self.indexer.get_bitmap_for_method(method)?;
        }
        if let Some(name) = &scope.process_name {
            bitmap &= self.indexer.get_bitmap_for_process_name(name)?;
        }
        if let Some(pid) = scope.pid {
            bitmap &= self.indexer.get_bitmap_for_pid(pid)?;
        }
        Some(bitmap)
    }
}

fn build_result(
    host: &str,
    method: &str,
    path_template: &str,
    acc: ClusterAccumulator,
    examples_per_cluster: usize,
) -> ClusterResult {
    let count = acc.entry_ids.len();
    let category = classify(path_template, &acc.content_type_hist);
    let dominant_content_type = dominant_content_type(&acc.content_type_hist);

    let error_count: usize = acc
        .status_hist
        .iter()
        .filter(|(code, _)| **code < 200 || **code >= 300)
        .map(|(_, n)| *n)
        .sum();
    let error_rate = if count == 0 { 0.0 } else { error_count as f64 / count as f64 };
    let avg_response_bytes = if count == 0 {
        0.0
    } else {
        acc.total_resp_bytes as f64 / count as f64
    };

    let examples = spread_sample(&acc.entry_ids, examples_per_cluster);
    let cluster_id = cluster_id_for(host, method, path_template);

    ClusterResult {
        cluster_id,
        host: host.to_string(),
        method: method.to_string(),
        path_template: path_template.to_string(),
        category,
        count,
        error_rate,
        avg_response_bytes,
        dominant_content_type,
        has_auth: acc.has_auth,
        examples,
    }
}

fn spread_sample(entry_ids: &[String], examples: usize) -> Vec<String> {
    let count = entry_ids.len();
    if count <= examples {
        return entry_ids.to_vec();
    }
    let step = count / examples;
    (0..examples)
        .map(|i| entry_ids[(i * step).min(count - 1)].clone())
        .collect()
}
