//! Tool-protocol input/output shapes not already owned by an engine crate:
//! single-entry lookup, endpoint fingerprinting, and entry-pair diffing.
//!
//! Neither `fingerprint` nor `diff` carries a detailed algorithm in the
//! external tool interfaces; both are built here from already-specified
//! primitives (the cluster engine's classification and `cluster_id` formula,
//! and a structural header/query/status comparison) rather than inventing
//! unspecified behavior.

use reqlens_core::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEntryRequest {
    pub session_id: String,
    pub entry_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRequest {
    pub session_id: String,
    pub entry_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintResponse {
    pub entry_id: String,
    pub host: String,
    pub method: String,
    pub path_template: String,
    pub category: reqlens_cluster::ClusterCategory,
    pub cluster_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRequest {
    pub session_id: String,
    pub entry_id_a: String,
    pub entry_id_b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResponse {
    pub headers_added: Vec<String>,
    pub headers_removed: Vec<String>,
    pub headers_changed: Vec<String>,
    pub query_keys_added: Vec<String>,
    pub query_keys_removed: Vec<String>,
    pub query_keys_changed: Vec<String>,
    pub status_changed: Option<(Option<u16>, Option<u16>)>,
    pub content_type_changed: Option<(Option<String>, Option<String>)>,
    pub request_body_equal: Option<bool>,
    pub response_body_equal: Option<bool>,
}

fn header_names(entry: &Entry) -> BTreeSet<String> {
    entry.headers.iter().map(|(n, _)| n.to_ascii_lowercase()).collect()
}

fn query_keys(entry: &Entry) -> std::collections::BTreeMap<String, String> {
    url::Url::parse(&entry.url)
        .map(|u| u.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect())
        .unwrap_or_default()
}

/// Structural diff between two entries: which headers and query keys were
/// added, removed, or changed in value, plus status/content-type/body
/// equality. Reuses the same header/query primitives the search and describe
/// engines already operate on.
pub fn diff_entries(a: &Entry, b: &Entry) -> DiffResponse {
    let headers_a = header_names(a);
    let headers_b = header_names(b);

    let headers_added: Vec<String> = headers_b.difference(&headers_a).cloned().collect();
    let headers_removed: Vec<String> = headers_a.difference(&headers_b).cloned().collect();
    let headers_changed: Vec<String> = headers_a
        .intersection(&headers_b)
        .filter(|name| reqlens_core::header_value(&a.headers, name) != reqlens_core::header_value(&b.headers, name))
        .cloned()
        .collect();

    let query_a = query_keys(a);
    let query_b = query_keys(b);
    let keys_a: BTreeSet<&String> = query_a.keys().collect();
    let keys_b: BTreeSet<&String> = query_b.keys().collect();
    let query_keys_added: Vec<String> = keys_b.difference(&keys_a).map(|k| k.to_string()).collect();
    let query_keys_removed: Vec<String> = keys_a.difference(&keys_b).map(|k| k.to_string()).collect();
    let query_keys_changed: Vec<String> = keys_a
        .intersection(&keys_b)
        .filter(|k| query_a.get(**k) != query_b.get(**k))
        .map(|k| k.to_string())
        .collect();

    let status_a = a.response.as_ref().map(|r| r.status);
    let status_b = b.response.as_ref().map(|r| r.status);
    let status_changed = (status_a != status_b).then_some((status_a, status_b));

    let ct_a = a.response_content_type();
    let ct_b = b.response_content_type();
    let content_type_changed = (ct_a != ct_b).then_some((ct_a, ct_b));

    let request_body_equal = match (a.decoded_request_body(), b.decoded_request_body()) {
        (None, None) => None,
        (ra, rb) => Some(ra == rb),
    };
    let response_body_equal = match (a.decoded_response_body(), b.decoded_response_body()) {
        (None, None) => None,
        (ra, rb) => Some(ra == rb),
    };

    DiffResponse {
        headers_added,
        headers_removed,
        headers_changed,
        query_keys_added,
        query_keys_removed,
        query_keys_changed,
        status_changed,
        content_type_changed,
        request_body_equal,
        response_body_equal,
    }
}
