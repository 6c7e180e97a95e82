//! Builds the flat, indexable [`EntryMeta`] projection from a raw [`Entry`]
//! (component C2). Pure function: no locks, no I/O.

use reqlens_core::types::{header_value, normalize_content_type};
use reqlens_core::{Entry, EntryMeta};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

const API_KEY_HEADERS: &[&str] = &["x-api-key", "x-auth-token", "x-access-token"];

const SESSION_COOKIE_EXACT: &[&str] = &[
    "jsessionid",
    "phpsessid",
    "asp.net_sessionid",
    "connect.sid",
    "_session",
    "_session_id",
];

const SESSION_COOKIE_SUBSTRINGS: &[&str] = &["session", "sid", "auth", "token", "jwt"];

/// `true` if a lowercase cookie name should be treated as session-related
/// an exact match against the fixed set, or containing any of the
/// fixed substrings.
fn is_session_cookie_name(lower_name: &str) -> bool {
    SESSION_COOKIE_EXACT.contains(&lower_name)
        || SESSION_COOKIE_SUBSTRINGS
            .iter()
            .any(|pat| lower_name.contains(pat))
}

/// Parse a `Cookie: a=1; b=2` request header value into (name, value) pairs.
fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (name, val) = part.split_once('=')?;
            Some((name.trim().to_string(), val.trim().to_string()))
        })
        .collect()
}

/// Parse a single `Set-Cookie: name=value; Path=/; HttpOnly` response header
/// into its (name, value) pair, ignoring attributes.
fn parse_set_cookie_header(value: &str) -> Option<(String, String)> {
    let first = value.split(';').next()?.trim();
    let (name, val) = first.split_once('=')?;
    Some((name.trim().to_string(), val.trim().to_string()))
}

fn host_and_path(url: &str) -> (String, String) {
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
            (host, parsed.path().to_string())
        }
        Err(_) => {
            let path = url.split('?').next().unwrap_or(url);
            (String::new(), path.to_string())
        }
    }
}

/// Build the indexable metadata projection for `entry`, which has just been
/// assigned `doc_id` by the indexer.
pub fn build_entry_meta(entry: &Entry, doc_id: u32) -> EntryMeta {
    let (host, path) = host_and_path(&entry.url);
    let method = entry
        .method
        .as_deref()
        .map(|m| m.to_ascii_uppercase())
        .unwrap_or_else(|| "GET".to_string());

    let mut header_names = BTreeSet::new();
    let mut header_pairs = Vec::with_capacity(entry.headers.len());
    let mut session_cookies = BTreeMap::new();
    let mut api_keys = BTreeMap::new();

    for (name, value) in &entry.headers {
        let lower_name = name.to_ascii_lowercase();
        header_names.insert(lower_name.clone());
        header_pairs.push((lower_name.clone(), value.clone()));

        if lower_name == "cookie" {
            for (cname, cvalue) in parse_cookie_header(value) {
                let lower_cname = cname.to_ascii_lowercase();
                if is_session_cookie_name(&lower_cname) {
                    session_cookies.insert(cname, cvalue);
                }
            }
        }

        if API_KEY_HEADERS.contains(&lower_name.as_str()) {
            api_keys.insert(lower_name.clone(), value.clone());
        }
    }

    let authorization = header_value(&entry.headers, "authorization");

    let mut set_cookies = BTreeMap::new();
    let mut status = None;
    let mut response_content_type = None;
    let mut response_body_bytes = 0u64;

    if let Some(response) = &entry.response {
        status = Some(response.status);
        response_content_type = header_value(&response.headers, "content-type")
            .map(|ct| normalize_content_type(&ct));
        response_body_bytes = entry
            .decoded_response_body()
            .map(|b| b.len() as u64)
            .unwrap_or(0);

        for (name, value) in &response.headers {
            if name.eq_ignore_ascii_case("set-cookie") {
                if let Some((cname, cvalue)) = parse_set_cookie_header(value) {
                    let lower_cname = cname.to_ascii_lowercase();
                    if is_session_cookie_name(&lower_cname) {
                        set_cookies.insert(cname, cvalue);
                    }
                }
            }
        }
    }

    let request_body_bytes = entry
        .decoded_request_body()
        .map(|b| b.len() as u64)
        .unwrap_or(0);

    let tls = entry.tls.clone().unwrap_or_default();
    let h2 = entry.h2.clone().unwrap_or_default();
    let process = entry.process.clone().unwrap_or_default();

    EntryMeta {
        entry_id: entry.id.clone(),
        doc_id,
        started_at_ms: entry.timings.started_at_ms,
        method,
        url: entry.url.clone(),
        host,
        path,
        status,
        http_version: entry.http_version.clone(),
        pid: process.pid,
        process_name: process.name,
        tls_connection_id: tls.connection_id,
        ja3: tls.ja3,
        ja4: tls.ja4,
        h2_connection_id: h2.connection_id,
        h2_stream_id: h2.stream_id,
        header_names,
        header_pairs,
        authorization,
        session_cookies,
        api_keys,
        set_cookies,
        request_body_bytes,
        response_body_bytes,
        response_content_type,
    }
}
