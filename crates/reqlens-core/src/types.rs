//! Shared domain types: the upstream entry record and its derived metadata
//! projection. These are the types every other reqlens crate builds on.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single HTTP header as observed on the wire: name case preserved, duplicates
/// allowed, order preserved.
pub type HeaderPairs = Vec<(String, String)>;

/// Process metadata attached to a captured entry, when the capture daemon knows it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessInfo {
    pub pid: Option<u32>,
    pub name: Option<String>,
}

/// TLS connection identifiers attached to a captured entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TlsInfo {
    pub connection_id: Option<String>,
    pub ja3: Option<String>,
    pub ja4: Option<String>,
}

/// HTTP/2 stream identifiers attached to a captured entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Http2Info {
    pub connection_id: Option<String>,
    pub stream_id: Option<u64>,
}

/// Timing information for a captured entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timings {
    pub started_at_ms: i64,
}

/// The response half of an entry, when the transaction completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HeaderPairs,
    /// Base64-encoded response body, standard padding.
    #[serde(default)]
    pub body_b64: Option<String>,
}

/// A captured HTTP transaction, as returned by the upstream capture daemon.
///
/// The core treats this as immutable once observed; it owns no wire-format
/// concerns beyond base64 body decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub url: String,
    pub http_version: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HeaderPairs,
    /// Base64-encoded request body, standard padding.
    #[serde(default)]
    pub body_b64: Option<String>,
    #[serde(default)]
    pub response: Option<EntryResponse>,
    #[serde(default)]
    pub process: Option<ProcessInfo>,
    #[serde(default)]
    pub tls: Option<TlsInfo>,
    #[serde(default)]
    pub h2: Option<Http2Info>,
    pub timings: Timings,
}

impl Entry {
    /// Decode the request body, if present. Decoding failures are swallowed:
    /// callers treat `None` the same as "no body available" rather than
    /// failing the surrounding operation.
    pub fn decoded_request_body(&self) -> Option<Vec<u8>> {
        decode_b64(self.body_b64.as_deref())
    }

    /// Decode the response body, if a response and body are present.
    pub fn decoded_response_body(&self) -> Option<Vec<u8>> {
        self.response
            .as_ref()
            .and_then(|r| decode_b64(r.body_b64.as_deref()))
    }

    /// Response content-type, normalized: parameters after `;` stripped, trimmed,
    /// lowercased.
    pub fn response_content_type(&self) -> Option<String> {
        let response = self.response.as_ref()?;
        header_value(&response.headers, "content-type").map(|v| normalize_content_type(&v))
    }
}

fn decode_b64(s: Option<&str>) -> Option<Vec<u8>> {
    let s = s?;
    base64::engine::general_purpose::STANDARD.decode(s).ok()
}

/// Case-insensitive header lookup returning the first match, preserving the
/// original casing of the value.
pub fn header_value(headers: &HeaderPairs, name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

/// Strip `;` parameters from a content-type value and lowercase it.
pub fn normalize_content_type(ct: &str) -> String {
    ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// Session info as reported by the upstream capture daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub entry_ids: Vec<String>,
}

/// Flat, indexable projection of an [`Entry`], built once at ingest time.
///
/// Never carries body bytes; only sizes.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub entry_id: String,
    pub doc_id: u32,

    pub started_at_ms: i64,
    pub method: String,
    pub url: String,
    pub host: String,
    pub path: String,
    pub status: Option<u16>,
    pub http_version: String,

    pub pid: Option<u32>,
    pub process_name: Option<String>,

    pub tls_connection_id: Option<String>,
    pub ja3: Option<String>,
    pub ja4: Option<String>,
    pub h2_connection_id: Option<String>,
    pub h2_stream_id: Option<u64>,

    pub header_names: BTreeSet<String>,
    pub header_pairs: HeaderPairs,

    pub authorization: Option<String>,
    pub session_cookies: BTreeMap<String, String>,
    pub api_keys: BTreeMap<String, String>,
    pub set_cookies: BTreeMap<String, String>,

    pub request_body_bytes: u64,
    pub response_body_bytes: u64,
    pub response_content_type: Option<String>,
}

impl EntryMeta {
    /// `true` if the entry carries any of the three auth signals the cluster and
    /// flow engines treat as "has auth": an Authorization header, a session
    /// cookie, or an API-key header.
    pub fn has_auth(&self) -> bool {
        self.authorization.is_some() || !self.session_cookies.is_empty() || !self.api_keys.is_empty()
    }
}
