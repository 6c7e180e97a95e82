//! Request/response shapes for the search engine.

use serde::{Deserialize, Serialize};

/// Structured filters applied before and after bitmap planning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub host: Option<String>,
    pub method: Option<String>,
    pub status: Option<u16>,
    pub http_version: Option<String>,
    pub process_name: Option<String>,
    pub pid: Option<u32>,
    pub header_name: Option<String>,
    pub tls_connection_id: Option<String>,
    pub ja3: Option<String>,
    pub ja4: Option<String>,

    /// Sliding window ending now, in milliseconds. `0` disables it in favor of
    /// `since_ms`/`until_ms`.
    pub time_window_ms: i64,
    /// Lower bound, inclusive. `0` means unbounded.
    pub since_ms: i64,
    /// Upper bound, inclusive. `0` means unbounded.
    pub until_ms: i64,

    pub path_contains: Option<String>,
    pub url_contains: Option<String>,
    pub header_contains: Option<String>,
    pub body_contains: Option<String>,
}

fn default_limit() -> usize {
    20
}

/// A search request scoped to a single session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub session_id: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl SearchRequest {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: None,
            filters: SearchFilters::default(),
            limit: 20,
            offset: 0,
        }
    }
}

/// A minimal projection of a matched entry, cheap to serialize back to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySummary {
    pub entry_id: String,
    pub method: String,
    pub url: String,
    pub host: String,
    pub status: Option<u16>,
    pub started_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub summary: EntrySummary,
    pub score: f64,
    pub highlights: Vec<String>,
    pub matched_in: Vec<String>,
}

/// Reported only when the request used a free-text query or a body/header
/// `contains` filter, since those are the cases where search coverage can be
/// partial (body content not in cache) or indexing-dependent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchScope {
    pub body_index_enabled: bool,
    pub body_coverage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total_hint: usize,
    pub synced_at_ms: Option<i64>,
    pub scope: Option<SearchScope>,
}
