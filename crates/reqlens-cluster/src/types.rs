//! Request/response shapes for the cluster (endpoint extraction) engine.

use serde::{Deserialize, Serialize};

/// Bitmap-backed scope: every set field is AND-ed together, with host wildcard
/// semantics shared with the search engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterScope {
    pub host: Option<String>,
    pub method: Option<String>,
    pub process_name: Option<String>,
    pub pid: Option<u32>,
}

/// Post-grouping filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterFilters {
    pub min_count: usize,
    pub category: Option<ClusterCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterCategory {
    Asset,
    Api,
    Page,
    Data,
    Other,
}

impl ClusterCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterCategory::Asset => "asset",
            ClusterCategory::Api => "api",
            ClusterCategory::Page => "page",
            ClusterCategory::Data => "data",
            ClusterCategory::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    pub normalize_ids: bool,
    /// Accepted for forward compatibility; path-templates already drop the
    /// entire query string before grouping, so this currently
    /// has no additional effect.
    pub strip_volatile_query_keys: bool,
    pub examples_per_cluster: usize,
    pub max_clusters: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            normalize_ids: true,
            strip_volatile_query_keys: true,
            examples_per_cluster: 3,
            max_clusters: 200,
        }
    }
}

impl ClusterOptions {
    pub fn clamped(mut self) -> Self {
        self.examples_per_cluster = self.examples_per_cluster.min(10).max(1);
        self.max_clusters = self.max_clusters.min(2000).max(1);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub session_id: String,
    #[serde(default)]
    pub scope: ClusterScope,
    #[serde(default)]
    pub time_window_ms: i64,
    #[serde(default)]
    pub since_ms: i64,
    #[serde(default)]
    pub until_ms: i64,
    #[serde(default)]
    pub filters: ClusterFilters,
    #[serde(default)]
    pub options: ClusterOptions,
    #[serde(default = "default_cluster_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_cluster_limit() -> usize {
    50
}

impl ClusterRequest {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            scope: ClusterScope::default(),
            time_window_ms: 0,
            since_ms: 0,
            until_ms: 0,
            filters: ClusterFilters::default(),
            options: ClusterOptions::default(),
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResult {
    pub cluster_id: String,
    pub host: String,
    pub method: String,
    pub path_template: String,
    pub category: ClusterCategory,
    pub count: usize,
    pub error_rate: f64,
    pub avg_response_bytes: f64,
    pub dominant_content_type: Option<String>,
    pub has_auth: bool,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub clusters: Vec<ClusterResult>,
    pub total_before_truncation: usize,
    pub truncated: bool,
    pub scope_hash: String,
    pub synced_at_ms: Option<i64>,
}
