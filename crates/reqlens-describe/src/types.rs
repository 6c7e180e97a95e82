//! Request/response shapes for the describe (per-cluster summarization)
//! engine.

use crate::body_analyzer::BodyAnalysis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeRequest {
    pub session_id: String,
    pub cluster_id: String,
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
}

fn default_max_examples() -> usize {
    5
}

impl DescribeRequest {
    pub fn new(session_id: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            cluster_id: cluster_id.into(),
            max_examples: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypicalHeader {
    pub name: String,
    pub frequency: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSignals {
    pub cookies_present: bool,
    pub bearer_present: bool,
    /// Presence of each fixed custom-auth header, keyed by lowercase name.
    pub custom_auth_headers: BTreeMap<String, bool>,
}

/// A key present in one of three entries with a single distinct value is
/// still tagged volatile by the `distinct_values / presence > 0.8` rule
/// before the stable threshold is ever checked — an intentional asymmetry
/// carried over unchanged (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKeyClass {
    Stable,
    Volatile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryKeyInfo {
    pub name: String,
    pub presence: usize,
    pub distinct_values: usize,
    pub classification: Option<QueryKeyClass>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub cluster_id: String,
    pub entries_examined: usize,
    pub typical_headers: Vec<TypicalHeader>,
    pub auth_signals: AuthSignals,
    pub query_keys: Vec<QueryKeyInfo>,
    pub request_body_shape: Option<BodyAnalysis>,
    pub response_body_shape: Option<BodyAnalysis>,
    pub synced_at_ms: Option<i64>,
}
