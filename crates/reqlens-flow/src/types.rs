//! Request/response shapes for the flow (request-chain) engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowOptions {
    pub time_window_ms: i64,
    pub same_pid_only: bool,
    pub same_host_only: bool,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            time_window_ms: 120_000,
            same_pid_only: true,
            same_host_only: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRequest {
    pub session_id: String,
    pub seed_entry_id: String,
    #[serde(default)]
    pub options: FlowOptions,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_flow_limit")]
    pub limit: usize,
}

fn default_max_depth() -> usize {
    50
}

fn default_flow_limit() -> usize {
    50
}

impl FlowRequest {
    pub fn new(session_id: impl Into<String>, seed_entry_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            seed_entry_id: seed_entry_id.into(),
            options: FlowOptions::default(),
            max_depth: 50,
            limit: 50,
        }
    }

    pub fn clamped(mut self) -> Self {
        self.max_depth = self.max_depth.min(500).max(1);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub entry_id: String,
    pub method: String,
    pub url: String,
    pub host: String,
    pub started_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}
