//! Candidate-set construction, edge building, and BFS pruning around a seed
//! entry (component C8).

use crate::types::{FlowEdge, FlowGraph, FlowNode, FlowRequest};
use reqlens_core::{EntryMeta, Error, Result};
use reqlens_index::Indexer;
use reqlens_refresh::Refresher;
use roaring::RoaringBitmap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

const SAME_TLS: &str = "same_tls";
const SAME_H2: &str = "same_h2";
const SAME_AUTH: &str = "same_auth";
const SAME_API_KEY: &str = "same_api_key";
const SAME_SESSION_COOKIE: &str = "same_session_cookie";
const SESSION_COOKIE_ORIGIN: &str = "session_cookie_origin";
const TEMPORAL: &str = "temporal";

pub struct FlowEngine {
    indexer: Arc<Indexer>,
    refresher: Arc<Refresher>,
}

impl FlowEngine {
    pub fn new(indexer: Arc<Indexer>, refresher: Arc<Refresher>) -> Self {
        Self { indexer, refresher }
    }

    pub async fn trace(&self, req: &FlowRequest) -> Result<FlowGraph> {
        self.refresher.refresh_if_stale(&req.session_id).await?;
        let req = req.clone().clamped();

        let seed = self
            .indexer
            .get_meta_by_entry_id(&req.seed_entry_id)
            .ok_or_else(|| Error::NotFound(format!("entry {}", req.seed_entry_id)))?;

        let candidates = self.candidate_metas(&seed, &req);
        let mut sorted = candidates;
        sorted.sort_by_key(|m| m.started_at_ms);

        let edges = build_edges(&sorted);
        let graph = prune(&req.seed_entry_id, &sorted, edges, req.limit, req.max_depth);
        Ok(graph)
    }

    fn candidate_metas(&self, seed: &EntryMeta, req: &FlowRequest) -> Vec<EntryMeta> {
        let mut doc_ids = RoaringBitmap::new();
        doc_ids.insert(seed.doc_id);

        if let Some(id) = &seed.tls_connection_id {
            if let Some(bm) = self.indexer.get_bitmap_for_tls_connection_id(id) {
                doc_ids |= &bm;
            }
        }
        if let Some(id) = &seed.h2_connection_id {
            if let Some(bm) = self.indexer.get_bitmap_for_h2_connection_id(id) {
                doc_ids |= &bm;
            }
        }

        let half_window = req.options.time_window_ms / 2;
        let lower = seed.started_at_ms - half_window;
        let upper = seed.started_at_ms + half_window;

        let mut metas = Vec::new();
        let mut seen_doc_ids = HashSet::new();
        for doc_id in doc_ids.iter() {
            if let Some(meta) = self.indexer.get_meta(doc_id) {
                seen_doc_ids.insert(doc_id);
                metas.push(meta);
            }
        }

        for doc_id in self.indexer.all_doc_ids().iter() {
            if seen_doc_ids.contains(&doc_id) {
                continue;
            }
            let Some(meta) = self.indexer.get_meta(doc_id) else { continue };
            if meta.started_at_ms < lower || meta.started_at_ms > upper {
                continue;
            }
            if req.options.same_pid_only && seed.pid.is_some() && meta.pid != seed.pid {
                continue;
            }
            if req.options.same_host_only && meta.host != seed.host {
                continue;
            }
            seen_doc_ids.insert(doc_id);
            metas.push(meta);
        }

        metas
    }
}

fn add_edge(from: &str, to: &str, reason: &str, edges: &mut Vec<FlowEdge>, seen: &mut HashSet<(String, String, String)>) {
    let key = (from.to_string(), to.to_string(), reason.to_string());
    if seen.insert(key) {
        edges.push(FlowEdge {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        });
    }
}

fn group_consecutive<T: Eq + std::hash::Hash>(
    metas: &[EntryMeta],
    key_fn: impl Fn(&EntryMeta) -> Option<T>,
    reason: &str,
    edges: &mut Vec<FlowEdge>,
    seen: &mut HashSet<(String, String, String)>,
) {
    let mut groups: HashMap<T, Vec<usize>> = HashMap::new();
    for (i, meta) in metas.iter().enumerate() {
        if let Some(key) = key_fn(meta) {
            groups.entry(key).or_default().push(i);
        }
    }
    for indices in groups.values() {
        for pair in indices.windows(2) {
            add_edge(&metas[pair[0]].entry_id, &metas[pair[1]].entry_id, reason, edges, seen);
        }
    }
}

fn group_consecutive_multi(
    metas: &[EntryMeta],
    map_fn: impl Fn(&EntryMeta) -> &std::collections::BTreeMap<String, String>,
    reason: &str,
    edges: &mut Vec<FlowEdge>,
    seen: &mut HashSet<(String, String, String)>,
) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, meta) in metas.iter().enumerate() {
        for (name, value) in map_fn(meta) {
            groups.entry(format!("{name}:{value}")).or_default().push(i);
        }
    }
    for indices in groups.values() {
        for pair in indices.windows(2) {
            add_edge(&metas[pair[0]].entry_id, &metas[pair[1]].entry_id, reason, edges, seen);
        }
    }
}

fn build_edges(metas: &[EntryMeta]) -> Vec<FlowEdge> {
    let mut edges = Vec::new();
    let mut seen = HashSet::new();

    group_consecutive(metas, |m| m.tls_connection_id.clone(), SAME_TLS, &mut edges, &mut seen);
    group_consecutive(metas, |m| m.h2_connection_id.clone(), SAME_H2, &mut edges, &mut seen);
    group_consecutive(metas, |m| m.authorization.clone(), SAME_AUTH, &mut edges, &mut seen);
    group_consecutive_multi(metas, |m| &m.api_keys, SAME_API_KEY, &mut edges, &mut seen);
    group_consecutive_multi(metas, |m| &m.session_cookies, SAME_SESSION_COOKIE, &mut edges, &mut seen);

    let mut earliest_setter: HashMap<(String, String), usize> = HashMap::new();
    for (i, meta) in metas.iter().enumerate() {
        for name in meta.set_cookies.keys() {
            earliest_setter.entry((meta.host.clone(), name.clone())).or_insert(i);
        }
    }
    for (i, meta) in metas.iter().enumerate() {
        for name in meta.session_cookies.keys() {
            if let Some(&setter_idx) = earliest_setter.get(&(meta.host.clone(), name.clone())) {
                if setter_idx != i && metas[setter_idx].started_at_ms < meta.started_at_ms {
                    add_edge(
                        &metas[setter_idx].entry_id,
                        &meta.entry_id,
                        SESSION_COOKIE_ORIGIN,
                        &mut edges,
                        &mut seen,
                    );
                }
            }
        }
    }

    for pair in metas.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let tls_connected = seen.contains(&(a.entry_id.clone(), b.entry_id.clone(), SAME_TLS.to_string()));
        let h2_connected = seen.contains(&(a.entry_id.clone(), b.entry_id.clone(), SAME_H2.to_string()));
        if !tls_connected && !h2_connected {
            add_edge(&a.entry_id, &b.entry_id, TEMPORAL, &mut edges, &mut seen);
        }
    }

    edges
}

fn prune(seed_entry_id: &str, metas: &[EntryMeta], edges: Vec<FlowEdge>, limit: usize, max_depth: usize) -> FlowGraph {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &edges {
        adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        adjacency.entry(edge.to.as_str()).or_default().push(edge.from.as_str());
    }

    let mut visited = HashSet::new();
    visited.insert(seed_entry_id.to_string());
    let mut queue = VecDeque::new();
    queue.push_back((seed_entry_id.to_string(), 0usize));
    let mut order = Vec::new();

    while let Some((node, depth)) = queue.pop_front() {
        order.push(node.clone());
        if order.len() >= limit {
            break;
        }
        if depth >= max_depth {
            continue;
        }
        if let Some(neighbors) = adjacency.get(node.as_str()) {
            for &n in neighbors {
                if visited.insert(n.to_string()) {
                    queue.push_back((n.to_string(), depth + 1));
                }
            }
        }
    }

    let survivors: HashSet<&str> = order.iter().map(|s| s.as_str()).collect();
    let by_id: HashMap<&str, &EntryMeta> = metas.iter().map(|m| (m.entry_id.as_str(), m)).collect();

    let nodes = order
        .iter()
        .filter_map(|id| by_id.get(id.as_str()))
        .map(|meta| FlowNode {
            entry_id: meta.entry_id.clone(),
            method: meta.method.clone(),
            url: meta.url.clone(),
            host: meta.host.clone(),
            started_at_ms: meta.started_at_ms,
        })
        .collect();

    let surviving_edges = edges
        .into_iter()
        .filter(|e| survivors.contains(e.from.as_str()) && survivors.contains(e.to.as_str()))
        .collect();

    FlowGraph {
        nodes,
        edges: surviving_edges,
    }
}
