//! Filter planning, post-filtering, scoring and pagination (component C6).

use crate::types::{EntrySummary, SearchFilters, SearchHit, SearchRequest, SearchResponse, SearchScope};
use reqlens_core::{EntryMeta, Result};
use reqlens_index::Indexer;
use reqlens_refresh::Refresher;
use roaring::RoaringBitmap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn time_bounds(filters: &SearchFilters, now: i64) -> (i64, i64) {
    if filters.time_window_ms > 0 {
        (now - filters.time_window_ms, now)
    } else {
        let lower = if filters.since_ms > 0 { filters.since_ms } else { i64::MIN };
        let upper = if filters.until_ms > 0 { filters.until_ms } else { i64::MAX };
        (lower, upper)
    }
}

pub struct SearchEngine {
    indexer: Arc<Indexer>,
    refresher: Arc<Refresher>,
}

impl SearchEngine {
    pub fn new(indexer: Arc<Indexer>, refresher: Arc<Refresher>) -> Self {
        Self { indexer, refresher }
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        self.refresher.refresh_if_stale(&req.session_id).await?;

        let synced_at_ms = self
            .indexer
            .get_session_state(&req.session_id)
            .and_then(|s| s.last_sync_at_ms);

        let query_tokens = req
            .query
            .as_deref()
            .map(reqlens_tokenize::tokenize)
            .unwrap_or_default();

        let candidates = match self.plan_filters(&req.filters, &query_tokens) {
            Some(bm) => bm,
            None => {
                return Ok(SearchResponse {
                    results: Vec::new(),
                    total_hint: 0,
                    synced_at_ms,
                    scope: self.scope_for(req, 0, 0),
                });
            }
        };

        let now = now_ms();
        let (lower, upper) = time_bounds(&req.filters, now);

        let mut survivors = Vec::new();
        let mut body_total = 0usize;
        let mut body_cache_hits = 0usize;

        for doc_id in candidates.iter() {
            let Some(meta) = self.indexer.get_meta(doc_id) else {
                continue;
            };
            if meta.started_at_ms < lower || meta.started_at_ms > upper {
                continue;
            }
            if let Some(needle) = &req.filters.path_contains {
                if !meta.path.to_lowercase().contains(&needle.to_lowercase()) {
                    continue;
                }
            }
            if let Some(needle) = &req.filters.url_contains {
                if !meta.url.to_lowercase().contains(&needle.to_lowercase()) {
                    continue;
                }
            }
            if let Some(needle) = &req.filters.header_contains {
                let needle_lower = needle.to_lowercase();
                let matched = meta
                    .header_pairs
                    .iter()
                    .any(|(n, v)| format!("{n}: {v}").to_lowercase().contains(&needle_lower));
                if !matched {
                    continue;
                }
            }
            if let Some(needle) = &req.filters.body_contains {
                body_total += 1;
                match self.indexer.cache().get(&meta.entry_id) {
                    Some(entry) => {
                        body_cache_hits += 1;
                        let needle_lower = needle.to_lowercase();
                        let req_matched = entry
                            .decoded_request_body()
                            .map(|b| String::from_utf8_lossy(&b).to_lowercase().contains(&needle_lower))
                            .unwrap_or(false);
                        let resp_matched = entry
                            .decoded_response_body()
                            .map(|b| String::from_utf8_lossy(&b).to_lowercase().contains(&needle_lower))
                            .unwrap_or(false);
                        if !(req_matched || resp_matched) {
                            continue;
                        }
                    }
                    None => continue,
                }
            }
            survivors.push((doc_id, meta));
        }

        let total_hint = survivors.len();

        let scored = self.score(survivors, &query_tokens, &req.filters);
        let mut scored = scored;
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let limit = match req.limit {
            0 => DEFAULT_LIMIT,
            n => n.min(MAX_LIMIT),
        };
        let start = req.offset.min(scored.len());
        let end = (start + limit).min(scored.len());

        let results = scored[start..end]
            .iter()
            .map(|(meta, score, highlights, matched_in)| SearchHit {
                summary: EntrySummary {
                    entry_id: meta.entry_id.clone(),
                    method: meta.method.clone(),
                    url: meta.url.clone(),
                    host: meta.host.clone(),
                    status: meta.status,
                    started_at_ms: meta.started_at_ms,
                },
                score: *score,
                highlights: highlights.clone(),
                matched_in: matched_in.clone(),
            })
            .collect();

        Ok(SearchResponse {
            results,
            total_hint,
            synced_at_ms,
            scope: self.scope_for(req, body_cache_hits, body_total),
        })
    }

    fn plan_filters(&self, filters: &SearchFilters, query_tokens: &[String]) -> Option<RoaringBitmap> {
        let mut candidates = self.indexer.all_doc_ids();

        macro_rules! and_or_empty {
            ($opt:expr, $lookup:expr) => {
                if let Some(value) = $opt {
                    match $lookup(value) {
                        Some(bm) => candidates &= bm,
                        None => return None,
                    }
                }
            };
        }

        and_or_empty!(&filters.host, |v| self.indexer.get_bitmap_for_host(v));
        and_or_empty!(&filters.method, |v| self.indexer.get_bitmap_for_method(v));
        and_or_empty!(&filters.status, |v: &u16| self.indexer.get_bitmap_for_status(*v));
        and_or_empty!(&filters.http_version, |v| self.indexer.get_bitmap_for_http_version(v));
        and_or_empty!(&filters.process_name, |v| self.indexer.get_bitmap_for_process_name(v));
        and_or_empty!(&filters.pid, |v: &u32| self.indexer.get_bitmap_for_pid(*v));
        and_or_empty!(&filters.header_name, |v| self.indexer.get_bitmap_for_header_name(v));
        and_or_empty!(&filters.tls_connection_id, |v| self
            .indexer
            .get_bitmap_for_tls_connection_id(v));
        and_or_empty!(&filters.ja3, |v| self.indexer.get_bitmap_for_ja3(v));
        and_or_empty!(&filters.ja4, |v| self.indexer.get_bitmap_for_ja4(v));

        for token in query_tokens {
            let mut union = RoaringBitmap::new();
            if let Some(bm) = self.indexer.get_bitmap_for_token(token) {
                union |= &bm;
            }
            if let Some(bm) = self.indexer.get_bitmap_for_header_token(token) {
                union |= &bm;
            }
            if self.indexer.body_index_enabled() {
                if let Some(bm) = self.indexer.get_bitmap_for_body_token(token) {
                    union |= &bm;
                }
            }
            candidates &= union;
        }

        Some(candidates)
    }

    fn score(
        &self,
        survivors: Vec<(u32, EntryMeta)>,
        query_tokens: &[String],
        filters: &SearchFilters,
    ) -> Vec<(EntryMeta, f64, Vec<String>, Vec<String>)> {
        let tmin = survivors.iter().map(|(_, m)| m.started_at_ms).min().unwrap_or(0);
        let tmax_raw = survivors.iter().map(|(_, m)| m.started_at_ms).max().unwrap_or(0);
        let tmax = if tmax_raw == tmin { tmin + 1 } else { tmax_raw };
        let span = (tmax - tmin) as f64;

        let total_query_tokens = query_tokens.len() as f64;

        survivors
            .into_iter()
            .map(|(doc_id, meta)| {
                let mut score = 0.1;
                let mut highlights = Vec::new();
                let mut matched_in = Vec::new();

                if !query_tokens.is_empty() {
                    let url_matches: Vec<&String> = query_tokens
                        .iter()
                        .filter(|t| {
                            self.indexer
                                .get_bitmap_for_token(t)
                                .is_some_and(|bm| bm.contains(doc_id))
                        })
                        .collect();
                    let header_hits = query_tokens
                        .iter()
                        .filter(|t| {
                            self.indexer
                                .get_bitmap_for_header_token(t)
                                .is_some_and(|bm| bm.contains(doc_id))
                        })
                        .count();
                    let body_hits = if self.indexer.body_index_enabled() {
                        query_tokens
                            .iter()
                            .filter(|t| {
                                self.indexer
                                    .get_bitmap_for_body_token(t)
                                    .is_some_and(|bm| bm.contains(doc_id))
                            })
                            .count()
                    } else {
                        0
                    };

                    let u = url_matches.len() as f64 / total_query_tokens;
                    score += 0.4 * u;
                    if !url_matches.is_empty() {
                        matched_in.push("url".to_string());
                        highlights.extend(url_matches.into_iter().cloned());
                    }

                    let h = header_hits as f64 / total_query_tokens;
                    score += 0.3 * h;
                    if header_hits > 0 {
                        matched_in.push("header".to_string());
                    }

                    if self.indexer.body_index_enabled() {
                        let b = body_hits as f64 / total_query_tokens;
                        score += 0.2 * b;
                        if body_hits > 0 {
                            matched_in.push("body".to_string());
                        }
                    }
                }

                if let Some(method) = &filters.method {
                    if meta.method.eq_ignore_ascii_case(method) {
                        score += 0.1;
                    }
                }

                score += 0.3 * (meta.started_at_ms - tmin) as f64 / span;

                if let Some(header_name) = &filters.header_name {
                    if meta.header_names.contains(&header_name.to_ascii_lowercase()) {
                        score += 0.2;
                    }
                }

                (meta, score, highlights, matched_in)
            })
            .collect()
    }

    fn scope_for(&self, req: &SearchRequest, body_cache_hits: usize, body_total: usize) -> Option<SearchScope> {
        let uses_scope_signal =
            req.query.is_some() || req.filters.header_contains.is_some() || req.filters.body_contains.is_some();
        if !uses_scope_signal {
            return None;
        }
        let body_coverage = req.filters.body_contains.as_ref().map(|_| {
            if body_cache_hits == body_total {
                format!("full ({body_total} entries searched)")
            } else {
                format!("partial ({body_cache_hits}/{body_total} entries cached)")
            }
        });
        Some(SearchScope {
            body_index_enabled: self.indexer.body_index_enabled(),
            body_coverage,
        })
    }
}
