//! Single-writer, many-reader inverted index over ingested entries (component C4).

use crate::cache::EntryCache;
use crate::meta_builder::build_entry_meta;
use reqlens_core::types::{header_value, normalize_content_type};
use reqlens_core::{Entry, EntryMeta};
use reqlens_tokenize::{tokenize_body, tokenize_headers, tokenize_url};
use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-session refresh bookkeeping, read and written by the refresher.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub last_entry_ids_len: usize,
    pub last_tail_entry_id: Option<String>,
    pub last_sync_at_ms: Option<i64>,
}

struct IndexerInner {
    docs: Vec<EntryMeta>,
    id_to_doc: HashMap<String, u32>,
    all_ids: RoaringBitmap,

    host: HashMap<String, RoaringBitmap>,
    method: HashMap<String, RoaringBitmap>,
    process_name: HashMap<String, RoaringBitmap>,
    pid: HashMap<u32, RoaringBitmap>,
    status: HashMap<u16, RoaringBitmap>,
    http_version: HashMap<String, RoaringBitmap>,
    header_name: HashMap<String, RoaringBitmap>,
    header_name_value: HashMap<String, RoaringBitmap>,
    tls_connection_id: HashMap<String, RoaringBitmap>,
    h2_connection_id: HashMap<String, RoaringBitmap>,
    ja3: HashMap<String, RoaringBitmap>,
    ja4: HashMap<String, RoaringBitmap>,

    url_token: HashMap<String, RoaringBitmap>,
    header_token: HashMap<String, RoaringBitmap>,
    body_token: HashMap<String, RoaringBitmap>,

    session_state: HashMap<String, SessionState>,
}

impl IndexerInner {
    fn new() -> Self {
        Self {
            docs: Vec::new(),
            id_to_doc: HashMap::new(),
            all_ids: RoaringBitmap::new(),
            host: HashMap::new(),
            method: HashMap::new(),
            process_name: HashMap::new(),
            pid: HashMap::new(),
            status: HashMap::new(),
            http_version: HashMap::new(),
            header_name: HashMap::new(),
            header_name_value: HashMap::new(),
            tls_connection_id: HashMap::new(),
            h2_connection_id: HashMap::new(),
            ja3: HashMap::new(),
            ja4: HashMap::new(),
            url_token: HashMap::new(),
            header_token: HashMap::new(),
            body_token: HashMap::new(),
            session_state: HashMap::new(),
        }
    }
}

fn header_name_value_key(name: &str, value: &str) -> String {
    format!("{}:{}", name.to_ascii_lowercase(), value)
}

/// The core in-memory index: doc-id allocation, per-field inverted bitmaps, and
/// per-session refresh state, all behind a single reader-writer lock.
pub struct Indexer {
    inner: RwLock<IndexerInner>,
    cache: Arc<EntryCache>,
    body_index_enabled: bool,
    body_index_max_bytes: usize,
}

impl Indexer {
    pub fn new(cache: Arc<EntryCache>, body_index_enabled: bool, body_index_max_bytes: usize) -> Self {
        Self {
            inner: RwLock::new(IndexerInner::new()),
            cache,
            body_index_enabled,
            body_index_max_bytes,
        }
    }

    pub fn body_index_enabled(&self) -> bool {
        self.body_index_enabled
    }

    pub fn cache(&self) -> &Arc<EntryCache> {
        &self.cache
    }

    /// Ingest `entry`, returning its doc-id. Idempotent: re-indexing a known
    /// entry-id returns the original doc-id and mutates nothing.
    pub fn index(&self, entry: &Entry) -> u32 {
        {
            let inner = self.inner.read().unwrap();
            if let Some(&doc_id) = inner.id_to_doc.get(&entry.id) {
                return doc_id;
            }
        }

        let mut inner = self.inner.write().unwrap();
        // Re-check under the write lock: another writer may have raced us.
        if let Some(&doc_id) = inner.id_to_doc.get(&entry.id) {
            return doc_id;
        }

        let doc_id = inner.docs.len() as u32;
        let meta = build_entry_meta(entry, doc_id);

        inner.all_ids.insert(doc_id);
        inner.id_to_doc.insert(entry.id.clone(), doc_id);

        if !meta.host.is_empty() {
            inner.host.entry(meta.host.clone()).or_default().insert(doc_id);
        }
        inner.method.entry(meta.method.clone()).or_default().insert(doc_id);
        if let Some(name) = &meta.process_name {
            inner.process_name.entry(name.clone()).or_default().insert(doc_id);
        }
        if let Some(pid) = meta.pid {
            inner.pid.entry(pid).or_default().insert(doc_id);
        }
        if let Some(status) = meta.status {
            inner.status.entry(status).or_default().insert(doc_id);
        }
        if !meta.http_version.is_empty() {
            inner
                .http_version
                .entry(meta.http_version.clone())
                .or_default()
                .insert(doc_id);
        }
        for name in &meta.header_names {
            inner.header_name.entry(name.clone()).or_default().insert(doc_id);
        }
        for (name, value) in &meta.header_pairs {
            inner
                .header_name_value
                .entry(header_name_value_key(name, value))
                .or_default()
                .insert(doc_id);
        }
        if let Some(id) = &meta.tls_connection_id {
            inner.tls_connection_id.entry(id.clone()).or_default().insert(doc_id);
        }
        if let Some(id) = &meta.h2_connection_id {
            inner.h2_connection_id.entry(id.clone()).or_default().insert(doc_id);
        }
        if let Some(ja3) = &meta.ja3 {
            inner.ja3.entry(ja3.clone()).or_default().insert(doc_id);
        }
        if let Some(ja4) = &meta.ja4 {
            inner.ja4.entry(ja4.clone()).or_default().insert(doc_id);
        }

        for token in tokenize_url(&meta.url) {
            inner.url_token.entry(token).or_default().insert(doc_id);
        }
        for token in tokenize_headers(&meta.header_pairs) {
            inner.header_token.entry(token).or_default().insert(doc_id);
        }

        if self.body_index_enabled {
            for token in self.body_tokens(entry, &meta) {
                inner.body_token.entry(token).or_default().insert(doc_id);
            }
        }

        inner.docs.push(meta);

        self.cache.put(Arc::new(entry.clone()));

        doc_id
    }

    fn body_tokens(&self, entry: &Entry, meta: &EntryMeta) -> Vec<String> {
        let mut tokens = Vec::new();
        if let Some(req_ct) = header_value(&entry.headers, "content-type") {
            if let Some(body) = entry.decoded_request_body() {
                tokens.extend(tokenize_body(
                    &normalize_content_type(&req_ct),
                    &body,
                    self.body_index_max_bytes,
                ));
            }
        }
        if let Some(resp_ct) = &meta.response_content_type {
            if let Some(body) = entry.decoded_response_body() {
                tokens.extend(tokenize_body(resp_ct, &body, self.body_index_max_bytes));
            }
        }
        tokens
    }

    pub fn get_meta(&self, doc_id: u32) -> Option<EntryMeta> {
        let inner = self.inner.read().unwrap();
        inner.docs.get(doc_id as usize).cloned()
    }

    pub fn get_meta_by_entry_id(&self, entry_id: &str) -> Option<EntryMeta> {
        let inner = self.inner.read().unwrap();
        let doc_id = *inner.id_to_doc.get(entry_id)?;
        inner.docs.get(doc_id as usize).cloned()
    }

    pub fn all_doc_ids(&self) -> RoaringBitmap {
        self.inner.read().unwrap().all_ids.clone()
    }

    pub fn doc_count(&self) -> usize {
        self.inner.read().unwrap().docs.len()
    }

    pub fn get_bitmap_for_host(&self, host: &str) -> Option<RoaringBitmap> {
        let host = host.to_ascii_lowercase();
        let inner = self.inner.read().unwrap();
        if let Some(base) = host.strip_prefix("*.") {
            if base.is_empty() {
                return None;
            }
            let suffix = format!(".{base}");
            let mut union = RoaringBitmap::new();
            let mut found = false;
            for (key, bm) in inner.host.iter() {
                if key == base || key.ends_with(&suffix) {
                    union |= bm;
                    found = true;
                }
            }
            if found && !union.is_empty() { Some(union) } else { None }
        } else {
            inner.host.get(&host).cloned()
        }
    }

    pub fn get_bitmap_for_method(&self, method: &str) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().method.get(&method.to_ascii_uppercase()).cloned()
    }

    pub fn get_bitmap_for_status(&self, status: u16) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().status.get(&status).cloned()
    }

    pub fn get_bitmap_for_http_version(&self, version: &str) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().http_version.get(version).cloned()
    }

    pub fn get_bitmap_for_process_name(&self, name: &str) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().process_name.get(name).cloned()
    }

    pub fn get_bitmap_for_pid(&self, pid: u32) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().pid.get(&pid).cloned()
    }

    pub fn get_bitmap_for_header_name(&self, name: &str) -> Option<RoaringBitmap> {
        self.inner
            .read()
            .unwrap()
            .header_name
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub fn get_bitmap_for_header_name_value(&self, name: &str, value: &str) -> Option<RoaringBitmap> {
        self.inner
            .read()
            .unwrap()
            .header_name_value
            .get(&header_name_value_key(name, value))
            .cloned()
    }

    pub fn get_bitmap_for_tls_connection_id(&self, id: &str) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().tls_connection_id.get(id).cloned()
    }

    pub fn get_bitmap_for_h2_connection_id(&self, id: &str) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().h2_connection_id.get(id).cloned()
    }

    pub fn get_bitmap_for_ja3(&self, ja3: &str) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().ja3.get(ja3).cloned()
    }

    pub fn get_bitmap_for_ja4(&self, ja4: &str) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().ja4.get(ja4).cloned()
    }

    pub fn get_bitmap_for_token(&self, token: &str) -> Option<RoaringBitmap> {
        self.inner.read().unwrap().url_token.get(&token.to_ascii_lowercase()).cloned()
    }

    pub fn get_bitmap_for_header_token(&self, token: &str) -> Option<RoaringBitmap> {
        self.inner
            .read()
            .unwrap()
            .header_token
            .get(&token.to_ascii_lowercase())
            .cloned()
    }

    pub fn get_bitmap_for_body_token(&self, token: &str) -> Option<RoaringBitmap> {
        self.inner
            .read()
            .unwrap()
            .body_token
            .get(&token.to_ascii_lowercase())
            .cloned()
    }

    pub fn get_session_state(&self, session_id: &str) -> Option<SessionState> {
        self.inner.read().unwrap().session_state.get(session_id).cloned()
    }

    pub fn set_session_state(&self, session_id: &str, state: SessionState) {
        self.inner
            .write()
            .unwrap()
            .session_state
            .insert(session_id.to_string(), state);
    }
}
