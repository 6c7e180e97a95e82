//! Filter planning, post-filtering, scoring, and pagination over the index
//! (component C6).

pub mod engine;
pub mod types;

pub use engine::SearchEngine;
pub use types::{EntrySummary, SearchFilters, SearchHit, SearchRequest, SearchResponse, SearchScope};
