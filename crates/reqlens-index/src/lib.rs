//! The entry cache and inverted-index core (components C2, C3, C4).

pub mod cache;
pub mod indexer;
pub mod meta_builder;

pub use cache::EntryCache;
pub use indexer::{Indexer, SessionState};
pub use meta_builder::build_entry_meta;
