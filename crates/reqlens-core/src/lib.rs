//! Shared types, error taxonomy, and configuration for the reqlens crates.
//!
//! This crate has no async runtime and no I/O: it is the vocabulary every other
//! crate in the workspace speaks (`Entry`, `EntryMeta`, `Error`, `Config`), kept
//! dependency-free so it can sit at the bottom of the build graph.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use types::{
    Entry, EntryMeta, EntryResponse, HeaderPairs, Http2Info, ProcessInfo, SessionInfo, Timings,
    TlsInfo, header_value, normalize_content_type,
};
