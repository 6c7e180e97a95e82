//! The upstream capture-daemon client contract plus an HTTP implementation
//! and an in-memory fake for tests. Sits underneath the indexer and refresher
//! (C4, C5) as the boundary to the process that actually captures traffic.

pub mod client;
pub mod http_client;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use client::UpstreamClient;
pub use http_client::HttpUpstreamClient;
