//! Endpoint extraction and classification into clusters (component C7).

pub mod classify;
pub mod engine;
pub mod store;
pub mod types;

pub use classify::classify;
pub use engine::{ClusterEngine, cluster_id_for};
pub use store::ClusterStore;
pub use types::{
    ClusterCategory, ClusterFilters, ClusterOptions, ClusterRequest, ClusterResponse, ClusterResult,
    ClusterScope,
};
