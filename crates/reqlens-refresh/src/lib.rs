//! On-demand and background index refresh against the upstream capture
//! daemon (component C5).

pub mod refresher;

pub use refresher::{Refresher, RefresherConfig};
