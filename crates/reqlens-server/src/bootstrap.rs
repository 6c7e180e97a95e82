//! Wires the indexer, refresher, and the four engines into one shared,
//! `Clone`-able handle built once at process start.

use reqlens_cluster::{ClusterEngine, ClusterStore};
use reqlens_core::{Config, Result};
use reqlens_describe::{BodyAnalyzer, DescribeEngine, JsonSchemaAnalyzer};
use reqlens_flow::FlowEngine;
use reqlens_index::{EntryCache, Indexer};
use reqlens_refresh::{Refresher, RefresherConfig};
use reqlens_search::SearchEngine;
use reqlens_upstream::{HttpUpstreamClient, UpstreamClient};
use std::sync::Arc;

/// Every dependency a tool handler needs, built once at process start and
/// shared behind `Arc` for the lifetime of the process.
#[derive(Clone)]
pub struct AppState {
    config: Config,
    indexer: Arc<Indexer>,
    upstream: Arc<dyn UpstreamClient>,
    refresher: Arc<Refresher>,
    cluster_store: Arc<ClusterStore>,
    search: Arc<SearchEngine>,
    cluster: Arc<ClusterEngine>,
    flow: Arc<FlowEngine>,
    describe: Arc<DescribeEngine>,
}

impl AppState {
    /// Build application state from environment-derived configuration.
    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    pub fn new(config: Config) -> Self {
        let indexer = Arc::new(Indexer::new(
            Arc::new(EntryCache::new(config.entry_cache_max_items)),
            config.index_body,
            config.index_body_max_bytes,
        ));
        let upstream: Arc<dyn UpstreamClient> = Arc::new(HttpUpstreamClient::new(&config.base_url));
        let refresher = Arc::new(Refresher::new(
            indexer.clone(),
            upstream.clone(),
            RefresherConfig::from(&config),
        ));
        let cluster_store = Arc::new(ClusterStore::new());
        let analyzer: Arc<dyn BodyAnalyzer> = Arc::new(JsonSchemaAnalyzer);

        let search = Arc::new(SearchEngine::new(indexer.clone(), refresher.clone()));
        let cluster = Arc::new(ClusterEngine::new(indexer.clone(), refresher.clone(), cluster_store.clone()));
        let flow = Arc::new(FlowEngine::new(indexer.clone(), refresher.clone()));
        let describe = Arc::new(DescribeEngine::new(
            indexer.clone(),
            refresher.clone(),
            upstream.clone(),
            cluster_store.clone(),
            analyzer,
        ));

        Self {
            config,
            indexer,
            upstream,
            refresher,
            cluster_store,
            search,
            cluster,
            flow,
            describe,
        }
    }

    /// Assembles state from already-built parts, bypassing `Config::from_env`
    /// and the `reqwest`-backed upstream client. Used by tests that need a
    /// [`reqlens_upstream::testing::FakeUpstreamClient`] in place of a real
    /// capture-daemon connection.
    #[cfg(test)]
    pub fn with_parts(config: Config, indexer: Arc<Indexer>, upstream: Arc<dyn UpstreamClient>) -> Self {
        let refresher = Arc::new(Refresher::new(indexer.clone(), upstream.clone(), RefresherConfig::from(&config)));
        let cluster_store = Arc::new(ClusterStore::new());
        let analyzer: Arc<dyn BodyAnalyzer> = Arc::new(JsonSchemaAnalyzer);

        let search = Arc::new(SearchEngine::new(indexer.clone(), refresher.clone()));
        let cluster = Arc::new(ClusterEngine::new(indexer.clone(), refresher.clone(), cluster_store.clone()));
        let flow = Arc::new(FlowEngine::new(indexer.clone(), refresher.clone()));
        let describe = Arc::new(DescribeEngine::new(
            indexer.clone(),
            refresher.clone(),
            upstream.clone(),
            cluster_store.clone(),
            analyzer,
        ));

        Self {
            config,
            indexer,
            upstream,
            refresher,
            cluster_store,
            search,
            cluster,
            flow,
            describe,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    pub fn upstream(&self) -> &Arc<dyn UpstreamClient> {
        &self.upstream
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    pub fn cluster_store(&self) -> &Arc<ClusterStore> {
        &self.cluster_store
    }

    pub fn search(&self) -> &Arc<SearchEngine> {
        &self.search
    }

    pub fn cluster(&self) -> &Arc<ClusterEngine> {
        &self.cluster
    }

    pub fn flow(&self) -> &Arc<FlowEngine> {
        &self.flow
    }

    pub fn describe(&self) -> &Arc<DescribeEngine> {
        &self.describe
    }
}

/// Installs the global `tracing` subscriber per the configured log level.
/// Logs go to stderr so stdout stays reserved for the tool-protocol framing.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| reqlens_core::Error::Internal(format!("failed to install tracing subscriber: {e}")))?;
    Ok(())
}
