//! Standalone stdio tool-server binary: bootstrap application state and run
//! the tool loop until stdin closes or a shutdown signal fires.

use reqlens_core::Config;
use reqlens_server::{AppState, init_tracing, serve};
use std::sync::Arc;

#[tokio::main]
async fn main() -> reqlens_core::Result<()> {
    let config = Config::from_env();
    init_tracing(&config)?;

    let state = Arc::new(AppState::new(config));
    serve(state).await
}
