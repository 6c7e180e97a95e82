//! Wires the engines into shared application state and exposes them over a
//! stdio tool-protocol loop (component A4).

pub mod bootstrap;
pub mod handlers;
pub mod protocol;
pub mod types;

pub use bootstrap::{AppState, init_tracing};
pub use protocol::run_stdio_loop;

use tokio_util::sync::CancellationToken;

/// Races `Ctrl+C` against `SIGTERM` (Unix only) so the process exits on
/// either signal.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Starts the stdio tool loop plus the background refresh tick, returning
/// once either the loop exits (stdin closed) or a shutdown signal fires.
pub async fn serve(state: std::sync::Arc<AppState>) -> reqlens_core::Result<()> {
    let cancel = CancellationToken::new();
    let background = state.refresher().clone().start_background_refresh(cancel.clone());

    tokio::select! {
        result = run_stdio_loop(state.clone(), cancel.clone()) => {
            background.abort();
            result
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            cancel.cancel();
            background.abort();
            Ok(())
        }
    }
}
