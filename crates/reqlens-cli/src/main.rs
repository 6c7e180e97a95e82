//! Command-line entry point: run the stdio tool server, or inspect index
//! state for manual smoke testing — debug aids, not part of the
//! tool-protocol surface.

use clap::{Parser, Subcommand};
use reqlens_core::Config;
use reqlens_server::{AppState, init_tracing, serve};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "reqlens")]
#[command(about = "ReqLens - in-process request indexing and analysis over captured HTTP traffic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stdio tool server
    Serve,
    /// Print indexer doc count and per-session refresh state
    Stats,
    /// Force an on-demand refresh of one session and print its resulting state
    Refresh {
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> reqlens_core::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing(&config)?;

    match cli.command {
        Commands::Serve => {
            let state = Arc::new(AppState::new(config));
            serve(state).await?;
        }
        Commands::Stats => {
            let state = AppState::new(config);
            println!("doc_count: {}", state.indexer().doc_count());
            let cancel = CancellationToken::new();
            match state.upstream().list_sessions(&cancel).await {
                Ok(sessions) => {
                    for session in sessions {
                        let refresh_state = state.indexer().get_session_state(&session.id);
                        println!("session {}: {:?}", session.id, refresh_state);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "stats: failed to list sessions");
                }
            }
        }
        Commands::Refresh { session_id } => {
            let state = AppState::new(config);
            let refreshed = state.refresher().refresh_session(&session_id).await?;
            println!("session {session_id} refreshed: {refreshed:?}");
        }
    }

    Ok(())
}
