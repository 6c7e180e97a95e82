//! The stdio JSON-RPC-shaped tool loop (component A4): one request object
//! read per line, one response object written per line. A different framing
//! (HTTP, a real MCP SDK) could replace this module without touching the
//! engines.

use crate::bootstrap::AppState;
use crate::handlers;
use futures::FutureExt;
use reqlens_core::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct ToolRequest {
    tool: String,
    #[serde(default)]
    input: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    kind: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ToolResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorPayload>,
}

fn kind_str(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "not_found",
        ErrorKind::InvalidInput => "invalid_input",
        ErrorKind::Upstream => "upstream_error",
        ErrorKind::Timeout => "timeout",
        ErrorKind::Internal => "internal_error",
    }
}

async fn handle_line(state: &AppState, line: &str, cancel: &CancellationToken) -> ToolResponse {
    let parsed: Result<ToolRequest, _> = serde_json::from_str(line);
    let request = match parsed {
        Ok(req) => req,
        Err(err) => {
            return ToolResponse {
                output: None,
                error: Some(ErrorPayload {
                    kind: kind_str(ErrorKind::InvalidInput),
                    message: format!("malformed request: {err}"),
                }),
            };
        }
    };

    // A handler panic must not take down a long-lived stdio session: catch it
    // at this boundary and report it the same as any other internal error.
    let result = std::panic::AssertUnwindSafe(handlers::dispatch(state, &request.tool, request.input, cancel))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(output)) => ToolResponse { output: Some(output), error: None },
        Ok(Err(err)) => ToolResponse {
            output: None,
            error: Some(ErrorPayload { kind: kind_str(err.kind()), message: err.to_string() }),
        },
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            tracing::error!(tool = %request.tool, %message, "tool handler panicked");
            ToolResponse {
                output: None,
                error: Some(ErrorPayload { kind: kind_str(ErrorKind::Internal), message }),
            }
        }
    }
}

/// Drives the loop until stdin closes or `cancel` fires. Each line is
/// handled independently so a single malformed request or handler error
/// never takes down the process.
pub async fn run_stdio_loop(state: Arc<AppState>, cancel: CancellationToken) -> reqlens_core::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.map_err(Error::Io)?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(&state, &line, &cancel).await;
        let mut serialized = serde_json::to_string(&response)?;
        serialized.push('\n');
        stdout.write_all(serialized.as_bytes()).await.map_err(Error::Io)?;
        stdout.flush().await.map_err(Error::Io)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqlens_core::Config;
    use reqlens_index::{EntryCache, Indexer};
    use reqlens_upstream::testing::FakeUpstreamClient;

    fn state() -> AppState {
        let cfg = Config::default();
        let indexer = Arc::new(Indexer::new(
            Arc::new(EntryCache::new(cfg.entry_cache_max_items)),
            cfg.index_body,
            cfg.index_body_max_bytes,
        ));
        let upstream: Arc<dyn reqlens_upstream::UpstreamClient> = Arc::new(FakeUpstreamClient::new());
        AppState::with_parts(cfg, indexer, upstream)
    }

    #[tokio::test]
    async fn malformed_json_line_reports_invalid_input() {
        let state = state();
        let cancel = CancellationToken::new();
        let response = handle_line(&state, "not json", &cancel).await;
        assert!(response.output.is_none());
        assert_eq!(response.error.unwrap().kind, "invalid_input");
    }

    #[tokio::test]
    async fn unknown_tool_reports_invalid_input() {
        let state = state();
        let cancel = CancellationToken::new();
        let response = handle_line(&state, r#"{"tool": "nope", "input": {}}"#, &cancel).await;
        assert_eq!(response.error.unwrap().kind, "invalid_input");
    }

    #[tokio::test]
    async fn missing_session_fails_through_refresh_if_stale() {
        let state = state();
        let cancel = CancellationToken::new();
        let line = r#"{"tool": "search", "input": {"session_id": "missing"}}"#;
        let response = handle_line(&state, line, &cancel).await;
        // `refresh_if_stale` wraps the upstream's `NotFound` as `Upstream` (the
        // refresher's singleflight result only carries a message, not a kind).
        assert_eq!(response.error.unwrap().kind, "upstream_error");
    }
}
