//! A `reqwest`-backed [`UpstreamClient`] talking to the capture daemon's HTTP API.

use crate::client::UpstreamClient;
use async_trait::async_trait;
use reqlens_core::{Entry, Error, Result, SessionInfo};
use serde::Deserialize;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Races `fut` against `cancel`, returning a [`Error::Timeout`] if the token
/// fires first.
async fn run_cancellable<T>(
    fut: impl Future<Output = Result<T>>,
    cancel: &CancellationToken,
) -> Result<T> {
    tokio::select! {
        res = fut => res,
        _ = cancel.cancelled() => Err(Error::Timeout("operation cancelled".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct SessionsResponse {
    sessions: Vec<SessionInfo>,
}

/// HTTP client for the upstream capture daemon, addressed by `base_url`
/// (`POWHTTP_BASE_URL`).
pub struct HttpUpstreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpUpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn list_sessions(&self, cancel: &CancellationToken) -> Result<Vec<SessionInfo>> {
        let fut = async {
            let resp = self
                .client
                .get(self.url("/sessions"))
                .send()
                .await
                .map_err(|e| Error::Upstream(format!("list_sessions request failed: {e}")))?;
            let body: SessionsResponse = resp
                .json()
                .await
                .map_err(|e| Error::Upstream(format!("list_sessions decode failed: {e}")))?;
            Ok(body.sessions)
        };
        run_cancellable(fut, cancel).await
    }

    async fn get_session(&self, session_id: &str, cancel: &CancellationToken) -> Result<SessionInfo> {
        let fut = async {
            let resp = self
                .client
                .get(self.url(&format!("/sessions/{session_id}")))
                .send()
                .await
                .map_err(|e| Error::Upstream(format!("get_session request failed: {e}")))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(Error::NotFound(format!("session {session_id}")));
            }
            resp.json()
                .await
                .map_err(|e| Error::Upstream(format!("get_session decode failed: {e}")))
        };
        run_cancellable(fut, cancel).await
    }

    async fn get_entry(
        &self,
        session_id: &str,
        entry_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Entry> {
        let fut = async {
            let resp = self
                .client
                .get(self.url(&format!("/sessions/{session_id}/entries/{entry_id}")))
                .send()
                .await
                .map_err(|e| Error::Upstream(format!("get_entry request failed: {e}")))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(Error::NotFound(format!("entry {entry_id}")));
            }
            resp.json()
                .await
                .map_err(|e| Error::Upstream(format!("get_entry decode failed: {e}")))
        };
        run_cancellable(fut, cancel).await
    }
}
