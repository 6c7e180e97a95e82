//! The `UpstreamClient` trait: the only transport the core relies on.

use async_trait::async_trait;
use reqlens_core::{Entry, Result, SessionInfo};
use tokio_util::sync::CancellationToken;

/// Client for the upstream HTTP capture daemon. Every operation is
/// cancellable via a [`CancellationToken`], honored at the I/O boundary.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// List every session the capture daemon currently knows about.
    async fn list_sessions(&self, cancel: &CancellationToken) -> Result<Vec<SessionInfo>>;

    /// Fetch one session by id, or the literal `"active"` for whichever
    /// session the daemon considers current.
    async fn get_session(&self, session_id: &str, cancel: &CancellationToken) -> Result<SessionInfo>;

    /// Fetch one entry by id within a session.
    async fn get_entry(
        &self,
        session_id: &str,
        entry_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Entry>;
}
