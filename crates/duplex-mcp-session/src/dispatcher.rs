//! The seam between the session engine and an endpoint implementation.
//!
//! The engine owns correlation, cancellation and progress; everything
//! method-specific goes through a [`RequestDispatcher`]. The server and
//! client crates each supply one.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use duplex_mcp_core::{McpResult, RequestId};

use crate::engine::SessionHandle;
use crate::progress::ProgressReporter;

/// Per-request context handed to the dispatcher.
///
/// Replaces ambient async state with explicit parameters: a cancellation
/// scope, a progress emitter when the request carried a token, and the
/// session handle for talking back to the peer.
pub struct RequestContext {
    request_id: RequestId,
    cancellation: CancellationToken,
    progress: Option<ProgressReporter>,
    peer: SessionHandle,
}

impl RequestContext {
    pub(crate) fn new(
        request_id: RequestId,
        cancellation: CancellationToken,
        progress: Option<ProgressReporter>,
        peer: SessionHandle,
    ) -> Self {
        Self {
            request_id,
            cancellation,
            progress,
            peer,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Fires when the peer cancels this request. Long-running handlers
    /// should select against it; the engine discards the outcome either way.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Present when the originator asked for progress updates.
    pub fn progress(&self) -> Option<&ProgressReporter> {
        self.progress.as_ref()
    }

    /// The session this request arrived on, for requests back to the peer.
    pub fn peer(&self) -> &SessionHandle {
        &self.peer
    }
}

/// Answers inbound requests.
///
/// A returned `Err` becomes a JSON-RPC error frame via the §7 mapping;
/// payload-level failures (a tool that ran and failed) belong in the `Ok`
/// result instead.
#[async_trait]
pub trait RequestDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: RequestContext,
    ) -> McpResult<Value>;

    /// Handle an inbound notification the engine does not consume itself
    /// (everything except `notifications/cancelled` and
    /// `notifications/progress`).
    async fn dispatch_notification(&self, method: &str, params: Option<Value>, peer: SessionHandle);
}
