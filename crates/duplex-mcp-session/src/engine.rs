//! The session engine.
//!
//! One engine instance drives one connection, on either side of the wire.
//! It owns the lifecycle state machine, correlates outbound requests with
//! inbound responses, dispatches inbound requests to the endpoint's
//! [`RequestDispatcher`], and routes cancellation and progress frames.
//!
//! Concurrency shape: the intake task consumes the transport's message
//! stream and never blocks on a handler (requests run as spawned tasks);
//! the writer task is the single consumer of an unbounded outbound queue,
//! so frames leave in FIFO order. The intake queue is unbounded on purpose:
//! backpressure against the transport would let one slow handler stall
//! every other in-flight request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use duplex_mcp_core::protocol::methods;
use duplex_mcp_core::types::{CancelledNotification, EmptyResult, ProgressNotification};
use duplex_mcp_core::{
    JsonRpcError, JsonRpcRequest, McpError, McpResult, Message, ProgressToken, RequestId,
    SessionState,
};
use duplex_mcp_transport::Transport;

use crate::dispatcher::{RequestContext, RequestDispatcher};
use crate::progress::{Progress, ProgressReporter, ProgressSender};

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Applied to outbound requests that do not set their own timeout.
    pub default_timeout: Option<Duration>,

    /// Overrides the transport-supplied session identifier.
    pub session_id: Option<String>,
}

/// Per-request options on the outbound path.
#[derive(Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,

    /// Sink for `notifications/progress` updates; supplying one makes the
    /// engine mint a progress token and ride it in `_meta`.
    pub progress: Option<ProgressSender>,

    /// Cancelling this token aborts the request: the pending entry is
    /// detached, `notifications/cancelled` goes out (never for
    /// `initialize`), and the caller gets [`McpError::Cancelled`].
    pub cancellation: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, sink: ProgressSender) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

struct PendingEntry {
    sender: oneshot::Sender<McpResult<Value>>,
    progress_token: Option<ProgressToken>,
}

struct SessionInner {
    state: RwLock<SessionState>,
    pending: Mutex<HashMap<RequestId, PendingEntry>>,
    inbound: Mutex<HashMap<RequestId, CancellationToken>>,
    progress_sinks: Mutex<HashMap<ProgressToken, ProgressSender>>,
    outbound: mpsc::UnboundedSender<Message>,
    transport: Arc<dyn Transport>,
    next_request_id: AtomicI64,
    next_progress_token: AtomicI64,
    shutdown: CancellationToken,
    session_id: String,
    config: SessionConfig,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionInner {
    fn state(&self) -> SessionState {
        *self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.is_closed() {
            return;
        }
        debug!(session = %self.session_id, from = ?*state, to = ?next, "session state change");
        *state = next;
    }

    fn mint_request_id(&self) -> RequestId {
        RequestId::Number(self.next_request_id.fetch_add(1, Ordering::Relaxed))
    }

    fn mint_progress_token(&self) -> ProgressToken {
        ProgressToken::Number(self.next_progress_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Remove a pending entry along with its progress sink.
    fn take_pending(&self, id: &RequestId) -> Option<PendingEntry> {
        let entry = lock(&self.pending).remove(id);
        if let Some(entry) = &entry {
            if let Some(token) = &entry.progress_token {
                lock(&self.progress_sinks).remove(token);
            }
        }
        entry
    }

    /// Fail everything in flight and cancel every inbound scope.
    fn teardown(&self) {
        let pending: Vec<PendingEntry> = lock(&self.pending).drain().map(|(_, e)| e).collect();
        for entry in pending {
            let _ = entry.sender.send(Err(McpError::Disconnected));
        }
        let inbound: Vec<CancellationToken> =
            lock(&self.inbound).drain().map(|(_, t)| t).collect();
        for token in inbound {
            token.cancel();
        }
        lock(&self.progress_sinks).clear();
        self.shutdown.cancel();
    }
}

/// Handle onto a running session. Cheap to clone; all clones drive the same
/// connection.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.inner.session_id)
            .field("state", &self.inner.state())
            .finish()
    }
}

/// The session engine entry point.
pub struct Session;

impl Session {
    /// Wire a transport to a dispatcher and start the intake and writer
    /// tasks. The returned handle is live until [`SessionHandle::close`] or
    /// transport disconnect.
    pub fn spawn<T: Transport + 'static>(
        mut transport: T,
        dispatcher: Arc<dyn RequestDispatcher>,
        config: SessionConfig,
    ) -> SessionHandle {
        let stream = transport.messages();
        let session_id = config
            .session_id
            .clone()
            .or_else(|| transport.session_id())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let transport: Arc<dyn Transport> = Arc::new(transport);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            state: RwLock::new(SessionState::Created),
            pending: Mutex::new(HashMap::new()),
            inbound: Mutex::new(HashMap::new()),
            progress_sinks: Mutex::new(HashMap::new()),
            outbound: outbound_tx,
            transport: transport.clone(),
            next_request_id: AtomicI64::new(1),
            next_progress_token: AtomicI64::new(1),
            shutdown: CancellationToken::new(),
            session_id,
            config,
        });

        tokio::spawn(writer_task(
            transport,
            outbound_rx,
            inner.shutdown.clone(),
        ));
        tokio::spawn(intake_task(inner.clone(), dispatcher, stream));

        SessionHandle { inner }
    }
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Lifecycle transitions are driven by the endpoint implementations
    /// (handshake and shutdown); `Closed` is terminal.
    pub fn set_state(&self, state: SessionState) {
        self.inner.set_state(state);
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state().is_ready()
    }

    /// Resolves when the session is torn down, by either side.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await;
    }

    /// Issue a request to the peer and await its response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> McpResult<Value> {
        if self.inner.state().is_shutting_down() {
            return Err(McpError::Disconnected);
        }

        let id = self.inner.mint_request_id();
        let mut params = params;

        let progress_token = match options.progress {
            Some(sink) => {
                let token = self.inner.mint_progress_token();
                inject_progress_token(&mut params, &token);
                lock(&self.inner.progress_sinks).insert(token.clone(), sink);
                Some(token)
            }
            None => None,
        };

        let (sender, receiver) = oneshot::channel();
        lock(&self.inner.pending).insert(
            id.clone(),
            PendingEntry {
                sender,
                progress_token,
            },
        );

        debug!(session = %self.inner.session_id, %id, method, "sending request");
        if self
            .inner
            .outbound
            .send(Message::request(id.clone(), method, params))
            .is_err()
        {
            self.inner.take_pending(&id);
            return Err(McpError::Disconnected);
        }

        let cancellation = options.cancellation.unwrap_or_default();
        let timeout = options.timeout.or(self.inner.config.default_timeout);

        tokio::select! {
            outcome = receiver => match outcome {
                Ok(result) => result,
                Err(_) => Err(McpError::Disconnected),
            },
            _ = cancellation.cancelled() => {
                self.abort_outbound(&id, method, None);
                Err(McpError::cancelled(None))
            }
            _ = sleep_or_forever(timeout) => {
                self.abort_outbound(&id, method, Some("request timed out"));
                Err(McpError::RequestTimeout)
            }
        }
    }

    /// Issue a request and decode its result.
    pub async fn request_typed<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> McpResult<R> {
        let value = self.request(method, params, options).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fire a notification at the peer.
    pub fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        if self.inner.state().is_closed() {
            return Err(McpError::Disconnected);
        }
        self.inner
            .outbound
            .send(Message::notification(method, params))
            .map_err(|_| McpError::Disconnected)
    }

    /// Liveness check; either side may ping at any lifecycle stage.
    pub async fn ping(&self) -> McpResult<()> {
        let _: EmptyResult = self
            .request_typed(methods::PING, Some(json!({})), RequestOptions::default())
            .await?;
        Ok(())
    }

    /// Shut the session down: fail pending requests with `Disconnected`,
    /// cancel inbound handlers, close the transport. Terminal.
    pub async fn close(&self) -> McpResult<()> {
        if self.inner.state().is_closed() {
            return Ok(());
        }
        info!(session = %self.inner.session_id, "closing session");
        self.inner.set_state(SessionState::ShuttingDown);
        self.inner.teardown();
        let _ = self.inner.transport.close().await;
        self.inner.set_state(SessionState::Closed);
        Ok(())
    }

    /// Detach a pending outbound request and tell the peer, unless the
    /// request was `initialize`, which must never be cancelled on the wire.
    fn abort_outbound(&self, id: &RequestId, method: &str, reason: Option<&str>) {
        let entry = self.inner.take_pending(id);
        if entry.is_some() && method != methods::INITIALIZE {
            let mut notification = CancelledNotification::new(id.clone());
            if let Some(reason) = reason {
                notification = notification.with_reason(reason);
            }
            let _ = self.inner.outbound.send(Message::notification(
                methods::NOTIFICATION_CANCELLED,
                Some(json!(notification)),
            ));
        }
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

fn inject_progress_token(params: &mut Option<Value>, token: &ProgressToken) {
    let params = params.get_or_insert_with(|| json!({}));
    if let Value::Object(map) = params {
        let meta = map
            .entry("_meta".to_string())
            .or_insert_with(|| json!({}));
        if let Value::Object(meta) = meta {
            meta.insert("progressToken".to_string(), json!(token));
        }
    }
}

/// Single writer: drains the outbound queue into the transport, one frame
/// at a time.
async fn writer_task(
    transport: Arc<dyn Transport>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            // biased so queued frames flush before a shutdown is observed
            biased;
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(err) = transport.send(frame).await {
                        debug!("outbound send failed, stopping writer: {err}");
                        break;
                    }
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }
}

/// Single consumer of the transport stream. Frames are picked up in arrival
/// order; request handlers run concurrently as spawned tasks.
async fn intake_task(
    inner: Arc<SessionInner>,
    dispatcher: Arc<dyn RequestDispatcher>,
    mut stream: duplex_mcp_transport::MessageStream,
) {
    loop {
        let item = tokio::select! {
            item = stream.recv() => item,
            _ = inner.shutdown.cancelled() => break,
        };
        let Some(item) = item else { break };
        match item {
            Ok(Message::Request(request)) => handle_inbound_request(&inner, &dispatcher, request),
            Ok(Message::Response(response)) => {
                complete_pending(&inner, &response.id, Ok(response.result));
            }
            Ok(Message::Error(error)) => {
                complete_pending(&inner, &error.id, Err(McpError::Peer(error.error)));
            }
            Ok(Message::Notification(notification)) => {
                handle_inbound_notification(&inner, &dispatcher, notification).await;
            }
            Err(err) => {
                warn!(session = %inner.session_id, "transport error: {err}");
                break;
            }
        }
    }

    debug!(session = %inner.session_id, "transport stream ended");
    inner.set_state(SessionState::Closed);
    inner.teardown();
}

fn complete_pending(inner: &Arc<SessionInner>, id: &RequestId, outcome: McpResult<Value>) {
    match inner.take_pending(id) {
        Some(entry) => {
            let _ = entry.sender.send(outcome);
        }
        // completion already raced with cancellation or timeout
        None => debug!(session = %inner.session_id, %id, "dropping late response"),
    }
}

fn handle_inbound_request(
    inner: &Arc<SessionInner>,
    dispatcher: &Arc<dyn RequestDispatcher>,
    request: JsonRpcRequest,
) {
    let token = inner.shutdown.child_token();
    lock(&inner.inbound).insert(request.id.clone(), token.clone());

    let reporter = request
        .progress_token()
        .map(|t| ProgressReporter::new(t, inner.outbound.clone()));
    let ctx = RequestContext::new(
        request.id.clone(),
        token.clone(),
        reporter,
        SessionHandle {
            inner: inner.clone(),
        },
    );

    let dispatcher = dispatcher.clone();
    let inner = inner.clone();
    tokio::spawn(async move {
        let outcome = tokio::select! {
            _ = token.cancelled() => None,
            result = dispatcher.dispatch(&request.method, request.params.clone(), ctx) => Some(result),
        };

        // whichever of handler completion and cancellation removes the
        // registry entry first decides whether a frame goes out
        let registered = lock(&inner.inbound).remove(&request.id).is_some();
        let outcome = match outcome {
            Some(outcome) if registered => outcome,
            _ => {
                debug!(session = %inner.session_id, id = %request.id, method = %request.method,
                    "inbound request cancelled, discarding outcome");
                return;
            }
        };

        let frame = match outcome {
            Ok(result) => Message::response(request.id, result),
            Err(err) => {
                debug!(session = %inner.session_id, method = %request.method,
                    "handler failed: {err}");
                Message::error(request.id, JsonRpcError::from(err))
            }
        };
        let _ = inner.outbound.send(frame);
    });
}

/// Notifications are consumed inline so their effects are ordered with the
/// requests that follow them (`notifications/initialized` must flip the
/// state before the next request is looked at). Notification handlers are
/// expected to be cheap; heavy work belongs in a task they spawn.
async fn handle_inbound_notification(
    inner: &Arc<SessionInner>,
    dispatcher: &Arc<dyn RequestDispatcher>,
    notification: duplex_mcp_core::JsonRpcNotification,
) {
    match notification.method.as_str() {
        methods::NOTIFICATION_CANCELLED => {
            let parsed: Option<CancelledNotification> = notification
                .params
                .and_then(|p| serde_json::from_value(p).ok());
            let Some(cancelled) = parsed else {
                debug!(session = %inner.session_id, "malformed cancellation notification, dropping");
                return;
            };
            match lock(&inner.inbound).remove(&cancelled.request_id) {
                Some(token) => {
                    debug!(session = %inner.session_id, id = %cancelled.request_id,
                        reason = cancelled.reason.as_deref().unwrap_or(""),
                        "peer cancelled inbound request");
                    token.cancel();
                }
                // raced with completion: nothing to do
                None => debug!(session = %inner.session_id, id = %cancelled.request_id,
                    "cancellation for unknown request id, dropping"),
            }
        }
        methods::NOTIFICATION_PROGRESS => {
            let parsed: Option<ProgressNotification> = notification
                .params
                .and_then(|p| serde_json::from_value(p).ok());
            let Some(progress) = parsed else {
                debug!(session = %inner.session_id, "malformed progress notification, dropping");
                return;
            };
            let sinks = lock(&inner.progress_sinks);
            match sinks.get(&progress.progress_token) {
                Some(sink) => {
                    let _ = sink.send(Progress {
                        progress: progress.progress,
                        total: progress.total,
                        message: progress.message,
                    });
                }
                None => debug!(session = %inner.session_id, token = %progress.progress_token,
                    "progress for unknown token, dropping"),
            }
        }
        _ => {
            let peer = SessionHandle {
                inner: inner.clone(),
            };
            dispatcher
                .dispatch_notification(&notification.method, notification.params, peer)
                .await;
        }
    }
}
