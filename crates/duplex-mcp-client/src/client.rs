//! The client endpoint: handshake driver, typed request surface, and the
//! dispatcher answering server-initiated requests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use duplex_mcp_core::protocol::{methods, version};
use duplex_mcp_core::types::{
    CallToolRequest, CallToolResult, CompleteRequest, CompleteResponse, GetPromptRequest,
    GetPromptResponse, ListPromptsResponse, ListResourceTemplatesResponse, ListResourcesResponse,
    ListRootsResponse, ListToolsResponse, LogLevel, ReadResourceRequest, ReadResourceResponse,
    Root, SetLevelRequest,
};
use duplex_mcp_core::{
    ClientCapabilities, Implementation, InitializeRequest, InitializeResponse, McpError,
    McpResult, ProtocolError, ServerCapabilities, SessionState,
};
use duplex_mcp_session::{
    RequestDispatcher, RequestContext, RequestOptions, Session, SessionConfig, SessionHandle,
};
use duplex_mcp_transport::Transport;

use crate::handlers::{ElicitationHandler, SamplingHandler};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Handler for inbound notifications registered by method name.
pub type NotificationFn = Arc<dyn Fn(Option<Value>, SessionHandle) -> BoxFuture<()> + Send + Sync>;

struct ClientInner {
    capabilities: ClientCapabilities,
    roots: RwLock<Vec<Root>>,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    elicitation_handler: Option<Arc<dyn ElicitationHandler>>,
    notification_handlers: RwLock<HashMap<String, NotificationFn>>,
    server_info: RwLock<Option<Implementation>>,
    server_capabilities: RwLock<Option<ServerCapabilities>>,
    protocol_version: RwLock<Option<String>>,
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Builds and connects a [`Client`].
pub struct ClientBuilder {
    info: Implementation,
    capabilities: ClientCapabilities,
    roots: Vec<Root>,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    elicitation_handler: Option<Arc<dyn ElicitationHandler>>,
    notification_handlers: HashMap<String, NotificationFn>,
    default_timeout: Option<Duration>,
}

impl ClientBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            capabilities: ClientCapabilities::default(),
            roots: Vec::new(),
            sampling_handler: None,
            elicitation_handler: None,
            notification_handlers: HashMap::new(),
            default_timeout: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_roots(mut self, roots: Vec<Root>) -> Self {
        self.roots = roots;
        self
    }

    pub fn with_sampling_handler(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.sampling_handler = Some(handler);
        self
    }

    pub fn with_elicitation_handler(mut self, handler: Arc<dyn ElicitationHandler>) -> Self {
        self.elicitation_handler = Some(handler);
        self
    }

    pub fn on_notification(mut self, method: impl Into<String>, handler: NotificationFn) -> Self {
        self.notification_handlers.insert(method.into(), handler);
        self
    }

    /// Default timeout for every request issued by this client.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Connect over a transport: spawns the session, runs the initialize
    /// handshake, and sends `notifications/initialized`. On a version the
    /// client does not support, the session is closed without the
    /// initialized notification and an error is returned.
    pub async fn connect<T: Transport + 'static>(self, transport: T) -> McpResult<Client> {
        let inner = Arc::new(ClientInner {
            capabilities: self.capabilities.clone(),
            roots: RwLock::new(self.roots),
            sampling_handler: self.sampling_handler,
            elicitation_handler: self.elicitation_handler,
            notification_handlers: RwLock::new(self.notification_handlers),
            server_info: RwLock::new(None),
            server_capabilities: RwLock::new(None),
            protocol_version: RwLock::new(None),
        });
        let dispatcher = Arc::new(ClientDispatcher {
            inner: inner.clone(),
        });
        let session = Session::spawn(
            transport,
            dispatcher,
            SessionConfig {
                default_timeout: self.default_timeout,
                session_id: None,
            },
        );
        session.set_state(SessionState::Initializing);

        let request = InitializeRequest {
            protocol_version: version::LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: self.capabilities,
            client_info: self.info,
        };
        let response: InitializeResponse = match session
            .request_typed(methods::INITIALIZE, Some(json!(request)), RequestOptions::default())
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let _ = session.close().await;
                return Err(err);
            }
        };

        if !version::is_supported(&response.protocol_version) {
            warn!(
                selected = %response.protocol_version,
                "server selected an unsupported protocol version, closing"
            );
            let _ = session.close().await;
            return Err(McpError::Protocol(ProtocolError::InitializationFailed(
                format!(
                    "server selected unsupported protocol version {}",
                    response.protocol_version
                ),
            )));
        }

        info!(
            server = %response.server_info.name,
            version = %response.protocol_version,
            "connected"
        );
        *write(&inner.server_info) = Some(response.server_info);
        *write(&inner.server_capabilities) = Some(response.capabilities);
        *write(&inner.protocol_version) = Some(response.protocol_version);

        // Ready before the notification leaves, so a server request racing
        // in right after it is not rejected
        session.set_state(SessionState::Ready);
        if let Err(err) = session.notify(methods::NOTIFICATION_INITIALIZED, None) {
            let _ = session.close().await;
            return Err(err);
        }

        Ok(Client { session, inner })
    }
}

/// An MCP client bound to one session.
pub struct Client {
    session: SessionHandle,
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session_id", &self.session.session_id())
            .field("state", &self.session.state())
            .finish()
    }
}

impl Client {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(name, version)
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn server_info(&self) -> Option<Implementation> {
        read(&self.inner.server_info).clone()
    }

    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        read(&self.inner.server_capabilities).clone()
    }

    /// The negotiated protocol version.
    pub fn protocol_version(&self) -> Option<String> {
        read(&self.inner.protocol_version).clone()
    }

    pub async fn ping(&self) -> McpResult<()> {
        self.session.ping().await
    }

    pub async fn list_tools(&self, cursor: Option<String>) -> McpResult<ListToolsResponse> {
        self.session
            .request_typed(methods::TOOLS_LIST, cursor_params(cursor), RequestOptions::default())
            .await
    }

    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
    ) -> McpResult<CallToolResult> {
        self.call_tool_with_options(CallToolRequest::new(name, arguments), RequestOptions::default())
            .await
    }

    /// Tool call with explicit timeout/progress/cancellation options.
    pub async fn call_tool_with_options(
        &self,
        request: CallToolRequest,
        options: RequestOptions,
    ) -> McpResult<CallToolResult> {
        self.session
            .request_typed(methods::TOOLS_CALL, Some(json!(request)), options)
            .await
    }

    pub async fn list_prompts(&self, cursor: Option<String>) -> McpResult<ListPromptsResponse> {
        self.session
            .request_typed(methods::PROMPTS_LIST, cursor_params(cursor), RequestOptions::default())
            .await
    }

    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<HashMap<String, String>>,
    ) -> McpResult<GetPromptResponse> {
        let request = GetPromptRequest {
            name: name.into(),
            arguments,
        };
        self.session
            .request_typed(methods::PROMPTS_GET, Some(json!(request)), RequestOptions::default())
            .await
    }

    pub async fn list_resources(&self, cursor: Option<String>) -> McpResult<ListResourcesResponse> {
        self.session
            .request_typed(
                methods::RESOURCES_LIST,
                cursor_params(cursor),
                RequestOptions::default(),
            )
            .await
    }

    pub async fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> McpResult<ListResourceTemplatesResponse> {
        self.session
            .request_typed(
                methods::RESOURCES_TEMPLATES_LIST,
                cursor_params(cursor),
                RequestOptions::default(),
            )
            .await
    }

    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResponse> {
        let request = ReadResourceRequest { uri: uri.into() };
        self.session
            .request_typed(methods::RESOURCES_READ, Some(json!(request)), RequestOptions::default())
            .await
    }

    /// Subscribe to updates of a resource. Idempotent on the server.
    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        let _: Value = self
            .session
            .request_typed(
                methods::RESOURCES_SUBSCRIBE,
                Some(json!({"uri": uri.into()})),
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        let _: Value = self
            .session
            .request_typed(
                methods::RESOURCES_UNSUBSCRIBE,
                Some(json!({"uri": uri.into()})),
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }

    pub async fn set_log_level(&self, level: LogLevel) -> McpResult<()> {
        let _: Value = self
            .session
            .request_typed(
                methods::LOGGING_SET_LEVEL,
                Some(json!(SetLevelRequest { level })),
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }

    pub async fn complete(&self, request: CompleteRequest) -> McpResult<CompleteResponse> {
        self.session
            .request_typed(
                methods::COMPLETION_COMPLETE,
                Some(json!(request)),
                RequestOptions::default(),
            )
            .await
    }

    pub fn roots(&self) -> Vec<Root> {
        read(&self.inner.roots).clone()
    }

    /// Replace the exposed roots. Emits `notifications/roots/list_changed`
    /// when that was advertised.
    pub fn set_roots(&self, roots: Vec<Root>) -> McpResult<()> {
        *write(&self.inner.roots) = roots;
        if self.inner.capabilities.roots_list_changed() {
            self.session
                .notify(methods::NOTIFICATION_ROOTS_LIST_CHANGED, None)?;
        }
        Ok(())
    }

    /// Fire a custom notification at the server.
    pub fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.session.notify(method, params)
    }

    /// Register a handler for inbound notifications of a given method.
    pub fn on_notification(&self, method: impl Into<String>, handler: NotificationFn) {
        write(&self.inner.notification_handlers).insert(method.into(), handler);
    }

    /// Resolves when the session is torn down by either side.
    pub async fn closed(&self) {
        self.session.closed().await;
    }

    pub async fn close(&self) -> McpResult<()> {
        self.session.close().await
    }
}

/// The client side of the method table: ping, sampling, elicitation and
/// roots, each gated on the client's own advertised capabilities.
struct ClientDispatcher {
    inner: Arc<ClientInner>,
}

impl ClientDispatcher {
    fn require(&self, advertised: bool, method: &str) -> McpResult<()> {
        if advertised {
            Ok(())
        } else {
            Err(McpError::method_not_found(method))
        }
    }
}

/// Cursor-bearing list params, with the `cursor` key omitted when absent.
fn cursor_params(cursor: Option<String>) -> Option<Value> {
    Some(match cursor {
        Some(cursor) => json!({"cursor": cursor}),
        None => json!({}),
    })
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(|err| McpError::invalid_params(err.to_string()))
}

#[async_trait]
impl RequestDispatcher for ClientDispatcher {
    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: RequestContext,
    ) -> McpResult<Value> {
        // no server-initiated request is acceptable until this client has
        // sent notifications/initialized
        if !ctx.peer().is_ready() {
            return Err(McpError::invalid_request(format!(
                "{method} received before the client initialized"
            )));
        }

        let caps = &self.inner.capabilities;
        match method {
            methods::PING => Ok(json!({})),
            methods::SAMPLING_CREATE_MESSAGE => {
                self.require(caps.supports_sampling(), method)?;
                let handler = self.inner.sampling_handler.clone().ok_or_else(|| {
                    McpError::internal_error("no sampling handler installed")
                })?;
                let request = parse_params(params)?;
                Ok(json!(handler.create_message(request).await?))
            }
            methods::ELICITATION_CREATE => {
                self.require(caps.supports_elicitation(), method)?;
                let handler = self.inner.elicitation_handler.clone().ok_or_else(|| {
                    McpError::internal_error("no elicitation handler installed")
                })?;
                let request = parse_params(params)?;
                Ok(json!(handler.elicit(request).await?))
            }
            methods::ROOTS_LIST => {
                self.require(caps.supports_roots(), method)?;
                Ok(json!(ListRootsResponse {
                    roots: read(&self.inner.roots).clone(),
                }))
            }
            other => Err(McpError::method_not_found(other)),
        }
    }

    async fn dispatch_notification(&self, method: &str, params: Option<Value>, peer: SessionHandle) {
        let handler = read(&self.inner.notification_handlers).get(method).cloned();
        match handler {
            Some(handler) => handler(params, peer).await,
            None => match method {
                methods::NOTIFICATION_MESSAGE => {
                    debug!(?params, "server log message");
                }
                methods::NOTIFICATION_TOOLS_LIST_CHANGED
                | methods::NOTIFICATION_PROMPTS_LIST_CHANGED
                | methods::NOTIFICATION_RESOURCES_LIST_CHANGED => {
                    debug!(method, "server listing changed");
                }
                methods::NOTIFICATION_RESOURCES_UPDATED => {
                    debug!(?params, "subscribed resource updated");
                }
                other => {
                    debug!(method = other, "unhandled notification, dropping");
                }
            },
        }
    }
}
