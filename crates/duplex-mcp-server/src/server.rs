//! The server endpoint: registries plus the method table, bound to any
//! number of concurrent sessions.
//!
//! One [`Server`] owns the capability registries and fallback handlers and
//! can outlive every session; [`Server::connect`] wires one transport into
//! a session driven by the server's dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use duplex_mcp_core::protocol::{methods, version};
use duplex_mcp_core::types::{
    CallToolRequest, CompleteRequest, CompleteResponse, Completion, CreateMessageRequest,
    CreateMessageResponse, ElicitRequest, ElicitResponse, GetPromptRequest, ListPromptsRequest,
    ListPromptsResponse, ListResourceTemplatesRequest, ListResourceTemplatesResponse,
    ListResourcesRequest, ListResourcesResponse, ListRootsResponse, ListToolsRequest,
    ListToolsResponse, LogLevel, LoggingMessageNotification, ReadResourceRequest,
    ResourceUpdatedNotification, SetLevelRequest, SubscribeRequest, UnsubscribeRequest,
};
use duplex_mcp_core::{
    ClientCapabilities, Implementation, InitializeRequest, InitializeResponse, McpError,
    McpResult, Prompt, Resource, ResourceTemplate, ServerCapabilities, SessionState, Tool,
};
use duplex_mcp_session::{
    RequestContext, RequestDispatcher, RequestOptions, Session, SessionConfig, SessionHandle,
};
use duplex_mcp_transport::Transport;

use crate::handlers::{
    CompletionHandler, PromptHandler, ResourceHandler, SubscriptionHook, ToolHandler,
};
use crate::registry::{
    list_page, BoxFuture, PromptFn, PromptRegistry, ResourceReadFn, ResourceRegistry,
    TemplateReadFn, ToolContext, ToolFn, ToolRegistry,
};
use crate::subscriptions::SubscriptionManager;

const DEFAULT_PAGE_SIZE: usize = 50;

/// Log messages sent before the client picks a level use this threshold.
const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

/// Handler for inbound notifications registered by method name.
pub type NotificationFn = Arc<dyn Fn(Option<Value>, SessionHandle) -> BoxFuture<()> + Send + Sync>;

struct SessionEntry {
    handle: SessionHandle,
    client_capabilities: Option<ClientCapabilities>,
    protocol_version: Option<String>,
    log_level: Option<LogLevel>,
}

struct ServerInner {
    info: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    page_size: usize,
    tools: RwLock<ToolRegistry>,
    prompts: RwLock<PromptRegistry>,
    resources: RwLock<ResourceRegistry>,
    tool_handler: Option<Arc<dyn ToolHandler>>,
    prompt_handler: Option<Arc<dyn PromptHandler>>,
    resource_handler: Option<Arc<dyn ResourceHandler>>,
    completion_handler: Option<Arc<dyn CompletionHandler>>,
    subscription_hook: Option<Arc<dyn SubscriptionHook>>,
    notification_handlers: RwLock<HashMap<String, NotificationFn>>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    subscriptions: SubscriptionManager,
}

fn lock_sessions(inner: &ServerInner) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
    inner
        .sessions
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_registry<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_registry<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ServerInner {
    /// Fan a notification out to every session that finished the handshake.
    fn broadcast(&self, method: &str, params: Option<Value>) {
        for entry in lock_sessions(self).values() {
            if entry.handle.is_ready() {
                let _ = entry.handle.notify(method, params.clone());
            }
        }
    }

    fn notify_tools_changed(&self) {
        if self.capabilities.tools_list_changed() {
            self.broadcast(methods::NOTIFICATION_TOOLS_LIST_CHANGED, None);
        }
    }

    fn notify_prompts_changed(&self) {
        if self.capabilities.prompts_list_changed() {
            self.broadcast(methods::NOTIFICATION_PROMPTS_LIST_CHANGED, None);
        }
    }

    fn notify_resources_changed(&self) {
        if self.capabilities.resources_list_changed() {
            self.broadcast(methods::NOTIFICATION_RESOURCES_LIST_CHANGED, None);
        }
    }

    fn remove_session(&self, session_id: &str) {
        lock_sessions(self).remove(session_id);
        self.subscriptions.remove_session(session_id);
    }
}

/// Builds a [`Server`].
pub struct ServerBuilder {
    info: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    page_size: usize,
    tool_handler: Option<Arc<dyn ToolHandler>>,
    prompt_handler: Option<Arc<dyn PromptHandler>>,
    resource_handler: Option<Arc<dyn ResourceHandler>>,
    completion_handler: Option<Arc<dyn CompletionHandler>>,
    subscription_hook: Option<Arc<dyn SubscriptionHook>>,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            capabilities: ServerCapabilities::default(),
            instructions: None,
            page_size: DEFAULT_PAGE_SIZE,
            tool_handler: None,
            prompt_handler: None,
            resource_handler: None,
            completion_handler: None,
            subscription_hook: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_tool_handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.tool_handler = Some(handler);
        self
    }

    pub fn with_prompt_handler(mut self, handler: Arc<dyn PromptHandler>) -> Self {
        self.prompt_handler = Some(handler);
        self
    }

    pub fn with_resource_handler(mut self, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resource_handler = Some(handler);
        self
    }

    pub fn with_completion_handler(mut self, handler: Arc<dyn CompletionHandler>) -> Self {
        self.completion_handler = Some(handler);
        self
    }

    pub fn with_subscription_hook(mut self, hook: Arc<dyn SubscriptionHook>) -> Self {
        self.subscription_hook = Some(hook);
        self
    }

    pub fn build(self) -> Server {
        Server {
            inner: Arc::new(ServerInner {
                info: self.info,
                capabilities: self.capabilities,
                instructions: self.instructions,
                page_size: self.page_size,
                tools: RwLock::new(ToolRegistry::new()),
                prompts: RwLock::new(PromptRegistry::new()),
                resources: RwLock::new(ResourceRegistry::new()),
                tool_handler: self.tool_handler,
                prompt_handler: self.prompt_handler,
                resource_handler: self.resource_handler,
                completion_handler: self.completion_handler,
                subscription_hook: self.subscription_hook,
                notification_handlers: RwLock::new(HashMap::new()),
                sessions: Mutex::new(HashMap::new()),
                subscriptions: SubscriptionManager::new(),
            }),
        }
    }
}

/// An MCP server. Cheap to clone; clones share registries and sessions.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("info", &self.inner.info)
            .field("capabilities", &self.inner.capabilities)
            .finish()
    }
}

impl Server {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ServerBuilder {
        ServerBuilder::new(name, version)
    }

    pub fn info(&self) -> &Implementation {
        &self.inner.info
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.inner.capabilities
    }

    /// Register (or replace) a tool. Emits `notifications/tools/list_changed`
    /// when that was advertised.
    pub fn register_tool(&self, tool: Tool, dispatch: ToolFn) -> McpResult<()> {
        write_registry(&self.inner.tools).add(tool, dispatch)?;
        self.inner.notify_tools_changed();
        Ok(())
    }

    /// Register a tool whose input schema is derived from its argument type.
    pub fn register_tool_typed<A, F, Fut>(&self, tool: Tool, handler: F) -> McpResult<()>
    where
        A: serde::de::DeserializeOwned + schemars::JsonSchema,
        F: Fn(A, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<duplex_mcp_core::CallToolResult>>
            + Send
            + 'static,
    {
        write_registry(&self.inner.tools).add_typed(tool, handler)?;
        self.inner.notify_tools_changed();
        Ok(())
    }

    pub fn unregister_tool(&self, name: &str) -> bool {
        let removed = write_registry(&self.inner.tools).remove(name);
        if removed {
            self.inner.notify_tools_changed();
        }
        removed
    }

    pub fn register_prompt(&self, prompt: Prompt, dispatch: PromptFn) {
        write_registry(&self.inner.prompts).add(prompt, dispatch);
        self.inner.notify_prompts_changed();
    }

    pub fn unregister_prompt(&self, name: &str) -> bool {
        let removed = write_registry(&self.inner.prompts).remove(name);
        if removed {
            self.inner.notify_prompts_changed();
        }
        removed
    }

    pub fn register_resource(&self, resource: Resource, dispatch: ResourceReadFn) -> McpResult<()> {
        write_registry(&self.inner.resources).add_resource(resource, dispatch)?;
        self.inner.notify_resources_changed();
        Ok(())
    }

    pub fn register_resource_template(
        &self,
        template: ResourceTemplate,
        dispatch: TemplateReadFn,
    ) -> McpResult<()> {
        write_registry(&self.inner.resources).add_template(template, dispatch)?;
        self.inner.notify_resources_changed();
        Ok(())
    }

    pub fn unregister_resource(&self, uri: &str) -> bool {
        let removed = write_registry(&self.inner.resources).remove_resource(uri);
        if removed {
            self.inner.notify_resources_changed();
        }
        removed
    }

    pub fn unregister_resource_template(&self, uri_template: &str) -> bool {
        let removed = write_registry(&self.inner.resources).remove_template(uri_template);
        if removed {
            self.inner.notify_resources_changed();
        }
        removed
    }

    /// Tell subscribed sessions that a resource changed.
    pub fn notify_resource_updated(&self, uri: &str) {
        let subscribers = self.inner.subscriptions.subscribers(uri);
        if subscribers.is_empty() {
            return;
        }
        let params = json!(ResourceUpdatedNotification {
            uri: uri.to_string()
        });
        let sessions = lock_sessions(&self.inner);
        for session_id in subscribers {
            if let Some(entry) = sessions.get(&session_id) {
                let _ = entry
                    .handle
                    .notify(methods::NOTIFICATION_RESOURCES_UPDATED, Some(params.clone()));
            }
        }
    }

    /// Emit `notifications/message` to every session whose level threshold
    /// admits it. A no-op unless the `logging` capability was advertised.
    pub fn log_message(&self, level: LogLevel, data: Value, logger: Option<&str>) {
        if !self.inner.capabilities.supports_logging() {
            debug!("logging capability not advertised, dropping log message");
            return;
        }
        let mut notification = LoggingMessageNotification::new(level, data);
        if let Some(logger) = logger {
            notification = notification.with_logger(logger);
        }
        let params = json!(notification);
        for entry in lock_sessions(&self.inner).values() {
            let threshold = entry.log_level.unwrap_or(DEFAULT_LOG_LEVEL);
            if entry.handle.is_ready() && level >= threshold {
                let _ = entry
                    .handle
                    .notify(methods::NOTIFICATION_MESSAGE, Some(params.clone()));
            }
        }
    }

    /// Broadcast a custom notification to every ready session.
    pub fn notify_all(&self, method: &str, params: Option<Value>) {
        self.inner.broadcast(method, params);
    }

    /// Register a handler for inbound notifications of a given method.
    pub fn on_notification(&self, method: impl Into<String>, handler: NotificationFn) {
        write_registry(&self.inner.notification_handlers).insert(method.into(), handler);
    }

    /// Bind a transport: spawns the session tasks and returns a handle to
    /// the new session. The session deregisters itself when it closes.
    pub fn connect<T: Transport + 'static>(&self, transport: T) -> ServerSession {
        let dispatcher = Arc::new(ServerDispatcher {
            server: self.inner.clone(),
        });
        let handle = Session::spawn(transport, dispatcher, SessionConfig::default());
        let session_id = handle.session_id().to_string();
        info!(session = %session_id, "client connected");

        lock_sessions(&self.inner).insert(
            session_id.clone(),
            SessionEntry {
                handle: handle.clone(),
                client_capabilities: None,
                protocol_version: None,
                log_level: None,
            },
        );

        let inner = self.inner.clone();
        let watched = handle.clone();
        tokio::spawn(async move {
            watched.closed().await;
            info!(session = %session_id, "session closed, releasing its state");
            inner.remove_session(&session_id);
        });

        ServerSession {
            server: self.clone(),
            handle,
        }
    }

    fn client_capabilities_of(&self, session_id: &str) -> Option<ClientCapabilities> {
        lock_sessions(&self.inner)
            .get(session_id)
            .and_then(|entry| entry.client_capabilities.clone())
    }
}

/// One live connection of a [`Server`], with the server-initiated request
/// surface.
pub struct ServerSession {
    server: Server,
    handle: SessionHandle,
}

impl ServerSession {
    pub fn session_id(&self) -> &str {
        self.handle.session_id()
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Resolves when the session is torn down by either side.
    pub async fn closed(&self) {
        self.handle.closed().await;
    }

    pub async fn close(&self) -> McpResult<()> {
        self.handle.close().await
    }

    pub async fn ping(&self) -> McpResult<()> {
        self.handle.ping().await
    }

    pub fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.handle.notify(method, params)
    }

    /// Ask the client to run an LLM generation. Requires the client's
    /// `sampling` capability.
    pub async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> McpResult<CreateMessageResponse> {
        self.require_client_capability(methods::SAMPLING_CREATE_MESSAGE, |caps| {
            caps.supports_sampling()
        })?;
        self.handle
            .request_typed(
                methods::SAMPLING_CREATE_MESSAGE,
                Some(json!(request)),
                RequestOptions::default(),
            )
            .await
    }

    /// Ask the client to collect structured user input. Requires the
    /// client's `elicitation` capability.
    pub async fn elicit(&self, request: ElicitRequest) -> McpResult<ElicitResponse> {
        self.require_client_capability(methods::ELICITATION_CREATE, |caps| {
            caps.supports_elicitation()
        })?;
        self.handle
            .request_typed(
                methods::ELICITATION_CREATE,
                Some(json!(request)),
                RequestOptions::default(),
            )
            .await
    }

    /// Ask the client for its roots. Requires the client's `roots`
    /// capability.
    pub async fn list_roots(&self) -> McpResult<ListRootsResponse> {
        self.require_client_capability(methods::ROOTS_LIST, |caps| caps.supports_roots())?;
        self.handle
            .request_typed(methods::ROOTS_LIST, Some(json!({})), RequestOptions::default())
            .await
    }

    fn require_client_capability(
        &self,
        method: &str,
        check: impl Fn(&ClientCapabilities) -> bool,
    ) -> McpResult<()> {
        let caps = self
            .server
            .client_capabilities_of(self.handle.session_id())
            .ok_or_else(|| McpError::invalid_request("session not initialized"))?;
        if check(&caps) {
            Ok(())
        } else {
            Err(McpError::method_not_found(method))
        }
    }
}

/// The server side of the method table.
struct ServerDispatcher {
    server: Arc<ServerInner>,
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(|err| McpError::invalid_params(err.to_string()))
}

fn parse_params_or_default<T: serde::de::DeserializeOwned + Default>(
    params: Option<Value>,
) -> McpResult<T> {
    match params {
        Some(value) => {
            serde_json::from_value(value).map_err(|err| McpError::invalid_params(err.to_string()))
        }
        None => Ok(T::default()),
    }
}

impl ServerDispatcher {
    fn require(&self, advertised: bool, method: &str) -> McpResult<()> {
        if advertised {
            Ok(())
        } else {
            Err(McpError::method_not_found(method))
        }
    }

    fn handle_initialize(&self, params: Option<Value>, peer: &SessionHandle) -> McpResult<Value> {
        if peer.state() != SessionState::Created {
            return Err(McpError::invalid_request("initialize received twice"));
        }
        let request: InitializeRequest = parse_params(params)?;
        version::validate_format(&request.protocol_version)?;
        let negotiated = version::negotiate(&request.protocol_version);

        info!(
            client = %request.client_info.name,
            requested = %request.protocol_version,
            negotiated,
            "initializing session"
        );

        {
            let mut sessions = lock_sessions(&self.server);
            if let Some(entry) = sessions.get_mut(peer.session_id()) {
                entry.client_capabilities = Some(request.capabilities);
                entry.protocol_version = Some(negotiated.to_string());
            }
        }
        peer.set_state(SessionState::Initializing);

        Ok(json!(InitializeResponse {
            protocol_version: negotiated.to_string(),
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.info.clone(),
            instructions: self.server.instructions.clone(),
        }))
    }

    async fn handle_tools_list(&self, params: Option<Value>) -> McpResult<Value> {
        let request: ListToolsRequest = parse_params_or_default(params)?;
        let statics = read_registry(&self.server.tools).descriptors();
        let handler = self.server.tool_handler.clone().map(|h| {
            move |cursor: Option<String>| -> BoxFuture<McpResult<(Vec<Tool>, Option<String>)>> {
                Box::pin(async move {
                    let response = h.list_tools(ListToolsRequest { cursor }).await?;
                    Ok((response.tools, response.next_cursor))
                })
            }
        });
        let (tools, next_cursor) = list_page(
            statics,
            request.cursor.as_deref(),
            self.server.page_size,
            |t: &Tool| &t.name,
            handler,
        )
        .await?;
        Ok(json!(ListToolsResponse { tools, next_cursor }))
    }

    async fn handle_tools_call(&self, params: Option<Value>, ctx: &RequestContext) -> McpResult<Value> {
        let request: CallToolRequest = parse_params(params)?;
        let tool_ctx = ToolContext {
            cancellation: ctx.cancellation().clone(),
            progress: ctx.progress().cloned(),
        };

        let dispatch = read_registry(&self.server.tools).dispatch(&request.name);
        if let Some(dispatch) = dispatch {
            let result = dispatch(request.arguments, tool_ctx).await?;
            return Ok(json!(result));
        }
        if let Some(handler) = &self.server.tool_handler {
            let result = handler.call_tool(request, tool_ctx).await?;
            return Ok(json!(result));
        }
        // lookup failure is a protocol error, not a tool failure
        Err(McpError::method_not_found(format!(
            "tool '{}'",
            request.name
        )))
    }

    async fn handle_prompts_list(&self, params: Option<Value>) -> McpResult<Value> {
        let request: ListPromptsRequest = parse_params_or_default(params)?;
        let statics = read_registry(&self.server.prompts).descriptors();
        let handler = self.server.prompt_handler.clone().map(|h| {
            move |cursor: Option<String>| -> BoxFuture<McpResult<(Vec<Prompt>, Option<String>)>> {
                Box::pin(async move {
                    let response = h.list_prompts(ListPromptsRequest { cursor }).await?;
                    Ok((response.prompts, response.next_cursor))
                })
            }
        });
        let (prompts, next_cursor) = list_page(
            statics,
            request.cursor.as_deref(),
            self.server.page_size,
            |p: &Prompt| &p.name,
            handler,
        )
        .await?;
        Ok(json!(ListPromptsResponse {
            prompts,
            next_cursor
        }))
    }

    async fn handle_prompts_get(&self, params: Option<Value>) -> McpResult<Value> {
        let request: GetPromptRequest = parse_params(params)?;
        let entry = read_registry(&self.server.prompts).dispatch(&request.name);
        match entry {
            Some((prompt, dispatch)) => {
                for required in prompt.required_arguments() {
                    let supplied = request
                        .arguments
                        .as_ref()
                        .map(|args| args.contains_key(required))
                        .unwrap_or(false);
                    if !supplied {
                        return Err(McpError::invalid_params(format!(
                            "missing required argument '{required}'"
                        )));
                    }
                }
                Ok(json!(dispatch(request.arguments).await?))
            }
            None => match &self.server.prompt_handler {
                Some(handler) => Ok(json!(handler.get_prompt(request).await?)),
                None => Err(McpError::invalid_params(format!(
                    "unknown prompt '{}'",
                    request.name
                ))),
            },
        }
    }

    async fn handle_resources_list(&self, params: Option<Value>) -> McpResult<Value> {
        let request: ListResourcesRequest = parse_params_or_default(params)?;
        let statics = read_registry(&self.server.resources).descriptors();
        let handler = self.server.resource_handler.clone().map(|h| {
            move |cursor: Option<String>| -> BoxFuture<McpResult<(Vec<Resource>, Option<String>)>> {
                Box::pin(async move {
                    let response = h.list_resources(ListResourcesRequest { cursor }).await?;
                    Ok((response.resources, response.next_cursor))
                })
            }
        });
        let (resources, next_cursor) = list_page(
            statics,
            request.cursor.as_deref(),
            self.server.page_size,
            |r: &Resource| &r.uri,
            handler,
        )
        .await?;
        Ok(json!(ListResourcesResponse {
            resources,
            next_cursor
        }))
    }

    async fn handle_resource_templates_list(&self, params: Option<Value>) -> McpResult<Value> {
        let request: ListResourceTemplatesRequest = parse_params_or_default(params)?;
        let statics = read_registry(&self.server.resources).template_descriptors();
        let handler = self.server.resource_handler.clone().map(|h| {
            move |cursor: Option<String>| -> BoxFuture<
                McpResult<(Vec<ResourceTemplate>, Option<String>)>,
            > {
                Box::pin(async move {
                    let response = h
                        .list_resource_templates(ListResourceTemplatesRequest { cursor })
                        .await?;
                    Ok((response.resource_templates, response.next_cursor))
                })
            }
        });
        let (resource_templates, next_cursor) = list_page(
            statics,
            request.cursor.as_deref(),
            self.server.page_size,
            |t: &ResourceTemplate| &t.uri_template,
            handler,
        )
        .await?;
        Ok(json!(ListResourceTemplatesResponse {
            resource_templates,
            next_cursor
        }))
    }

    async fn handle_resources_read(&self, params: Option<Value>) -> McpResult<Value> {
        let request: ReadResourceRequest = parse_params(params)?;

        // resolution order: exact static match, then templates, then the
        // fallback handler; first match wins
        let exact = read_registry(&self.server.resources).read_dispatch(&request.uri);
        if let Some(dispatch) = exact {
            return Ok(json!(dispatch(request).await?));
        }

        let templated = read_registry(&self.server.resources).template_dispatch(&request.uri);
        if let Some((dispatch, vars)) = templated {
            return Ok(json!(dispatch(request, vars).await?));
        }

        if let Some(handler) = &self.server.resource_handler {
            return Ok(json!(handler.read_resource(request).await?));
        }

        Err(McpError::invalid_params(format!(
            "unknown resource uri '{}'",
            request.uri
        )))
    }

    async fn handle_subscribe(&self, params: Option<Value>, peer: &SessionHandle) -> McpResult<Value> {
        let request: SubscribeRequest = parse_params(params)?;
        let newly = self
            .server
            .subscriptions
            .subscribe(peer.session_id(), &request.uri);
        if newly {
            if let Some(hook) = &self.server.subscription_hook {
                hook.subscribed(&request.uri).await?;
            }
        }
        Ok(json!({}))
    }

    async fn handle_unsubscribe(
        &self,
        params: Option<Value>,
        peer: &SessionHandle,
    ) -> McpResult<Value> {
        let request: UnsubscribeRequest = parse_params(params)?;
        let removed = self
            .server
            .subscriptions
            .unsubscribe(peer.session_id(), &request.uri);
        if removed {
            if let Some(hook) = &self.server.subscription_hook {
                hook.unsubscribed(&request.uri).await?;
            }
        }
        Ok(json!({}))
    }

    fn handle_set_level(&self, params: Option<Value>, peer: &SessionHandle) -> McpResult<Value> {
        let request: SetLevelRequest = parse_params(params)?;
        let mut sessions = lock_sessions(&self.server);
        if let Some(entry) = sessions.get_mut(peer.session_id()) {
            entry.log_level = Some(request.level);
        }
        Ok(json!({}))
    }

    async fn handle_complete(&self, params: Option<Value>) -> McpResult<Value> {
        let request: CompleteRequest = parse_params(params)?;
        match &self.server.completion_handler {
            Some(handler) => Ok(json!(handler.complete(request).await?)),
            None => Ok(json!(CompleteResponse {
                completion: Completion::plain(Vec::new()),
            })),
        }
    }
}

#[async_trait]
impl RequestDispatcher for ServerDispatcher {
    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: RequestContext,
    ) -> McpResult<Value> {
        let peer = ctx.peer().clone();

        // only initialize and ping may run before the handshake completes
        match method {
            methods::INITIALIZE => return self.handle_initialize(params, &peer),
            methods::PING => return Ok(json!({})),
            _ if !peer.is_ready() => {
                return Err(McpError::invalid_request(format!(
                    "{method} received before initialized notification"
                )))
            }
            _ => {}
        }

        let caps = &self.server.capabilities;
        match method {
            methods::TOOLS_LIST => {
                self.require(caps.supports_tools(), method)?;
                self.handle_tools_list(params).await
            }
            methods::TOOLS_CALL => {
                self.require(caps.supports_tools(), method)?;
                self.handle_tools_call(params, &ctx).await
            }
            methods::PROMPTS_LIST => {
                self.require(caps.supports_prompts(), method)?;
                self.handle_prompts_list(params).await
            }
            methods::PROMPTS_GET => {
                self.require(caps.supports_prompts(), method)?;
                self.handle_prompts_get(params).await
            }
            methods::RESOURCES_LIST => {
                self.require(caps.supports_resources(), method)?;
                self.handle_resources_list(params).await
            }
            methods::RESOURCES_TEMPLATES_LIST => {
                self.require(caps.supports_resources(), method)?;
                self.handle_resource_templates_list(params).await
            }
            methods::RESOURCES_READ => {
                self.require(caps.supports_resources(), method)?;
                self.handle_resources_read(params).await
            }
            methods::RESOURCES_SUBSCRIBE => {
                self.require(caps.supports_resource_subscriptions(), method)?;
                self.handle_subscribe(params, &peer).await
            }
            methods::RESOURCES_UNSUBSCRIBE => {
                self.require(caps.supports_resources(), method)?;
                self.handle_unsubscribe(params, &peer).await
            }
            methods::LOGGING_SET_LEVEL => {
                self.require(caps.supports_logging(), method)?;
                self.handle_set_level(params, &peer)
            }
            methods::COMPLETION_COMPLETE => {
                self.require(caps.supports_completions(), method)?;
                self.handle_complete(params).await
            }
            other => Err(McpError::method_not_found(other)),
        }
    }

    async fn dispatch_notification(&self, method: &str, params: Option<Value>, peer: SessionHandle) {
        match method {
            methods::NOTIFICATION_INITIALIZED => match peer.state() {
                SessionState::Initializing => {
                    peer.set_state(SessionState::Ready);
                    info!(session = %peer.session_id(), "session ready");
                }
                state => {
                    warn!(session = %peer.session_id(), ?state,
                        "unexpected initialized notification");
                }
            },
            other => {
                let handler = read_registry(&self.server.notification_handlers)
                    .get(other)
                    .cloned();
                match handler {
                    Some(handler) => handler(params, peer).await,
                    None => {
                        debug!(session = %peer.session_id(), method = other,
                            "unhandled notification, dropping");
                    }
                }
            }
        }
    }
}
