//! Everything a host application typically needs in scope.

pub use duplex_mcp_core::protocol::capabilities::{
    ClientCapabilities, CompletionsCapability, ElicitationCapability, LoggingCapability,
    PromptsCapability, ResourcesCapability, RootsCapability, SamplingCapability,
    ServerCapabilities, ToolsCapability,
};
pub use duplex_mcp_core::types::{
    CallToolRequest, CallToolResult, CompleteRequest, CompleteResponse, Completion, ContentBlock,
    CreateMessageRequest, CreateMessageResponse, ElicitAction, ElicitRequest, ElicitResponse,
    ElicitationSchema, GetPromptRequest, GetPromptResponse, ListRootsResponse, LogLevel,
    PrimitiveSchema, Prompt, PromptArgument, PromptMessage, ReadResourceResponse, Reference,
    Resource, ResourceContents, ResourceTemplate, Role, Root, Tool, ToolAnnotations,
};
pub use duplex_mcp_core::{
    Implementation, JsonRpcError, McpError, McpResult, Message, ProgressToken, RequestId,
    SessionState, LATEST_PROTOCOL_VERSION,
};

pub use duplex_mcp_transport::{duplex, Transport, TransportError};

pub use duplex_mcp_session::{
    progress_channel, CancellationToken, Progress, ProgressReporter, RequestOptions,
    SessionHandle,
};

pub use duplex_mcp_server::{
    CompletionHandler, PromptHandler, ResourceHandler, Server, ServerBuilder, ServerSession,
    SubscriptionHook, ToolContext, ToolHandler,
};

pub use duplex_mcp_client::{Client, ClientBuilder, ElicitationHandler, SamplingHandler};
