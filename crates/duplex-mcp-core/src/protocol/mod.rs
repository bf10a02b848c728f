//! JSON-RPC envelope, capabilities, lifecycle and version negotiation.

pub mod capabilities;
pub mod jsonrpc;
pub mod lifecycle;
pub mod methods;
pub mod version;

pub use capabilities::{
    ClientCapabilities, CompletionsCapability, ElicitationCapability, LoggingCapability,
    PromptsCapability, ResourcesCapability, RootsCapability, SamplingCapability,
    ServerCapabilities, ToolsCapability,
};
pub use jsonrpc::{
    error_codes, JsonRpcError, JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, Message, ProgressToken, RequestId, JSONRPC_VERSION,
};
pub use lifecycle::{
    Implementation, InitializeRequest, InitializeResponse, InitializedNotification, SessionState,
};
pub use version::{LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};
