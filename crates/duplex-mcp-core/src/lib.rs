//! # Duplex MCP Core
//!
//! Protocol types and wire codec for the Model Context Protocol (MCP).
//!
//! This crate holds everything both sides of a session agree on: the
//! JSON-RPC envelope and its classification rules, the MCP payload DTOs,
//! capability and lifecycle types, version negotiation, the error taxonomy
//! and the pagination/URI-template utilities. The session engine, the
//! transport port and the endpoint surfaces live in the sibling crates.

pub mod error;
pub mod protocol;
pub mod schema;
pub mod types;
pub mod utils;

pub use error::{McpError, McpResult, ProtocolError};
pub use protocol::{
    error_codes, ClientCapabilities, Implementation, InitializeRequest, InitializeResponse,
    JsonRpcError, JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    Message, ProgressToken, RequestId, ServerCapabilities, SessionState,
    LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
pub use types::{
    CallToolRequest, CallToolResult, ContentBlock, Prompt, Resource, ResourceContents,
    ResourceTemplate, Root, Tool,
};
