//! Error taxonomy.
//!
//! Protocol-layer failures (shape, lookup, capability gating) map onto
//! JSON-RPC error frames. `Cancelled`, `Disconnected` and `RequestTimeout`
//! are local failures on the originator and never produce a wire frame.
//! Tool-execution failures are not errors at all: they travel back as
//! `CallToolResult { is_error: true }` so the model can self-correct.

use thiserror::Error;

use crate::protocol::jsonrpc::{error_codes, JsonRpcError};

/// Canonical result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer answered an outbound request with an error frame.
    #[error("peer error: {0}")]
    Peer(JsonRpcError),

    /// The request was cancelled, locally or by the peer.
    #[error("request cancelled{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Cancelled { reason: Option<String> },

    /// The transport closed while a response was outstanding.
    #[error("transport disconnected")]
    Disconnected,

    /// A local per-request timeout elapsed.
    #[error("request timed out")]
    RequestTimeout,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl McpError {
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::ParseError(msg.into()))
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::InvalidRequest(msg.into()))
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::MethodNotFound(method.into()))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::InvalidParams(msg.into()))
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::InternalError(msg.into()))
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::InvalidResponse(msg.into()))
    }

    pub fn cancelled(reason: Option<String>) -> Self {
        Self::Cancelled { reason }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Protocol-contract violations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid protocol version: {0}")]
    InvalidVersion(String),

    #[error("initialization failed: {0}")]
    InitializationFailed(String),
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::Protocol(ProtocolError::ParseError(msg)) => {
                JsonRpcError::new(error_codes::PARSE_ERROR, format!("Parse error: {msg}"))
            }
            McpError::Protocol(ProtocolError::InvalidRequest(msg)) => JsonRpcError::new(
                error_codes::INVALID_REQUEST,
                format!("Invalid request: {msg}"),
            ),
            McpError::Protocol(ProtocolError::MethodNotFound(method)) => {
                JsonRpcError::method_not_found(&method)
            }
            McpError::Protocol(ProtocolError::InvalidParams(msg)) => JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Invalid params: {msg}"),
            ),
            McpError::Protocol(ProtocolError::InvalidVersion(msg)) => JsonRpcError::new(
                error_codes::INVALID_REQUEST,
                format!("Invalid protocol version: {msg}"),
            ),
            McpError::Protocol(ProtocolError::InvalidResponse(msg)) => JsonRpcError::new(
                error_codes::INVALID_REQUEST,
                format!("Invalid response: {msg}"),
            ),
            McpError::Protocol(ProtocolError::InitializationFailed(msg)) => JsonRpcError::new(
                error_codes::INVALID_REQUEST,
                format!("Initialization failed: {msg}"),
            ),
            McpError::Protocol(ProtocolError::InternalError(msg)) => {
                JsonRpcError::internal_error(msg)
            }
            // An error frame from the peer keeps its original code when it
            // has to be relayed.
            McpError::Peer(err) => err,
            McpError::Serialization(e) => {
                JsonRpcError::new(error_codes::PARSE_ERROR, format!("Serialization error: {e}"))
            }
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_map_to_reserved_codes() {
        let cases = [
            (McpError::parse_error("x"), error_codes::PARSE_ERROR),
            (McpError::invalid_request("x"), error_codes::INVALID_REQUEST),
            (McpError::method_not_found("x"), error_codes::METHOD_NOT_FOUND),
            (McpError::invalid_params("x"), error_codes::INVALID_PARAMS),
            (McpError::internal_error("x"), error_codes::INTERNAL_ERROR),
        ];
        for (err, code) in cases {
            let rpc: JsonRpcError = err.into();
            assert_eq!(rpc.code, code);
        }
    }

    #[test]
    fn peer_error_keeps_its_code() {
        let rpc: JsonRpcError = McpError::Peer(JsonRpcError::new(-31000, "app-defined")).into();
        assert_eq!(rpc.code, -31000);
    }

    #[test]
    fn cancelled_display_includes_reason() {
        let err = McpError::cancelled(Some("user".to_string()));
        assert_eq!(err.to_string(), "request cancelled: user");
        assert!(err.is_cancelled());

        let bare = McpError::cancelled(None);
        assert_eq!(bare.to_string(), "request cancelled");
    }
}
