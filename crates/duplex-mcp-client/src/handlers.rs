//! Handler traits for server-initiated requests.
//!
//! A handler only ever runs when the matching capability was advertised;
//! advertising a capability without installing its handler makes the
//! requests fail with an internal error.

use async_trait::async_trait;

use duplex_mcp_core::types::{
    CreateMessageRequest, CreateMessageResponse, ElicitRequest, ElicitResponse,
};
use duplex_mcp_core::McpResult;

/// Runs LLM generations on the server's behalf (`sampling/createMessage`).
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> McpResult<CreateMessageResponse>;
}

/// Collects structured user input on the server's behalf
/// (`elicitation/create`).
#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    async fn elicit(&self, request: ElicitRequest) -> McpResult<ElicitResponse>;
}
