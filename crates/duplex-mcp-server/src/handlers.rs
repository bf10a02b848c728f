//! Fallback handler traits.
//!
//! The registries resolve first; these handlers extend each feature with
//! dynamically produced primitives. A combined listing concatenates the
//! registry's items first, then the handler's, and on a name collision the
//! registry wins.

use async_trait::async_trait;

use duplex_mcp_core::types::{
    CallToolRequest, CallToolResult, CompleteRequest, CompleteResponse, GetPromptRequest,
    GetPromptResponse, ListPromptsRequest, ListPromptsResponse, ListResourceTemplatesRequest,
    ListResourceTemplatesResponse, ListResourcesRequest, ListResourcesResponse,
    ReadResourceRequest, ReadResourceResponse, ListToolsRequest, ListToolsResponse,
};
use duplex_mcp_core::McpResult;

use crate::registry::ToolContext;

/// Serves tools the registry does not know about.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn list_tools(&self, request: ListToolsRequest) -> McpResult<ListToolsResponse>;

    async fn call_tool(
        &self,
        request: CallToolRequest,
        ctx: ToolContext,
    ) -> McpResult<CallToolResult>;
}

/// Serves prompts the registry does not know about.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn list_prompts(&self, request: ListPromptsRequest) -> McpResult<ListPromptsResponse>;

    async fn get_prompt(&self, request: GetPromptRequest) -> McpResult<GetPromptResponse>;
}

/// Serves resources beyond the static set and the template set.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn list_resources(
        &self,
        request: ListResourcesRequest,
    ) -> McpResult<ListResourcesResponse>;

    async fn list_resource_templates(
        &self,
        request: ListResourceTemplatesRequest,
    ) -> McpResult<ListResourceTemplatesResponse>;

    /// Last stop of the `resources/read` resolution chain, after exact and
    /// template matching both missed.
    async fn read_resource(&self, request: ReadResourceRequest) -> McpResult<ReadResourceResponse>;
}

/// Argument autocompletion.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn complete(&self, request: CompleteRequest) -> McpResult<CompleteResponse>;
}

/// Observes subscription changes. Subscribe/unsubscribe stay idempotent
/// regardless of what the hook does; its errors propagate to the caller.
#[async_trait]
pub trait SubscriptionHook: Send + Sync {
    async fn subscribed(&self, uri: &str) -> McpResult<()> {
        let _ = uri;
        Ok(())
    }

    async fn unsubscribed(&self, uri: &str) -> McpResult<()> {
        let _ = uri;
        Ok(())
    }
}
