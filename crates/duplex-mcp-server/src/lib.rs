//! # Duplex MCP Server
//!
//! The server endpoint: capability registries, the feature method table,
//! per-session subscriptions, and the server-initiated request surface
//! (sampling, elicitation, roots), all driven through the shared session
//! engine.

pub mod handlers;
pub mod registry;
pub mod server;
pub mod subscriptions;

pub use handlers::{
    CompletionHandler, PromptHandler, ResourceHandler, SubscriptionHook, ToolHandler,
};
pub use registry::{
    PromptFn, PromptRegistry, ResourceReadFn, ResourceRegistry, TemplateReadFn, ToolContext,
    ToolFn, ToolRegistry,
};
pub use server::{NotificationFn, Server, ServerBuilder, ServerSession};
pub use subscriptions::SubscriptionManager;
