//! MCP payload types: content blocks, primitives and per-method DTOs.

pub mod completion;
pub mod content;
pub mod elicitation;
pub mod notifications;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tools;

pub use completion::{
    CompleteRequest, CompleteResponse, Completion, CompletionArgument, CompletionContext,
    Reference, MAX_COMPLETION_VALUES,
};
pub use content::{Annotations, ContentBlock, Role};
pub use elicitation::{
    ElicitAction, ElicitRequest, ElicitResponse, ElicitationSchema, PrimitiveSchema, StringFormat,
};
pub use notifications::{
    CancelledNotification, EmptyResult, LogLevel, LoggingMessageNotification, PingRequest,
    ProgressNotification, SetLevelRequest,
};
pub use prompts::{
    GetPromptRequest, GetPromptResponse, ListPromptsRequest, ListPromptsResponse, Prompt,
    PromptArgument, PromptMessage,
};
pub use resources::{
    ListResourceTemplatesRequest, ListResourceTemplatesResponse, ListResourcesRequest,
    ListResourcesResponse, ReadResourceRequest, ReadResourceResponse, Resource, ResourceContents,
    ResourceTemplate, ResourceUpdatedNotification, SubscribeRequest, UnsubscribeRequest,
};
pub use roots::{ListRootsRequest, ListRootsResponse, Root};
pub use sampling::{
    CreateMessageRequest, CreateMessageResponse, IncludeContext, ModelHint, ModelPreferences,
    SamplingMessage, StopReason,
};
pub use tools::{
    CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResponse, Tool, ToolAnnotations,
};
