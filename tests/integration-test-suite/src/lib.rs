//! Shared fixtures: an "everything" server exercising every capability,
//! plus helpers to wire a client to it in-process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use duplex_mcp::prelude::*;

/// Route engine logs to the test output when `RUST_LOG` asks for them.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Base64 payload of the second static resource.
pub const RESOURCE_TWO_BLOB: &str = "UmVzb3VyY2UgMjogdGhpcyBpcyBhIGJhc2U2NCBibG9i";

/// Set by the `slow` tool when it observes its cancellation scope fire.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn observed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Prompts are served entirely by this handler; it pages with its own
/// cursor labels, which the server wraps into opaque wire tokens.
struct CustomPromptHandler;

#[async_trait]
impl PromptHandler for CustomPromptHandler {
    async fn list_prompts(
        &self,
        request: duplex_mcp::core::types::ListPromptsRequest,
    ) -> McpResult<duplex_mcp::core::types::ListPromptsResponse> {
        let (prompts, next_cursor) = match request.cursor.as_deref() {
            None => (vec![Prompt::new("FirstCustomPrompt")], Some("abc".to_string())),
            Some("abc") => (
                vec![Prompt::new("SecondCustomPrompt")],
                Some("def".to_string()),
            ),
            Some("def") => (vec![Prompt::new("FinalCustomPrompt")], None),
            Some(other) => {
                return Err(McpError::invalid_params(format!("unknown cursor {other:?}")))
            }
        };
        Ok(duplex_mcp::core::types::ListPromptsResponse {
            prompts,
            next_cursor,
        })
    }

    async fn get_prompt(&self, request: GetPromptRequest) -> McpResult<GetPromptResponse> {
        Ok(GetPromptResponse {
            description: Some(format!("The {} prompt", request.name)),
            messages: vec![PromptMessage {
                role: Role::User,
                content: ContentBlock::text(format!("Rendered {}", request.name)),
            }],
        })
    }
}

/// Completes the `style` argument of any prompt reference.
struct StyleCompletionHandler;

#[async_trait]
impl CompletionHandler for StyleCompletionHandler {
    async fn complete(&self, request: CompleteRequest) -> McpResult<CompleteResponse> {
        let candidates = match request.argument.name.as_str() {
            "style" => vec!["casual", "formal", "technical", "friendly"],
            _ => Vec::new(),
        };
        let values = candidates
            .into_iter()
            .filter(|c| c.starts_with(&request.argument.value))
            .map(str::to_string)
            .collect();
        Ok(CompleteResponse {
            completion: Completion::plain(values),
        })
    }
}

/// A server advertising every capability, with the fixtures the conformance
/// scenarios expect.
pub fn everything_server() -> (Server, CancelFlag) {
    let server = Server::builder("S", "1")
        .with_capabilities(ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            prompts: Some(PromptsCapability {
                list_changed: Some(true),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(true),
                list_changed: Some(true),
            }),
            logging: Some(LoggingCapability {}),
            completions: Some(CompletionsCapability {}),
        })
        .with_prompt_handler(Arc::new(CustomPromptHandler))
        .with_completion_handler(Arc::new(StyleCompletionHandler))
        .build();

    server
        .register_tool(
            Tool::new("echo").with_description("Echoes back the input"),
            Arc::new(|args, _ctx| {
                Box::pin(async move {
                    let message = args
                        .as_ref()
                        .and_then(|a| a.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or_default()
                        .to_string();
                    Ok(CallToolResult::text(format!("Echo: {message}")))
                })
            }),
        )
        .expect("echo registration");

    let flag = CancelFlag::default();
    let observed = flag.clone();
    server
        .register_tool(
            Tool::new("slow").with_description("Runs until cancelled"),
            Arc::new(move |_args, ctx| {
                let observed = observed.clone();
                Box::pin(async move {
                    tokio::select! {
                        _ = ctx.cancellation.cancelled() => {
                            observed.0.store(true, std::sync::atomic::Ordering::Release);
                            Err(McpError::cancelled(None))
                        }
                        _ = tokio::time::sleep(Duration::from_secs(30)) => {
                            Ok(CallToolResult::text("finally done"))
                        }
                    }
                })
            }),
        )
        .expect("slow registration");

    server
        .register_tool(
            Tool::new("working").with_description("Reports progress"),
            Arc::new(|_args, ctx| {
                Box::pin(async move {
                    if let Some(progress) = &ctx.progress {
                        progress.report(0.5, Some(1.0), Some("halfway"));
                        progress.report(1.0, Some(1.0), Some("done"));
                    }
                    Ok(CallToolResult::text("worked"))
                })
            }),
        )
        .expect("working registration");

    server
        .register_resource(
            Resource::new("test://static/resource/1", "Resource 1")
                .with_mime_type("text/plain"),
            Arc::new(|request| {
                Box::pin(async move {
                    Ok(ReadResourceResponse {
                        contents: vec![ResourceContents::text(
                            request.uri,
                            "Resource 1: a plain text resource",
                        )
                        .with_mime_type("text/plain")],
                    })
                })
            }),
        )
        .expect("resource 1 registration");

    server
        .register_resource(
            Resource::new("test://static/resource/2", "Resource 2")
                .with_mime_type("application/octet-stream"),
            Arc::new(|request| {
                Box::pin(async move {
                    Ok(ReadResourceResponse {
                        contents: vec![ResourceContents::blob(request.uri, RESOURCE_TWO_BLOB)
                            .with_mime_type("application/octet-stream")],
                    })
                })
            }),
        )
        .expect("resource 2 registration");

    server
        .register_resource_template(
            ResourceTemplate::new("test://dynamic/{id}", "Dynamic resources"),
            Arc::new(|request, vars| {
                Box::pin(async move {
                    let id = vars.get("id").cloned().unwrap_or_default();
                    Ok(ReadResourceResponse {
                        contents: vec![ResourceContents::text(
                            request.uri,
                            format!("Dynamic resource {id}"),
                        )],
                    })
                })
            }),
        )
        .expect("template registration");

    (server, flag)
}

/// Connect a default client to the server over the in-memory pair.
pub async fn connect_client(server: &Server) -> (Client, ServerSession) {
    connect_client_with(server, Client::builder("C", "1")).await
}

pub async fn connect_client_with(
    server: &Server,
    builder: ClientBuilder,
) -> (Client, ServerSession) {
    let (client_end, server_end) = duplex::pair();
    let session = server.connect(server_end);
    let client = builder
        .connect(client_end)
        .await
        .expect("client handshake failed");
    (client, session)
}

/// Echo fixture used by the wire-literal scenarios.
pub fn scenario_initialize_params() -> serde_json::Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {},
        "clientInfo": {"name": "C", "version": "1"}
    })
}
