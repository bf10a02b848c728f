//! # Duplex MCP
//!
//! A bidirectional Model Context Protocol (MCP) runtime: a JSON-RPC 2.0
//! session engine powering both the client and the server side of a
//! connection over any message-oriented transport.
//!
//! This crate re-exports the whole workspace; most users want the
//! [`prelude`].
//!
//! ```no_run
//! use duplex_mcp::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> McpResult<()> {
//! let server = Server::builder("everything", "1.0")
//!     .with_capabilities(ServerCapabilities {
//!         tools: Some(ToolsCapability { list_changed: Some(true) }),
//!         ..Default::default()
//!     })
//!     .build();
//! server.register_tool(
//!     Tool::new("echo").with_description("Echoes back the input"),
//!     Arc::new(|args, _ctx| Box::pin(async move {
//!         let message = args
//!             .as_ref()
//!             .and_then(|a| a.get("message"))
//!             .and_then(|m| m.as_str())
//!             .unwrap_or_default();
//!         Ok(CallToolResult::text(format!("Echo: {message}")))
//!     })),
//! )?;
//!
//! let (client_end, server_end) = duplex::pair();
//! let _session = server.connect(server_end);
//! let client = Client::builder("host", "1.0").connect(client_end).await?;
//! let result = client.call_tool("echo", Some(serde_json::json!({"message": "hi"}))).await?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

pub use duplex_mcp_client as client;
pub use duplex_mcp_core as core;
pub use duplex_mcp_server as server;
pub use duplex_mcp_session as session;
pub use duplex_mcp_transport as transport;

pub mod prelude;
