//! Conformance scenarios asserted at the wire level: a real server on one
//! end, a hand-driven probe on the other, with literal frame comparisons
//! where the protocol fixes exact bytes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::timeout;

use duplex_mcp::prelude::*;
use duplex_mcp_integration_tests::{everything_server, init_test_logging, scenario_initialize_params};

use duplex_mcp::transport::MessageStream;

async fn next_frame(stream: &mut MessageStream) -> Message {
    timeout(Duration::from_secs(1), stream.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("transport error")
}

async fn assert_no_frame(stream: &mut MessageStream) {
    let outcome = timeout(Duration::from_millis(250), stream.recv()).await;
    assert!(outcome.is_err(), "unexpected frame: {:?}", outcome.unwrap());
}

fn frame_json(frame: &Message) -> Value {
    serde_json::to_value(frame).expect("frame serializes")
}

/// Scenario: the full handshake, with the server's answer compared against
/// the literal wire value.
#[tokio::test]
async fn handshake_wire_literals() {
    init_test_logging();
    let server = Server::builder("S", "1")
        .with_capabilities(ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            ..Default::default()
        })
        .build();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let session = server.connect(wire);

    let initialize = Message::from_slice(
        br#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"C","version":"1"}}}"#,
    )
    .expect("literal frame parses");
    probe.send(initialize).await.unwrap();

    let response = next_frame(&mut frames).await;
    assert_eq!(
        frame_json(&response),
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {"listChanged": true}},
                "serverInfo": {"name": "S", "version": "1"}
            }
        })
    );

    probe
        .send(Message::from_slice(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap())
        .await
        .unwrap();

    // the session reaches Ready once the notification is consumed
    timeout(Duration::from_secs(1), async {
        while !session.handle().is_ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session never became ready");
}

/// Scenario: the echo tool call, compared against the literal result frame.
#[tokio::test]
async fn echo_tool_call_wire_literals() {
    let (server, _flag) = everything_server();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);

    probe
        .send(Message::request(
            RequestId::number(1),
            "initialize",
            Some(scenario_initialize_params()),
        ))
        .await
        .unwrap();
    next_frame(&mut frames).await;
    probe
        .send(Message::notification("notifications/initialized", None))
        .await
        .unwrap();

    probe
        .send(Message::from_slice(
            br#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"message":"Hello MCP!"}}}"#,
        )
        .unwrap())
        .await
        .unwrap();

    let response = next_frame(&mut frames).await;
    assert_eq!(
        frame_json(&response),
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {"content": [{"type": "text", "text": "Echo: Hello MCP!"}]}
        })
    );
}

/// Scenario: the cancellation race. The server-side handler's cancellation
/// scope fires and no response frame for the cancelled id is ever sent.
#[tokio::test]
async fn cancellation_race_wire_behavior() {
    let (server, flag) = everything_server();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);

    probe
        .send(Message::request(
            RequestId::number(1),
            "initialize",
            Some(scenario_initialize_params()),
        ))
        .await
        .unwrap();
    next_frame(&mut frames).await;
    probe
        .send(Message::notification("notifications/initialized", None))
        .await
        .unwrap();

    probe
        .send(Message::request(
            RequestId::number(7),
            "tools/call",
            Some(json!({"name": "slow"})),
        ))
        .await
        .unwrap();
    probe
        .send(Message::from_slice(
            br#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":7,"reason":"user"}}"#,
        )
        .unwrap())
        .await
        .unwrap();

    // no frame for id 7, ever
    assert_no_frame(&mut frames).await;
    assert!(flag.observed(), "handler cancellation scope never fired");
}

/// Boundary: an empty page with a cursor lets the caller continue; a page
/// without one ends the stream.
#[tokio::test]
async fn empty_page_with_cursor_continues() {
    struct SparseTools;

    #[async_trait::async_trait]
    impl ToolHandler for SparseTools {
        async fn list_tools(
            &self,
            request: duplex_mcp::core::types::ListToolsRequest,
        ) -> McpResult<duplex_mcp::core::types::ListToolsResponse> {
            let (tools, next_cursor) = match request.cursor.as_deref() {
                None => (Vec::new(), Some("more".to_string())),
                Some("more") => (vec![Tool::new("straggler")], None),
                Some(other) => {
                    return Err(McpError::invalid_params(format!("bad cursor {other:?}")))
                }
            };
            Ok(duplex_mcp::core::types::ListToolsResponse { tools, next_cursor })
        }

        async fn call_tool(
            &self,
            request: CallToolRequest,
            _ctx: ToolContext,
        ) -> McpResult<CallToolResult> {
            Err(McpError::method_not_found(format!("tool '{}'", request.name)))
        }
    }

    let server = Server::builder("S", "1")
        .with_capabilities(ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: None }),
            ..Default::default()
        })
        .with_tool_handler(Arc::new(SparseTools))
        .build();

    let (client_end, server_end) = duplex::pair();
    let _session = server.connect(server_end);
    let client = Client::builder("C", "1").connect(client_end).await.unwrap();

    let first = client.list_tools(None).await.unwrap();
    assert!(first.tools.is_empty());
    let cursor = first.next_cursor.expect("caller may continue");

    let second = client.list_tools(Some(cursor)).await.unwrap();
    assert_eq!(second.tools.len(), 1);
    assert_eq!(second.tools[0].name, "straggler");
    assert!(second.next_cursor.is_none(), "end of stream");
}
