//! Server behavior over a raw wire probe: lifecycle enforcement, capability
//! gating, subscriptions and notification fan-out, asserted frame by frame.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::timeout;

use duplex_mcp_core::types::LogLevel;
use duplex_mcp_core::{error_codes, Message, RequestId, ServerCapabilities, Tool};
use duplex_mcp_core::protocol::capabilities::{
    LoggingCapability, ResourcesCapability, ToolsCapability,
};
use duplex_mcp_server::Server;
use duplex_mcp_transport::{duplex, MessageStream, Transport};

async fn next_frame(stream: &mut MessageStream) -> Message {
    timeout(Duration::from_secs(1), stream.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("transport error")
}

fn error_code(frame: &Message) -> i32 {
    match frame {
        Message::Error(e) => e.error.code,
        other => panic!("expected error frame, got {other:?}"),
    }
}

fn result(frame: Message) -> Value {
    match frame {
        Message::Response(r) => r.result,
        other => panic!("expected response frame, got {other:?}"),
    }
}

fn full_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        tools: Some(ToolsCapability {
            list_changed: Some(true),
        }),
        resources: Some(ResourcesCapability {
            subscribe: Some(true),
            list_changed: Some(true),
        }),
        logging: Some(LoggingCapability {}),
        ..Default::default()
    }
}

/// Drive the handshake over the raw wire and return once Ready.
async fn handshake(probe: &duplex::DuplexTransport, frames: &mut MessageStream) {
    probe
        .send(Message::request(
            RequestId::number(1),
            "initialize",
            Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "probe", "version": "1"}
            })),
        ))
        .await
        .unwrap();
    let response = result(next_frame(frames).await);
    assert_eq!(response["protocolVersion"], "2024-11-05");
    probe
        .send(Message::notification("notifications/initialized", None))
        .await
        .unwrap();
    // ping round-trip so the state change is observed before returning
    probe
        .send(Message::request(RequestId::number(2), "ping", Some(json!({}))))
        .await
        .unwrap();
    next_frame(frames).await;
}

#[tokio::test]
async fn requests_before_initialized_are_invalid_except_ping() {
    let server = Server::builder("S", "1")
        .with_capabilities(full_capabilities())
        .build();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);

    // ping is fine before the handshake
    probe
        .send(Message::request(RequestId::number(1), "ping", Some(json!({}))))
        .await
        .unwrap();
    assert_eq!(result(next_frame(&mut frames).await), json!({}));

    // anything else is InvalidRequest
    probe
        .send(Message::request(RequestId::number(2), "tools/list", None))
        .await
        .unwrap();
    assert_eq!(
        error_code(&next_frame(&mut frames).await),
        error_codes::INVALID_REQUEST
    );
}

#[tokio::test]
async fn initialize_twice_is_invalid_request() {
    let server = Server::builder("S", "1")
        .with_capabilities(full_capabilities())
        .build();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);

    handshake(&probe, &mut frames).await;

    probe
        .send(Message::request(
            RequestId::number(9),
            "initialize",
            Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "probe", "version": "1"}
            })),
        ))
        .await
        .unwrap();
    assert_eq!(
        error_code(&next_frame(&mut frames).await),
        error_codes::INVALID_REQUEST
    );
}

#[tokio::test]
async fn unadvertised_capability_methods_are_method_not_found() {
    // a server with no capabilities at all
    let server = Server::builder("S", "1").build();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);

    handshake(&probe, &mut frames).await;

    for (id, method) in [
        (10, "tools/list"),
        (11, "tools/call"),
        (12, "prompts/list"),
        (13, "resources/list"),
        (14, "resources/subscribe"),
        (15, "logging/setLevel"),
        (16, "completion/complete"),
    ] {
        probe
            .send(Message::request(RequestId::number(id), method, None))
            .await
            .unwrap();
        assert_eq!(
            error_code(&next_frame(&mut frames).await),
            error_codes::METHOD_NOT_FOUND,
            "method {method} should be gated"
        );
    }
}

#[tokio::test]
async fn unknown_tool_is_method_not_found_but_tool_failure_is_a_result() {
    let server = Server::builder("S", "1")
        .with_capabilities(full_capabilities())
        .build();
    server
        .register_tool(
            Tool::new("fragile"),
            Arc::new(|_, _| {
                Box::pin(async {
                    Ok(duplex_mcp_core::CallToolResult::error("tool blew up"))
                })
            }),
        )
        .unwrap();

    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);
    handshake(&probe, &mut frames).await;

    // execution failure comes back as a result with isError
    probe
        .send(Message::request(
            RequestId::number(20),
            "tools/call",
            Some(json!({"name": "fragile"})),
        ))
        .await
        .unwrap();
    let outcome = result(next_frame(&mut frames).await);
    assert_eq!(outcome["isError"], json!(true));

    // lookup failure is a JSON-RPC error
    probe
        .send(Message::request(
            RequestId::number(21),
            "tools/call",
            Some(json!({"name": "no-such-tool"})),
        ))
        .await
        .unwrap();
    assert_eq!(
        error_code(&next_frame(&mut frames).await),
        error_codes::METHOD_NOT_FOUND
    );
}

#[tokio::test]
async fn subscribe_is_idempotent_and_updates_fan_out() {
    let server = Server::builder("S", "1")
        .with_capabilities(full_capabilities())
        .build();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);
    handshake(&probe, &mut frames).await;

    for id in [30, 31] {
        probe
            .send(Message::request(
                RequestId::number(id),
                "resources/subscribe",
                Some(json!({"uri": "test://static/resource/1"})),
            ))
            .await
            .unwrap();
        assert_eq!(result(next_frame(&mut frames).await), json!({}));
    }

    server.notify_resource_updated("test://static/resource/1");
    let update = next_frame(&mut frames).await;
    match update {
        Message::Notification(n) => {
            assert_eq!(n.method, "notifications/resources/updated");
            assert_eq!(n.params.unwrap()["uri"], "test://static/resource/1");
        }
        other => panic!("expected updated notification, got {other:?}"),
    }

    // a duplicate subscription produced exactly one fan-out above; an
    // update for an unsubscribed uri produces none
    server.notify_resource_updated("test://static/resource/2");
    probe
        .send(Message::request(RequestId::number(32), "ping", Some(json!({}))))
        .await
        .unwrap();
    let frame = next_frame(&mut frames).await;
    assert_eq!(frame.id(), Some(&RequestId::number(32)));
}

#[tokio::test]
async fn list_changed_precedes_the_next_list_response() {
    let server = Server::builder("S", "1")
        .with_capabilities(full_capabilities())
        .build();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);
    handshake(&probe, &mut frames).await;

    server
        .register_tool(
            Tool::new("late-arrival"),
            Arc::new(|_, _| {
                Box::pin(async { Ok(duplex_mcp_core::CallToolResult::text("hi")) })
            }),
        )
        .unwrap();

    probe
        .send(Message::request(RequestId::number(40), "tools/list", None))
        .await
        .unwrap();

    // the notification was enqueued by register_tool before the list
    // request arrived, so it comes out first
    let first = next_frame(&mut frames).await;
    assert_eq!(first.method(), Some("notifications/tools/list_changed"));

    let listing = result(next_frame(&mut frames).await);
    assert_eq!(listing["tools"][0]["name"], "late-arrival");
}

#[tokio::test]
async fn log_messages_respect_the_session_level() {
    let server = Server::builder("S", "1")
        .with_capabilities(full_capabilities())
        .build();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);
    handshake(&probe, &mut frames).await;

    probe
        .send(Message::request(
            RequestId::number(50),
            "logging/setLevel",
            Some(json!({"level": "warning"})),
        ))
        .await
        .unwrap();
    assert_eq!(result(next_frame(&mut frames).await), json!({}));

    // below the threshold: suppressed
    server.log_message(LogLevel::Info, json!("quiet"), None);
    // at the threshold: delivered
    server.log_message(LogLevel::Warning, json!("loud"), Some("core"));

    let frame = next_frame(&mut frames).await;
    match frame {
        Message::Notification(n) => {
            assert_eq!(n.method, "notifications/message");
            let params = n.params.unwrap();
            assert_eq!(params["level"], "warning");
            assert_eq!(params["data"], "loud");
            assert_eq!(params["logger"], "core");
        }
        other => panic!("expected log notification, got {other:?}"),
    }
}

#[tokio::test]
async fn bad_cursor_is_invalid_params() {
    let server = Server::builder("S", "1")
        .with_capabilities(full_capabilities())
        .build();
    let (mut probe, wire) = duplex::pair();
    let mut frames = probe.messages();
    let _session = server.connect(wire);
    handshake(&probe, &mut frames).await;

    probe
        .send(Message::request(
            RequestId::number(60),
            "tools/list",
            Some(json!({"cursor": "never-issued-by-this-server"})),
        ))
        .await
        .unwrap();
    assert_eq!(
        error_code(&next_frame(&mut frames).await),
        error_codes::INVALID_PARAMS
    );
}
