//! Bidirectional features: sampling, elicitation, roots, logging fan-out,
//! progress and list-changed notifications, exercised through both typed
//! endpoints at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use duplex_mcp::prelude::*;
use duplex_mcp_integration_tests::{connect_client, connect_client_with, everything_server};

struct FixedSampling;

#[async_trait]
impl SamplingHandler for FixedSampling {
    async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> McpResult<CreateMessageResponse> {
        assert!(!request.messages.is_empty());
        Ok(CreateMessageResponse {
            role: Role::Assistant,
            content: ContentBlock::text("sampled"),
            model: "test-model-mini".to_string(),
            stop_reason: None,
        })
    }
}

struct AcceptingElicitation;

#[async_trait]
impl ElicitationHandler for AcceptingElicitation {
    async fn elicit(&self, request: ElicitRequest) -> McpResult<ElicitResponse> {
        assert!(request.requested_schema.properties.contains_key("color"));
        let mut content = HashMap::new();
        content.insert("color".to_string(), json!("green"));
        Ok(ElicitResponse::accept(content))
    }
}

fn sampling_request() -> CreateMessageRequest {
    CreateMessageRequest::new(
        vec![duplex_mcp::core::types::SamplingMessage {
            role: Role::User,
            content: ContentBlock::text("say hi"),
        }],
        64,
    )
}

#[tokio::test]
async fn server_can_sample_through_the_client() {
    let (server, _flag) = everything_server();
    let builder = Client::builder("C", "1")
        .with_capabilities(ClientCapabilities {
            sampling: Some(SamplingCapability {}),
            ..Default::default()
        })
        .with_sampling_handler(Arc::new(FixedSampling));
    let (_client, session) = connect_client_with(&server, builder).await;

    let response = session.create_message(sampling_request()).await.unwrap();
    assert_eq!(response.model, "test-model-mini");
    assert_eq!(response.role, Role::Assistant);
}

#[tokio::test]
async fn sampling_without_the_capability_is_rejected() {
    let (server, _flag) = everything_server();
    let (_client, session) = connect_client(&server).await;

    let outcome = session.create_message(sampling_request()).await;
    match outcome {
        Err(McpError::Protocol(duplex_mcp::core::ProtocolError::MethodNotFound(_))) => {}
        other => panic!("expected MethodNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn elicitation_round_trips_structured_input() {
    let (server, _flag) = everything_server();
    let builder = Client::builder("C", "1")
        .with_capabilities(ClientCapabilities {
            elicitation: Some(ElicitationCapability {}),
            ..Default::default()
        })
        .with_elicitation_handler(Arc::new(AcceptingElicitation));
    let (_client, session) = connect_client_with(&server, builder).await;

    let response = session
        .elicit(ElicitRequest {
            message: "Pick a color".to_string(),
            requested_schema: ElicitationSchema::new()
                .with_property(
                    "color",
                    PrimitiveSchema::enumeration(vec![
                        "red".to_string(),
                        "green".to_string(),
                    ]),
                )
                .with_required(vec!["color".to_string()]),
        })
        .await
        .unwrap();

    assert_eq!(response.action, ElicitAction::Accept);
    assert_eq!(response.content.unwrap()["color"], json!("green"));
}

#[tokio::test]
async fn roots_are_listed_and_changes_announced() {
    let (server, _flag) = everything_server();
    let builder = Client::builder("C", "1")
        .with_capabilities(ClientCapabilities {
            roots: Some(RootsCapability {
                list_changed: Some(true),
            }),
            ..Default::default()
        })
        .with_roots(vec![Root::new("file:///workspace").with_name("workspace")]);
    let (client, session) = connect_client_with(&server, builder).await;

    let listed = session.list_roots().await.unwrap();
    assert_eq!(listed.roots.len(), 1);
    assert_eq!(listed.roots[0].uri, "file:///workspace");

    // the change notification reaches the server's registered hook
    let (saw_change_tx, mut saw_change_rx) = mpsc::unbounded_channel();
    server.on_notification(
        "notifications/roots/list_changed",
        Arc::new(move |_params, _peer| {
            let tx = saw_change_tx.clone();
            Box::pin(async move {
                let _ = tx.send(());
            })
        }),
    );

    client
        .set_roots(vec![
            Root::new("file:///workspace"),
            Root::new("file:///scratch"),
        ])
        .unwrap();

    timeout(Duration::from_secs(1), saw_change_rx.recv())
        .await
        .expect("roots change never announced");

    let relisted = session.list_roots().await.unwrap();
    assert_eq!(relisted.roots.len(), 2);
}

#[tokio::test]
async fn log_messages_flow_to_the_client_after_set_level() {
    let (server, _flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    let (log_tx, mut log_rx) = mpsc::unbounded_channel::<Option<Value>>();
    client.on_notification(
        "notifications/message",
        Arc::new(move |params, _peer| {
            let tx = log_tx.clone();
            Box::pin(async move {
                let _ = tx.send(params);
            })
        }),
    );

    client.set_log_level(LogLevel::Debug).await.unwrap();
    server.log_message(LogLevel::Error, json!({"what": "broke"}), Some("core"));

    let params = timeout(Duration::from_secs(1), log_rx.recv())
        .await
        .expect("log message never arrived")
        .flatten()
        .expect("log message carries params");
    assert_eq!(params["level"], "error");
    assert_eq!(params["logger"], "core");
}

#[tokio::test]
async fn tool_progress_reaches_the_caller() {
    let (server, _flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    let (sink, mut updates) = progress_channel();
    let result = client
        .call_tool_with_options(
            CallToolRequest::new("working", None),
            RequestOptions::default().with_progress(sink),
        )
        .await
        .unwrap();
    assert!(!result.is_failure());

    let first = timeout(Duration::from_secs(1), updates.recv())
        .await
        .unwrap()
        .expect("first progress update");
    assert_eq!(first.progress, 0.5);
    assert_eq!(first.message.as_deref(), Some("halfway"));

    let second = timeout(Duration::from_secs(1), updates.recv())
        .await
        .unwrap()
        .expect("second progress update");
    assert_eq!(second.progress, 1.0);
}

#[tokio::test]
async fn registry_mutations_announce_list_changed() {
    let (server, _flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel();
    client.on_notification(
        "notifications/tools/list_changed",
        Arc::new(move |_params, _peer| {
            let tx = changed_tx.clone();
            Box::pin(async move {
                let _ = tx.send(());
            })
        }),
    );

    server
        .register_tool(
            Tool::new("newcomer"),
            Arc::new(|_, _| Box::pin(async { Ok(CallToolResult::text("new")) })),
        )
        .unwrap();

    timeout(Duration::from_secs(1), changed_rx.recv())
        .await
        .expect("list_changed never arrived");

    // and the next listing reflects the mutation
    let tools = client.list_tools(None).await.unwrap();
    assert!(tools.tools.iter().any(|t| t.name == "newcomer"));
}

#[tokio::test]
async fn client_cancellation_token_cancels_the_server_handler() {
    let (server, flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    let token = CancellationToken::new();
    let cancel = token.clone();
    let call = tokio::spawn(async move {
        client
            .call_tool_with_options(
                CallToolRequest::new("slow", None),
                RequestOptions::default().with_cancellation(token),
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let outcome = call.await.unwrap();
    assert!(outcome.err().map(|e| e.is_cancelled()).unwrap_or(false));

    timeout(Duration::from_secs(1), async {
        while !flag.observed() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server handler never observed the cancellation");
}
