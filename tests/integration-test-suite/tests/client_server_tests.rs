//! End-to-end coverage through the typed client: pagination, resource
//! reads, completion, subscriptions and shutdown.

use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use duplex_mcp::prelude::*;
use duplex_mcp_integration_tests::{connect_client, everything_server, RESOURCE_TWO_BLOB};

#[tokio::test]
async fn handshake_reports_server_identity() {
    let (server, _flag) = everything_server();
    let (client, session) = connect_client(&server).await;

    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(client.protocol_version().as_deref(), Some(LATEST_PROTOCOL_VERSION));
    let info = client.server_info().expect("server info recorded");
    assert_eq!(info.name, "S");
    let caps = client.server_capabilities().expect("capabilities recorded");
    assert!(caps.supports_tools());
    assert!(caps.supports_resource_subscriptions());

    timeout(Duration::from_secs(1), async {
        while !session.handle().is_ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("server side never became ready");
}

/// The three custom prompts come back one page at a time; the handler pages
/// with its own labels underneath the opaque wire cursors, and the last
/// page carries no cursor.
#[tokio::test]
async fn prompts_paginate_across_three_pages() {
    let (server, _flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    let mut names = Vec::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = client.list_prompts(cursor).await.unwrap();
        pages += 1;
        names.extend(page.prompts.into_iter().map(|p| p.name));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
        assert!(pages < 10, "pagination never terminated");
    }

    assert_eq!(pages, 3);
    assert_eq!(
        names,
        vec!["FirstCustomPrompt", "SecondCustomPrompt", "FinalCustomPrompt"]
    );
}

#[tokio::test]
async fn foreign_cursors_are_rejected() {
    let (server, _flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    let outcome = client.list_prompts(Some("abc".to_string())).await;
    match outcome {
        Err(McpError::Peer(err)) => {
            assert_eq!(err.code, duplex_mcp::core::error_codes::INVALID_PARAMS)
        }
        other => panic!("expected InvalidParams from the server, got {other:?}"),
    }
}

#[tokio::test]
async fn resource_reads_cover_text_blob_and_template() {
    let (server, _flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    let text = client.read_resource("test://static/resource/1").await.unwrap();
    assert_eq!(text.contents.len(), 1);
    match &text.contents[0] {
        ResourceContents::Text {
            uri,
            mime_type,
            text,
            ..
        } => {
            assert_eq!(uri, "test://static/resource/1");
            assert_eq!(mime_type.as_deref(), Some("text/plain"));
            assert!(text.starts_with("Resource 1:"));
        }
        other => panic!("expected text contents, got {other:?}"),
    }

    let blob = client.read_resource("test://static/resource/2").await.unwrap();
    assert_eq!(blob.contents.len(), 1);
    match &blob.contents[0] {
        ResourceContents::Blob { blob, .. } => {
            assert!(!blob.is_empty());
            assert_eq!(blob, RESOURCE_TWO_BLOB);
        }
        other => panic!("expected blob contents, got {other:?}"),
    }

    let templated = client.read_resource("test://dynamic/42").await.unwrap();
    match &templated.contents[0] {
        ResourceContents::Text { text, .. } => assert_eq!(text, "Dynamic resource 42"),
        other => panic!("expected text contents, got {other:?}"),
    }

    let missing = client.read_resource("test://static/resource/404").await;
    match missing {
        Err(McpError::Peer(err)) => {
            assert_eq!(err.code, duplex_mcp::core::error_codes::INVALID_PARAMS)
        }
        other => panic!("expected InvalidParams, got {other:?}"),
    }
}

#[tokio::test]
async fn completion_returns_the_matching_value() {
    let (server, _flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    let response = client
        .complete(CompleteRequest::new(
            Reference::prompt("irrelevant"),
            "style",
            "fo",
        ))
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&response.completion).unwrap(),
        json!({"values": ["formal"]})
    );
}

#[tokio::test]
async fn duplicate_subscriptions_are_indistinguishable_from_one() {
    let (server, _flag) = everything_server();
    let (client, _session) = connect_client(&server).await;

    client.subscribe_resource("test://static/resource/1").await.unwrap();
    client.subscribe_resource("test://static/resource/1").await.unwrap();
    // unknown URIs are accepted too
    client.subscribe_resource("test://nowhere").await.unwrap();

    // unsubscribe twice; the second is a no-op, not an error
    client.unsubscribe_resource("test://static/resource/1").await.unwrap();
    client.unsubscribe_resource("test://static/resource/1").await.unwrap();
}

#[tokio::test]
async fn unadvertised_methods_fail_with_method_not_found() {
    let server = Server::builder("bare", "1").build();
    let (client, _session) = connect_client(&server).await;

    let outcome = client.list_tools(None).await;
    match outcome {
        Err(McpError::Peer(err)) => {
            assert_eq!(err.code, duplex_mcp::core::error_codes::METHOD_NOT_FOUND)
        }
        other => panic!("expected MethodNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn close_tears_both_sides_down() {
    let (server, _flag) = everything_server();
    let (client, session) = connect_client(&server).await;

    client.ping().await.unwrap();
    client.close().await.unwrap();
    assert_eq!(client.state(), SessionState::Closed);

    timeout(Duration::from_secs(1), session.closed())
        .await
        .expect("server session never observed the close");

    let outcome = client.list_tools(None).await;
    assert!(matches!(outcome, Err(McpError::Disconnected)));
}
