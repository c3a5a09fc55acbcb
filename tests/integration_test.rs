// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end test of the fully wired node: two complete `praxis_node::Node`
//! instances, each with their own signed card, backend supervisor, and MCP
//! router, connected over real loopback TCP and exchanging an actual tool
//! call through `/mcp/bridge/1.0.0`.
//!
//! The `echo` backend is a one-line `sh` script standing in for a real
//! stdio MCP server — the same pattern `praxis-backend`'s own stdio tests
//! use `cat` for, just answering a fixed request instead of echoing it.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;

use praxis_backend::{BackendConfig, BackendTransportConfig, StdioBackendConfig};
use praxis_mcp::envelope::METHOD_TOOLS_CALL;
use praxis_mcp::McpRequest;
use praxis_node::{Node, NodeConfig};
use praxis_p2p::node::P2pEvent;

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn echo_backend_config() -> BackendConfig {
    // Reads one request line and answers with a fixed response line,
    // regardless of the request's own id — `StdioChild::call` never checks
    // that the response id matches what it sent.
    let script = r#"while IFS= read -r _; do printf '%s\n' '{"id":"x","result":{"message":"pong"}}'; done"#;
    BackendConfig {
        name: "echo".to_string(),
        transport: BackendTransportConfig::Stdio(StdioBackendConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: Default::default(),
            working_dir: None,
            inherit_env: true,
        }),
    }
}

async fn wait_for<F>(events: &mut tokio::sync::broadcast::Receiver<P2pEvent>, matcher: F) -> P2pEvent
where
    F: Fn(&P2pEvent) -> bool,
{
    timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(ev) if matcher(&ev) => return ev,
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for expected event")
}

/// A remote tool call reaches a backend registered on the *other* node,
/// routed entirely over the P2P bridge: alice dials bob, the two exchange
/// capability cards automatically, and alice then calls bob's `echo`
/// backend through `P2pHandle::call_mcp`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remote_tool_call_round_trips_over_p2p_bridge() {
    let alice_port = free_port();
    let bob_port = free_port();

    let alice_config = NodeConfig {
        p2p_listen: format!("/ip4/127.0.0.1/tcp/{alice_port}"),
        ..NodeConfig::default()
    };
    let bob_config = NodeConfig {
        p2p_listen: format!("/ip4/127.0.0.1/tcp/{bob_port}"),
        backends: vec![echo_backend_config()],
        ..NodeConfig::default()
    };

    let alice = Node::start(alice_config, HashMap::new()).await.expect("alice starts");
    let bob = Node::start(bob_config, HashMap::new()).await.expect("bob starts");

    let mut alice_events = alice.p2p().subscribe_events();

    // Give bob's backend a moment to leave the `starting` state before the
    // call lands, and both swarms a moment to finish binding.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let bob_addr = format!("/ip4/127.0.0.1/tcp/{bob_port}").parse().unwrap();
    alice.p2p().dial(bob_addr).await.expect("dial command accepted");

    let bob_peer_id = match wait_for(&mut alice_events, |ev| matches!(ev, P2pEvent::PeerDiscovered { .. })).await {
        P2pEvent::PeerDiscovered { peer_id, card } => {
            assert_eq!(card.name, "praxis-node");
            peer_id
        }
        other => panic!("unexpected event: {other:?}"),
    };

    let request = McpRequest {
        id: "alice-1".to_string(),
        method: METHOD_TOOLS_CALL.to_string(),
        server_name: "echo".to_string(),
        tool_name: Some("ping".to_string()),
        params: serde_json::json!({}),
        timeout: None,
    };

    let response = alice
        .p2p()
        .call_mcp(bob_peer_id, request)
        .await
        .expect("remote call succeeds");

    assert_eq!(response.id, "alice-1");
    assert_eq!(response.result, Some(serde_json::json!({ "message": "pong" })));
    assert!(response.error.is_none());

    alice.shutdown().await;
    bob.shutdown().await;
}

/// A request for a backend that was never registered on the remote node
/// comes back as an error over the wire rather than hanging or panicking.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remote_tool_call_for_unknown_backend_returns_error_response() {
    let alice_port = free_port();
    let bob_port = free_port();

    let alice_config = NodeConfig {
        p2p_listen: format!("/ip4/127.0.0.1/tcp/{alice_port}"),
        ..NodeConfig::default()
    };
    let bob_config = NodeConfig {
        p2p_listen: format!("/ip4/127.0.0.1/tcp/{bob_port}"),
        ..NodeConfig::default()
    };

    let alice = Node::start(alice_config, HashMap::new()).await.expect("alice starts");
    let bob = Node::start(bob_config, HashMap::new()).await.expect("bob starts");

    let mut alice_events = alice.p2p().subscribe_events();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let bob_addr = format!("/ip4/127.0.0.1/tcp/{bob_port}").parse().unwrap();
    alice.p2p().dial(bob_addr).await.expect("dial command accepted");

    let bob_peer_id = match wait_for(&mut alice_events, |ev| matches!(ev, P2pEvent::PeerDiscovered { .. })).await {
        P2pEvent::PeerDiscovered { peer_id, .. } => peer_id,
        other => panic!("unexpected event: {other:?}"),
    };

    let request = McpRequest {
        id: "alice-2".to_string(),
        method: METHOD_TOOLS_CALL.to_string(),
        server_name: "nonexistent".to_string(),
        tool_name: Some("ping".to_string()),
        params: serde_json::json!({}),
        timeout: None,
    };

    let response = alice
        .p2p()
        .call_mcp(bob_peer_id, request)
        .await
        .expect("the bridge itself succeeds even though the backend call fails");

    assert!(response.result.is_none());
    assert!(response.error.is_some());

    alice.shutdown().await;
    bob.shutdown().await;
}
