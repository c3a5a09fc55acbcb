//! Frame-level round-trip tests for the card-exchange and MCP-bridge wire
//! types, exercised through the public `request_response::Codec` impls.

use futures::io::Cursor;
use libp2p::{request_response::Codec, StreamProtocol};

use praxis_card::CapabilityCard;
use praxis_p2p::protocol::codec::{CardExchangeCodec, McpBridgeCodec, CARD_EXCHANGE_PROTO, MCP_BRIDGE_PROTO};
use praxis_p2p::protocol::types::{CardExchangeRequest, CardExchangeResponse, McpRequest, McpResponse};

fn dummy_protocol() -> StreamProtocol {
    CARD_EXCHANGE_PROTO
}

#[tokio::test]
async fn card_exchange_request_roundtrips() {
    let mut codec = CardExchangeCodec;
    let mut buf = Vec::new();
    codec
        .write_request(&dummy_protocol(), &mut buf, CardExchangeRequest)
        .await
        .expect("write request");
    let mut cursor = Cursor::new(buf);
    codec
        .read_request(&dummy_protocol(), &mut cursor)
        .await
        .expect("read request");
}

#[tokio::test]
async fn card_exchange_response_roundtrips() {
    let mut codec = CardExchangeCodec;
    let mut card = CapabilityCard::builder("alice", "1.0");
    card.description = "general purpose Rust agent".into();

    let mut buf = Vec::new();
    codec
        .write_response(&dummy_protocol(), &mut buf, CardExchangeResponse { card: card.clone() })
        .await
        .expect("write response");
    let mut cursor = Cursor::new(buf);
    let decoded = codec
        .read_response(&dummy_protocol(), &mut cursor)
        .await
        .expect("read response");
    assert_eq!(decoded.card.name, card.name);
    assert_eq!(decoded.card.description, card.description);
}

#[tokio::test]
async fn mcp_bridge_request_roundtrips() {
    let mut codec = McpBridgeCodec;
    let req = McpRequest {
        id: "r1".into(),
        method: "tools/call".into(),
        server_name: "fs".into(),
        tool_name: Some("read_file".into()),
        params: serde_json::json!({"path": "/tmp/x"}),
        timeout: Some(5),
    };

    let mut buf = Vec::new();
    codec
        .write_request(&MCP_BRIDGE_PROTO, &mut buf, req.clone())
        .await
        .expect("write request");
    let mut cursor = Cursor::new(buf);
    let decoded = codec
        .read_request(&MCP_BRIDGE_PROTO, &mut cursor)
        .await
        .expect("read request");
    assert_eq!(decoded.id, req.id);
    assert_eq!(decoded.tool_name, req.tool_name);
}

#[tokio::test]
async fn mcp_bridge_response_roundtrips() {
    let mut codec = McpBridgeCodec;
    let resp = McpResponse::ok("r1".into(), serde_json::json!({"ok": true}));

    let mut buf = Vec::new();
    codec
        .write_response(&MCP_BRIDGE_PROTO, &mut buf, resp.clone())
        .await
        .expect("write response");
    let mut cursor = Cursor::new(buf);
    let decoded = codec
        .read_response(&MCP_BRIDGE_PROTO, &mut cursor)
        .await
        .expect("read response");
    assert_eq!(decoded.id, resp.id);
    assert_eq!(decoded.result, resp.result);
}

#[tokio::test]
async fn oversized_card_exchange_frame_is_rejected() {
    let mut codec = CardExchangeCodec;
    let mut buf = Vec::new();
    buf.extend_from_slice(&u32::MAX.to_be_bytes());
    let mut cursor = Cursor::new(buf);
    let result = codec.read_response(&dummy_protocol(), &mut cursor).await;
    assert!(result.is_err());
}
