//! The combined `NetworkBehaviour` for a P2P host node.
//!
//! - `mdns`          — LAN peer discovery, no bootstrap/relay required
//! - `identify`      — exchange multiaddr and protocol lists with peers
//! - `ping`          — keep idle connections alive
//! - `card_exchange` — capability-card request/response
//! - `mcp_bridge`     — MCP-over-P2P request/response

use std::time::Duration;

use libp2p::{identify, identity, mdns, ping, request_response, swarm::NetworkBehaviour, PeerId};

use crate::protocol::codec::{CardExchangeCodec, McpBridgeCodec, CARD_EXCHANGE_PROTO, MCP_BRIDGE_PROTO};
use crate::protocol::types::{CardExchangeRequest, CardExchangeResponse, McpRequest, McpResponse};

const APP_PROTO: &str = "/praxis/1.0.0";

#[derive(NetworkBehaviour)]
#[behaviour(out_event = "P2pBehaviourEvent")]
pub struct P2pBehaviour {
    pub mdns: mdns::tokio::Behaviour,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
    pub card_exchange: request_response::Behaviour<CardExchangeCodec>,
    pub mcp_bridge: request_response::Behaviour<McpBridgeCodec>,
}

#[derive(Debug)]
pub enum P2pBehaviourEvent {
    Mdns(mdns::Event),
    Identify(Box<identify::Event>),
    Ping(ping::Event),
    CardExchange(request_response::Event<CardExchangeRequest, CardExchangeResponse>),
    McpBridge(request_response::Event<McpRequest, McpResponse>),
}

impl From<mdns::Event> for P2pBehaviourEvent {
    fn from(e: mdns::Event) -> Self {
        P2pBehaviourEvent::Mdns(e)
    }
}
impl From<identify::Event> for P2pBehaviourEvent {
    fn from(e: identify::Event) -> Self {
        P2pBehaviourEvent::Identify(Box::new(e))
    }
}
impl From<ping::Event> for P2pBehaviourEvent {
    fn from(e: ping::Event) -> Self {
        P2pBehaviourEvent::Ping(e)
    }
}
impl From<request_response::Event<CardExchangeRequest, CardExchangeResponse>> for P2pBehaviourEvent {
    fn from(e: request_response::Event<CardExchangeRequest, CardExchangeResponse>) -> Self {
        P2pBehaviourEvent::CardExchange(e)
    }
}
impl From<request_response::Event<McpRequest, McpResponse>> for P2pBehaviourEvent {
    fn from(e: request_response::Event<McpRequest, McpResponse>) -> Self {
        P2pBehaviourEvent::McpBridge(e)
    }
}

impl P2pBehaviour {
    pub fn new(key: &identity::Keypair) -> Result<Self, libp2p::mdns::Error> {
        let local_peer_id = PeerId::from(key.public());
        Ok(Self {
            mdns: mdns::tokio::Behaviour::new(mdns::Config::default(), local_peer_id)?,
            identify: identify::Behaviour::new(identify::Config::new(APP_PROTO.into(), key.public())),
            ping: ping::Behaviour::new(ping::Config::new().with_interval(Duration::from_secs(15))),
            card_exchange: request_response::Behaviour::with_codec(
                CardExchangeCodec,
                [(CARD_EXCHANGE_PROTO, request_response::ProtocolSupport::Full)],
                request_response::Config::default().with_request_timeout(Duration::from_secs(30)),
            ),
            mcp_bridge: request_response::Behaviour::with_codec(
                McpBridgeCodec,
                [(MCP_BRIDGE_PROTO, request_response::ProtocolSupport::Full)],
                request_response::Config::default().with_request_timeout(Duration::from_secs(30)),
            ),
        })
    }
}
