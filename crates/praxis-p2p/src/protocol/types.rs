//! Wire types for the two request/response protocols a node speaks:
//! capability-card exchange and the MCP bridge.

use serde::{Deserialize, Serialize};

use praxis_card::CapabilityCard;

pub use praxis_mcp::{McpRequest, McpResponse};

/// Request side of the card-exchange protocol: ask the responder for its
/// current signed capability card. Carries nothing — opening the stream
/// itself is the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardExchangeRequest;

/// Response side of the card-exchange protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardExchangeResponse {
    pub card: CapabilityCard,
}
