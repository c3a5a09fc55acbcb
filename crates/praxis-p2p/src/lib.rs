// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The libp2p host: mDNS discovery, capability-card exchange, and the MCP
//! bridge.

pub mod behaviour;
pub mod config;
pub mod error;
pub mod node;
pub mod protocol;
pub mod transport;

pub use config::P2pConfig;
pub use error::P2pError;
pub use node::{P2pEvent, P2pHandle, P2pNode};
pub use protocol::types::{CardExchangeRequest, CardExchangeResponse};
