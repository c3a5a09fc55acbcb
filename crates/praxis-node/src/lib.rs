// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Process-wide lifecycle: builds the capability card, backend supervisor,
//! MCP router, and P2P host in dependency order, and tears them down in
//! reverse.

pub mod config;
pub mod error;
pub mod node;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn node_starts_and_shuts_down_with_no_backends() {
        let config = NodeConfig {
            p2p_listen: "/ip4/127.0.0.1/tcp/0".to_string(),
            ..NodeConfig::default()
        };
        let node = Node::start(config, HashMap::new()).await.expect("node starts");
        let card = node.local_card().await;
        assert_eq!(card.name, "praxis-node");
        node.shutdown().await;
    }

    #[tokio::test]
    async fn signed_card_carries_the_configured_did() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            p2p_listen: "/ip4/127.0.0.1/tcp/0".to_string(),
            identity: config::IdentityConfig {
                name: Some("alice".into()),
                description: "a test agent".into(),
                did: Some("did:web:alice.example".into()),
                signing_key_path: Some(dir.path().join("key")),
            },
            ..NodeConfig::default()
        };
        let node = Node::start(config, HashMap::new()).await.expect("node starts");
        let card = node.local_card().await;
        assert_eq!(card.did.as_deref(), Some("did:web:alice.example"));
        assert_eq!(card.signatures.len(), 1);
        node.shutdown().await;
    }
}
