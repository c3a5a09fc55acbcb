// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Node configuration, loaded from TOML.
//!
//! Unlike the gateway config this replaces, there is no multi-path deep
//! merge: a node reads exactly one file, or runs on defaults. All defaults
//! are safe for a single-machine LAN deployment (random P2P port, mDNS on,
//! no backends registered).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use praxis_backend::config::{BackendConfig, SupervisorConfig};
use praxis_mcp::RouterConfig;

fn default_listen_addr() -> String {
    "/ip4/0.0.0.0/tcp/0".to_string()
}

/// Identity advertised to other agents on first connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Display name. Defaults to the system hostname if omitted.
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    /// `did:web` or `did:webvh` identifier this node signs its card under.
    /// If omitted, the card is left unsigned.
    pub did: Option<String>,
    /// Path to the Ed25519 signing key (raw 32-byte seed). Generated on
    /// first run if absent and `did` is set.
    pub signing_key_path: Option<PathBuf>,
}

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default = "default_listen_addr")]
    pub p2p_listen: String,

    /// Path for persisting the node's libp2p keypair. A fresh identity is
    /// generated each run when absent.
    pub p2p_keypair_path: Option<PathBuf>,

    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub supervisor: SupervisorConfigToml,

    #[serde(default)]
    pub router: RouterConfigToml,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            p2p_listen: default_listen_addr(),
            p2p_keypair_path: None,
            backends: Vec::new(),
            supervisor: SupervisorConfigToml::default(),
            router: RouterConfigToml::default(),
        }
    }
}

/// Mirrors [`praxis_backend::config::SupervisorConfig`] with plain `u64`
/// second fields so it round-trips through TOML without a custom visitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SupervisorConfigToml {
    pub max_restart_attempts: u32,
    pub restart_backoff_secs: u64,
    pub health_interval_secs: u64,
    pub introspection_delay_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for SupervisorConfigToml {
    fn default() -> Self {
        let d = SupervisorConfig::default();
        Self {
            max_restart_attempts: d.max_restart_attempts,
            restart_backoff_secs: d.restart_backoff.as_secs(),
            health_interval_secs: d.health_interval.as_secs(),
            introspection_delay_secs: d.introspection_delay.as_secs(),
            shutdown_grace_secs: d.shutdown_grace.as_secs(),
        }
    }
}

impl From<SupervisorConfigToml> for SupervisorConfig {
    fn from(t: SupervisorConfigToml) -> Self {
        use std::time::Duration;
        Self {
            max_restart_attempts: t.max_restart_attempts,
            restart_backoff: Duration::from_secs(t.restart_backoff_secs),
            health_interval: Duration::from_secs(t.health_interval_secs),
            introspection_delay: Duration::from_secs(t.introspection_delay_secs),
            shutdown_grace: Duration::from_secs(t.shutdown_grace_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouterConfigToml {
    pub max_concurrent_requests: usize,
    pub default_timeout_secs: u64,
}

impl Default for RouterConfigToml {
    fn default() -> Self {
        let d = RouterConfig::default();
        Self {
            max_concurrent_requests: d.max_concurrent_requests,
            default_timeout_secs: d.default_timeout_secs,
        }
    }
}

impl From<RouterConfigToml> for RouterConfig {
    fn from(t: RouterConfigToml) -> Self {
        Self {
            max_concurrent_requests: t.max_concurrent_requests,
            default_timeout_secs: t.default_timeout_secs,
        }
    }
}

/// Load a [`NodeConfig`] from `path`, or return defaults if `path` is `None`.
pub fn load(path: Option<&Path>) -> Result<NodeConfig, crate::error::NodeError> {
    let Some(path) = path else {
        return Ok(NodeConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| crate::error::NodeError::Config(format!("reading {}: {e}", path.display())))?;
    toml::from_str(&text)
        .map_err(|e| crate::error::NodeError::Config(format!("parsing {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listen_is_any_interface_random_port() {
        let c = NodeConfig::default();
        assert_eq!(c.p2p_listen, "/ip4/0.0.0.0/tcp/0");
    }

    #[test]
    fn load_none_returns_defaults() {
        let c = load(None).unwrap();
        assert!(c.backends.is_empty());
    }

    #[test]
    fn config_toml_round_trip() {
        let c = NodeConfig::default();
        let text = toml::to_string(&c).unwrap();
        let back: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.p2p_listen, c.p2p_listen);
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "p2p_listen = \"/ip4/127.0.0.1/tcp/4010\"\n").unwrap();
        let c = load(Some(&path)).unwrap();
        assert_eq!(c.p2p_listen, "/ip4/127.0.0.1/tcp/4010");
    }
}
