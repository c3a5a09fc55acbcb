// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Construction and teardown of every long-lived component, in the fixed
//! order C1, C2, C6, C4, C5, C7/C8, C9: canonicalization and DID resolution
//! are pulled in implicitly by the card and backend crates, so the node
//! itself only ever touches the card, the backend supervisor, the MCP
//! router, and the P2P host directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use praxis_backend::config::SupervisorConfig;
use praxis_backend::{BackendSupervisor, SseToolRegistry};
use praxis_card::CapabilityCard;
use praxis_mcp::McpRouter;
use praxis_p2p::config::P2pConfig;
use praxis_p2p::node::{P2pHandle, P2pNode};

use crate::config::NodeConfig;
use crate::error::NodeError;

const DEFAULT_NODE_NAME: &str = "praxis-node";
const CARD_RESYNC_INTERVAL: Duration = Duration::from_secs(5);

/// A fully wired node: backend supervisor, MCP router, and P2P host, sharing
/// one signed capability card.
pub struct Node {
    card: Arc<RwLock<CapabilityCard>>,
    supervisor: Arc<BackendSupervisor>,
    p2p: P2pHandle,
    shutdown: CancellationToken,
    resync_task: tokio::task::JoinHandle<()>,
    p2p_task: tokio::task::JoinHandle<Result<(), praxis_p2p::P2pError>>,
}

impl Node {
    /// Build every component in dependency order and start the P2P event
    /// loop and card-resync task in the background.
    ///
    /// `sse_registries` supplies the tool registry for each backend whose
    /// config names the `sse` transport (keyed by backend name); it's the
    /// caller's responsibility since the registry is an in-process trait
    /// object, not something a config file can express.
    pub async fn start(
        config: NodeConfig,
        sse_registries: HashMap<String, Arc<dyn SseToolRegistry>>,
    ) -> Result<Self, NodeError> {
        let signing_key = load_or_create_signing_key(&config.identity)?;
        let card = Arc::new(RwLock::new(build_initial_card(&config.identity, signing_key.as_ref())?));

        let supervisor = BackendSupervisor::new(SupervisorConfig::from(config.supervisor));
        for backend in &config.backends {
            let registry = sse_registries.get(&backend.name).cloned();
            supervisor.register(backend.clone(), registry).await?;
        }
        supervisor.spawn_health_loop();

        // Root of every long-lived background task and in-flight router
        // dispatch. Cancelling it on shutdown terminates all derived work
        // deterministically instead of relying solely on per-task timeouts.
        let shutdown = CancellationToken::new();

        let router_config = praxis_mcp::RouterConfig::from(config.router);
        let router = Arc::new(McpRouter::new(supervisor.clone(), router_config, shutdown.clone()));

        let mut p2p_config = P2pConfig::new(
            config
                .p2p_listen
                .parse()
                .map_err(|e| NodeError::Config(format!("invalid p2p_listen: {e}")))?,
        );
        p2p_config.keypair_path = config.p2p_keypair_path.clone();

        let p2p_node = P2pNode::new(p2p_config, card.clone(), router);
        let p2p = p2p_node.handle();
        let p2p_task = tokio::spawn(p2p_node.run());

        let resync_task = spawn_card_resync(
            card.clone(),
            supervisor.clone(),
            signing_key,
            config.identity.did.clone(),
            shutdown.clone(),
        );

        Ok(Self {
            card,
            supervisor,
            p2p,
            shutdown,
            resync_task,
            p2p_task,
        })
    }

    pub fn p2p(&self) -> &P2pHandle {
        &self.p2p
    }

    pub fn supervisor(&self) -> &Arc<BackendSupervisor> {
        &self.supervisor
    }

    pub async fn local_card(&self) -> CapabilityCard {
        self.card.read().await.clone()
    }

    /// Tear down in reverse construction order: P2P host, then the root
    /// cancellation (unblocking in-flight router dispatches and the resync
    /// task alongside backend teardown), then backends.
    pub async fn shutdown(self) {
        self.p2p.shutdown().await;
        let _ = tokio::time::timeout(Duration::from_secs(5), self.p2p_task).await;

        self.shutdown.cancel();

        self.supervisor.shutdown().await;

        let _ = tokio::time::timeout(Duration::from_secs(1), self.resync_task).await;
    }
}

fn load_or_create_signing_key(identity: &crate::config::IdentityConfig) -> Result<Option<SigningKey>, NodeError> {
    if identity.did.is_none() {
        return Ok(None);
    }
    let Some(path) = identity.signing_key_path.as_ref() else {
        return Ok(Some(SigningKey::generate(&mut OsRng)));
    };
    if let Ok(bytes) = std::fs::read(path) {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| NodeError::Config(format!("{} is not a 32-byte ed25519 seed", path.display())))?;
        return Ok(Some(SigningKey::from_bytes(&seed)));
    }
    let key = SigningKey::generate(&mut OsRng);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| NodeError::Config(format!("creating {}: {e}", parent.display())))?;
    }
    std::fs::write(path, key.to_bytes())
        .map_err(|e| NodeError::Config(format!("writing {}: {e}", path.display())))?;
    Ok(Some(key))
}

fn build_initial_card(
    identity: &crate::config::IdentityConfig,
    signing_key: Option<&SigningKey>,
) -> Result<CapabilityCard, NodeError> {
    let name = identity.name.clone().unwrap_or_else(|| DEFAULT_NODE_NAME.to_string());
    let mut card = CapabilityCard::builder(name, "1.0");
    card.description = identity.description.clone();

    if let (Some(did), Some(key)) = (identity.did.as_ref(), signing_key) {
        praxis_card::sign_card(&mut card, key, did.clone(), None, "node-key")?;
    }
    Ok(card)
}

/// Watch the backend supervisor for descriptor changes and fold them into
/// the shared card, re-signing whenever the local key is known. This is the
/// runtime side of "backend list changes trigger a version bump and
/// re-sign" — the supervisor mutates its own state but has no reference to
/// the card, so the node is the one place both are visible at once.
fn spawn_card_resync(
    card: Arc<RwLock<CapabilityCard>>,
    supervisor: Arc<BackendSupervisor>,
    signing_key: Option<SigningKey>,
    did: Option<String>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CARD_RESYNC_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => return,
            }
            let descriptors = supervisor.descriptors().await;
            let mut guard = card.write().await;
            let changed = descriptors
                .iter()
                .any(|d| guard.backends.iter().find(|b| b.name == d.name) != Some(d));
            if !changed {
                continue;
            }
            for descriptor in descriptors {
                guard.upsert_backend(descriptor);
            }
            if let (Some(did), Some(key)) = (did.as_ref(), signing_key.as_ref()) {
                if let Err(err) = praxis_card::sign_card(&mut guard, key, did.clone(), None, "node-key") {
                    tracing::warn!(%err, "failed to re-sign card after backend list change");
                }
            }
            tracing::info!(version = %guard.version, "capability card updated after backend change");
        }
    })
}
