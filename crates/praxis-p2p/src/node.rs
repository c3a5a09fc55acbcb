//! High-level P2P host node.
//!
//! Obtain a `P2pHandle` before calling `run()` so you can send commands and
//! subscribe to events while the node's event loop runs inside a spawned task.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex as StdMutex},
    time::{Duration, Instant},
};

use futures::StreamExt;
use libp2p::{
    identity,
    mdns,
    request_response::{self, OutboundRequestId, ResponseChannel},
    swarm::{dial_opts::DialOpts, Swarm, SwarmEvent},
    Multiaddr, PeerId,
};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

use praxis_card::CapabilityCard;
use praxis_mcp::{McpRequest, McpResponse, McpRouter};

use crate::{
    behaviour::{P2pBehaviour, P2pBehaviourEvent},
    config::P2pConfig,
    error::P2pError,
    protocol::types::{CardExchangeRequest, CardExchangeResponse},
    transport::{build_transport, default_swarm_config, load_or_create_keypair},
};

type NodeSwarm = Swarm<P2pBehaviour>;

/// Events emitted by the node to the owning process.
#[derive(Debug, Clone)]
pub enum P2pEvent {
    PeerDiscovered { peer_id: PeerId, card: CapabilityCard },
    PeerExpired { peer_id: PeerId },
    Error(String),
}

#[derive(Debug)]
enum P2pCommand {
    Dial {
        addr: libp2p::Multiaddr,
    },
    FetchCard {
        peer: PeerId,
        reply_tx: oneshot::Sender<Result<CapabilityCard, P2pError>>,
    },
    CallMcp {
        peer: PeerId,
        request: McpRequest,
        reply_tx: oneshot::Sender<Result<McpResponse, P2pError>>,
    },
    Shutdown,
}

enum InternalEvent {
    CardResponseReady {
        channel: ResponseChannel<CardExchangeResponse>,
        card: CapabilityCard,
    },
    McpResponseReady {
        channel: ResponseChannel<McpResponse>,
        response: McpResponse,
    },
}

/// Cheap-to-clone handle to a running `P2pNode`.
#[derive(Clone)]
pub struct P2pHandle {
    cmd_tx: mpsc::Sender<P2pCommand>,
    event_tx: broadcast::Sender<P2pEvent>,
    names: Arc<StdMutex<HashMap<String, PeerId>>>,
    cards: Arc<StdMutex<HashMap<PeerId, CapabilityCard>>>,
    connect_poll_interval: Duration,
    connect_poll_timeout: Duration,
}

impl P2pHandle {
    pub fn subscribe_events(&self) -> broadcast::Receiver<P2pEvent> {
        self.event_tx.subscribe()
    }

    /// Resolve an agent name (from a card already exchanged) to a `PeerId`,
    /// polling the local peer table until `connect_poll_timeout` elapses.
    pub async fn connect_by_name(&self, name: &str) -> Result<PeerId, P2pError> {
        let deadline = Instant::now() + self.connect_poll_timeout;
        loop {
            if let Some(peer_id) = self.names.lock().expect("names lock poisoned").get(name).copied() {
                return Ok(peer_id);
            }
            if Instant::now() >= deadline {
                return Err(P2pError::PeerNotFound(name.to_string()));
            }
            tokio::time::sleep(self.connect_poll_interval).await;
        }
    }

    /// Return `peer`'s cached capability card, fetching it live if not yet cached.
    pub async fn fetch_card(&self, peer: PeerId) -> Result<CapabilityCard, P2pError> {
        if let Some(card) = self.cards.lock().expect("cards lock poisoned").get(&peer).cloned() {
            return Ok(card);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(P2pCommand::FetchCard { peer, reply_tx })
            .await
            .map_err(|_| P2pError::Shutdown)?;
        reply_rx.await.map_err(|_| P2pError::Shutdown)?
    }

    /// Forward an MCP request to `peer` over the MCP bridge protocol and wait
    /// for its response.
    pub async fn call_mcp(&self, peer: PeerId, request: McpRequest) -> Result<McpResponse, P2pError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(P2pCommand::CallMcp {
                peer,
                request,
                reply_tx,
            })
            .await
            .map_err(|_| P2pError::Shutdown)?;
        reply_rx.await.map_err(|_| P2pError::Shutdown)?
    }

    /// Dial a peer at a known address explicitly, bypassing mDNS discovery.
    /// Useful when two nodes are not on the same multicast-reachable LAN
    /// segment (e.g. in tests).
    pub async fn dial(&self, addr: libp2p::Multiaddr) -> Result<(), P2pError> {
        self.cmd_tx
            .send(P2pCommand::Dial { addr })
            .await
            .map_err(|_| P2pError::Shutdown)
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(P2pCommand::Shutdown).await;
    }
}

/// A libp2p host: mDNS discovery, capability-card exchange, and the MCP
/// bridge, wired to a local [`CapabilityCard`] and [`McpRouter`].
pub struct P2pNode {
    config: P2pConfig,
    local_card: Arc<RwLock<CapabilityCard>>,
    router: Arc<McpRouter>,
    event_tx: broadcast::Sender<P2pEvent>,
    cmd_tx: mpsc::Sender<P2pCommand>,
    cmd_rx: mpsc::Receiver<P2pCommand>,
    names: Arc<StdMutex<HashMap<String, PeerId>>>,
    cards: Arc<StdMutex<HashMap<PeerId, CapabilityCard>>>,
}

impl P2pNode {
    pub fn new(config: P2pConfig, local_card: Arc<RwLock<CapabilityCard>>, router: Arc<McpRouter>) -> Self {
        let (event_tx, _) = broadcast::channel(config.discovery_channel_capacity);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        Self {
            config,
            local_card,
            router,
            event_tx,
            cmd_tx,
            cmd_rx,
            names: Arc::new(StdMutex::new(HashMap::new())),
            cards: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn handle(&self) -> P2pHandle {
        P2pHandle {
            cmd_tx: self.cmd_tx.clone(),
            event_tx: self.event_tx.clone(),
            names: Arc::clone(&self.names),
            cards: Arc::clone(&self.cards),
            connect_poll_interval: self.config.connect_poll_interval,
            connect_poll_timeout: self.config.connect_poll_timeout,
        }
    }

    /// Build the swarm and run the event loop until a `Shutdown` command
    /// arrives.
    pub async fn run(self) -> Result<(), P2pError> {
        let key = match &self.config.keypair_path {
            Some(p) => load_or_create_keypair(p)?,
            None => identity::Keypair::generate_ed25519(),
        };
        let local_peer_id = PeerId::from(key.public());
        tracing::info!(%local_peer_id, "p2p node starting");

        let mut swarm = build_node_swarm(&key)?;
        swarm
            .listen_on(self.config.listen_addr.clone())
            .map_err(|e| P2pError::Transport(e.to_string()))?;

        let (internal_tx, internal_rx) = mpsc::channel(64);

        let state = NodeState {
            local_peer_id,
            local_card: self.local_card,
            router: self.router,
            event_tx: self.event_tx,
            peer_ttl: self.config.peer_ttl,
            names: self.names,
            cards: self.cards,
            last_seen: HashMap::new(),
            pending_card_requests: HashMap::new(),
            pending_mcp_requests: HashMap::new(),
            internal_tx,
            mdns_queue: VecDeque::new(),
            mdns_queue_capacity: self.config.discovery_channel_capacity,
        };

        state.event_loop(&mut swarm, self.cmd_rx, internal_rx).await
    }
}

fn build_node_swarm(key: &identity::Keypair) -> Result<NodeSwarm, P2pError> {
    let transport = build_transport(key)?;
    let local_peer_id = PeerId::from(key.public());
    let behaviour = P2pBehaviour::new(key).map_err(|e| P2pError::Transport(e.to_string()))?;
    Ok(Swarm::new(transport, behaviour, local_peer_id, default_swarm_config()))
}

struct NodeState {
    local_peer_id: PeerId,
    local_card: Arc<RwLock<CapabilityCard>>,
    router: Arc<McpRouter>,
    event_tx: broadcast::Sender<P2pEvent>,
    peer_ttl: Duration,
    names: Arc<StdMutex<HashMap<String, PeerId>>>,
    cards: Arc<StdMutex<HashMap<PeerId, CapabilityCard>>>,
    last_seen: HashMap<PeerId, Instant>,
    /// `None` means the request was an automatic post-connection card fetch;
    /// `Some` is an explicit `fetch_card` call awaiting its reply.
    pending_card_requests: HashMap<OutboundRequestId, Option<oneshot::Sender<Result<CapabilityCard, P2pError>>>>,
    pending_mcp_requests: HashMap<OutboundRequestId, oneshot::Sender<Result<McpResponse, P2pError>>>,
    internal_tx: mpsc::Sender<InternalEvent>,
    /// Bounded, drop-oldest queue of mDNS `Discovered` entries sitting
    /// between the notifee handler and the dial step: a flood of discovery
    /// notifications bounds memory instead of growing unboundedly, at the
    /// cost of the oldest undialed entries once full.
    mdns_queue: VecDeque<(PeerId, Multiaddr)>,
    mdns_queue_capacity: usize,
}

impl NodeState {
    async fn event_loop(
        mut self,
        swarm: &mut NodeSwarm,
        mut cmd_rx: mpsc::Receiver<P2pCommand>,
        mut internal_rx: mpsc::Receiver<InternalEvent>,
    ) -> Result<(), P2pError> {
        let mut prune_ticker = tokio::time::interval(std::cmp::max(self.peer_ttl / 4, Duration::from_secs(30)));
        let mut mdns_drain_ticker = tokio::time::interval(Duration::from_millis(50));
        loop {
            tokio::select! {
                event = swarm.select_next_some() => {
                    self.handle_swarm_event(swarm, event).await;
                }
                Some(cmd) = cmd_rx.recv() => {
                    if self.handle_command(swarm, cmd) {
                        break;
                    }
                }
                Some(ev) = internal_rx.recv() => {
                    self.handle_internal_event(swarm, ev);
                }
                _ = prune_ticker.tick() => {
                    self.prune_stale_peers();
                }
                _ = mdns_drain_ticker.tick() => {
                    self.drain_mdns_queue(swarm);
                }
            }
        }
        Ok(())
    }

    fn handle_command(&mut self, swarm: &mut NodeSwarm, cmd: P2pCommand) -> bool {
        match cmd {
            P2pCommand::Dial { addr } => {
                if let Err(err) = swarm.dial(addr) {
                    tracing::warn!(%err, "explicit dial failed");
                }
                false
            }
            P2pCommand::FetchCard { peer, reply_tx } => {
                let request_id = swarm
                    .behaviour_mut()
                    .card_exchange
                    .send_request(&peer, CardExchangeRequest);
                self.pending_card_requests.insert(request_id, Some(reply_tx));
                false
            }
            P2pCommand::CallMcp {
                peer,
                request,
                reply_tx,
            } => {
                let request_id = swarm.behaviour_mut().mcp_bridge.send_request(&peer, request);
                self.pending_mcp_requests.insert(request_id, reply_tx);
                false
            }
            P2pCommand::Shutdown => true,
        }
    }

    fn handle_internal_event(&mut self, swarm: &mut NodeSwarm, ev: InternalEvent) {
        match ev {
            InternalEvent::CardResponseReady { channel, card } => {
                let _ = swarm
                    .behaviour_mut()
                    .card_exchange
                    .send_response(channel, CardExchangeResponse { card });
            }
            InternalEvent::McpResponseReady { channel, response } => {
                let _ = swarm.behaviour_mut().mcp_bridge.send_response(channel, response);
            }
        }
    }

    async fn handle_swarm_event(
        &mut self,
        swarm: &mut NodeSwarm,
        event: SwarmEvent<P2pBehaviourEvent>,
    ) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                tracing::info!(%address, "p2p node listening");
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                self.last_seen.insert(peer_id, Instant::now());
                let request_id = swarm
                    .behaviour_mut()
                    .card_exchange
                    .send_request(&peer_id, CardExchangeRequest);
                self.pending_card_requests.insert(request_id, None);
            }
            SwarmEvent::Behaviour(P2pBehaviourEvent::Mdns(mdns::Event::Discovered(list))) => {
                for (peer_id, addr) in list {
                    self.enqueue_discovered(peer_id, addr);
                }
            }
            SwarmEvent::Behaviour(P2pBehaviourEvent::Mdns(mdns::Event::Expired(list))) => {
                for (peer_id, _) in list {
                    tracing::debug!(%peer_id, "mdns entry expired");
                }
            }
            SwarmEvent::Behaviour(P2pBehaviourEvent::CardExchange(event)) => {
                self.handle_card_exchange_event(event);
            }
            SwarmEvent::Behaviour(P2pBehaviourEvent::McpBridge(event)) => {
                self.handle_mcp_bridge_event(event);
            }
            _ => {}
        }
    }

    fn handle_card_exchange_event(
        &mut self,
        event: request_response::Event<CardExchangeRequest, CardExchangeResponse>,
    ) {
        match event {
            request_response::Event::Message { peer, message, .. } => match message {
                request_response::Message::Request { channel, .. } => {
                    let local_card = Arc::clone(&self.local_card);
                    let internal_tx = self.internal_tx.clone();
                    tokio::spawn(async move {
                        let card = local_card.read().await.clone();
                        let _ = internal_tx.send(InternalEvent::CardResponseReady { channel, card }).await;
                    });
                }
                request_response::Message::Response { request_id, response } => {
                    self.last_seen.insert(peer, Instant::now());
                    self.names
                        .lock()
                        .expect("names lock poisoned")
                        .insert(response.card.name.clone(), peer);
                    self.cards
                        .lock()
                        .expect("cards lock poisoned")
                        .insert(peer, response.card.clone());
                    if let Some(waiter) = self.pending_card_requests.remove(&request_id) {
                        if let Some(reply_tx) = waiter {
                            let _ = reply_tx.send(Ok(response.card.clone()));
                        }
                    }
                    let _ = self.event_tx.send(P2pEvent::PeerDiscovered {
                        peer_id: peer,
                        card: response.card,
                    });
                }
            },
            request_response::Event::OutboundFailure { peer, request_id, error, .. } => {
                if let Some(Some(reply_tx)) = self.pending_card_requests.remove(&request_id) {
                    let _ = reply_tx.send(Err(P2pError::CardExchange(error.to_string())));
                } else {
                    self.pending_card_requests.remove(&request_id);
                }
                let _ = self
                    .event_tx
                    .send(P2pEvent::Error(format!("card exchange with {peer} failed: {error}")));
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                tracing::warn!(%peer, %error, "inbound card exchange failed");
            }
            request_response::Event::ResponseSent { .. } => {}
        }
    }

    fn handle_mcp_bridge_event(&mut self, event: request_response::Event<McpRequest, McpResponse>) {
        match event {
            request_response::Event::Message { message, .. } => match message {
                request_response::Message::Request { request, channel, .. } => {
                    let router = Arc::clone(&self.router);
                    let internal_tx = self.internal_tx.clone();
                    tokio::spawn(async move {
                        let response = router.process_request(request).await;
                        let _ = internal_tx.send(InternalEvent::McpResponseReady { channel, response }).await;
                    });
                }
                request_response::Message::Response { request_id, response } => {
                    if let Some(reply_tx) = self.pending_mcp_requests.remove(&request_id) {
                        let _ = reply_tx.send(Ok(response));
                    }
                }
            },
            request_response::Event::OutboundFailure { peer, request_id, error, .. } => {
                if let Some(reply_tx) = self.pending_mcp_requests.remove(&request_id) {
                    let _ = reply_tx.send(Err(P2pError::McpBridge(error.to_string())));
                }
                let _ = self
                    .event_tx
                    .send(P2pEvent::Error(format!("mcp bridge with {peer} failed: {error}")));
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                tracing::warn!(%peer, %error, "inbound mcp bridge request failed");
            }
            request_response::Event::ResponseSent { .. } => {}
        }
    }

    /// Record an mDNS discovery notification, rejecting our own identity
    /// and bounding the queue with drop-oldest semantics so a burst of
    /// notifications can't grow memory without bound.
    fn enqueue_discovered(&mut self, peer_id: PeerId, addr: Multiaddr) {
        if peer_id == self.local_peer_id {
            return;
        }
        if self.mdns_queue.len() >= self.mdns_queue_capacity {
            if let Some((dropped, _)) = self.mdns_queue.pop_front() {
                tracing::warn!(%dropped, "mdns discovery queue full, dropping oldest entry");
            }
        }
        self.mdns_queue.push_back((peer_id, addr));
    }

    /// Dial every peer currently queued from mDNS discovery.
    fn drain_mdns_queue(&mut self, swarm: &mut NodeSwarm) {
        while let Some((peer_id, addr)) = self.mdns_queue.pop_front() {
            tracing::debug!(%peer_id, %addr, "mdns discovered peer");
            self.last_seen.insert(peer_id, Instant::now());
            let opts = DialOpts::peer_id(peer_id).addresses(vec![addr]).build();
            if let Err(err) = swarm.dial(opts) {
                tracing::debug!(%peer_id, %err, "dial attempt failed or already in progress");
            }
        }
    }

    fn prune_stale_peers(&mut self) {
        let now = Instant::now();
        let stale: Vec<PeerId> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) > self.peer_ttl)
            .map(|(peer, _)| *peer)
            .collect();
        if stale.is_empty() {
            return;
        }
        let mut names = self.names.lock().expect("names lock poisoned");
        let mut cards = self.cards.lock().expect("cards lock poisoned");
        for peer in &stale {
            self.last_seen.remove(peer);
            cards.remove(peer);
            names.retain(|_, v| v != peer);
            let _ = self.event_tx.send(P2pEvent::PeerExpired { peer_id: *peer });
        }
    }
}
