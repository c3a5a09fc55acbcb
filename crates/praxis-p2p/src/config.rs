use std::{path::PathBuf, time::Duration};

use libp2p::Multiaddr;

/// Configuration for a P2P host node.
pub struct P2pConfig {
    /// Local TCP listen address. Use `/ip4/0.0.0.0/tcp/0` for an OS-assigned port.
    pub listen_addr: Multiaddr,

    /// Path to persist the libp2p keypair. `None` generates a fresh ephemeral key.
    pub keypair_path: Option<PathBuf>,

    /// How long a peer discovered via mDNS is kept in the peer table without
    /// being re-announced before it is considered stale.
    pub peer_ttl: Duration,

    /// Capacity of the bounded discovery-event channel. Oldest entries are
    /// dropped once full rather than blocking the mDNS event loop.
    pub discovery_channel_capacity: usize,

    /// How long `connect_by_name` polls the peer table for a name that
    /// hasn't announced itself yet before giving up.
    pub connect_poll_timeout: Duration,

    /// Poll interval used while waiting for a named peer to appear.
    pub connect_poll_interval: Duration,
}

impl P2pConfig {
    pub fn new(listen_addr: Multiaddr) -> Self {
        Self {
            listen_addr,
            keypair_path: None,
            peer_ttl: Duration::from_secs(3600),
            discovery_channel_capacity: 100,
            connect_poll_timeout: Duration::from_secs(10),
            connect_poll_interval: Duration::from_millis(100),
        }
    }
}
