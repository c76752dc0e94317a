// Network node

use crate::chain::Blockchain;
use crate::consensus::Miner;
use crate::network::routes;
use crate::storage::ChainStore;
use crate::wallet::Wallets;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Warm-up delay before startup peer discovery
const DISCOVERY_DELAY: Duration = Duration::from_secs(2);

/// Per-request timeout for outbound peer calls
const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Mutable node state guarded by the single node lock
pub struct NodeState {
    pub blockchain: Blockchain,
    pub peers: Vec<String>,
}

/// A node: one blockchain, a wallet collection with the miner wallet, and
/// a peer address set. Every handler that touches the blockchain or the
/// peer list goes through the reader/writer lock.
pub struct Node {
    pub id: String,
    pub port: u16,
    pub miner: Miner,
    pub wallets: Wallets,
    pub state: RwLock<NodeState>,
}

impl Node {
    /// Create a node listening on `port`, with an optional comma-separated
    /// peer list and an optional persistence adapter
    pub fn new(port: u16, peers: Option<&str>, store: Option<Box<dyn ChainStore>>) -> Self {
        let id = format!("node-{}", port);

        let mut wallets = Wallets::new();
        let miner_address = wallets.create_wallet();

        let blockchain = Blockchain::new(store);
        let miner = Miner::new(miner_address);

        let peers: Vec<String> = peers
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            id,
            port,
            miner,
            wallets,
            state: RwLock::new(NodeState { blockchain, peers }),
        }
    }

    /// Serve the request surface until shutdown. Fails when the listen port
    /// cannot be bound.
    pub async fn start(self: Arc<Self>) -> Result<(), String> {
        log::info!("Starting node {} on port {}", self.id, self.port);
        log::info!("Miner wallet: {}", self.miner.address);

        {
            let state = self.state.read().await;
            if !state.peers.is_empty() {
                log::info!("Peers: {:?}", state.peers);
            }
        }

        let routes = routes::routes(self.clone());

        let (addr, server) = warp::serve(routes)
            .try_bind_ephemeral(([0, 0, 0, 0], self.port))
            .map_err(|e| format!("Failed to bind port {}: {}", self.port, e))?;

        log::info!("Node {} ready and listening on {}", self.id, addr);

        tokio::spawn(discover_peers(self.clone()));

        server.await;
        Ok(())
    }

    /// Register a peer address unless it is already known
    pub async fn add_peer(&self, peer_address: &str) {
        let mut state = self.state.write().await;
        if state.peers.iter().any(|p| p == peer_address) {
            log::info!("Peer {} already exists", peer_address);
            return;
        }
        state.peers.push(peer_address.to_string());
        log::info!("Added new peer: {}", peer_address);
    }
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn peer_client(timeout: Duration) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))
}

/// Best-effort fan-out of a JSON payload to every peer's endpoint.
/// One task per peer; failures are logged and never propagated.
pub async fn broadcast_to_peers(node: Arc<Node>, endpoint: &'static str, payload: serde_json::Value) {
    let peers = node.state.read().await.peers.clone();

    for peer in peers {
        let payload = payload.clone();
        tokio::spawn(async move {
            let client = match peer_client(PEER_TIMEOUT) {
                Ok(c) => c,
                Err(e) => {
                    log::error!("{}", e);
                    return;
                }
            };

            let url = format!("http://{}{}", peer, endpoint);
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    log::info!("Broadcast successful to peer: {}", peer);
                }
                Ok(response) => {
                    log::warn!("Peer {} responded with status: {}", peer, response.status());
                }
                Err(e) => {
                    log::warn!("Failed to broadcast to peer {}: {}", peer, e);
                }
            }
        });
    }
}

/// Startup discovery: probe each configured peer, announce this node's
/// address, then pull the peer's chain for an initial sync
async fn discover_peers(node: Arc<Node>) {
    tokio::time::sleep(DISCOVERY_DELAY).await;

    let peers = node.state.read().await.peers.clone();
    for peer in peers {
        tokio::spawn(connect_to_peer(node.clone(), peer));
    }
}

async fn connect_to_peer(node: Arc<Node>, peer: String) {
    let client = match peer_client(PEER_TIMEOUT) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };

    let url = format!("http://{}/health", peer);
    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => {
            log::info!("Successfully connected to peer: {}", peer);
            announce_to_peer(node, peer).await;
        }
        Ok(response) => {
            log::warn!("Peer {} responded with status: {}", peer, response.status());
        }
        Err(e) => {
            log::warn!("Failed to connect to peer {}: {}", peer, e);
        }
    }
}

async fn announce_to_peer(node: Arc<Node>, peer: String) {
    let client = match peer_client(PEER_TIMEOUT) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };

    let my_address = format!("localhost:{}", node.port);
    let announcement = serde_json::json!({ "peerAddress": my_address });

    let url = format!("http://{}/peers", peer);
    match client.post(&url).json(&announcement).send().await {
        Ok(response) if response.status().is_success() => {
            log::info!("Successfully announced to peer: {}", peer);
            tokio::spawn(sync_with_peer(node, peer));
        }
        Ok(response) => {
            log::warn!("Peer {} rejected announcement: {}", peer, response.status());
        }
        Err(e) => {
            log::warn!("Failed to announce to peer {}: {}", peer, e);
        }
    }
}

/// Pull a peer's chain; when it is strictly longer, post it to this node's
/// own chain-sync endpoint, which applies the longest-chain rule
async fn sync_with_peer(node: Arc<Node>, peer: String) {
    let client = match peer_client(Duration::from_secs(10)) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };

    let url = format!("http://{}/blockchain", peer);
    let peer_chain: Blockchain = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => match response.json().await {
            Ok(chain) => chain,
            Err(e) => {
                log::warn!("Failed to decode blockchain from peer {}: {}", peer, e);
                return;
            }
        },
        Ok(response) => {
            log::warn!(
                "Peer {} returned status {} for blockchain request",
                peer,
                response.status()
            );
            return;
        }
        Err(e) => {
            log::warn!("Failed to get blockchain from peer {}: {}", peer, e);
            return;
        }
    };

    let (peer_longer, local_len) = {
        let state = node.state.read().await;
        (
            peer_chain.is_longer_than(&state.blockchain),
            state.blockchain.chain.len(),
        )
    };

    if !peer_longer {
        log::info!(
            "Peer {} has same or shorter chain ({} vs {})",
            peer,
            peer_chain.chain.len(),
            local_len
        );
        return;
    }

    log::info!(
        "Peer {} has longer chain ({} vs {}), requesting sync",
        peer,
        peer_chain.chain.len(),
        local_len
    );

    let sync_url = format!("http://localhost:{}/blockchain/sync", node.port);
    match client.post(&sync_url).json(&peer_chain).send().await {
        Ok(response) if response.status().is_success() => {
            log::info!("Successfully synced with peer {}", peer);
        }
        Ok(response) => {
            log::warn!("Chain sync returned status: {}", response.status());
        }
        Err(e) => {
            log::warn!("Failed to sync with peer chain: {}", e);
        }
    }
}
