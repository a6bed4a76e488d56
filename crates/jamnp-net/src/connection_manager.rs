//! Owns the peer table and the live connection table; drives the connect
//! policy, keepalive cycle and epoch-update peer churn (§4.5).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jamnp_core::grid::ValidatorGrid;
use jamnp_core::ids::{Ed25519PublicKey, ValidatorIndex};
use jamnp_transport::connection::Connection;
use jamnp_transport::endpoint::QuicTransport;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::peer::{Initiator, PeerInfo, PeerState};
use crate::validator_set::ValidatorSetManager;

/// Maximum connect attempts before a local-initiator peer is left alone
/// until the next epoch update re-adds it.
pub const MAX_ATTEMPTS: u32 = 3;
/// Minimum delay between connect attempts to the same peer.
pub const RETRY_DELAY: Duration = Duration::from_secs(60);
/// Keepalive sweep interval (§5 "Suspension points").
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConnectionManagerError {
    #[error("peer {} is not in any validator set", hex::encode(.0))]
    UnknownPeer(Ed25519PublicKey),

    #[error("peer {0} has no published endpoint")]
    NoEndpoint(ValidatorIndex),

    #[error(transparent)]
    Connect(#[from] jamnp_transport::error::ConnectionError),
}

/// Coordinates peer membership (from [`ValidatorSetManager`]), the grid
/// topology, and the live connection table. Sole writer of the peer and
/// connection maps; protocol handlers only read through
/// [`ConnectionManager::find_connection`].
pub struct ConnectionManager {
    own_key: Ed25519PublicKey,
    validator_set: Arc<ValidatorSetManager>,
    grid: RwLock<ValidatorGrid>,
    peers: RwLock<HashMap<ValidatorIndex, PeerInfo>>,
    connections: RwLock<HashMap<Ed25519PublicKey, Arc<Connection>>>,
}

impl ConnectionManager {
    pub fn new(own_key: Ed25519PublicKey, validator_set: Arc<ValidatorSetManager>) -> Self {
        Self {
            own_key,
            validator_set,
            grid: RwLock::new(ValidatorGrid::new(&[])),
            peers: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn grid(&self) -> ValidatorGrid {
        self.grid.read().clone()
    }

    pub fn peer(&self, index: ValidatorIndex) -> Option<PeerInfo> {
        self.peers.read().get(&index).cloned()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn find_connection(&self, peer_key: &Ed25519PublicKey) -> Option<Arc<Connection>> {
        self.connections.read().get(peer_key).cloned()
    }

    /// Snapshot of every peer key currently holding a live connection, for
    /// callers that drive per-connection setup (e.g. opening the UP0
    /// stream) independently of the accept/dial path.
    pub fn connected_peer_keys(&self) -> Vec<Ed25519PublicKey> {
        self.connections.read().keys().copied().collect()
    }

    /// Driven by [`crate::epoch::EpochManager::maybe_apply_transition`]
    /// firing: recompute the grid, add newly-appearing peers, drop peers no
    /// longer in the union (§4.5 "Epoch update").
    pub fn apply_epoch_update(&self) {
        let union = self.validator_set.get_all_connected();
        let indices: Vec<ValidatorIndex> = union.keys().copied().filter(|i| union[i].ed25519_key != self.own_key).collect();
        *self.grid.write() = ValidatorGrid::new(&indices);

        let mut peers = self.peers.write();

        let stale: Vec<ValidatorIndex> = peers.keys().copied().filter(|i| !union.contains_key(i)).collect();
        for idx in stale {
            if let Some(mut peer) = peers.remove(&idx) {
                peer.mark_removed();
                self.close_connection_for(&peer);
                info!(validator = idx, "peer left the active union, connection dropped");
            }
        }

        for (&idx, meta) in &union {
            if meta.ed25519_key == self.own_key {
                continue;
            }
            peers.entry(idx).or_insert_with(|| {
                let initiator = Initiator::resolve(&self.own_key, &meta.ed25519_key);
                debug!(validator = idx, ?initiator, "tracking new peer after epoch update");
                PeerInfo::new(idx, meta.endpoint.clone(), initiator)
            });
        }
    }

    fn close_connection_for(&self, peer: &PeerInfo) {
        if let Some(endpoint) = &peer.endpoint {
            if let Some(conn) = self.connections.write().remove(&endpoint.peer_key) {
                conn.close("peer removed from validator set");
            }
        }
    }

    /// One sweep of the connect policy: dial every `Local`-initiator peer
    /// that is due (§4.5 "Connect policy").
    pub async fn connect_due_peers(&self, transport: &QuicTransport) {
        let due: Vec<PeerInfo> = {
            let now = Instant::now();
            self.peers
                .read()
                .values()
                .filter(|p| p.connect_due(now, MAX_ATTEMPTS, RETRY_DELAY))
                .cloned()
                .collect()
        };

        for peer in due {
            let Some(endpoint) = peer.endpoint.clone() else {
                warn!(validator = peer.validator_index, "peer has no published endpoint, skipping connect");
                continue;
            };
            self.dial(peer.validator_index, &endpoint.host, endpoint.port, endpoint.peer_key, transport).await;
        }
    }

    async fn dial(&self, index: ValidatorIndex, host: &str, port: u16, peer_key: Ed25519PublicKey, transport: &QuicTransport) {
        let now = Instant::now();
        if let Some(peer) = self.peers.write().get_mut(&index) {
            peer.mark_connecting(now);
        }

        let addr: SocketAddr = match format!("{host}:{port}").parse() {
            Ok(a) => a,
            Err(e) => {
                warn!(validator = index, error = %e, "peer endpoint does not parse as a socket address");
                return;
            }
        };

        match transport.connect(addr, peer_key).await {
            Ok(conn) => self.register_connection(index, Arc::new(conn)),
            Err(e) => {
                warn!(validator = index, error = %e, "connect attempt failed");
            }
        }
    }

    /// Record a freshly established connection (dialled or accepted) and
    /// mark its peer connected.
    pub fn register_connection(&self, index: ValidatorIndex, connection: Arc<Connection>) {
        let key = connection.peer_key();
        self.connections.write().insert(key, connection);
        if let Some(peer) = self.peers.write().get_mut(&index) {
            peer.mark_connected(Instant::now());
        }
    }

    /// Accept an inbound connection whose peer key belongs to a `Remote`
    /// (or `Local`, in case of a simultaneous-open race) peer we already
    /// know about.
    pub fn register_incoming(&self, connection: Arc<Connection>) -> Result<(), ConnectionManagerError> {
        let key = connection.peer_key();
        let index = {
            let peers = self.peers.read();
            peers
                .iter()
                .find(|(_, p)| p.endpoint.as_ref().is_some_and(|e| e.peer_key == key))
                .map(|(idx, _)| *idx)
        };

        match index {
            Some(idx) => {
                self.connections.write().insert(key, connection);
                if let Some(peer) = self.peers.write().get_mut(&idx) {
                    peer.mark_connected(Instant::now());
                }
                Ok(())
            }
            None => {
                warn!(peer = %hex::encode(key), "rejecting inbound connection from peer not in any validator set");
                connection.close("peer not in any validator set");
                Err(ConnectionManagerError::UnknownPeer(key))
            }
        }
    }

    /// One sweep of the keepalive cycle (§4.5 "Keepalive"): any connection
    /// whose underlying transport has gone unhealthy is dropped and its
    /// peer re-driven toward `Connecting`.
    pub fn keepalive_sweep(&self) {
        let dead: Vec<Ed25519PublicKey> = self
            .connections
            .read()
            .iter()
            .filter(|(_, conn)| !conn.is_alive())
            .map(|(key, _)| *key)
            .collect();

        if dead.is_empty() {
            return;
        }

        let mut connections = self.connections.write();
        let mut peers = self.peers.write();
        for key in dead {
            connections.remove(&key);
            if let Some(peer) = peers.values_mut().find(|p| p.endpoint.as_ref().is_some_and(|e| e.peer_key == key)) {
                peer.mark_disconnected();
                debug!(peer = %hex::encode(key), "keepalive detected dead connection, marked disconnected");
            }
        }
    }

    /// Validators sharing a row or column with `validator` in the current
    /// grid, i.e. the UP0 fan-out target set.
    pub fn grid_neighbours(&self, validator: ValidatorIndex) -> Vec<ValidatorIndex> {
        self.grid.read().neighbours(validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamnp_core::ids::{Endpoint, ValidatorMetadata};

    fn meta(b: u8, port: u16) -> ValidatorMetadata {
        ValidatorMetadata::new([b; 32], [b; 32], Some(Endpoint::new("127.0.0.1", port, [b; 32])))
    }

    #[test]
    fn epoch_update_adds_and_removes_peers() {
        let own_key = [0u8; 32];
        let mut genesis = HashMap::new();
        genesis.insert(1u16, meta(1, 1000));
        let vset = Arc::new(ValidatorSetManager::new(0, genesis));
        let mgr = ConnectionManager::new(own_key, vset.clone());

        mgr.apply_epoch_update();
        assert_eq!(mgr.peer_count(), 1);
        assert!(mgr.peer(1).is_some());

        let mut next = HashMap::new();
        next.insert(2u16, meta(2, 2000));
        vset.prepare_transition(1, next).unwrap();
        vset.apply_transition().unwrap();

        mgr.apply_epoch_update();
        assert!(mgr.peer(1).is_none(), "validator 1 left the union");
        assert!(mgr.peer(2).is_some());
    }

    #[test]
    fn epoch_update_skips_self() {
        let own_key = [7u8; 32];
        let mut genesis = HashMap::new();
        genesis.insert(0u16, meta(7, 1000));
        genesis.insert(1u16, meta(9, 2000));
        let vset = Arc::new(ValidatorSetManager::new(0, genesis));
        let mgr = ConnectionManager::new(own_key, vset);

        mgr.apply_epoch_update();
        assert_eq!(mgr.peer_count(), 1);
        assert!(mgr.peer(0).is_none());
        assert!(mgr.peer(1).is_some());
    }
}
