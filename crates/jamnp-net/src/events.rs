//! Typed publish/subscribe event bus (§6 "Events emitted on the event bus").
//!
//! Mirrors the teacher's "manager owns a registry behind a lock, public
//! methods drive it" shape (`DiscoveryManager`/`TransportManager`): a
//! `RwLock<Vec<Sender>>` fans every publish out to every live subscriber,
//! pruning senders whose receiver has been dropped.

use jamnp_core::ids::{CoreIndex, Ed25519PublicKey, EpochIndex, Hash, Slot, ValidatorIndex};
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// One event name per spec.md §6, each carrying the minimum payload its
/// handler already has in hand at emit time.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    BlocksRequested { peer: Ed25519PublicKey, header_hash: Hash, max_blocks: u32 },
    BlocksReceived { peer: Ed25519PublicKey, blocks: Vec<Vec<u8>> },
    StateRequested { peer: Ed25519PublicKey, header_hash: Hash, start_key: Hash, end_key: Hash },
    StateResponse { peer: Ed25519PublicKey, nodes: Vec<Vec<u8>>, entries: Vec<(Vec<u8>, Vec<u8>)> },
    TicketDistributionRequest { peer: Ed25519PublicKey, epoch: EpochIndex, attempt: u8, proof: Box<[u8; 784]>, relayed: bool },
    WorkReportRequest { peer: Ed25519PublicKey, work_report_hash: Hash },
    WorkReportResponse { peer: Ed25519PublicKey, work_report: Vec<u8> },
    WorkReportDistribution { peer: Ed25519PublicKey, work_report: Vec<u8>, slot: Slot, signatures: Vec<(ValidatorIndex, [u8; 64])> },
    ShardDistributionRequest { peer: Ed25519PublicKey, erasure_root: Hash, shard_index: u32 },
    ShardDistributionResponse { peer: Ed25519PublicKey, bundle: Vec<u8>, segments: Vec<Vec<u8>>, justification: Vec<u8> },
    AuditShardRequest { peer: Ed25519PublicKey, erasure_root: Hash, shard_index: u32 },
    AuditShardResponse { peer: Ed25519PublicKey, bundle: Vec<u8>, justification: Vec<u8> },
    SegmentShardRequest { peer: Ed25519PublicKey, requests: Vec<(Hash, u32, Vec<u32>)>, with_justification: bool },
    SegmentShardResponse { peer: Ed25519PublicKey, segments: Vec<Vec<u8>>, justifications: Vec<Vec<u8>> },
    AssuranceReceived { peer: Ed25519PublicKey, anchor: Hash, bitfield: Vec<u8>, signature: [u8; 64] },
    PreimageAnnouncementReceived { peer: Ed25519PublicKey, service_id: u32, hash: Hash, len: u32 },
    PreimageRequested { peer: Ed25519PublicKey, hash: Hash },
    PreimageReceived { peer: Ed25519PublicKey, hash: Hash, data: Vec<u8> },
    BlockAnnouncementHandshake { peer: Ed25519PublicKey, finalized: (Hash, Slot), leaves: Vec<(Hash, Slot)> },
    BlockAnnouncementWithHeader { peer: Ed25519PublicKey, header: Vec<u8>, finalized: (Hash, Slot) },
    WorkPackageSubmission { peer: Ed25519PublicKey, core_index: CoreIndex, work_package: Vec<u8>, extrinsic: Vec<u8> },
    WorkPackageSharing { peer: Ed25519PublicKey, core_index: CoreIndex, bundle: Vec<u8> },
    WorkPackageSharingResponse { peer: Ed25519PublicKey, work_report_hash: Hash, signature: [u8; 64] },
    AuditAnnouncement { peer: Ed25519PublicKey, header_hash: Hash, tranche: u32, announcements: Vec<(CoreIndex, Hash)> },
    JudgmentPublication { peer: Ed25519PublicKey, epoch: EpochIndex, validator: ValidatorIndex, validity: bool, work_report_hash: Hash },
}

/// Broadcast publish/subscribe hub. Cloning is cheap: it shares the
/// underlying subscriber registry.
#[derive(Clone)]
pub struct EventBus {
    subscribers: std::sync::Arc<RwLock<Vec<mpsc::Sender<NetworkEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { subscribers: std::sync::Arc::new(RwLock::new(Vec::new())) }
    }

    /// Register a new subscriber with a bounded mailbox of `buffer` events.
    pub fn subscribe(&self, buffer: usize) -> mpsc::Receiver<NetworkEvent> {
        let (tx, rx) = mpsc::channel(buffer);
        self.subscribers.write().push(tx);
        rx
    }

    /// Emit `event` to every live subscriber, dropping any whose receiver
    /// has gone away. Preserves emission order for a single handler
    /// invocation's sequence of calls (§5).
    pub fn publish(&self, event: NetworkEvent) {
        let mut dead = Vec::new();
        {
            let subs = self.subscribers.read();
            for (i, sub) in subs.iter().enumerate() {
                if sub.try_send(event.clone()).is_err() {
                    dead.push(i);
                }
            }
        }
        if !dead.is_empty() {
            let mut subs = self.subscribers.write();
            for &i in dead.iter().rev() {
                if subs.get(i).is_some_and(mpsc::Sender::is_closed) {
                    subs.remove(i);
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers_in_order() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe(8);
        let mut rx_b = bus.subscribe(8);

        bus.publish(NetworkEvent::PreimageRequested { peer: [1u8; 32], hash: [2u8; 32] });
        bus.publish(NetworkEvent::PreimageRequested { peer: [3u8; 32], hash: [4u8; 32] });

        for rx in [&mut rx_a, &mut rx_b] {
            let first = rx.recv().await.unwrap();
            assert!(matches!(first, NetworkEvent::PreimageRequested { peer, .. } if peer == [1u8; 32]));
            let second = rx.recv().await.unwrap();
            assert!(matches!(second, NetworkEvent::PreimageRequested { peer, .. } if peer == [3u8; 32]));
        }
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_publish() {
        let bus = EventBus::new();
        let rx = bus.subscribe(1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(NetworkEvent::PreimageRequested { peer: [0u8; 32], hash: [0u8; 32] });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
