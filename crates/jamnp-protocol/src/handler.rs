//! Protocol handler framework (spec.md §4.6): one handler per stream kind,
//! each owning codec + event emission and nothing else — the actual
//! processing logic is the service it's handed at construction (§9 Design
//! Notes, "treat the event-bus-driven variant as canonical").
//!
//! `handle_request` runs on the serving side of a CE exchange: decode,
//! consult the local service, emit an informational event, encode the
//! response. `handle_response` runs on the initiating side once the
//! response frame comes back: decode and emit the corresponding `*Received`
//! event. Fire-and-forget protocols (CE131-135, CE141, CE142, CE144, CE145)
//! have an empty response and a no-op `handle_response`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jamnp_core::framing::StreamKind;
use jamnp_core::ids::{Ed25519PublicKey, Hash, ValidatorIndex};
use jamnp_net::events::{EventBus, NetworkEvent};
use tracing::debug;

use crate::codecs::{assurance, audit, block, judgment, preimage, shard, state, ticket, up0, work_package, work_report};
use crate::error::HandlerError;
use crate::services::{
    ChainManager, JudgmentStore, PreimageStore, ServiceError, ShardStore, StateStore, TicketService, ValidatorSetProvider,
    WorkReportGuarantor, WorkStore,
};

/// Stands in for the Blake2b header hash out of this crate's scope
/// (spec.md §1), keyed the same way [`crate::services::MemoryChainManager`]
/// keys its headers so CE135's `put` and CE136's `get` agree on a hash.
fn hash_bytes(data: &[u8]) -> Hash {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Uniform capability set every stream-kind handler implements (§4.6).
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    fn kind(&self) -> StreamKind;

    /// Serving side: decode `payload`, run the request, return the encoded
    /// response (empty for fire-and-forget protocols).
    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError>;

    /// Initiating side: decode a response frame that came back on a stream
    /// this node opened. Default no-op, for protocols with an empty
    /// response or a UP-style protocol that never calls this.
    async fn handle_response(&self, _peer: Ed25519PublicKey, _payload: &[u8]) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Looks up the registered handler for an incoming stream's kind byte
/// (§4.5 "Stream routing on receive").
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<StreamKind, Arc<dyn ProtocolHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ProtocolHandler>) -> Result<(), HandlerError> {
        let kind = handler.kind();
        if self.handlers.insert(kind, handler).is_some() {
            return Err(HandlerError::DuplicateStreamKind(kind.to_byte()));
        }
        Ok(())
    }

    pub async fn dispatch_request(&self, kind: StreamKind, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let handler = self.handlers.get(&kind).ok_or(HandlerError::UnknownStreamKind(kind.to_byte()))?;
        debug!(kind = kind.to_byte(), peer = %hex::encode(peer), len = payload.len(), "dispatching request");
        handler.handle_request(peer, payload).await
    }

    pub async fn dispatch_response(&self, kind: StreamKind, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let handler = self.handlers.get(&kind).ok_or(HandlerError::UnknownStreamKind(kind.to_byte()))?;
        debug!(kind = kind.to_byte(), peer = %hex::encode(peer), len = payload.len(), "dispatching response");
        handler.handle_response(peer, payload).await
    }
}

fn service_err(e: ServiceError) -> HandlerError {
    HandlerError::Service(e.to_string())
}

/// CE128 — Block request.
pub struct BlockRequestHandler {
    chain: Arc<dyn ChainManager>,
    events: EventBus,
}

impl BlockRequestHandler {
    pub fn new(chain: Arc<dyn ChainManager>, events: EventBus) -> Self {
        Self { chain, events }
    }
}

#[async_trait]
impl ProtocolHandler for BlockRequestHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_BLOCK_REQUEST
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let req = block::decode_request(payload)?;
        self.events.publish(NetworkEvent::BlocksRequested { peer, header_hash: req.header_hash, max_blocks: req.max_blocks });
        let blocks = self.chain.blocks_from(&req.header_hash, req.direction, req.max_blocks).await.map_err(service_err)?;
        Ok(block::encode_response(&block::BlockResponse { blocks }))
    }

    async fn handle_response(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let resp = block::decode_response(payload)?;
        self.events.publish(NetworkEvent::BlocksReceived { peer, blocks: resp.blocks });
        Ok(())
    }
}

/// CE129 — State request.
pub struct StateRequestHandler {
    state: Arc<dyn StateStore>,
    events: EventBus,
}

impl StateRequestHandler {
    pub fn new(state: Arc<dyn StateStore>, events: EventBus) -> Self {
        Self { state, events }
    }
}

#[async_trait]
impl ProtocolHandler for StateRequestHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_STATE_REQUEST
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let req = state::decode_request(payload)?;
        self.events.publish(NetworkEvent::StateRequested {
            peer,
            header_hash: req.header_hash,
            start_key: req.start_key,
            end_key: req.end_key,
        });
        let (nodes, entries) =
            self.state.range(&req.header_hash, &req.start_key, &req.end_key, req.max_size).await.map_err(service_err)?;
        let entries = entries.into_iter().map(|(key, value)| state::StateEntry { key, value }).collect();
        Ok(state::encode_response(&state::StateResponse { nodes, entries }))
    }

    async fn handle_response(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let resp = state::decode_response(payload)?;
        let entries = resp.entries.into_iter().map(|e| (e.key, e.value)).collect();
        self.events.publish(NetworkEvent::StateResponse { peer, nodes: resp.nodes, entries });
        Ok(())
    }
}

/// CE131 — Ticket distribution, generator → proxy. The receiving validator
/// must be the computed proxy or the exchange fails (§4.8 step 4).
pub struct TicketGeneratorToProxyHandler {
    own_validator_index: ValidatorIndex,
    validator_set: Arc<dyn ValidatorSetProvider>,
    ticket_service: Arc<dyn TicketService>,
    max_tickets_per_extrinsic: u8,
    events: EventBus,
}

impl TicketGeneratorToProxyHandler {
    pub fn new(
        own_validator_index: ValidatorIndex,
        validator_set: Arc<dyn ValidatorSetProvider>,
        ticket_service: Arc<dyn TicketService>,
        max_tickets_per_extrinsic: u8,
        events: EventBus,
    ) -> Self {
        Self { own_validator_index, validator_set, ticket_service, max_tickets_per_extrinsic, events }
    }
}

#[async_trait]
impl ProtocolHandler for TicketGeneratorToProxyHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_SAFROLE_TICKET_DIST_1
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = ticket::decode(payload)?;
        if !ticket::is_valid_attempt(msg.attempt, self.max_tickets_per_extrinsic) {
            return Err(HandlerError::InvalidAttemptByte(msg.attempt));
        }
        self.ticket_service.verify_proof(msg.epoch, msg.attempt, &msg.proof).await.map_err(|_| HandlerError::InvalidTicket)?;

        let proxy = self.ticket_service.compute_proxy(&msg.proof, self.validator_set.current_count());
        if proxy != self.own_validator_index {
            return Err(HandlerError::NotIntendedProxy);
        }

        self.events.publish(NetworkEvent::TicketDistributionRequest {
            peer,
            epoch: msg.epoch,
            attempt: msg.attempt,
            proof: msg.proof,
            relayed: false,
        });
        Ok(Vec::new())
    }
}

/// CE132 — Ticket distribution, proxy → every current validator. Receivers
/// only store; no proxy check (§4.8 step 5).
pub struct TicketProxyToAllHandler {
    ticket_service: Arc<dyn TicketService>,
    max_tickets_per_extrinsic: u8,
    events: EventBus,
}

impl TicketProxyToAllHandler {
    pub fn new(ticket_service: Arc<dyn TicketService>, max_tickets_per_extrinsic: u8, events: EventBus) -> Self {
        Self { ticket_service, max_tickets_per_extrinsic, events }
    }
}

#[async_trait]
impl ProtocolHandler for TicketProxyToAllHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_SAFROLE_TICKET_DIST_2
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = ticket::decode(payload)?;
        if !ticket::is_valid_attempt(msg.attempt, self.max_tickets_per_extrinsic) {
            return Err(HandlerError::InvalidAttemptByte(msg.attempt));
        }
        self.ticket_service.verify_proof(msg.epoch, msg.attempt, &msg.proof).await.map_err(|_| HandlerError::InvalidTicket)?;

        self.events.publish(NetworkEvent::TicketDistributionRequest {
            peer,
            epoch: msg.epoch,
            attempt: msg.attempt,
            proof: msg.proof,
            relayed: true,
        });
        Ok(Vec::new())
    }
}

/// CE133 — Work-package submission, builder → guarantor. Fire-and-forget;
/// processing is deferred entirely to the `WorkPackageSubmission` subscriber.
pub struct WorkPackageSubmissionHandler {
    events: EventBus,
}

impl WorkPackageSubmissionHandler {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ProtocolHandler for WorkPackageSubmissionHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_WORK_PACKAGE_SUBMIT
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = work_package::decode_submission(payload)?;
        self.events.publish(NetworkEvent::WorkPackageSubmission {
            peer,
            core_index: msg.core_index,
            work_package: msg.work_package,
            extrinsic: msg.extrinsic,
        });
        Ok(Vec::new())
    }
}

/// CE134 — Work-package sharing, guarantor → guarantor.
pub struct WorkPackageShareHandler {
    guarantor: Arc<dyn WorkReportGuarantor>,
    events: EventBus,
}

impl WorkPackageShareHandler {
    pub fn new(guarantor: Arc<dyn WorkReportGuarantor>, events: EventBus) -> Self {
        Self { guarantor, events }
    }
}

#[async_trait]
impl ProtocolHandler for WorkPackageShareHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_WORK_PACKAGE_SHARE
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = work_package::decode_share(payload)?;
        self.events.publish(NetworkEvent::WorkPackageSharing { peer, core_index: msg.core_index, bundle: msg.work_package.clone() });
        let (work_report_hash, signature) =
            self.guarantor.guarantee(msg.core_index, &msg.segment_roots, &msg.work_package).await.map_err(service_err)?;
        Ok(work_package::encode_share_response(&work_package::WorkPackageShareResponse { work_report_hash, signature }))
    }

    async fn handle_response(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let resp = work_package::decode_share_response(payload)?;
        self.events.publish(NetworkEvent::WorkPackageSharingResponse {
            peer,
            work_report_hash: resp.work_report_hash,
            signature: resp.signature,
        });
        Ok(())
    }
}

/// CE135 — Work-report distribution, guarantor → validator. Fire-and-forget.
pub struct WorkReportDistributionHandler {
    work_store: Arc<dyn WorkStore>,
    events: EventBus,
}

impl WorkReportDistributionHandler {
    pub fn new(work_store: Arc<dyn WorkStore>, events: EventBus) -> Self {
        Self { work_store, events }
    }
}

#[async_trait]
impl ProtocolHandler for WorkReportDistributionHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_WORK_REPORT_DIST
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = work_report::decode_distribution(payload)?;
        self.events.publish(NetworkEvent::WorkReportDistribution {
            peer,
            work_report: msg.work_report.clone(),
            slot: msg.slot,
            signatures: msg.signatures.iter().map(|s| (s.validator_index, s.signature)).collect(),
        });
        let hash = hash_bytes(&msg.work_report);
        let _ = self.work_store.put(hash, msg.work_report).await.map_err(service_err)?;
        Ok(Vec::new())
    }
}

/// CE136 — Work-report request.
pub struct WorkReportRequestHandler {
    work_store: Arc<dyn WorkStore>,
    events: EventBus,
}

impl WorkReportRequestHandler {
    pub fn new(work_store: Arc<dyn WorkStore>, events: EventBus) -> Self {
        Self { work_store, events }
    }
}

#[async_trait]
impl ProtocolHandler for WorkReportRequestHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_WORK_REPORT_REQUEST
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let req = work_report::decode_request(payload)?;
        self.events.publish(NetworkEvent::WorkReportRequest { peer, work_report_hash: req.work_report_hash });
        let report = self.work_store.get(&req.work_report_hash).await.map_err(service_err)?.unwrap_or_default();
        Ok(work_report::encode_response(&report))
    }

    async fn handle_response(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let report = work_report::decode_response(payload);
        self.events.publish(NetworkEvent::WorkReportResponse { peer, work_report: report });
        Ok(())
    }
}

/// CE137 — Shard distribution, → assurer.
pub struct ShardDistributionHandler {
    shards: Arc<dyn ShardStore>,
    events: EventBus,
}

impl ShardDistributionHandler {
    pub fn new(shards: Arc<dyn ShardStore>, events: EventBus) -> Self {
        Self { shards, events }
    }
}

#[async_trait]
impl ProtocolHandler for ShardDistributionHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_SHARD_DIST
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let req = shard::decode_shard_request(payload)?;
        self.events.publish(NetworkEvent::ShardDistributionRequest { peer, erasure_root: req.erasure_root, shard_index: req.shard_index });
        let (bundle, segments, justification) =
            self.shards.bundle_and_segments(&req.erasure_root, req.shard_index).await.map_err(service_err)?;
        Ok(shard::encode_shard_distribution_response(&shard::ShardDistributionResponse { bundle, segments, justification }))
    }

    async fn handle_response(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let resp = shard::decode_shard_distribution_response(payload)?;
        self.events.publish(NetworkEvent::ShardDistributionResponse {
            peer,
            bundle: resp.bundle,
            segments: resp.segments,
            justification: resp.justification,
        });
        Ok(())
    }
}

/// CE138 — Audit-shard request.
pub struct AuditShardRequestHandler {
    shards: Arc<dyn ShardStore>,
    events: EventBus,
}

impl AuditShardRequestHandler {
    pub fn new(shards: Arc<dyn ShardStore>, events: EventBus) -> Self {
        Self { shards, events }
    }
}

#[async_trait]
impl ProtocolHandler for AuditShardRequestHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_AUDIT_SHARD_REQUEST
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let req = shard::decode_shard_request(payload)?;
        self.events.publish(NetworkEvent::AuditShardRequest { peer, erasure_root: req.erasure_root, shard_index: req.shard_index });
        let (bundle, justification) = self.shards.audit_bundle(&req.erasure_root, req.shard_index).await.map_err(service_err)?;
        Ok(shard::encode_audit_shard_response(&shard::AuditShardResponse { bundle, justification }))
    }

    async fn handle_response(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let resp = shard::decode_audit_shard_response(payload)?;
        self.events.publish(NetworkEvent::AuditShardResponse { peer, bundle: resp.bundle, justification: resp.justification });
        Ok(())
    }
}

/// CE139/CE140 — Segment-shard request. `with_justification` distinguishes
/// the two stream kinds; correlate responses by `(stream_kind,
/// erasure_root)`, not FIFO (spec.md §9 open question 3).
pub struct SegmentShardRequestHandler {
    kind: StreamKind,
    with_justification: bool,
    shards: Arc<dyn ShardStore>,
    events: EventBus,
}

impl SegmentShardRequestHandler {
    pub fn new(with_justification: bool, shards: Arc<dyn ShardStore>, events: EventBus) -> Self {
        let kind = if with_justification { StreamKind::CE_SEGMENT_SHARD_REQUEST_2 } else { StreamKind::CE_SEGMENT_SHARD_REQUEST };
        Self { kind, with_justification, shards, events }
    }
}

#[async_trait]
impl ProtocolHandler for SegmentShardRequestHandler {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let req = shard::decode_segment_request(payload)?;
        self.events.publish(NetworkEvent::SegmentShardRequest {
            peer,
            requests: req.items.iter().map(|i| (i.erasure_root, i.shard_index, i.segment_indices.clone())).collect(),
            with_justification: self.with_justification,
        });

        let mut segments = Vec::new();
        let mut justifications = Vec::new();
        for item in &req.items {
            let (seg, just) = self
                .shards
                .segments(&item.erasure_root, item.shard_index, &item.segment_indices, self.with_justification)
                .await
                .map_err(service_err)?;
            segments.extend(seg);
            justifications.extend(just);
        }
        Ok(shard::encode_segment_response(&shard::SegmentShardResponse { segments, justifications }))
    }

    async fn handle_response(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let resp = shard::decode_segment_response(payload)?;
        self.events.publish(NetworkEvent::SegmentShardResponse { peer, segments: resp.segments, justifications: resp.justifications });
        Ok(())
    }
}

/// CE141 — Assurance distribution, assurer → validator. Fire-and-forget.
pub struct AssuranceDistributionHandler {
    events: EventBus,
}

impl AssuranceDistributionHandler {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ProtocolHandler for AssuranceDistributionHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_ASSURANCE_DIST
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = assurance::decode(payload)?;
        self.events.publish(NetworkEvent::AssuranceReceived { peer, anchor: msg.anchor, bitfield: msg.bitfield, signature: msg.signature });
        Ok(Vec::new())
    }
}

/// CE142 — Preimage announcement. Fire-and-forget.
pub struct PreimageAnnouncementHandler {
    events: EventBus,
}

impl PreimageAnnouncementHandler {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ProtocolHandler for PreimageAnnouncementHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_PREIMAGE_ANNOUNCEMENT
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = preimage::decode_announcement(payload)?;
        self.events.publish(NetworkEvent::PreimageAnnouncementReceived { peer, service_id: msg.service_id, hash: msg.hash, len: msg.len });
        Ok(Vec::new())
    }
}

/// CE143 — Preimage request.
pub struct PreimageRequestHandler {
    preimages: Arc<dyn PreimageStore>,
    events: EventBus,
}

impl PreimageRequestHandler {
    pub fn new(preimages: Arc<dyn PreimageStore>, events: EventBus) -> Self {
        Self { preimages, events }
    }
}

#[async_trait]
impl ProtocolHandler for PreimageRequestHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_PREIMAGE_REQUEST
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let req = preimage::decode_request(payload)?;
        self.events.publish(NetworkEvent::PreimageRequested { peer, hash: req.hash });
        let data = self.preimages.get(&req.hash).await.map_err(service_err)?.unwrap_or_default();
        Ok(preimage::encode_response(&data))
    }

    async fn handle_response(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<(), HandlerError> {
        let data = preimage::decode_response(payload);
        // The response carries no hash of its own; the caller correlates by stream.
        self.events.publish(NetworkEvent::PreimageReceived { peer, hash: Hash::default(), data });
        Ok(())
    }
}

/// CE144 — Audit announcement, auditor ↔ auditor. Fire-and-forget.
pub struct AuditAnnouncementHandler {
    events: EventBus,
}

impl AuditAnnouncementHandler {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ProtocolHandler for AuditAnnouncementHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_AUDIT_ANNOUNCEMENT
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = audit::decode(payload)?;
        self.events.publish(NetworkEvent::AuditAnnouncement {
            peer,
            header_hash: msg.header_hash,
            tranche: msg.tranche,
            announcements: msg.reports.into_iter().map(|r| (r.core_index, r.work_report_hash)).collect(),
        });
        Ok(Vec::new())
    }
}

/// CE145 — Judgment publication. Fire-and-forget.
pub struct JudgmentPublicationHandler {
    judgments: Arc<dyn JudgmentStore>,
    events: EventBus,
}

impl JudgmentPublicationHandler {
    pub fn new(judgments: Arc<dyn JudgmentStore>, events: EventBus) -> Self {
        Self { judgments, events }
    }
}

#[async_trait]
impl ProtocolHandler for JudgmentPublicationHandler {
    fn kind(&self) -> StreamKind {
        StreamKind::CE_JUDGMENT_PUBLICATION
    }

    async fn handle_request(&self, peer: Ed25519PublicKey, payload: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let msg = judgment::decode(payload)?;
        let validator = msg.validator as ValidatorIndex;
        self.events.publish(NetworkEvent::JudgmentPublication {
            peer,
            epoch: msg.epoch,
            validator,
            validity: msg.validity,
            work_report_hash: msg.work_report_hash,
        });
        self.judgments.record(msg.epoch, validator, msg.work_report_hash, msg.validity).await.map_err(service_err)?;
        Ok(Vec::new())
    }
}

/// UP0 — Block announcement. Persistent, not request/response, so it lives
/// outside [`ProtocolHandler`]: one [`Up0Session`] per open UP0 stream,
/// fed each incoming frame in order by its owning stream task (§4.7).
pub struct Up0Session {
    peer: Ed25519PublicKey,
    finalized: up0::Final,
    leaves: Vec<up0::Final>,
    events: EventBus,
}

impl Up0Session {
    pub fn new(peer: Ed25519PublicKey, events: EventBus) -> Self {
        Self { peer, finalized: up0::Final { hash: Hash::default(), slot: 0 }, leaves: Vec::new(), events }
    }

    /// Feed one decoded frame. The first frame on a stream is always a
    /// handshake; subsequent frames are announcements.
    pub fn on_frame(&mut self, payload: &[u8]) -> Result<(), HandlerError> {
        match up0::decode_message(payload)? {
            up0::Up0Message::Handshake(h) => {
                self.finalized = h.finalized;
                self.leaves = h.leaves.clone();
                self.events.publish(NetworkEvent::BlockAnnouncementHandshake {
                    peer: self.peer,
                    finalized: (h.finalized.hash, h.finalized.slot),
                    leaves: h.leaves.iter().map(|l| (l.hash, l.slot)).collect(),
                });
            }
            up0::Up0Message::Announcement(a) => {
                if a.finalized.slot > self.finalized.slot {
                    self.finalized = a.finalized;
                }
                self.events.publish(NetworkEvent::BlockAnnouncementWithHeader {
                    peer: self.peer,
                    header: a.header,
                    finalized: (a.finalized.hash, a.finalized.slot),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MemoryChainManager, MemoryShardStore, MemoryStateStore, NoopTicketService, NoopWorkReportGuarantor};

    #[tokio::test]
    async fn registry_rejects_duplicate_stream_kind() {
        let mut registry = HandlerRegistry::new();
        let events = EventBus::new();
        registry.register(Arc::new(BlockRequestHandler::new(MemoryChainManager::new(), events.clone()))).unwrap();
        let err = registry.register(Arc::new(BlockRequestHandler::new(MemoryChainManager::new(), events))).unwrap_err();
        assert!(matches!(err, HandlerError::DuplicateStreamKind(_)));
    }

    #[tokio::test]
    async fn registry_reports_unknown_stream_kind() {
        let registry = HandlerRegistry::new();
        let err = registry.dispatch_request(StreamKind::CE_BLOCK_REQUEST, [0; 32], &[]).await.unwrap_err();
        assert!(matches!(err, HandlerError::UnknownStreamKind(128)));
    }

    #[tokio::test]
    async fn block_request_handler_serves_from_chain_manager() {
        let chain = MemoryChainManager::new();
        chain.import_block(b"genesis").await.unwrap();
        let hash = chain.hash_header(b"genesis").await;
        let handler = BlockRequestHandler::new(chain, EventBus::new());

        let req = block::BlockRequest { header_hash: hash, direction: block::Direction::AscendingExclusive, max_blocks: 10 };
        let response = handler.handle_request([1; 32], &block::encode_request(&req)).await.unwrap();
        let decoded = block::decode_response(&response).unwrap();
        assert_eq!(decoded.blocks.len(), 1);
    }

    #[tokio::test]
    async fn ticket_generator_to_proxy_rejects_wrong_proxy() {
        let mut proof = Box::new([0u8; 784]);
        proof[780..784].copy_from_slice(&1u32.to_be_bytes());
        let validator_set = jamnp_net::validator_set::ValidatorSetManager::new(0, Default::default());
        let validator_set = Arc::new(validator_set);
        let handler = TicketGeneratorToProxyHandler::new(
            5, // not the computed proxy (1 % 2 = 1)
            validator_set.clone(),
            Arc::new(NoopTicketService),
            4,
            EventBus::new(),
        );
        let msg = ticket::TicketDistribution { epoch: 1, attempt: 0, proof };
        let err = handler.handle_request([0; 32], &ticket::encode(&msg)).await.unwrap_err();
        assert!(matches!(err, HandlerError::NotIntendedProxy));
    }

    #[tokio::test]
    async fn ticket_generator_to_proxy_accepts_correct_proxy() {
        let mut proof = Box::new([0u8; 784]);
        proof[780..784].copy_from_slice(&1u32.to_be_bytes());
        let validator_set = Arc::new(jamnp_net::validator_set::ValidatorSetManager::new(0, Default::default()));
        let handler = TicketGeneratorToProxyHandler::new(1, validator_set, Arc::new(NoopTicketService), 4, EventBus::new());
        let msg = ticket::TicketDistribution { epoch: 1, attempt: 0, proof };
        let response = handler.handle_request([0; 32], &ticket::encode(&msg)).await.unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn work_package_share_handler_invokes_guarantor() {
        let handler = WorkPackageShareHandler::new(Arc::new(NoopWorkReportGuarantor), EventBus::new());
        let share = work_package::WorkPackageShare { core_index: 0, segment_roots: vec![], work_package: vec![1, 2, 3] };
        let response = handler.handle_request([0; 32], &work_package::encode_share(&share)).await.unwrap();
        assert_eq!(response.len(), 96);
    }

    #[tokio::test]
    async fn shard_distribution_handler_serves_stored_bundle() {
        let store = MemoryShardStore::new();
        store.insert([1; 32], 0, vec![9; 4], vec![vec![1]], vec![2]);
        let handler = ShardDistributionHandler::new(store, EventBus::new());
        let req = shard::ShardRequest { erasure_root: [1; 32], shard_index: 0 };
        let response = handler.handle_request([0; 32], &shard::encode_shard_request(&req)).await.unwrap();
        let decoded = shard::decode_shard_distribution_response(&response).unwrap();
        assert_eq!(decoded.bundle, vec![9; 4]);
    }

    #[tokio::test]
    async fn state_request_handler_filters_by_range() {
        let store = MemoryStateStore::new();
        store.insert(vec![1], vec![7]);
        let handler = StateRequestHandler::new(store, EventBus::new());
        let mut end = [0u8; 32];
        end[31] = 2;
        let req = state::StateRequest { header_hash: [0; 32], start_key: [0; 32], end_key: end, max_size: 1000 };
        let response = handler.handle_request([0; 32], &state::encode_request(&req)).await.unwrap();
        let decoded = state::decode_response(&response).unwrap();
        assert_eq!(decoded.entries.len(), 1);
    }

    #[test]
    fn up0_session_tracks_finalized_pointer_across_frames() {
        let mut session = Up0Session::new([0; 32], EventBus::new());
        let handshake = up0::Handshake { finalized: up0::Final { hash: [0; 32], slot: 42 }, leaves: vec![] };
        session.on_frame(&up0::encode_handshake(&handshake)).unwrap();
        assert_eq!(session.finalized.slot, 42);

        let announcement = up0::Announcement { header: vec![1, 2, 3], finalized: up0::Final { hash: [9; 32], slot: 100 } };
        session.on_frame(&up0::encode_announcement(&announcement)).unwrap();
        assert_eq!(session.finalized.slot, 100);

        let stale = up0::Announcement { header: vec![4], finalized: up0::Final { hash: [1; 32], slot: 50 } };
        session.on_frame(&up0::encode_announcement(&stale)).unwrap();
        assert_eq!(session.finalized.slot, 100, "stale announcement must not roll back the pointer");
    }
}
