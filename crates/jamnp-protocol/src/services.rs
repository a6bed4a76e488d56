//! Service traits standing in for the external collaborators spec.md §6
//! lists as "services consumed": block validation, chain import, the state
//! trie, cryptographic primitives. Handlers hold `Arc<dyn Trait>` and defer
//! to these rather than embedding application semantics (spec.md §1 scope).
//!
//! Each trait ships a minimal in-memory test double, following the
//! teacher's `Store` trait / `MemoryStore`-style pairing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jamnp_core::ids::{BandersnatchPublicKey, CoreIndex, Ed25519PublicKey, Ed25519Signature, EpochIndex, Hash, ValidatorIndex};
use jamnp_net::validator_set::ValidatorSetManager;
use parking_lot::RwLock;
use thiserror::Error;

use crate::codecs::block::Direction;
use crate::codecs::work_package::SegmentRootMapping;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

/// Read-only access to the active validator set, for consumers that should
/// not see [`ValidatorSetManager`]'s mutating methods.
pub trait ValidatorSetProvider: Send + Sync {
    fn current_count(&self) -> usize;
    fn contains(&self, key: &Ed25519PublicKey) -> bool;
}

impl ValidatorSetProvider for ValidatorSetManager {
    fn current_count(&self) -> usize {
        self.current().len()
    }

    fn contains(&self, key: &Ed25519PublicKey) -> bool {
        self.get_all_connected().values().any(|m| &m.ed25519_key == key)
    }
}

/// Block import and header hashing, delegated to the chain subsystem.
#[async_trait]
pub trait ChainManager: Send + Sync {
    async fn import_block(&self, block: &[u8]) -> Result<(), ServiceError>;
    async fn hash_header(&self, header: &[u8]) -> Hash;
    async fn header_at(&self, hash: &Hash) -> Result<Option<Vec<u8>>, ServiceError>;

    /// Serves CE128: up to `max_blocks` opaque, encoded blocks walking from
    /// `header_hash` in `direction`.
    async fn blocks_from(&self, header_hash: &Hash, direction: Direction, max_blocks: u32) -> Result<Vec<Vec<u8>>, ServiceError>;
}

/// Serves CE129 state requests against the state trie.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the proving trie nodes and the `(key, value)` entries in
    /// `[start_key, end_key)`, bounded by `max_size` total response bytes.
    async fn range(
        &self,
        header_hash: &Hash,
        start_key: &Hash,
        end_key: &Hash,
        max_size: u32,
    ) -> Result<(Vec<Vec<u8>>, Vec<(Vec<u8>, Vec<u8>)>), ServiceError>;
}

/// Serves CE137/CE138/CE139-140: erasure-coded shard storage for a
/// validator's assurer role.
#[async_trait]
pub trait ShardStore: Send + Sync {
    /// CE137: the full bundle, its constituent segments, and a justification.
    async fn bundle_and_segments(&self, erasure_root: &Hash, shard_index: u32) -> Result<(Vec<u8>, Vec<Vec<u8>>, Vec<u8>), ServiceError>;

    /// CE138: the bundle and a justification, without segments.
    async fn audit_bundle(&self, erasure_root: &Hash, shard_index: u32) -> Result<(Vec<u8>, Vec<u8>), ServiceError>;

    /// CE139/CE140: the requested segments, with justifications only when
    /// `with_justification` (CE140).
    async fn segments(
        &self,
        erasure_root: &Hash,
        shard_index: u32,
        segment_indices: &[u32],
        with_justification: bool,
    ) -> Result<(Vec<Vec<u8>>, Vec<Vec<u8>>), ServiceError>;
}

/// Runs a shared work package and produces the signed work report (CE134).
/// Guarantee computation and signing are application semantics outside this
/// crate's scope (spec.md §1); this trait is the seam.
#[async_trait]
pub trait WorkReportGuarantor: Send + Sync {
    async fn guarantee(
        &self,
        core_index: CoreIndex,
        segment_roots: &[SegmentRootMapping],
        work_package: &[u8],
    ) -> Result<(Hash, Ed25519Signature), ServiceError>;
}

/// Safrole ticket verification and proxy computation (§4.8).
#[async_trait]
pub trait TicketService: Send + Sync {
    /// Verify the ring-VRF proof for `epoch`/`attempt`; does not check
    /// proxy-ness.
    async fn verify_proof(&self, epoch: EpochIndex, attempt: u8, proof: &[u8; 784]) -> Result<(), ServiceError>;

    /// Derive the proxy validator index from the proof: last 4 bytes of the
    /// VRF output, big-endian u32, modulo the active set size.
    fn compute_proxy(&self, proof: &[u8; 784], active_set_size: usize) -> ValidatorIndex {
        if active_set_size == 0 {
            return 0;
        }
        let tail = &proof[proof.len() - 4..];
        let n = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
        (n as usize % active_set_size) as ValidatorIndex
    }
}

/// Entropy source for VRF/ticket generation.
pub trait EntropySource: Send + Sync {
    fn current_entropy(&self) -> [u8; 32];
}

/// Holds this node's signing keys.
pub trait KeyPairHolder: Send + Sync {
    fn ed25519_signing_key(&self) -> Ed25519PublicKey;
    fn bandersnatch_signing_key(&self) -> BandersnatchPublicKey;
}

/// Async get/put keyed by hash, the shape shared by every JAM content store.
#[async_trait]
pub trait PreimageStore: Send + Sync {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, ServiceError>;
    async fn put(&self, hash: Hash, data: Vec<u8>) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait WorkStore: Send + Sync {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, ServiceError>;
    async fn put(&self, hash: Hash, data: Vec<u8>) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, ServiceError>;
    async fn put(&self, hash: Hash, data: Vec<u8>) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait JudgmentStore: Send + Sync {
    async fn record(&self, epoch: EpochIndex, validator: ValidatorIndex, work_report_hash: Hash, validity: bool) -> Result<(), ServiceError>;
}

/// Shared `HashMap<Hash, Vec<u8>>` behind a lock; backs the in-memory
/// Preimage/Work/Block store doubles below.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl PreimageStore for MemoryBlobStore {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, ServiceError> {
        Ok(self.blobs.read().get(hash).cloned())
    }

    async fn put(&self, hash: Hash, data: Vec<u8>) -> Result<(), ServiceError> {
        self.blobs.write().insert(hash, data);
        Ok(())
    }
}

#[async_trait]
impl WorkStore for MemoryBlobStore {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, ServiceError> {
        Ok(self.blobs.read().get(hash).cloned())
    }

    async fn put(&self, hash: Hash, data: Vec<u8>) -> Result<(), ServiceError> {
        self.blobs.write().insert(hash, data);
        Ok(())
    }
}

#[async_trait]
impl BlockStore for MemoryBlobStore {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, ServiceError> {
        Ok(self.blobs.read().get(hash).cloned())
    }

    async fn put(&self, hash: Hash, data: Vec<u8>) -> Result<(), ServiceError> {
        self.blobs.write().insert(hash, data);
        Ok(())
    }
}

/// In-memory judgment log, keyed by `(epoch, validator, work_report_hash)`.
#[derive(Default)]
pub struct MemoryJudgmentStore {
    entries: RwLock<Vec<(EpochIndex, ValidatorIndex, Hash, bool)>>,
}

impl MemoryJudgmentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl JudgmentStore for MemoryJudgmentStore {
    async fn record(&self, epoch: EpochIndex, validator: ValidatorIndex, work_report_hash: Hash, validity: bool) -> Result<(), ServiceError> {
        self.entries.write().push((epoch, validator, work_report_hash, validity));
        Ok(())
    }
}

/// In-memory chain double: headers keyed by their SHA-256 hash (standing in
/// for Blake2b, which lives with the real chain manager, spec.md §1 scope).
#[derive(Default)]
pub struct MemoryChainManager {
    headers: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl MemoryChainManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn hash(bytes: &[u8]) -> Hash {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }
}

#[async_trait]
impl ChainManager for MemoryChainManager {
    async fn import_block(&self, block: &[u8]) -> Result<(), ServiceError> {
        let hash = Self::hash(block);
        self.headers.write().insert(hash, block.to_vec());
        Ok(())
    }

    async fn hash_header(&self, header: &[u8]) -> Hash {
        Self::hash(header)
    }

    async fn header_at(&self, hash: &Hash) -> Result<Option<Vec<u8>>, ServiceError> {
        Ok(self.headers.read().get(hash).cloned())
    }

    async fn blocks_from(&self, _header_hash: &Hash, _direction: Direction, max_blocks: u32) -> Result<Vec<Vec<u8>>, ServiceError> {
        Ok(self.headers.read().values().take(max_blocks as usize).cloned().collect())
    }
}

/// In-memory state-trie double: a flat key/value map, no actual trie
/// structure (the state trie itself is out of scope, spec.md §1).
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.write().insert(key, value);
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn range(
        &self,
        _header_hash: &Hash,
        start_key: &Hash,
        end_key: &Hash,
        max_size: u32,
    ) -> Result<(Vec<Vec<u8>>, Vec<(Vec<u8>, Vec<u8>)>), ServiceError> {
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .read()
            .iter()
            .filter(|(k, _)| k.as_slice() >= &start_key[..] && k.as_slice() < &end_key[..])
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut total = 0usize;
        entries.retain(|(k, v)| {
            total += k.len() + v.len();
            total <= max_size as usize
        });

        Ok((Vec::new(), entries))
    }
}

/// In-memory shard double keyed by `(erasure_root, shard_index)`.
#[derive(Default)]
pub struct MemoryShardStore {
    bundles: RwLock<HashMap<(Hash, u32), (Vec<u8>, Vec<Vec<u8>>, Vec<u8>)>>,
}

impl MemoryShardStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, erasure_root: Hash, shard_index: u32, bundle: Vec<u8>, segments: Vec<Vec<u8>>, justification: Vec<u8>) {
        self.bundles.write().insert((erasure_root, shard_index), (bundle, segments, justification));
    }
}

#[async_trait]
impl ShardStore for MemoryShardStore {
    async fn bundle_and_segments(&self, erasure_root: &Hash, shard_index: u32) -> Result<(Vec<u8>, Vec<Vec<u8>>, Vec<u8>), ServiceError> {
        self.bundles.read().get(&(*erasure_root, shard_index)).cloned().ok_or(ServiceError::NotFound)
    }

    async fn audit_bundle(&self, erasure_root: &Hash, shard_index: u32) -> Result<(Vec<u8>, Vec<u8>), ServiceError> {
        let (bundle, _segments, justification) =
            self.bundles.read().get(&(*erasure_root, shard_index)).cloned().ok_or(ServiceError::NotFound)?;
        Ok((bundle, justification))
    }

    async fn segments(
        &self,
        erasure_root: &Hash,
        shard_index: u32,
        segment_indices: &[u32],
        with_justification: bool,
    ) -> Result<(Vec<Vec<u8>>, Vec<Vec<u8>>), ServiceError> {
        let (_bundle, all_segments, justification) =
            self.bundles.read().get(&(*erasure_root, shard_index)).cloned().ok_or(ServiceError::NotFound)?;
        let picked = segment_indices.iter().filter_map(|&i| all_segments.get(i as usize).cloned()).collect();
        let justifications = if with_justification { vec![justification] } else { Vec::new() };
        Ok((picked, justifications))
    }
}

/// Stands in for the guarantor's work-package execution and signing
/// pipeline (spec.md §1: cryptographic primitives and application semantics
/// are external collaborators). Produces a deterministic hash of the work
/// package and a zero signature rather than a real one.
pub struct NoopWorkReportGuarantor;

#[async_trait]
impl WorkReportGuarantor for NoopWorkReportGuarantor {
    async fn guarantee(
        &self,
        _core_index: CoreIndex,
        _segment_roots: &[SegmentRootMapping],
        work_package: &[u8],
    ) -> Result<(Hash, Ed25519Signature), ServiceError> {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(work_package);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        Ok((hash, [0u8; 64]))
    }
}

/// A `TicketService` double whose proxy computation is the real algorithm
/// (so proxy-ness tests are meaningful) but whose proof verification always
/// succeeds, standing in for the Bandersnatch ring-VRF the networking layer
/// does not implement (spec.md §1 scope).
pub struct NoopTicketService;

#[async_trait]
impl TicketService for NoopTicketService {
    async fn verify_proof(&self, _epoch: EpochIndex, attempt: u8, _proof: &[u8; 784]) -> Result<(), ServiceError> {
        let _ = attempt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_blob_store_roundtrips() {
        let store = MemoryBlobStore::new();
        let hash = [9u8; 32];
        PreimageStore::put(store.as_ref(), hash, b"hello".to_vec()).await.unwrap();
        let got = PreimageStore::get(store.as_ref(), &hash).await.unwrap();
        assert_eq!(got, Some(b"hello".to_vec()));
    }

    #[test]
    fn compute_proxy_is_a_pure_function_of_the_proof() {
        let ticket_service = NoopTicketService;
        let mut proof = [0u8; 784];
        proof[780..784].copy_from_slice(&7u32.to_be_bytes());
        assert_eq!(ticket_service.compute_proxy(&proof, 4), 3);
        assert_eq!(ticket_service.compute_proxy(&proof, 4), ticket_service.compute_proxy(&proof, 4));
    }

    #[tokio::test]
    async fn memory_chain_manager_serves_imported_blocks() {
        let chain = MemoryChainManager::new();
        chain.import_block(b"block-one").await.unwrap();
        chain.import_block(b"block-two").await.unwrap();

        let hash = chain.hash_header(b"block-one").await;
        assert_eq!(chain.header_at(&hash).await.unwrap(), Some(b"block-one".to_vec()));

        let blocks = chain.blocks_from(&hash, Direction::AscendingExclusive, 1).await.unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[tokio::test]
    async fn memory_state_store_filters_by_range_and_size() {
        let store = MemoryStateStore::new();
        store.insert(vec![1], vec![0; 10]);
        store.insert(vec![2], vec![0; 10]);
        store.insert(vec![5], vec![0; 10]);

        let mut start = [0u8; 32];
        start[31] = 1;
        let mut end = [0u8; 32];
        end[31] = 5;

        let (_, entries) = store.range(&[0; 32], &start, &end, 1000).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn memory_shard_store_round_trips() {
        let store = MemoryShardStore::new();
        let root = [3u8; 32];
        store.insert(root, 0, vec![1, 2, 3], vec![vec![1], vec![2]], vec![9]);

        let (bundle, segments, justification) = store.bundle_and_segments(&root, 0).await.unwrap();
        assert_eq!(bundle, vec![1, 2, 3]);
        assert_eq!(segments.len(), 2);
        assert_eq!(justification, vec![9]);

        let (picked, justifications) = store.segments(&root, 0, &[1], true).await.unwrap();
        assert_eq!(picked, vec![vec![2]]);
        assert_eq!(justifications, vec![vec![9]]);

        let (_picked, justifications) = store.segments(&root, 0, &[1], false).await.unwrap();
        assert!(justifications.is_empty());
    }

    #[tokio::test]
    async fn noop_work_report_guarantor_is_deterministic() {
        let guarantor = NoopWorkReportGuarantor;
        let (hash_a, _) = guarantor.guarantee(0, &[], b"package").await.unwrap();
        let (hash_b, _) = guarantor.guarantee(0, &[], b"package").await.unwrap();
        assert_eq!(hash_a, hash_b);
    }
}
