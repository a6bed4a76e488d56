//! Previous/current/next validator-set triple and epoch-transition staging.

use std::collections::HashMap;

use jamnp_core::ids::{Endpoint, EpochIndex, ValidatorIndex, ValidatorMetadata};
use parking_lot::RwLock;
use thiserror::Error;

/// Errors raised by [`ValidatorSetManager`] transition bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidatorSetError {
    #[error("prepare_transition called while a transition is already pending")]
    TransitionAlreadyPending,

    #[error("apply_transition called with no transition pending")]
    NoTransitionPending,
}

struct Inner {
    epoch: EpochIndex,
    previous: HashMap<ValidatorIndex, ValidatorMetadata>,
    current: HashMap<ValidatorIndex, ValidatorMetadata>,
    next: HashMap<ValidatorIndex, ValidatorMetadata>,
    pending: Option<(EpochIndex, HashMap<ValidatorIndex, ValidatorMetadata>)>,
}

/// Maintains the three validator-set snapshots (§4.2) and arbitrates epoch
/// transitions: `prepare_transition` stages a change, `apply_transition`
/// commits it. The two must alternate; nesting a second `prepare_transition`
/// before an `apply_transition` is rejected.
pub struct ValidatorSetManager {
    inner: RwLock<Inner>,
}

impl ValidatorSetManager {
    /// Build a manager whose `current` set is `genesis` and whose epoch
    /// index starts at `starting_epoch`.
    pub fn new(
        starting_epoch: EpochIndex,
        genesis: HashMap<ValidatorIndex, ValidatorMetadata>,
    ) -> Self {
        Self {
            inner: RwLock::new(Inner {
                epoch: starting_epoch,
                previous: HashMap::new(),
                current: genesis,
                next: HashMap::new(),
                pending: None,
            }),
        }
    }

    pub fn epoch(&self) -> EpochIndex {
        self.inner.read().epoch
    }

    pub fn current(&self) -> HashMap<ValidatorIndex, ValidatorMetadata> {
        self.inner.read().current.clone()
    }

    pub fn previous(&self) -> HashMap<ValidatorIndex, ValidatorMetadata> {
        self.inner.read().previous.clone()
    }

    pub fn next(&self) -> HashMap<ValidatorIndex, ValidatorMetadata> {
        self.inner.read().next.clone()
    }

    pub fn has_pending_transition(&self) -> bool {
        self.inner.read().pending.is_some()
    }

    /// Union of previous ∪ current ∪ next, duplicates resolved current >
    /// previous > next (invariant 4, minus the "self" exclusion which
    /// callers apply once they know their own index).
    pub fn get_all_connected(&self) -> HashMap<ValidatorIndex, ValidatorMetadata> {
        let inner = self.inner.read();
        let mut out = inner.next.clone();
        out.extend(inner.previous.clone());
        out.extend(inner.current.clone());
        out
    }

    /// Reverse lookup by published endpoint, searched current then previous
    /// then next.
    pub fn find_by_endpoint(&self, host: &str, port: u16) -> Option<(ValidatorIndex, ValidatorMetadata)> {
        let inner = self.inner.read();
        for set in [&inner.current, &inner.previous, &inner.next] {
            if let Some((idx, meta)) = set.iter().find(|(_, meta)| {
                meta.endpoint.as_ref().is_some_and(|e: &Endpoint| e.host == host && e.port == port)
            }) {
                return Some((*idx, meta.clone()));
            }
        }
        None
    }

    /// Stage a transition: snapshot `current` into `previous`, stage
    /// `next_set` as the pending `next`. Must not be called while another
    /// transition is already pending.
    pub fn prepare_transition(
        &self,
        new_epoch: EpochIndex,
        next_set: HashMap<ValidatorIndex, ValidatorMetadata>,
    ) -> Result<(), ValidatorSetError> {
        let mut inner = self.inner.write();
        if inner.pending.is_some() {
            return Err(ValidatorSetError::TransitionAlreadyPending);
        }
        inner.previous = inner.current.clone();
        inner.next = next_set.clone();
        inner.pending = Some((new_epoch, next_set));
        Ok(())
    }

    /// Commit a staged transition: `next` becomes `current`, `next` is
    /// cleared, the epoch index advances. Fails if nothing is pending.
    pub fn apply_transition(&self) -> Result<EpochIndex, ValidatorSetError> {
        let mut inner = self.inner.write();
        let (new_epoch, next_set) = inner.pending.take().ok_or(ValidatorSetError::NoTransitionPending)?;
        inner.current = next_set;
        inner.next = HashMap::new();
        inner.epoch = new_epoch;
        Ok(new_epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(key_byte: u8) -> ValidatorMetadata {
        ValidatorMetadata::new([key_byte; 32], [key_byte; 32], None)
    }

    #[test]
    fn prepare_then_apply_rotates_sets() {
        let mut genesis = HashMap::new();
        genesis.insert(0u16, meta(1));
        let mgr = ValidatorSetManager::new(0, genesis);

        let mut next = HashMap::new();
        next.insert(1u16, meta(2));
        mgr.prepare_transition(1, next.clone()).unwrap();

        assert!(mgr.has_pending_transition());
        assert_eq!(mgr.previous().len(), 1);
        assert_eq!(mgr.next(), next);

        let new_epoch = mgr.apply_transition().unwrap();
        assert_eq!(new_epoch, 1);
        assert_eq!(mgr.epoch(), 1);
        assert_eq!(mgr.current(), next);
        assert!(mgr.next().is_empty());
        assert!(!mgr.has_pending_transition());
    }

    #[test]
    fn nested_prepare_is_rejected() {
        let mgr = ValidatorSetManager::new(0, HashMap::new());
        mgr.prepare_transition(1, HashMap::new()).unwrap();
        let err = mgr.prepare_transition(2, HashMap::new()).unwrap_err();
        assert_eq!(err, ValidatorSetError::TransitionAlreadyPending);
    }

    #[test]
    fn apply_without_prepare_is_rejected() {
        let mgr = ValidatorSetManager::new(0, HashMap::new());
        let err = mgr.apply_transition().unwrap_err();
        assert_eq!(err, ValidatorSetError::NoTransitionPending);
    }

    #[test]
    fn get_all_connected_prefers_current_over_previous_over_next() {
        let mut genesis = HashMap::new();
        genesis.insert(0u16, meta(1));
        let mgr = ValidatorSetManager::new(0, genesis);

        let mut next = HashMap::new();
        next.insert(0u16, meta(9));
        next.insert(1u16, meta(2));
        mgr.prepare_transition(1, next).unwrap();

        let all = mgr.get_all_connected();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&0].ed25519_key, [1u8; 32], "current wins over next");
    }

    #[test]
    fn find_by_endpoint_searches_all_three_sets() {
        let mut genesis = HashMap::new();
        let mut m = meta(5);
        m.endpoint = Some(Endpoint::new("10.0.0.5", 30333, [5u8; 32]));
        genesis.insert(3u16, m);
        let mgr = ValidatorSetManager::new(0, genesis);

        let found = mgr.find_by_endpoint("10.0.0.5", 30333).unwrap();
        assert_eq!(found.0, 3);
        assert!(mgr.find_by_endpoint("10.0.0.6", 1).is_none());
    }
}
