//! Slot-tick driven epoch transitions (§4.4).
//!
//! The `EpochManager` is the authoritative source of "what epoch are we in"
//! (spec.md §9 open question 2): a separate `floor(slot / slots_per_epoch)`
//! computation anywhere else in the stack is bookkeeping only, never a
//! second source of truth.

use std::collections::HashMap;

use jamnp_core::ids::{EpochIndex, Slot, ValidatorIndex, ValidatorMetadata};
use parking_lot::RwLock;

use crate::validator_set::ValidatorSetManager;

struct Inner {
    slots_per_epoch: u32,
    epoch_start_slot: Slot,
    current_slot: Slot,
    first_block_finalized: bool,
    connectivity_applied: bool,
    apply_slot: Option<Slot>,
}

/// Drives [`ValidatorSetManager::apply_transition`] from slot ticks and a
/// finalisation signal, per invariant 7: a transition is visible only once
/// both "first block of the new epoch finalised" and "at least
/// `max(floor(E/30), 1)` slots have elapsed since the epoch start" hold.
pub struct EpochManager {
    inner: RwLock<Inner>,
}

impl EpochManager {
    pub fn new(slots_per_epoch: u32) -> Self {
        Self {
            inner: RwLock::new(Inner {
                slots_per_epoch,
                epoch_start_slot: 0,
                current_slot: 0,
                first_block_finalized: false,
                connectivity_applied: false,
                apply_slot: None,
            }),
        }
    }

    pub fn slots_per_epoch(&self) -> u32 {
        self.inner.read().slots_per_epoch
    }

    fn threshold(&self) -> u32 {
        (self.inner.read().slots_per_epoch / 30).max(1)
    }

    /// `max(floor(E/60), 1)` slots after `apply_slot`: when ticket
    /// distribution may begin. Queried by the ticket service; never gates
    /// networking itself.
    pub fn ticket_distribution_start(&self) -> Option<Slot> {
        let inner = self.inner.read();
        inner.apply_slot.map(|s| s + (inner.slots_per_epoch / 60).max(1))
    }

    /// `max(floor(E/20), 1)` slots after `apply_slot`: when ticket
    /// forwarding (the CE132 fan-out) may begin.
    pub fn ticket_forwarding_start(&self) -> Option<Slot> {
        let inner = self.inner.read();
        inner.apply_slot.map(|s| s + (inner.slots_per_epoch / 20).max(1))
    }

    /// Record that the chain manager finalised the new epoch's first block.
    pub fn notify_first_block_finalized(&self) {
        self.inner.write().first_block_finalized = true;
    }

    /// Advance to `slot`. If it crosses an epoch boundary, stage a
    /// transition on `validator_set` with `next_set` and reset the
    /// finalisation/apply flags for the new epoch. Returns `true` if this
    /// call both staged a new transition and the previous one had already
    /// been applied (i.e. it is safe to begin tracking the new epoch).
    pub fn advance_slot(
        &self,
        slot: Slot,
        validator_set: &ValidatorSetManager,
        next_set: impl FnOnce() -> HashMap<ValidatorIndex, ValidatorMetadata>,
    ) {
        let mut inner = self.inner.write();
        inner.current_slot = slot;

        let new_epoch = slot / inner.slots_per_epoch;
        let boundary_crossed = new_epoch != validator_set.epoch();

        if boundary_crossed && !validator_set.has_pending_transition() {
            drop(inner);
            let _ = validator_set.prepare_transition(new_epoch, next_set());
            let mut inner = self.inner.write();
            inner.epoch_start_slot = new_epoch * inner.slots_per_epoch;
            inner.first_block_finalized = false;
            inner.connectivity_applied = false;
            inner.apply_slot = None;
        }
    }

    /// Check the apply threshold (invariant 7) and, if satisfied and not
    /// already applied this epoch, commit the staged transition. Idempotent:
    /// once applied for an epoch, subsequent calls are no-ops until the next
    /// boundary stages a fresh transition. Returns the new epoch index if a
    /// transition was just applied.
    pub fn maybe_apply_transition(&self, validator_set: &ValidatorSetManager) -> Option<EpochIndex> {
        let (finalized, slots_elapsed, already_applied, current_slot) = {
            let inner = self.inner.read();
            (
                inner.first_block_finalized,
                inner.current_slot.saturating_sub(inner.epoch_start_slot),
                inner.connectivity_applied,
                inner.current_slot,
            )
        };

        if already_applied || !finalized || slots_elapsed < self.threshold() {
            return None;
        }
        if !validator_set.has_pending_transition() {
            return None;
        }

        let new_epoch = validator_set.apply_transition().ok()?;
        let mut inner = self.inner.write();
        inner.connectivity_applied = true;
        inner.apply_slot = Some(current_slot);
        Some(new_epoch)
    }

    pub fn is_connectivity_applied(&self) -> bool {
        self.inner.read().connectivity_applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(b: u8) -> ValidatorMetadata {
        ValidatorMetadata::new([b; 32], [b; 32], None)
    }

    #[test]
    fn invariant_5_no_apply_until_both_conditions_hold() {
        let epoch_mgr = EpochManager::new(600);
        let validator_set = ValidatorSetManager::new(0, HashMap::new());

        epoch_mgr.advance_slot(600, &validator_set, || {
            let mut m = HashMap::new();
            m.insert(0u16, meta(1));
            m
        });
        assert!(validator_set.has_pending_transition());

        assert!(epoch_mgr.maybe_apply_transition(&validator_set).is_none());

        epoch_mgr.advance_slot(605, &validator_set, HashMap::new);
        assert!(epoch_mgr.maybe_apply_transition(&validator_set).is_none(), "slots elapsed but not finalized");

        epoch_mgr.notify_first_block_finalized();
        assert!(epoch_mgr.maybe_apply_transition(&validator_set).is_none(), "finalized but threshold not met");

        epoch_mgr.advance_slot(600 + 20, &validator_set, HashMap::new);
        let applied = epoch_mgr.maybe_apply_transition(&validator_set);
        assert_eq!(applied, Some(1));
        assert!(epoch_mgr.is_connectivity_applied());
    }

    #[test]
    fn apply_is_idempotent_per_epoch() {
        let epoch_mgr = EpochManager::new(60);
        let validator_set = ValidatorSetManager::new(0, HashMap::new());

        epoch_mgr.advance_slot(60, &validator_set, HashMap::new);
        epoch_mgr.notify_first_block_finalized();
        epoch_mgr.advance_slot(62, &validator_set, HashMap::new);

        assert_eq!(epoch_mgr.maybe_apply_transition(&validator_set), Some(1));
        assert_eq!(epoch_mgr.maybe_apply_transition(&validator_set), None);
    }

    #[test]
    fn derived_schedule_offsets_from_apply_slot() {
        let epoch_mgr = EpochManager::new(600);
        let validator_set = ValidatorSetManager::new(0, HashMap::new());

        assert!(epoch_mgr.ticket_distribution_start().is_none());

        epoch_mgr.advance_slot(600, &validator_set, HashMap::new);
        epoch_mgr.notify_first_block_finalized();
        epoch_mgr.advance_slot(620, &validator_set, HashMap::new);
        epoch_mgr.maybe_apply_transition(&validator_set);

        assert_eq!(epoch_mgr.ticket_distribution_start(), Some(620 + 10));
        assert_eq!(epoch_mgr.ticket_forwarding_start(), Some(620 + 30));
    }

    #[test]
    fn tiny_epoch_lengths_use_floor_of_one() {
        let epoch_mgr = EpochManager::new(10);
        assert_eq!(epoch_mgr.threshold(), 1);
    }
}
