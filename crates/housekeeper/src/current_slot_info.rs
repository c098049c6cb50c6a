use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::RwLock;
use vela_common::api::builder_api::BuilderGetValidatorsResponseEntry;

/// Shared view of the chain position and the current duty map. Written by the
/// chain event updater, read on every submission and proposer call.
#[derive(Clone, Default)]
pub struct CurrentSlotInfo {
    head_slot: Arc<AtomicU64>,
    /// Head + 1 once the optimistic barrier for the previous window drained.
    optimistic_slot: Arc<AtomicU64>,
    proposer_duties: Arc<RwLock<Vec<BuilderGetValidatorsResponseEntry>>>,
}

impl CurrentSlotInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head_slot(&self) -> u64 {
        self.head_slot.load(Ordering::Relaxed)
    }

    pub fn set_head_slot(&self, slot: u64) {
        self.head_slot.store(slot, Ordering::Relaxed);
    }

    pub fn optimistic_slot(&self) -> u64 {
        self.optimistic_slot.load(Ordering::Relaxed)
    }

    pub fn set_optimistic_slot(&self, slot: u64) {
        self.optimistic_slot.store(slot, Ordering::Relaxed);
    }

    pub fn proposer_duties(&self) -> Vec<BuilderGetValidatorsResponseEntry> {
        self.proposer_duties.read().clone()
    }

    pub fn set_proposer_duties(&self, duties: Vec<BuilderGetValidatorsResponseEntry>) {
        *self.proposer_duties.write() = duties;
    }

    pub fn duty_for_slot(&self, slot: u64) -> Option<BuilderGetValidatorsResponseEntry> {
        self.proposer_duties.read().iter().find(|duty| duty.slot == slot).cloned()
    }
}
