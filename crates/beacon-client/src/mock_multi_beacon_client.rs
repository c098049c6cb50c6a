use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethereum_consensus::primitives::{Bytes32, Root};
use tokio::sync::broadcast::Sender;
use vela_common::{eth::SignedBeaconBlock, ValidatorSummary};

use crate::{
    error::BeaconClientError,
    traits::MultiBeaconClientTrait,
    types::{
        BroadcastValidation, HeadEventData, ProposerDuty, RandaoResponse, StateId, SyncStatus,
    },
};

/// Test double; head events are injected by the test via the captured sender.
#[derive(Clone, Default)]
pub struct MockMultiBeaconClient {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    head_slot: u64,
    randao: Option<Bytes32>,
    duties: Vec<ProposerDuty>,
    validators: Vec<ValidatorSummary>,
    published_blocks: Vec<Arc<SignedBeaconBlock>>,
    head_event_chan: Option<Sender<HeadEventData>>,
}

impl MockMultiBeaconClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head_slot(&self, slot: u64) {
        self.inner.lock().unwrap().head_slot = slot;
    }

    pub fn set_randao(&self, randao: Bytes32) {
        self.inner.lock().unwrap().randao = Some(randao);
    }

    pub fn set_duties(&self, duties: Vec<ProposerDuty>) {
        self.inner.lock().unwrap().duties = duties;
    }

    pub fn set_validators(&self, validators: Vec<ValidatorSummary>) {
        self.inner.lock().unwrap().validators = validators;
    }

    pub fn published_blocks(&self) -> Vec<Arc<SignedBeaconBlock>> {
        self.inner.lock().unwrap().published_blocks.clone()
    }

    pub fn push_head_event(&self, event: HeadEventData) {
        if let Some(chan) = &self.inner.lock().unwrap().head_event_chan {
            let _ = chan.send(event);
        }
    }
}

#[async_trait]
impl MultiBeaconClientTrait for MockMultiBeaconClient {
    async fn best_sync_status(&self) -> Result<SyncStatus, BeaconClientError> {
        let head_slot = self.inner.lock().unwrap().head_slot;
        Ok(SyncStatus { head_slot, sync_distance: 0, is_syncing: false })
    }

    async fn subscribe_to_head_events(&self, chan: Sender<HeadEventData>) {
        self.inner.lock().unwrap().head_event_chan = Some(chan);
    }

    async fn get_state_validators(
        &self,
        _state_id: StateId,
    ) -> Result<Vec<ValidatorSummary>, BeaconClientError> {
        Ok(self.inner.lock().unwrap().validators.clone())
    }

    async fn get_proposer_duties(
        &self,
        _epoch: u64,
    ) -> Result<(Root, Vec<ProposerDuty>), BeaconClientError> {
        Ok((Root::default(), self.inner.lock().unwrap().duties.clone()))
    }

    async fn get_randao(&self, _state_id: StateId) -> Result<RandaoResponse, BeaconClientError> {
        let randao = self
            .inner
            .lock()
            .unwrap()
            .randao
            .clone()
            .ok_or(BeaconClientError::NoBeaconClients)?;
        Ok(RandaoResponse { randao })
    }

    async fn publish_block(
        &self,
        block: Arc<SignedBeaconBlock>,
        _broadcast_validation: Option<BroadcastValidation>,
    ) -> Result<(), BeaconClientError> {
        self.inner.lock().unwrap().published_blocks.push(block);
        Ok(())
    }
}
