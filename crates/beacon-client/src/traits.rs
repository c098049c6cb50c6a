use std::sync::Arc;

use async_trait::async_trait;
use ethereum_consensus::primitives::Root;
use tokio::sync::broadcast::Sender;
use vela_common::{eth::SignedBeaconBlock, ValidatorSummary};

use crate::{
    error::BeaconClientError,
    types::{
        BroadcastValidation, HeadEventData, ProposerDuty, RandaoResponse, StateId, SyncStatus,
    },
};

#[async_trait]
pub trait BeaconClientTrait: Send + Sync + Clone {
    async fn sync_status(&self) -> Result<SyncStatus, BeaconClientError>;

    async fn subscribe_to_head_events(
        &self,
        chan: Sender<HeadEventData>,
    ) -> Result<(), BeaconClientError>;

    async fn get_state_validators(
        &self,
        state_id: StateId,
    ) -> Result<Vec<ValidatorSummary>, BeaconClientError>;

    async fn get_proposer_duties(
        &self,
        epoch: u64,
    ) -> Result<(Root, Vec<ProposerDuty>), BeaconClientError>;

    /// Randao mix at the given state. A submission targeting slot `s` must
    /// carry the mix of state `s - 1`.
    async fn get_randao(&self, state_id: StateId) -> Result<RandaoResponse, BeaconClientError>;

    async fn publish_block(
        &self,
        block: Arc<SignedBeaconBlock>,
        broadcast_validation: Option<BroadcastValidation>,
    ) -> Result<(), BeaconClientError>;

    fn get_uri(&self) -> String;
}

#[async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait MultiBeaconClientTrait: Send + Sync + Clone {
    async fn best_sync_status(&self) -> Result<SyncStatus, BeaconClientError>;

    async fn subscribe_to_head_events(&self, chan: Sender<HeadEventData>);

    async fn get_state_validators(
        &self,
        state_id: StateId,
    ) -> Result<Vec<ValidatorSummary>, BeaconClientError>;

    async fn get_proposer_duties(
        &self,
        epoch: u64,
    ) -> Result<(Root, Vec<ProposerDuty>), BeaconClientError>;

    async fn get_randao(&self, state_id: StateId) -> Result<RandaoResponse, BeaconClientError>;

    async fn publish_block(
        &self,
        block: Arc<SignedBeaconBlock>,
        broadcast_validation: Option<BroadcastValidation>,
    ) -> Result<(), BeaconClientError>;
}
