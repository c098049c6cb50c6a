use std::sync::Arc;

use async_trait::async_trait;
use ethereum_consensus::primitives::Root;
use tokio::sync::broadcast::Sender;
use tracing::{error, warn};
use vela_common::{eth::SignedBeaconBlock, ValidatorSummary};

use crate::{
    error::BeaconClientError,
    traits::{BeaconClientTrait, MultiBeaconClientTrait},
    types::{
        BroadcastValidation, HeadEventData, ProposerDuty, RandaoResponse, StateId, SyncStatus,
    },
};

/// Fans requests out over several beacon nodes; reads pick the best-synced
/// answer, publishes succeed if any node accepts.
#[derive(Clone)]
pub struct MultiBeaconClient<B: BeaconClientTrait> {
    pub beacon_clients: Vec<Arc<B>>,
}

impl<B: BeaconClientTrait> MultiBeaconClient<B> {
    pub fn new(beacon_clients: Vec<Arc<B>>) -> Self {
        Self { beacon_clients }
    }
}

#[async_trait]
impl<B: BeaconClientTrait + 'static> MultiBeaconClientTrait for MultiBeaconClient<B> {
    async fn best_sync_status(&self) -> Result<SyncStatus, BeaconClientError> {
        let mut best: Option<SyncStatus> = None;

        for client in &self.beacon_clients {
            match client.sync_status().await {
                Ok(status) => {
                    if best.as_ref().map_or(true, |b| status.head_slot > b.head_slot) {
                        best = Some(status);
                    }
                }
                Err(err) => warn!(%err, uri = client.get_uri(), "failed to get sync status"),
            }
        }

        best.ok_or(BeaconClientError::NoBeaconClients)
    }

    async fn subscribe_to_head_events(&self, chan: Sender<HeadEventData>) {
        for client in &self.beacon_clients {
            let client = client.clone();
            let chan = chan.clone();
            tokio::spawn(async move {
                if let Err(err) = client.subscribe_to_head_events(chan).await {
                    error!(%err, uri = client.get_uri(), "head event subscription failed");
                }
            });
        }
    }

    async fn get_state_validators(
        &self,
        state_id: StateId,
    ) -> Result<Vec<ValidatorSummary>, BeaconClientError> {
        let mut last_error = BeaconClientError::NoBeaconClients;
        for client in &self.beacon_clients {
            match client.get_state_validators(state_id).await {
                Ok(validators) => return Ok(validators),
                Err(err) => last_error = err,
            }
        }
        Err(last_error)
    }

    async fn get_proposer_duties(
        &self,
        epoch: u64,
    ) -> Result<(Root, Vec<ProposerDuty>), BeaconClientError> {
        let mut last_error = BeaconClientError::NoBeaconClients;
        for client in &self.beacon_clients {
            match client.get_proposer_duties(epoch).await {
                Ok(duties) => return Ok(duties),
                Err(err) => last_error = err,
            }
        }
        Err(last_error)
    }

    async fn get_randao(&self, state_id: StateId) -> Result<RandaoResponse, BeaconClientError> {
        let mut last_error = BeaconClientError::NoBeaconClients;
        for client in &self.beacon_clients {
            match client.get_randao(state_id).await {
                Ok(randao) => return Ok(randao),
                Err(err) => last_error = err,
            }
        }
        Err(last_error)
    }

    async fn publish_block(
        &self,
        block: Arc<SignedBeaconBlock>,
        broadcast_validation: Option<BroadcastValidation>,
    ) -> Result<(), BeaconClientError> {
        let mut errors = Vec::new();
        for client in &self.beacon_clients {
            match client.publish_block(block.clone(), broadcast_validation).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(%err, uri = client.get_uri(), "failed to publish block");
                    errors.push(err.to_string());
                }
            }
        }
        Err(BeaconClientError::BroadcastFailed(errors.join("; ")))
    }
}
