use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ethereum_consensus::primitives::Root;
use futures_util::StreamExt;
use reqwest_eventsource::EventSource;
use tokio::{sync::broadcast::Sender, time::sleep};
use tracing::{error, warn};
use url::Url;
use vela_common::{eth::SignedBeaconBlock, ValidatorSummary};

use crate::{
    error::BeaconClientError,
    traits::BeaconClientTrait,
    types::{
        ApiResult, BeaconResponse, BroadcastValidation, HeadEventData, ProposerDutiesResponse,
        ProposerDuty, RandaoResponse, StateId, SyncStatus,
    },
};

#[derive(Clone, Debug)]
pub struct BeaconClient {
    pub http: reqwest::Client,
    pub endpoint: Url,
}

impl BeaconClient {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn from_endpoint_str(endpoint: &str) -> Result<Self, BeaconClientError> {
        let endpoint = Url::parse(endpoint)?;
        Ok(Self::new(reqwest::Client::new(), endpoint))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, BeaconClientError> {
        let target = self.endpoint.join(path)?;
        let result: ApiResult<T> = self.http.get(target).send().await?.json().await?;
        match result {
            ApiResult::Ok(result) => Ok(result),
            ApiResult::Err(err) => Err(err.into()),
        }
    }

    /// Forwards SSE events from the beacon node's `events` endpoint into the
    /// channel, reconnecting on stream errors.
    async fn subscribe_to_sse<T: serde::de::DeserializeOwned>(
        &self,
        topic: &str,
        chan: Sender<T>,
    ) -> Result<(), BeaconClientError> {
        let url = format!("{}eth/v1/events?topics={}", self.endpoint, topic);

        loop {
            let mut es = EventSource::get(&url);

            while let Some(event) = es.next().await {
                match event {
                    Ok(reqwest_eventsource::Event::Message(message)) => {
                        match serde_json::from_str::<T>(&message.data) {
                            Ok(data) => {
                                let _ = chan.send(data);
                            }
                            Err(err) => {
                                warn!(%err, topic, "failed to parse event")
                            }
                        }
                    }
                    Ok(reqwest_eventsource::Event::Open) => {}
                    Err(err) => {
                        error!(%err, topic, "event stream error, reconnecting");
                        break;
                    }
                }
            }

            sleep(Duration::from_secs(1)).await;
        }
    }
}

#[async_trait]
impl BeaconClientTrait for BeaconClient {
    async fn sync_status(&self) -> Result<SyncStatus, BeaconClientError> {
        let response: BeaconResponse<SyncStatus> = self.get("eth/v1/node/syncing").await?;
        Ok(response.data)
    }

    async fn subscribe_to_head_events(
        &self,
        chan: Sender<HeadEventData>,
    ) -> Result<(), BeaconClientError> {
        self.subscribe_to_sse("head", chan).await
    }

    async fn get_state_validators(
        &self,
        state_id: StateId,
    ) -> Result<Vec<ValidatorSummary>, BeaconClientError> {
        let endpoint = format!("eth/v1/beacon/states/{state_id}/validators");
        let response: BeaconResponse<Vec<ValidatorSummary>> = self.get(&endpoint).await?;
        Ok(response.data)
    }

    async fn get_proposer_duties(
        &self,
        epoch: u64,
    ) -> Result<(Root, Vec<ProposerDuty>), BeaconClientError> {
        let endpoint = format!("eth/v1/validator/duties/proposer/{epoch}");
        let response: ProposerDutiesResponse = self.get(&endpoint).await?;
        Ok((response.dependent_root, response.data))
    }

    async fn get_randao(&self, state_id: StateId) -> Result<RandaoResponse, BeaconClientError> {
        let endpoint = format!("eth/v1/beacon/states/{state_id}/randao");
        let response: BeaconResponse<RandaoResponse> = self.get(&endpoint).await?;
        Ok(response.data)
    }

    async fn publish_block(
        &self,
        block: Arc<SignedBeaconBlock>,
        broadcast_validation: Option<BroadcastValidation>,
    ) -> Result<(), BeaconClientError> {
        let path = match broadcast_validation {
            Some(validation) => {
                format!("eth/v2/beacon/blocks?broadcast_validation={validation}")
            }
            None => "eth/v1/beacon/blocks".to_string(),
        };
        let target = self.endpoint.join(&path)?;
        let response = self.http.post(target).json(block.as_ref()).send().await?;

        match response.status() {
            reqwest::StatusCode::OK | reqwest::StatusCode::ACCEPTED => Ok(()),
            _ => {
                let api_err = response.json().await?;
                Err(BeaconClientError::Api(api_err))
            }
        }
    }

    fn get_uri(&self) -> String {
        self.endpoint.to_string()
    }
}
