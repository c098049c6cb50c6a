use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    Json,
};
use moka::sync::Cache;
use tracing::warn;
use vela_common::api::data_api::{
    BuilderBlocksReceivedParams, DeliveredPayloadsResponse, ProposerPayloadDeliveredParams,
    ReceivedBlocksResponse, ValidatorRegistrationParams,
};
use vela_database::DatabaseService;

use crate::relay_data::error::DataApiError;

const MAX_LIMIT_DELIVERED: u64 = 200;
const MAX_LIMIT_BIDS: u64 = 500;

pub(crate) type BidsCache = Cache<String, Vec<ReceivedBlocksResponse>>;
pub(crate) type DeliveredPayloadsCache = Cache<String, Vec<DeliveredPayloadsResponse>>;

#[derive(Clone)]
pub struct DataApi<DB: DatabaseService> {
    db: Arc<DB>,
}

impl<DB: DatabaseService + 'static> DataApi<DB> {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    /// Implements <https://flashbots.github.io/relay-specs/#/Data/getDeliveredPayloads>
    pub async fn proposer_payload_delivered(
        Extension(data_api): Extension<Arc<DataApi<DB>>>,
        Extension(cache): Extension<Arc<DeliveredPayloadsCache>>,
        Query(params): Query<ProposerPayloadDeliveredParams>,
    ) -> Result<impl IntoResponse, DataApiError> {
        if params.slot.is_some() && params.cursor.is_some() {
            return Err(DataApiError::SlotAndCursor);
        }

        if params.limit.map_or(false, |limit| limit > MAX_LIMIT_DELIVERED) {
            return Err(DataApiError::LimitReached { max: MAX_LIMIT_DELIVERED });
        }

        let cache_key = format!("{params:?}");
        if let Some(cached_result) = cache.get(&cache_key) {
            return Ok(Json(cached_result));
        }

        match data_api.db.get_delivered_payloads(&params.into()).await {
            Ok(result) => {
                let response: Vec<DeliveredPayloadsResponse> = result
                    .into_iter()
                    .map(|doc| DeliveredPayloadsResponse {
                        slot: doc.bid_trace.slot,
                        parent_hash: doc.bid_trace.parent_hash,
                        block_hash: doc.bid_trace.block_hash,
                        builder_pubkey: doc.bid_trace.builder_public_key,
                        proposer_pubkey: doc.bid_trace.proposer_public_key,
                        proposer_fee_recipient: doc.bid_trace.proposer_fee_recipient,
                        gas_limit: doc.bid_trace.gas_limit,
                        gas_used: doc.bid_trace.gas_used,
                        value: doc.bid_trace.value,
                        block_number: doc.block_number,
                        num_tx: doc.num_txs,
                    })
                    .collect();

                cache.insert(cache_key, response.clone());
                Ok(Json(response))
            }
            Err(err) => {
                warn!(%err, "failed to fetch delivered payloads");
                Err(DataApiError::InternalServerError)
            }
        }
    }

    /// Implements <https://flashbots.github.io/relay-specs/#/Data/getReceivedBids>
    pub async fn builder_bids_received(
        Extension(data_api): Extension<Arc<DataApi<DB>>>,
        Extension(cache): Extension<Arc<BidsCache>>,
        Query(params): Query<BuilderBlocksReceivedParams>,
    ) -> Result<impl IntoResponse, DataApiError> {
        if params.slot.is_none() &&
            params.block_hash.is_none() &&
            params.block_number.is_none() &&
            params.builder_pubkey.is_none()
        {
            return Err(DataApiError::MissingFilter);
        }

        if params.limit.map_or(false, |limit| limit > MAX_LIMIT_BIDS) {
            return Err(DataApiError::LimitReached { max: MAX_LIMIT_BIDS });
        }

        let cache_key = format!("{params:?}");
        if let Some(cached_result) = cache.get(&cache_key) {
            return Ok(Json(cached_result));
        }

        match data_api.db.get_bids(&params.into()).await {
            Ok(result) => {
                let response: Vec<ReceivedBlocksResponse> = result
                    .into_iter()
                    .map(|doc| ReceivedBlocksResponse {
                        slot: doc.bid_trace.slot,
                        parent_hash: doc.bid_trace.parent_hash,
                        block_hash: doc.bid_trace.block_hash,
                        builder_pubkey: doc.bid_trace.builder_public_key,
                        proposer_pubkey: doc.bid_trace.proposer_public_key,
                        proposer_fee_recipient: doc.bid_trace.proposer_fee_recipient,
                        gas_limit: doc.bid_trace.gas_limit,
                        gas_used: doc.bid_trace.gas_used,
                        value: doc.bid_trace.value,
                        block_number: doc.block_number,
                        num_tx: doc.num_txs,
                        timestamp_ms: doc.timestamp_ms,
                        optimistic_submission: doc.optimistic_submission,
                    })
                    .collect();

                cache.insert(cache_key, response.clone());
                Ok(Json(response))
            }
            Err(err) => {
                warn!(%err, "failed to fetch bids");
                Err(DataApiError::InternalServerError)
            }
        }
    }

    /// Implements <https://flashbots.github.io/relay-specs/#/Data/getValidatorRegistration>
    pub async fn validator_registration(
        Extension(data_api): Extension<Arc<DataApi<DB>>>,
        Query(params): Query<ValidatorRegistrationParams>,
    ) -> Result<impl IntoResponse, DataApiError> {
        match data_api.db.get_validator_registration(&params.pubkey).await {
            Ok(Some(entry)) => Ok(Json(entry.registration)),
            Ok(None) => Err(DataApiError::RegistrationNotFound),
            Err(err) => {
                warn!(%err, "failed to get validator registration");
                Err(DataApiError::InternalServerError)
            }
        }
    }
}
