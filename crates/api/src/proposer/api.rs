use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use ethereum_consensus::primitives::{BlsPublicKey, U256};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use vela_beacon_client::{types::BroadcastValidation, MultiBeaconClientTrait};
use vela_common::{
    api::proposer_api::GetHeaderParams,
    bid_submission::BidTrace,
    chain_info::ChainInfo,
    eth::{unblind_beacon_block, ExecutionPayload, SignedBeaconBlock, SignedBlindedBeaconBlock},
    task::{self, WaitGroup},
    utils::utcnow_ns,
    GetPayloadTrace, RelayConfig,
};
use vela_database::DatabaseService;
use vela_datastore::Auctioneer;
use vela_housekeeper::CurrentSlotInfo;

use crate::proposer::{error::ProposerApiError, register::RegistrationProcessor};

/// One retry covers the cache-replication lag between the instance that
/// accepted the winning bid and this one.
const PAYLOAD_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct ProposerApi<A, DB, M>
where
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
    M: MultiBeaconClientTrait + 'static,
{
    pub auctioneer: Arc<A>,
    pub db: Arc<DB>,
    pub multi_beacon_client: Arc<M>,
    pub chain_info: Arc<ChainInfo>,
    pub curr_slot_info: CurrentSlotInfo,
    pub registration_processor: RegistrationProcessor<A, DB>,
    pub relay_config: Arc<RelayConfig>,

    /// Outstanding optimistic simulations; the refund check waits on this.
    pub optimistic_blocks: WaitGroup,
    /// In-flight getPayload calls, drained during shutdown.
    pub payload_calls_in_flight: WaitGroup,
    /// Once set, getHeader serves nothing; getPayload keeps working.
    pub no_more_headers: Arc<AtomicBool>,
}

impl<A, DB, M> ProposerApi<A, DB, M>
where
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
    M: MultiBeaconClientTrait + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auctioneer: Arc<A>,
        db: Arc<DB>,
        multi_beacon_client: Arc<M>,
        chain_info: Arc<ChainInfo>,
        curr_slot_info: CurrentSlotInfo,
        registration_processor: RegistrationProcessor<A, DB>,
        relay_config: Arc<RelayConfig>,
        optimistic_blocks: WaitGroup,
    ) -> Self {
        Self {
            auctioneer,
            db,
            multi_beacon_client,
            chain_info,
            curr_slot_info,
            registration_processor,
            relay_config,
            optimistic_blocks,
            payload_calls_in_flight: WaitGroup::new(),
            no_more_headers: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Implements <https://ethereum.github.io/builder-specs/#/Builder/status>
    pub async fn status(
        Extension(_api): Extension<Arc<ProposerApi<A, DB, M>>>,
    ) -> impl IntoResponse {
        StatusCode::OK
    }

    /// Implements <https://ethereum.github.io/builder-specs/#/Builder/registerValidator>
    pub async fn register_validators(
        Extension(api): Extension<Arc<ProposerApi<A, DB, M>>>,
        body: Bytes,
    ) -> Result<StatusCode, ProposerApiError> {
        let receive = utcnow_ns();
        let num_enqueued = api.registration_processor.process_batch(&body).await?;

        debug!(
            num_enqueued,
            head_slot = api.curr_slot_info.head_slot(),
            latency_ns = utcnow_ns().saturating_sub(receive),
            "processed validator registrations",
        );
        Ok(StatusCode::OK)
    }

    /// Implements <https://ethereum.github.io/builder-specs/#/Builder/getHeader>
    pub async fn get_header(
        Extension(api): Extension<Arc<ProposerApi<A, DB, M>>>,
        Path(params): Path<GetHeaderParams>,
    ) -> Result<Response, ProposerApiError> {
        if api.no_more_headers.load(Ordering::Relaxed) ||
            api.auctioneer.kill_switch_enabled().await?
        {
            return Ok(StatusCode::NO_CONTENT.into_response());
        }

        let head_slot = api.curr_slot_info.head_slot();
        if params.slot < head_slot {
            return Err(ProposerApiError::RequestForPastSlot {
                request_slot: params.slot,
                head_slot,
            });
        }

        let best_bid = api
            .auctioneer
            .get_best_bid(params.slot, &params.parent_hash, &params.public_key)
            .await?;

        match best_bid {
            Some(bid) if bid.value() > U256::ZERO => {
                info!(
                    slot = params.slot,
                    value = %bid.value(),
                    block_hash = ?bid.block_hash(),
                    "serving bid",
                );

                let db = api.db.clone();
                let block_hash = bid.block_hash().clone();
                let trace = vela_common::GetHeaderTrace {
                    receive: utcnow_ns(),
                    ..Default::default()
                };
                task::spawn(file!(), line!(), async move {
                    if let Err(err) = db
                        .save_get_header_call(
                            params.slot,
                            params.parent_hash,
                            params.public_key,
                            block_hash,
                            trace,
                        )
                        .await
                    {
                        error!(%err, "failed to save get_header call");
                    }
                });

                Ok(Json(bid).into_response())
            }
            _ => Ok(StatusCode::NO_CONTENT.into_response()),
        }
    }

    /// Implements <https://ethereum.github.io/builder-specs/#/Builder/submitBlindedBlock>
    pub async fn get_payload(
        Extension(api): Extension<Arc<ProposerApi<A, DB, M>>>,
        body: Bytes,
    ) -> Result<Json<ExecutionPayload>, ProposerApiError> {
        let request_id = Uuid::new_v4();
        let mut trace = GetPayloadTrace { receive: utcnow_ns(), ..Default::default() };

        let signed_blinded_block: SignedBlindedBeaconBlock = serde_json::from_slice(&body)?;
        debug!(
            %request_id,
            slot = signed_blinded_block.slot(),
            block_hash = ?signed_blinded_block.block_hash(),
            "received blinded block",
        );

        let _guard = api.payload_calls_in_flight.enter();
        match api.handle_get_payload(signed_blinded_block, &mut trace).await {
            Ok(payload) => Ok(Json(payload)),
            Err(err) => {
                warn!(%request_id, %err, "get_payload failed");
                Err(err)
            }
        }
    }

    pub async fn handle_get_payload(
        &self,
        mut signed_blinded_block: SignedBlindedBeaconBlock,
        trace: &mut GetPayloadTrace,
    ) -> Result<ExecutionPayload, ProposerApiError> {
        let slot = signed_blinded_block.slot();
        let block_hash = signed_blinded_block.block_hash().clone();

        let head_slot = self.curr_slot_info.head_slot();
        if slot <= head_slot {
            return Err(ProposerApiError::RequestForPastSlot { request_slot: slot, head_slot });
        }

        // the signer is identified by index, not trusted from the body
        let proposer_public_key = self
            .db
            .known_validator_by_index(signed_blinded_block.proposer_index())
            .ok_or(ProposerApiError::UnknownProposerIndex(
                signed_blinded_block.proposer_index(),
            ))?;
        trace.proposer_index_validated = utcnow_ns();

        // commitment point: from here the proposer is bound to this bid
        if let Err(err) = signed_blinded_block.verify_signature(
            &proposer_public_key,
            self.chain_info.genesis_validators_root.clone(),
            &self.chain_info.context,
        ) {
            warn!(%err, slot, "invalid blinded block signature");
            return Err(ProposerApiError::InvalidSignature);
        }
        trace.signature_validated = utcnow_ns();

        let payload = self
            .get_execution_payload(slot, &proposer_public_key, &block_hash)
            .await
            .ok_or_else(|| {
                error!(slot, ?block_hash, "no execution payload found");
                ProposerApiError::NoExecutionPayloadFound
            })?;
        trace.payload_fetched = utcnow_ns();

        self.auctioneer.check_and_set_last_slot_and_hash_delivered(slot, &block_hash).await?;

        let unblinded_block = match unblind_beacon_block(&signed_blinded_block, &payload) {
            Ok(block) => Arc::new(block),
            Err(err) => {
                error!(%err, slot, "blinded block does not match stored payload");
                return Err(ProposerApiError::BlindedBlockAndPayloadHeaderMismatch);
            }
        };
        trace.validation_complete = utcnow_ns();

        let api = self.clone();
        let background_payload = Arc::new(payload.clone());
        let background_trace = trace.clone();
        task::spawn(file!(), line!(), async move {
            api.process_delivered_payload(
                unblinded_block,
                background_payload,
                proposer_public_key,
                background_trace,
            )
            .await;
        });

        info!(slot, ?block_hash, "delivering payload");
        Ok(payload)
    }

    async fn get_execution_payload(
        &self,
        slot: u64,
        proposer_public_key: &BlsPublicKey,
        block_hash: &ethereum_consensus::primitives::Hash32,
    ) -> Option<ExecutionPayload> {
        for attempt in 0..2 {
            match self
                .auctioneer
                .get_execution_payload(slot, proposer_public_key, block_hash)
                .await
            {
                Ok(Some(payload)) => return Some(payload),
                Ok(None) => {
                    warn!(slot, attempt, "execution payload not found, retrying");
                }
                Err(err) => {
                    error!(%err, slot, attempt, "error fetching execution payload");
                }
            }

            if attempt == 0 {
                sleep(PAYLOAD_RETRY_DELAY).await;
            }
        }
        None
    }

    /// Runs after the payload has been revealed: publish, persist, and close
    /// the demotion-refund window for the slot.
    async fn process_delivered_payload(
        &self,
        unblinded_block: Arc<SignedBeaconBlock>,
        payload: Arc<ExecutionPayload>,
        proposer_public_key: BlsPublicKey,
        mut trace: GetPayloadTrace,
    ) {
        let slot = unblinded_block.message.slot;
        let block_hash = payload.block_hash.clone();

        if self.relay_config.disable_block_publishing {
            debug!(slot, "block publishing disabled");
        } else if let Err(err) = self
            .multi_beacon_client
            .publish_block(
                unblinded_block.clone(),
                Some(BroadcastValidation::ConsensusAndEquivocation),
            )
            .await
        {
            error!(%err, slot, "failed to publish block");
        }
        trace.beacon_client_broadcast = utcnow_ns();

        let bid_trace = match self
            .auctioneer
            .get_bid_trace(slot, &proposer_public_key, &block_hash)
            .await
        {
            Ok(Some(bid_trace)) => bid_trace,
            Ok(None) => {
                error!(slot, ?block_hash, "bid trace not found for delivered payload");
                return;
            }
            Err(err) => {
                error!(%err, slot, "error fetching bid trace");
                return;
            }
        };

        trace.on_deliver_payload = utcnow_ns();
        if let Err(err) =
            self.db.save_delivered_payload(&bid_trace, payload.clone(), &trace).await
        {
            error!(%err, slot, "failed to save delivered payload");
        }

        // no refund decision while this slot's optimistic simulations are
        // still running
        self.optimistic_blocks.wait().await;

        if let Err(err) = self.finalise_demotion_refund(&bid_trace, &unblinded_block).await {
            error!(%err, slot, "failed to finalise demotion refund");
        }
    }

    /// If the delivered block belongs to a demoted builder, attach the refund
    /// justification to the demotion row.
    async fn finalise_demotion_refund(
        &self,
        bid_trace: &BidTrace,
        unblinded_block: &SignedBeaconBlock,
    ) -> Result<(), ProposerApiError> {
        let Some(demotion) = self.db.get_builder_demotion(bid_trace).await? else {
            return Ok(());
        };

        info!(
            slot = bid_trace.slot,
            builder = ?demotion.builder_pub_key,
            "demotion found for delivered payload, attaching refund justification",
        );

        let registration = self
            .db
            .get_validator_registration(&bid_trace.proposer_public_key)
            .await?
            .ok_or(ProposerApiError::UnknownValidator)?;

        self.db
            .update_builder_demotion(bid_trace, unblinded_block, &registration.registration)
            .await?;
        Ok(())
    }
}
