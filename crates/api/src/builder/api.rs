use std::{sync::Arc, time::Duration};

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use bytes::Bytes;
use ethereum_consensus::primitives::U256;
use http::HeaderMap;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use uuid::Uuid;
use vela_beacon_client::MultiBeaconClientTrait;
use vela_common::{
    api::builder_api::BuilderGetValidatorsResponseEntry,
    bid_submission::SignedBidSubmission,
    builder_info::BuilderInfo,
    chain_info::ChainInfo,
    eth::{try_execution_header_from_payload, SignedBuilderBid},
    signing::RelaySigningContext,
    task,
    utils::utcnow_ns,
    RelayConfig, SubmissionTrace,
};
use vela_database::DatabaseService;
use vela_datastore::Auctioneer;
use vela_housekeeper::{CurrentSlotInfo, RandaoOracle};

use crate::builder::{
    decode::{decompress_body, peek_submission_info},
    error::BuilderApiError,
    simulator::{optimistic_simulator::OptimisticSimulator, traits::BlockSimulator},
    types::BlockSimRequest,
};

/// Response delay for silently dropped submissions, matching the latency
/// profile of an accepted one.
const SILENT_DROP_DELAY: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct BuilderApi<A, DB, S, M>
where
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
    S: BlockSimulator + 'static,
    M: MultiBeaconClientTrait + 'static,
{
    pub auctioneer: Arc<A>,
    pub db: Arc<DB>,
    pub chain_info: Arc<ChainInfo>,
    pub signing_context: Arc<RelaySigningContext>,
    pub simulator: OptimisticSimulator<S, A, DB>,
    pub curr_slot_info: CurrentSlotInfo,
    pub randao_oracle: RandaoOracle<M>,
    pub relay_config: Arc<RelayConfig>,
}

impl<A, DB, S, M> BuilderApi<A, DB, S, M>
where
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
    S: BlockSimulator + 'static,
    M: MultiBeaconClientTrait + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auctioneer: Arc<A>,
        db: Arc<DB>,
        chain_info: Arc<ChainInfo>,
        signing_context: Arc<RelaySigningContext>,
        simulator: OptimisticSimulator<S, A, DB>,
        curr_slot_info: CurrentSlotInfo,
        randao_oracle: RandaoOracle<M>,
        relay_config: Arc<RelayConfig>,
    ) -> Self {
        Self {
            auctioneer,
            db,
            chain_info,
            signing_context,
            simulator,
            curr_slot_info,
            randao_oracle,
            relay_config,
        }
    }

    /// Implements <https://flashbots.github.io/relay-specs/#/Builder/getValidators>
    pub async fn get_validators(
        Extension(api): Extension<Arc<BuilderApi<A, DB, S, M>>>,
    ) -> impl IntoResponse {
        Json(api.curr_slot_info.proposer_duties())
    }

    /// Implements <https://flashbots.github.io/relay-specs/#/Builder/submitBlock>
    pub async fn submit_block(
        Extension(api): Extension<Arc<BuilderApi<A, DB, S, M>>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<StatusCode, BuilderApiError> {
        let request_id = Uuid::new_v4();
        let mut trace = SubmissionTrace { receive: utcnow_ns(), ..Default::default() };

        if let Err(err) = api.handle_submit_block(&headers, body, &mut trace).await {
            warn!(%request_id, %err, "submission rejected");
            return Err(err);
        }

        debug!(
            %request_id,
            latency_ns = utcnow_ns().saturating_sub(trace.receive),
            is_optimistic = trace.is_optimistic,
            "submission accepted",
        );
        Ok(StatusCode::OK)
    }

    /// The submission pipeline. Ordering of the stages matters; see the
    /// stage comments.
    pub async fn handle_submit_block(
        &self,
        headers: &HeaderMap,
        body: Bytes,
        trace: &mut SubmissionTrace,
    ) -> Result<(), BuilderApiError> {
        // decode, gzip or raw
        let body = decompress_body(headers, body)?;
        if let Some(peek) = peek_submission_info(&body) {
            debug!(block_hash = %peek.block_hash, value = %peek.value, "received submission");
        }
        let mut submission: SignedBidSubmission = serde_json::from_slice(&body)?;
        trace.decode = utcnow_ns();

        self.process_submission(&mut submission, trace).await
    }

    pub async fn process_submission(
        &self,
        submission: &mut SignedBidSubmission,
        trace: &mut SubmissionTrace,
    ) -> Result<(), BuilderApiError> {
        let bid_slot = submission.slot();

        // slot gate: nothing is accepted at or before the delivered slot
        if let Some(last_slot_delivered) = self.auctioneer.get_last_slot_delivered().await? {
            if bid_slot <= last_slot_delivered {
                return Err(BuilderApiError::PayloadAlreadyDelivered);
            }
        }

        let builder_info = self.fetch_builder_info(submission).await;

        // block timestamp must sit exactly on the slot boundary
        let expected_timestamp = self.chain_info.slot_start_timestamp_in_secs(bid_slot);
        if submission.timestamp() != expected_timestamp {
            return Err(BuilderApiError::IncorrectTimestamp {
                got: submission.timestamp(),
                expected: expected_timestamp,
            });
        }

        // kick the randao refresh early if the submission is ahead of the oracle
        if bid_slot > self.randao_oracle.known_slot().unwrap_or_default() {
            self.randao_oracle.spawn_refresh(bid_slot);
        }

        // duty match
        let duty = self
            .curr_slot_info
            .duty_for_slot(bid_slot)
            .ok_or(BuilderApiError::ProposerDutyNotFound)?;
        self.sanity_check_duty(submission, &duty)?;

        // silent drops keep the latency profile of an accepted submission
        if builder_info.is_blacklisted {
            debug!(builder = ?submission.builder_public_key(), "builder is blacklisted");
            sleep(SILENT_DROP_DELAY).await;
            return Ok(());
        }
        if self.relay_config.low_prio_builders_disabled && !builder_info.is_high_prio {
            debug!(
                builder = ?submission.builder_public_key(),
                "low-prio builders currently disabled"
            );
            sleep(SILENT_DROP_DELAY).await;
            return Ok(());
        }

        let head_slot = self.curr_slot_info.head_slot();
        if bid_slot <= head_slot {
            return Err(BuilderApiError::SubmissionForPastSlot { head_slot, got: bid_slot });
        }

        // trivial submissions are accepted and ignored
        if submission.value() == U256::ZERO || submission.num_txs() == 0 {
            return Ok(());
        }

        // structural consistency
        submission.validate()?;
        trace.pre_checks = utcnow_ns();

        // the oracle must hold this exact slot's randao by now
        self.confirm_prev_randao(submission)?;

        // builder signature over the bid trace
        if let Err(err) = submission.verify_signature(&self.chain_info.context) {
            warn!(%err, "failed to verify submission signature");
            return Err(BuilderApiError::SignatureVerificationFailed);
        }
        trace.signature = utcnow_ns();

        // collateral branch: optimistic only inside the optimistic window
        let can_be_optimistic = builder_info.can_process_optimistically(submission.value()) &&
            bid_slot == self.curr_slot_info.optimistic_slot();

        let request = BlockSimRequest::new(duty.entry.message.gas_limit, submission);
        let was_optimistic =
            self.simulator.process_request(request, &builder_info, can_be_optimistic).await?;
        trace.simulation = utcnow_ns();
        trace.is_optimistic = was_optimistic;

        // staleness check: a later submission from this builder may have
        // overtaken this one while it was in the simulator
        if let Some(stored_received_at) = self
            .auctioneer
            .get_builder_latest_payload_received_at(
                bid_slot,
                submission.builder_public_key(),
                submission.parent_hash(),
                submission.proposer_public_key(),
            )
            .await?
        {
            if stored_received_at > trace.receive {
                return Err(BuilderApiError::AlreadyUsingNewerPayload);
            }
        }

        // relay-signed bid, then the ordered cache writes
        let mut payload = submission.execution_payload.clone();
        let header = try_execution_header_from_payload(&mut payload)
            .map_err(|_| BuilderApiError::InternalError)?;
        let signed_builder_bid = SignedBuilderBid::new(
            header,
            submission.value(),
            self.signing_context.public_key(),
            &self.signing_context.signing_key,
            &self.chain_info.context,
        )
        .map_err(|_| BuilderApiError::InternalError)?;

        self.auctioneer
            .save_bid_and_update_top_bid(submission, &signed_builder_bid, trace.receive)
            .await?;
        trace.cache_update = utcnow_ns();
        trace.eligible_at = trace.cache_update;
        trace.request_finish = utcnow_ns();

        // deferred audit write, never affects the response
        let db = self.db.clone();
        let submission = submission.clone();
        let trace = trace.clone();
        task::spawn(file!(), line!(), async move {
            if let Err(err) = db.store_block_submission(submission, trace).await {
                error!(%err, "failed to store block submission");
            }
        });

        Ok(())
    }

    /// Missing builder entries behave as a defaulted builder.
    async fn fetch_builder_info(&self, submission: &SignedBidSubmission) -> BuilderInfo {
        match self.auctioneer.get_builder_info(submission.builder_public_key()).await {
            Ok(info) => info,
            Err(_) => BuilderInfo::default(),
        }
    }

    fn sanity_check_duty(
        &self,
        submission: &SignedBidSubmission,
        duty: &BuilderGetValidatorsResponseEntry,
    ) -> Result<(), BuilderApiError> {
        if duty.entry.message.fee_recipient != *submission.proposer_fee_recipient() {
            return Err(BuilderApiError::FeeRecipientMismatch {
                got: submission.proposer_fee_recipient().clone(),
                expected: duty.entry.message.fee_recipient.clone(),
            });
        }

        if duty.entry.message.public_key != *submission.proposer_public_key() {
            return Err(BuilderApiError::ProposerPublicKeyMismatch {
                got: Box::new(submission.proposer_public_key().clone()),
                expected: Box::new(duty.entry.message.public_key.clone()),
            });
        }

        Ok(())
    }

    fn confirm_prev_randao(&self, submission: &SignedBidSubmission) -> Result<(), BuilderApiError> {
        let Some(expected) = self.randao_oracle.expected() else {
            return Err(BuilderApiError::PrevRandaoNotKnownYet);
        };
        if expected.slot != submission.slot() {
            // transient: the refresh kicked off earlier may still be in flight
            return Err(BuilderApiError::PrevRandaoNotKnownYet);
        }
        if expected.prev_randao != *submission.prev_randao() {
            return Err(BuilderApiError::PrevRandaoMismatch {
                got: format!("{:?}", submission.prev_randao()),
                expected: format!("{:?}", expected.prev_randao),
            });
        }
        Ok(())
    }
}
