use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ethereum_consensus::{
    builder::SignedValidatorRegistration,
    primitives::{BlsPublicKey, Hash32},
};
use vela_common::{
    api::{builder_api::BuilderGetValidatorsResponseEntry, data_api::BidFilters},
    bid_submission::{BidTrace, SignedBidSubmission},
    builder_info::BuilderInfo,
    eth::{ExecutionPayload, SignedBeaconBlock},
    GetHeaderTrace, GetPayloadTrace, SignedValidatorRegistrationEntry, SubmissionTrace,
    ValidatorSummary,
};

use crate::{
    error::DatabaseError,
    types::{BidSubmissionDocument, BuilderInfoDocument, DeliveredPayloadDocument, DemotionDocument},
};

#[async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait DatabaseService: Send + Sync + Clone {
    async fn save_validator_registrations(
        &self,
        entries: Vec<SignedValidatorRegistrationEntry>,
    ) -> Result<(), DatabaseError>;

    /// False when the stored registration's timestamp is at or past the
    /// incoming one: such a registration is a no-op.
    async fn is_registration_update_required(
        &self,
        registration: &SignedValidatorRegistration,
    ) -> Result<bool, DatabaseError>;

    async fn get_validator_registration(
        &self,
        pub_key: &BlsPublicKey,
    ) -> Result<Option<SignedValidatorRegistrationEntry>, DatabaseError>;

    async fn get_validator_registrations_for_pub_keys(
        &self,
        pub_keys: &[BlsPublicKey],
    ) -> Result<Vec<SignedValidatorRegistrationEntry>, DatabaseError>;

    async fn set_known_validators(
        &self,
        known_validators: Vec<ValidatorSummary>,
    ) -> Result<(), DatabaseError>;

    /// Bulk form of the known-validator check used by the registration
    /// pipeline: returns the subset of the given keys that are known.
    async fn check_known_validators(
        &self,
        public_keys: Vec<BlsPublicKey>,
    ) -> Result<HashSet<BlsPublicKey>, DatabaseError>;

    /// Hot path; served from the memory-resident set.
    fn is_known_validator(&self, public_key: &BlsPublicKey) -> bool;

    /// Resolves a proposer index to its pubkey, used by getPayload to identify
    /// the signer.
    fn known_validator_by_index(&self, index: u64) -> Option<BlsPublicKey>;

    async fn set_proposer_duties(
        &self,
        proposer_duties: Vec<BuilderGetValidatorsResponseEntry>,
    ) -> Result<(), DatabaseError>;

    async fn get_proposer_duties(
        &self,
    ) -> Result<Vec<BuilderGetValidatorsResponseEntry>, DatabaseError>;

    async fn get_all_builder_infos(&self) -> Result<Vec<BuilderInfoDocument>, DatabaseError>;

    async fn get_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
    ) -> Result<Option<BuilderInfoDocument>, DatabaseError>;

    async fn store_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
        builder_info: &BuilderInfo,
    ) -> Result<(), DatabaseError>;

    /// Inserts a demotion row carrying the failed submission and the
    /// simulation error, and flips the builder's demoted bit.
    async fn db_demote_builder(
        &self,
        submission: &SignedBidSubmission,
        reason: String,
    ) -> Result<(), DatabaseError>;

    async fn get_builder_demotion(
        &self,
        bid_trace: &BidTrace,
    ) -> Result<Option<DemotionDocument>, DatabaseError>;

    /// Fills the refund-justification columns of an existing demotion row.
    async fn update_builder_demotion(
        &self,
        bid_trace: &BidTrace,
        signed_beacon_block: &SignedBeaconBlock,
        registration: &SignedValidatorRegistration,
    ) -> Result<(), DatabaseError>;

    /// Persists the submission audit row and bumps the builder's submission
    /// counter in one transaction.
    async fn store_block_submission(
        &self,
        submission: SignedBidSubmission,
        trace: SubmissionTrace,
    ) -> Result<(), DatabaseError>;

    async fn save_delivered_payload(
        &self,
        bid_trace: &BidTrace,
        payload: Arc<ExecutionPayload>,
        latency_trace: &GetPayloadTrace,
    ) -> Result<(), DatabaseError>;

    async fn save_get_header_call(
        &self,
        slot: u64,
        parent_hash: Hash32,
        public_key: BlsPublicKey,
        best_block_hash: Hash32,
        trace: GetHeaderTrace,
    ) -> Result<(), DatabaseError>;

    async fn get_bids(
        &self,
        filters: &BidFilters,
    ) -> Result<Vec<BidSubmissionDocument>, DatabaseError>;

    async fn get_delivered_payloads(
        &self,
        filters: &BidFilters,
    ) -> Result<Vec<DeliveredPayloadDocument>, DatabaseError>;
}
