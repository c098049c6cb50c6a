use ethereum_consensus::{
    builder::SignedValidatorRegistration,
    primitives::{BlsPublicKey, Hash32},
};
use serde::{Deserialize, Serialize};
use vela_common::{bid_submission::BidTrace, builder_info::BuilderInfo, eth::SignedBeaconBlock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderInfoDocument {
    pub pub_key: BlsPublicKey,
    pub builder_info: BuilderInfo,
}

/// One accepted submission as stored in the audit table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidSubmissionDocument {
    pub bid_trace: BidTrace,
    pub block_number: u64,
    pub num_txs: usize,
    pub timestamp_ms: u64,
    pub optimistic_submission: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveredPayloadDocument {
    pub bid_trace: BidTrace,
    pub block_number: u64,
    pub num_txs: usize,
}

/// A demotion log row. The refund-justification columns start out empty and
/// are filled if the demoted builder's block ends up delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemotionDocument {
    pub slot: u64,
    pub builder_pub_key: BlsPublicKey,
    pub block_hash: Hash32,
    pub sim_error: String,
    pub signed_beacon_block: Option<SignedBeaconBlock>,
    pub signed_validator_registration: Option<SignedValidatorRegistration>,
}
