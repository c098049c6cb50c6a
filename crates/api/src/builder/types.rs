use ethereum_consensus::{primitives::BlsSignature, serde::as_str};
use serde::{Deserialize, Serialize};
use vela_common::{
    bid_submission::{BidTrace, SignedBidSubmission},
    eth::ExecutionPayload,
};

/// The validation request forwarded to the external block simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSimRequest {
    #[serde(with = "as_str")]
    pub registered_gas_limit: u64,
    pub message: BidTrace,
    pub execution_payload: ExecutionPayload,
    pub signature: BlsSignature,
}

impl BlockSimRequest {
    pub fn new(registered_gas_limit: u64, submission: &SignedBidSubmission) -> Self {
        Self {
            registered_gas_limit,
            message: submission.message.clone(),
            execution_payload: submission.execution_payload.clone(),
            signature: submission.signature.clone(),
        }
    }

    /// The demotion log stores the failing submission in full.
    pub fn to_submission(&self) -> SignedBidSubmission {
        SignedBidSubmission {
            message: self.message.clone(),
            execution_payload: self.execution_payload.clone(),
            signature: self.signature.clone(),
        }
    }
}
