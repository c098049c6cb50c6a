use ethereum_consensus::{
    primitives::{BlsPublicKey, ExecutionAddress, Hash32, U256},
    serde::as_str,
};
use serde::{Deserialize, Serialize};

/// Normalised filter set shared by the data-API queries.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct BidFilters {
    pub slot: Option<u64>,
    pub cursor: Option<u64>,
    pub limit: Option<u64>,
    pub block_hash: Option<Hash32>,
    pub block_number: Option<u64>,
    pub proposer_pubkey: Option<BlsPublicKey>,
    pub builder_pubkey: Option<BlsPublicKey>,
    /// 1 = ascending by value, -1 = descending by value.
    pub order_by: Option<i8>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProposerPayloadDeliveredParams {
    pub slot: Option<u64>,
    pub cursor: Option<u64>,
    pub limit: Option<u64>,
    pub block_hash: Option<Hash32>,
    pub block_number: Option<u64>,
    pub proposer_pubkey: Option<BlsPublicKey>,
    pub builder_pubkey: Option<BlsPublicKey>,
    pub order_by: Option<String>,
}

impl From<ProposerPayloadDeliveredParams> for BidFilters {
    fn from(value: ProposerPayloadDeliveredParams) -> Self {
        BidFilters {
            slot: value.slot,
            cursor: value.cursor,
            limit: value.limit,
            block_hash: value.block_hash,
            block_number: value.block_number,
            proposer_pubkey: value.proposer_pubkey,
            builder_pubkey: value.builder_pubkey,
            order_by: match value.order_by.as_deref() {
                Some("value") => Some(1),
                Some("-value") => Some(-1),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BuilderBlocksReceivedParams {
    pub slot: Option<u64>,
    pub block_hash: Option<Hash32>,
    pub block_number: Option<u64>,
    pub builder_pubkey: Option<BlsPublicKey>,
    pub limit: Option<u64>,
}

impl From<BuilderBlocksReceivedParams> for BidFilters {
    fn from(value: BuilderBlocksReceivedParams) -> Self {
        BidFilters {
            slot: value.slot,
            cursor: None,
            limit: value.limit,
            block_hash: value.block_hash,
            block_number: value.block_number,
            proposer_pubkey: None,
            builder_pubkey: value.builder_pubkey,
            order_by: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveredPayloadsResponse {
    #[serde(with = "as_str")]
    pub slot: u64,
    pub parent_hash: Hash32,
    pub block_hash: Hash32,
    pub builder_pubkey: BlsPublicKey,
    pub proposer_pubkey: BlsPublicKey,
    pub proposer_fee_recipient: ExecutionAddress,
    #[serde(with = "as_str")]
    pub gas_limit: u64,
    #[serde(with = "as_str")]
    pub gas_used: u64,
    #[serde(with = "as_str")]
    pub value: U256,
    #[serde(with = "as_str")]
    pub block_number: u64,
    #[serde(with = "as_str")]
    pub num_tx: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedBlocksResponse {
    #[serde(with = "as_str")]
    pub slot: u64,
    pub parent_hash: Hash32,
    pub block_hash: Hash32,
    pub builder_pubkey: BlsPublicKey,
    pub proposer_pubkey: BlsPublicKey,
    pub proposer_fee_recipient: ExecutionAddress,
    #[serde(with = "as_str")]
    pub gas_limit: u64,
    #[serde(with = "as_str")]
    pub gas_used: u64,
    #[serde(with = "as_str")]
    pub value: U256,
    #[serde(with = "as_str")]
    pub block_number: u64,
    #[serde(with = "as_str")]
    pub num_tx: usize,
    #[serde(with = "as_str")]
    pub timestamp_ms: u64,
    pub optimistic_submission: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ValidatorRegistrationParams {
    pub pubkey: BlsPublicKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_by_maps_to_signed_flag() {
        let params = ProposerPayloadDeliveredParams {
            slot: Some(1),
            cursor: None,
            limit: None,
            block_hash: None,
            block_number: None,
            proposer_pubkey: None,
            builder_pubkey: None,
            order_by: Some("-value".to_string()),
        };
        let filters: BidFilters = params.into();
        assert_eq!(filters.order_by, Some(-1));
    }
}
