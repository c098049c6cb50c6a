use ethereum_consensus::primitives::{BlsPublicKey, Hash32};
use serde::{Deserialize, Serialize};

/// Path parameters of `GET /eth/v1/builder/header/{slot}/{parent_hash}/{pubkey}`.
/// Hex fields are length-validated by their typed deserializers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetHeaderParams {
    pub slot: u64,
    pub parent_hash: Hash32,
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
}
