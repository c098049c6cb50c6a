use ethereum_consensus::{
    primitives::{BlsPublicKey, BlsSignature, Bytes32, ExecutionAddress, Hash32, Slot, U256},
    serde::as_str,
    ssz::prelude::*,
    state_transition::Context,
    Error,
};

use crate::{
    eth::execution_payload::ExecutionPayload,
    signing::verify_signed_builder_message,
};

/// The non-forgeable summary of a builder bid, signed by the builder.
#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct BidTrace {
    #[serde(with = "as_str")]
    pub slot: Slot,
    pub parent_hash: Hash32,
    pub block_hash: Hash32,
    #[serde(rename = "builder_pubkey")]
    pub builder_public_key: BlsPublicKey,
    #[serde(rename = "proposer_pubkey")]
    pub proposer_public_key: BlsPublicKey,
    pub proposer_fee_recipient: ExecutionAddress,
    #[serde(with = "as_str")]
    pub gas_limit: u64,
    #[serde(with = "as_str")]
    pub gas_used: u64,
    #[serde(with = "as_str")]
    pub value: U256,
}

/// A full builder submission: bid trace + execution payload + builder signature
/// over the trace.
#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct SignedBidSubmission {
    pub message: BidTrace,
    pub execution_payload: ExecutionPayload,
    pub signature: BlsSignature,
}

impl SignedBidSubmission {
    pub fn slot(&self) -> Slot {
        self.message.slot
    }

    pub fn parent_hash(&self) -> &Hash32 {
        &self.message.parent_hash
    }

    pub fn block_hash(&self) -> &Hash32 {
        &self.message.block_hash
    }

    pub fn builder_public_key(&self) -> &BlsPublicKey {
        &self.message.builder_public_key
    }

    pub fn proposer_public_key(&self) -> &BlsPublicKey {
        &self.message.proposer_public_key
    }

    pub fn proposer_fee_recipient(&self) -> &ExecutionAddress {
        &self.message.proposer_fee_recipient
    }

    pub fn value(&self) -> U256 {
        self.message.value
    }

    pub fn timestamp(&self) -> u64 {
        self.execution_payload.timestamp
    }

    pub fn prev_randao(&self) -> &Bytes32 {
        &self.execution_payload.prev_randao
    }

    pub fn num_txs(&self) -> usize {
        self.execution_payload.transactions.len()
    }

    /// Verifies the builder's signature over the bid trace (builder domain).
    pub fn verify_signature(&mut self, context: &Context) -> Result<(), Error> {
        let public_key = self.message.builder_public_key.clone();
        verify_signed_builder_message(&mut self.message, &self.signature, &public_key, context)
    }

    /// Structural consistency between the trace and the payload.
    pub fn validate(&self) -> Result<(), BidValidationError> {
        if self.message.block_hash != self.execution_payload.block_hash {
            return Err(BidValidationError::BlockHashMismatch {
                message: self.message.block_hash.clone(),
                payload: self.execution_payload.block_hash.clone(),
            });
        }

        if self.message.parent_hash != self.execution_payload.parent_hash {
            return Err(BidValidationError::ParentHashMismatch {
                message: self.message.parent_hash.clone(),
                payload: self.execution_payload.parent_hash.clone(),
            });
        }

        if self.message.gas_limit != self.execution_payload.gas_limit {
            return Err(BidValidationError::GasLimitMismatch {
                message: self.message.gas_limit,
                payload: self.execution_payload.gas_limit,
            });
        }

        if self.execution_payload.gas_used > self.execution_payload.gas_limit {
            return Err(BidValidationError::GasUsedOverLimit {
                gas_used: self.execution_payload.gas_used,
                gas_limit: self.execution_payload.gas_limit,
            });
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BidValidationError {
    #[error("block hash mismatch. message: {message:?}, payload: {payload:?}")]
    BlockHashMismatch { message: Hash32, payload: Hash32 },

    #[error("parent hash mismatch. message: {message:?}, payload: {payload:?}")]
    ParentHashMismatch { message: Hash32, payload: Hash32 },

    #[error("gas limit mismatch. message: {message}, payload: {payload}")]
    GasLimitMismatch { message: u64, payload: u64 },

    #[error("gas used ({gas_used}) above gas limit ({gas_limit})")]
    GasUsedOverLimit { gas_used: u64, gas_limit: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_trace_json_round_trip() {
        let trace = BidTrace {
            slot: 101,
            gas_limit: 30_000_000,
            gas_used: 21_000,
            value: U256::from(5u64),
            ..Default::default()
        };

        let encoded = serde_json::to_string(&trace).unwrap();
        assert!(encoded.contains("\"slot\":\"101\""));
        assert!(encoded.contains("\"value\":\"5\""));
        assert!(encoded.contains("\"builder_pubkey\""));

        let decoded: BidTrace = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.slot, 101);
        assert_eq!(decoded.value, U256::from(5u64));
    }

    #[test]
    fn validate_rejects_inconsistent_hashes() {
        let mut submission = SignedBidSubmission::default();
        submission.message.gas_limit = 30_000_000;
        submission.execution_payload.gas_limit = 30_000_000;
        assert!(submission.validate().is_ok());

        submission.message.block_hash = Hash32::try_from([0xbb; 32].as_slice()).unwrap();
        assert!(matches!(
            submission.validate(),
            Err(BidValidationError::BlockHashMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_gas_used_over_limit() {
        let mut submission = SignedBidSubmission::default();
        submission.message.gas_limit = 1_000;
        submission.execution_payload.gas_limit = 1_000;
        submission.execution_payload.gas_used = 2_000;
        assert!(matches!(
            submission.validate(),
            Err(BidValidationError::GasUsedOverLimit { .. })
        ));
    }
}
