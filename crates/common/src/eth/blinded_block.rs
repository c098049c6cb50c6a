use ethereum_consensus::{
    primitives::{BlsPublicKey, BlsSignature, Hash32, Root, Slot},
    serde::as_str,
    ssz::prelude::*,
    state_transition::Context,
    Error,
};

use crate::{
    eth::execution_payload::{
        try_execution_header_from_payload, ExecutionPayload, ExecutionPayloadHeader,
    },
    signing::verify_signed_consensus_message,
};

/// Body of the proposer's commitment. Only the execution payload header is
/// carried; consensus-side body fields are out of scope for the relay.
#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct BlindedBeaconBlockBody {
    pub execution_payload_header: ExecutionPayloadHeader,
}

#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct BlindedBeaconBlock {
    #[serde(with = "as_str")]
    pub slot: Slot,
    #[serde(with = "as_str")]
    pub proposer_index: u64,
    pub parent_root: Root,
    pub state_root: Root,
    pub body: BlindedBeaconBlockBody,
}

/// The proposer's signed commitment to a specific bid.
#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct SignedBlindedBeaconBlock {
    pub message: BlindedBeaconBlock,
    pub signature: BlsSignature,
}

impl SignedBlindedBeaconBlock {
    pub fn slot(&self) -> Slot {
        self.message.slot
    }

    pub fn proposer_index(&self) -> u64 {
        self.message.proposer_index
    }

    pub fn block_hash(&self) -> &Hash32 {
        &self.message.body.execution_payload_header.block_hash
    }

    /// Verifies the proposer's signature (beacon-proposer domain). This is the
    /// proposer's commitment point.
    pub fn verify_signature(
        &mut self,
        public_key: &BlsPublicKey,
        genesis_validators_root: Root,
        context: &Context,
    ) -> Result<(), Error> {
        let slot = self.message.slot;
        verify_signed_consensus_message(
            &mut self.message,
            &self.signature,
            public_key,
            context,
            Some(slot),
            Some(genesis_validators_root),
        )
    }
}

#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct BeaconBlockBody {
    pub execution_payload: ExecutionPayload,
}

#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct BeaconBlock {
    #[serde(with = "as_str")]
    pub slot: Slot,
    #[serde(with = "as_str")]
    pub proposer_index: u64,
    pub parent_root: Root,
    pub state_root: Root,
    pub body: BeaconBlockBody,
}

/// The unblinded block published to the beacon network after the payload
/// reveal. Carries the proposer's original signature.
#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct SignedBeaconBlock {
    pub message: BeaconBlock,
    pub signature: BlsSignature,
}

#[derive(Debug, thiserror::Error)]
pub enum UnblindError {
    #[error("blinded header does not match stored payload")]
    HeaderMismatch,

    #[error("merkleization error: {0}")]
    Merkleization(#[from] MerkleizationError),
}

/// Combines the proposer's signed blinded block with the stored execution
/// payload. The caller must have located the payload by the committed block
/// hash; the full header equality check here catches a corrupted store.
pub fn unblind_beacon_block(
    signed_blinded_block: &SignedBlindedBeaconBlock,
    execution_payload: &ExecutionPayload,
) -> Result<SignedBeaconBlock, UnblindError> {
    let mut payload = execution_payload.clone();
    let local_header = try_execution_header_from_payload(&mut payload)?;

    let blinded = &signed_blinded_block.message;
    if local_header != blinded.body.execution_payload_header {
        return Err(UnblindError::HeaderMismatch);
    }

    Ok(SignedBeaconBlock {
        message: BeaconBlock {
            slot: blinded.slot,
            proposer_index: blinded.proposer_index,
            parent_root: blinded.parent_root.clone(),
            state_root: blinded.state_root.clone(),
            body: BeaconBlockBody { execution_payload: payload },
        },
        signature: signed_blinded_block.signature.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unblind_requires_matching_header() {
        let mut payload = ExecutionPayload { block_number: 1, ..Default::default() };
        let header = try_execution_header_from_payload(&mut payload).unwrap();

        let mut signed_blinded_block = SignedBlindedBeaconBlock::default();
        signed_blinded_block.message.slot = 101;
        signed_blinded_block.message.body.execution_payload_header = header;

        let unblinded = unblind_beacon_block(&signed_blinded_block, &payload).unwrap();
        assert_eq!(unblinded.message.slot, 101);
        assert_eq!(unblinded.message.body.execution_payload.block_number, 1);

        let other_payload = ExecutionPayload { block_number: 2, ..Default::default() };
        assert!(matches!(
            unblind_beacon_block(&signed_blinded_block, &other_payload),
            Err(UnblindError::HeaderMismatch)
        ));
    }
}
