use ethereum_consensus::{
    primitives::{BlsPublicKey, BlsSignature, Hash32, U256},
    serde::as_str,
    ssz::prelude::*,
    state_transition::Context,
    Error,
};

use crate::{
    eth::execution_payload::ExecutionPayloadHeader,
    signing::{sign_builder_message, verify_signed_builder_message},
};

/// The bid served to proposers via getHeader, signed with the relay's key.
#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct BuilderBid {
    pub header: ExecutionPayloadHeader,
    #[serde(with = "as_str")]
    pub value: U256,
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
}

#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct SignedBuilderBid {
    pub message: BuilderBid,
    pub signature: BlsSignature,
}

impl SignedBuilderBid {
    /// Builds and signs the relay's bid for a validated submission header.
    pub fn new(
        header: ExecutionPayloadHeader,
        value: U256,
        public_key: &BlsPublicKey,
        signing_key: &ethereum_consensus::crypto::SecretKey,
        context: &Context,
    ) -> Result<Self, Error> {
        let mut message = BuilderBid { header, value, public_key: public_key.clone() };
        let signature = sign_builder_message(&mut message, signing_key, context)?;
        Ok(Self { message, signature })
    }

    pub fn value(&self) -> U256 {
        self.message.value
    }

    pub fn block_hash(&self) -> &Hash32 {
        &self.message.header.block_hash
    }

    pub fn verify_signature(&mut self, context: &Context) -> Result<(), Error> {
        let public_key = self.message.public_key.clone();
        verify_signed_builder_message(&mut self.message, &self.signature, &public_key, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_consensus::crypto::SecretKey;

    #[test]
    fn signed_bid_round_trips_signature() {
        let mut rng = rand::thread_rng();
        let sk = SecretKey::random(&mut rng).unwrap();
        let pk = sk.public_key();
        let context = Context::for_mainnet();

        let mut bid = SignedBuilderBid::new(
            ExecutionPayloadHeader::default(),
            U256::from(42u64),
            &pk,
            &sk,
            &context,
        )
        .unwrap();

        assert_eq!(bid.value(), U256::from(42u64));
        assert!(bid.verify_signature(&context).is_ok());

        // tampering with the value must invalidate the signature
        bid.message.value = U256::from(43u64);
        assert!(bid.verify_signature(&context).is_err());
    }
}
