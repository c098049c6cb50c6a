use ethereum_consensus::{
    crypto::SecretKey,
    domains::DomainType,
    phase0::mainnet::compute_domain,
    primitives::{BlsPublicKey, BlsSignature, Domain, Root, Slot},
    signing::{sign_with_domain, verify_signed_data},
    ssz::prelude::*,
    state_transition::Context,
    Error, Fork,
};

/// Holds the relay's BLS identity. All bids served via getHeader are signed
/// with this key; horizontally-scaled instances must share it (enforced at
/// startup through the shared cache).
#[derive(Clone)]
pub struct RelaySigningContext {
    pub signing_key: SecretKey,
    pub public_key: BlsPublicKey,
}

impl RelaySigningContext {
    pub fn new(signing_key: SecretKey) -> Self {
        let public_key = signing_key.public_key();
        Self { signing_key, public_key }
    }

    pub fn from_hex(secret_key: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let stripped = secret_key.trim_start_matches("0x");
        let bytes = hex::decode(stripped)?;
        let signing_key = SecretKey::from_bytes(&bytes)?;
        Ok(Self::new(signing_key))
    }

    pub fn public_key(&self) -> &BlsPublicKey {
        &self.public_key
    }
}

impl Default for RelaySigningContext {
    fn default() -> Self {
        let mut rng = rand::thread_rng();
        Self::new(SecretKey::random(&mut rng).expect("can generate key"))
    }
}

pub fn compute_builder_domain(context: &Context) -> Result<Domain, Error> {
    compute_domain(DomainType::ApplicationBuilder, None, None, context)
}

pub fn sign_builder_message<T: Merkleized>(
    message: &mut T,
    signing_key: &SecretKey,
    context: &Context,
) -> Result<BlsSignature, Error> {
    let domain = compute_builder_domain(context)?;
    sign_with_domain(message, signing_key, domain)
}

pub fn verify_signed_builder_message<T: Merkleized>(
    message: &mut T,
    signature: &BlsSignature,
    public_key: &BlsPublicKey,
    context: &Context,
) -> Result<(), Error> {
    let domain = compute_builder_domain(context)?;
    verify_signed_data(message, signature, public_key, domain)?;
    Ok(())
}

fn compute_consensus_domain(
    context: &Context,
    slot_hint: Option<Slot>,
    root_hint: Option<Root>,
) -> Result<Domain, Error> {
    let fork_version = slot_hint.map(|slot| match context.fork_for(slot) {
        Fork::Bellatrix => context.bellatrix_fork_version,
        Fork::Capella => context.capella_fork_version,
        Fork::Deneb => context.deneb_fork_version,
        _ => context.genesis_fork_version,
    });
    compute_domain(DomainType::BeaconProposer, fork_version, root_hint, context)
}

pub fn sign_consensus_message<T: Merkleized>(
    message: &mut T,
    signing_key: &SecretKey,
    context: &Context,
    slot_hint: Option<Slot>,
    root_hint: Option<Root>,
) -> Result<BlsSignature, Error> {
    let domain = compute_consensus_domain(context, slot_hint, root_hint)?;
    sign_with_domain(message, signing_key, domain)
}

pub fn verify_signed_consensus_message<T: Merkleized>(
    message: &mut T,
    signature: &BlsSignature,
    public_key: &BlsPublicKey,
    context: &Context,
    slot_hint: Option<Slot>,
    root_hint: Option<Root>,
) -> Result<(), Error> {
    let domain = compute_consensus_domain(context, slot_hint, root_hint)?;
    verify_signed_data(message, signature, public_key, domain)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bid_submission::BidTrace;
    use ethereum_consensus::primitives::U256;

    #[test]
    fn builder_message_sign_and_verify() {
        let mut rng = rand::thread_rng();
        let sk = SecretKey::random(&mut rng).unwrap();
        let pk = sk.public_key();
        let context = Context::for_mainnet();

        let mut trace = BidTrace {
            slot: 101,
            builder_public_key: pk.clone(),
            value: U256::from(5u64),
            ..Default::default()
        };

        let signature = sign_builder_message(&mut trace, &sk, &context).unwrap();
        assert!(verify_signed_builder_message(&mut trace, &signature, &pk, &context).is_ok());

        let other = SecretKey::random(&mut rng).unwrap().public_key();
        assert!(verify_signed_builder_message(&mut trace, &signature, &other, &context).is_err());
    }
}
