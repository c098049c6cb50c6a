use ethereum_consensus::primitives::{BlsPublicKey, Hash32, U256};
use serde::{Deserialize, Serialize};
use vela_common::eth::SignedBuilderBid;

/// A builder's current bid for a `(slot, parent, proposer)` tuple, stored as a
/// hash field keyed by builder pubkey. The receive timestamp drives both the
/// staleness CAS and the top-bid tie-break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedBuilderBidWrapper {
    pub bid: SignedBuilderBid,
    pub slot: u64,
    pub builder_public_key: BlsPublicKey,
    pub received_at_ns: u64,
}

impl SignedBuilderBidWrapper {
    pub fn new(
        bid: SignedBuilderBid,
        slot: u64,
        builder_public_key: BlsPublicKey,
        received_at_ns: u64,
    ) -> Self {
        Self { bid, slot, builder_public_key, received_at_ns }
    }

    pub fn value(&self) -> U256 {
        self.bid.value()
    }

    pub fn block_hash(&self) -> &Hash32 {
        self.bid.block_hash()
    }
}

/// Picks the winning bid: maximum value, ties broken by earliest arrival, then
/// by lexicographically smallest block hash.
pub fn select_top_bid(entries: &[SignedBuilderBidWrapper]) -> Option<&SignedBuilderBidWrapper> {
    entries.iter().min_by(|a, b| {
        b.value()
            .cmp(&a.value())
            .then_with(|| a.received_at_ns.cmp(&b.received_at_ns))
            .then_with(|| a.block_hash().as_ref().cmp(b.block_hash().as_ref()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_common::eth::{BuilderBid, ExecutionPayloadHeader};

    fn wrapper(value: u64, received_at_ns: u64, block_hash_byte: u8) -> SignedBuilderBidWrapper {
        let mut header = ExecutionPayloadHeader::default();
        header.block_hash = Hash32::try_from([block_hash_byte; 32].as_slice()).unwrap();
        let bid = SignedBuilderBid {
            message: BuilderBid {
                header,
                value: U256::from(value),
                public_key: BlsPublicKey::default(),
            },
            signature: Default::default(),
        };
        SignedBuilderBidWrapper::new(bid, 101, BlsPublicKey::default(), received_at_ns)
    }

    #[test]
    fn highest_value_wins() {
        let entries = vec![wrapper(5, 10, 0x01), wrapper(7, 20, 0x02)];
        let top = select_top_bid(&entries).unwrap();
        assert_eq!(top.value(), U256::from(7u64));
    }

    #[test]
    fn value_tie_breaks_on_earliest_arrival() {
        let entries = vec![wrapper(7, 20, 0x01), wrapper(7, 10, 0x02)];
        let top = select_top_bid(&entries).unwrap();
        assert_eq!(top.received_at_ns, 10);
    }

    #[test]
    fn full_tie_breaks_on_smallest_block_hash() {
        let entries = vec![wrapper(7, 10, 0x02), wrapper(7, 10, 0x01)];
        let top = select_top_bid(&entries).unwrap();
        assert_eq!(top.block_hash().as_ref()[0], 0x01);
    }

    #[test]
    fn empty_set_has_no_top_bid() {
        assert!(select_top_bid(&[]).is_none());
    }
}
