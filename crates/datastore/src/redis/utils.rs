use ethereum_consensus::primitives::{BlsPublicKey, Hash32};

use crate::types::keys::{
    BEST_BID_KEY, BID_TRACE_KEY, EXEC_PAYLOAD_KEY, LATEST_BID_RECEIVED_AT_KEY,
    LATEST_BUILDER_BID_KEY,
};

pub fn get_execution_payload_key(
    slot: u64,
    proposer_pub_key: &BlsPublicKey,
    block_hash: &Hash32,
) -> String {
    format!("{EXEC_PAYLOAD_KEY}:{slot}_{proposer_pub_key:?}_{block_hash:?}")
}

pub fn get_cache_bid_trace_key(
    slot: u64,
    proposer_pub_key: &BlsPublicKey,
    block_hash: &Hash32,
) -> String {
    format!("{BID_TRACE_KEY}:{slot}_{proposer_pub_key:?}_{block_hash:?}")
}

pub fn get_best_bid_key(
    slot: u64,
    parent_hash: &Hash32,
    proposer_pub_key: &BlsPublicKey,
) -> String {
    format!("{BEST_BID_KEY}:{slot}_{parent_hash:?}_{proposer_pub_key:?}")
}

pub fn get_latest_builder_bid_key(
    slot: u64,
    parent_hash: &Hash32,
    proposer_pub_key: &BlsPublicKey,
) -> String {
    format!("{LATEST_BUILDER_BID_KEY}:{slot}_{parent_hash:?}_{proposer_pub_key:?}")
}

pub fn get_latest_bid_received_at_key(
    slot: u64,
    parent_hash: &Hash32,
    proposer_pub_key: &BlsPublicKey,
) -> String {
    format!("{LATEST_BID_RECEIVED_AT_KEY}:{slot}_{parent_hash:?}_{proposer_pub_key:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_embed_all_tuple_parts() {
        let parent = Hash32::try_from([0xaa; 32].as_slice()).unwrap();
        let proposer = BlsPublicKey::default();

        let key = get_best_bid_key(101, &parent, &proposer);
        assert!(key.starts_with("best-bid:101_0xaaaa"));

        let other_parent = Hash32::try_from([0xbb; 32].as_slice()).unwrap();
        assert_ne!(key, get_best_bid_key(101, &other_parent, &proposer));
    }
}
