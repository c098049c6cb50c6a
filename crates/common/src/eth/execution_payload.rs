use ethereum_consensus::{
    primitives::{Bytes32, ExecutionAddress, Hash32, Root, U256},
    serde::as_str,
    ssz::prelude::*,
};

pub const BYTES_PER_LOGS_BLOOM: usize = 256;
pub const MAX_EXTRA_DATA_BYTES: usize = 32;
pub const MAX_BYTES_PER_TRANSACTION: usize = 1_073_741_824;
pub const MAX_TRANSACTIONS_PER_PAYLOAD: usize = 1_048_576;

pub type Transaction = ByteList<MAX_BYTES_PER_TRANSACTION>;

#[derive(Debug, Default, Clone, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct ExecutionPayload {
    pub parent_hash: Hash32,
    pub fee_recipient: ExecutionAddress,
    pub state_root: Bytes32,
    pub receipts_root: Bytes32,
    pub logs_bloom: ByteVector<BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: Bytes32,
    #[serde(with = "as_str")]
    pub block_number: u64,
    #[serde(with = "as_str")]
    pub gas_limit: u64,
    #[serde(with = "as_str")]
    pub gas_used: u64,
    #[serde(with = "as_str")]
    pub timestamp: u64,
    pub extra_data: ByteList<MAX_EXTRA_DATA_BYTES>,
    #[serde(with = "as_str")]
    pub base_fee_per_gas: U256,
    pub block_hash: Hash32,
    pub transactions: List<Transaction, MAX_TRANSACTIONS_PER_PAYLOAD>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize, serde::Serialize, serde::Deserialize)]
pub struct ExecutionPayloadHeader {
    pub parent_hash: Hash32,
    pub fee_recipient: ExecutionAddress,
    pub state_root: Bytes32,
    pub receipts_root: Bytes32,
    pub logs_bloom: ByteVector<BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: Bytes32,
    #[serde(with = "as_str")]
    pub block_number: u64,
    #[serde(with = "as_str")]
    pub gas_limit: u64,
    #[serde(with = "as_str")]
    pub gas_used: u64,
    #[serde(with = "as_str")]
    pub timestamp: u64,
    pub extra_data: ByteList<MAX_EXTRA_DATA_BYTES>,
    #[serde(with = "as_str")]
    pub base_fee_per_gas: U256,
    pub block_hash: Hash32,
    pub transactions_root: Root,
}

/// Derives the header served to proposers from a full payload. Mutable access
/// is needed to merkleize the transaction list.
pub fn try_execution_header_from_payload(
    payload: &mut ExecutionPayload,
) -> Result<ExecutionPayloadHeader, MerkleizationError> {
    let transactions_root = payload.transactions.hash_tree_root()?;

    Ok(ExecutionPayloadHeader {
        parent_hash: payload.parent_hash.clone(),
        fee_recipient: payload.fee_recipient.clone(),
        state_root: payload.state_root.clone(),
        receipts_root: payload.receipts_root.clone(),
        logs_bloom: payload.logs_bloom.clone(),
        prev_randao: payload.prev_randao.clone(),
        block_number: payload.block_number,
        gas_limit: payload.gas_limit,
        gas_used: payload.gas_used,
        timestamp: payload.timestamp,
        extra_data: payload.extra_data.clone(),
        base_fee_per_gas: payload.base_fee_per_gas,
        block_hash: payload.block_hash.clone(),
        transactions_root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matches_payload_fields() {
        let mut payload = ExecutionPayload {
            block_number: 17_000_000,
            gas_limit: 30_000_000,
            gas_used: 12_345_678,
            timestamp: 1_700_000_000,
            ..Default::default()
        };
        payload.transactions.push(Transaction::try_from(vec![0x02u8; 4].as_slice()).unwrap());

        let header = try_execution_header_from_payload(&mut payload).unwrap();
        assert_eq!(header.block_number, payload.block_number);
        assert_eq!(header.block_hash, payload.block_hash);

        // the root commits to the transactions, so a different tx list must
        // produce a different header
        let mut other = payload.clone();
        other.transactions.push(Transaction::try_from(vec![0x03u8; 4].as_slice()).unwrap());
        let other_header = try_execution_header_from_payload(&mut other).unwrap();
        assert_ne!(header.transactions_root, other_header.transactions_root);
    }
}
