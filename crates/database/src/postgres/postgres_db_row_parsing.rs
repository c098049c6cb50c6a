use ethereum_consensus::primitives::{BlsPublicKey, ExecutionAddress, Hash32, U256};
use tokio_postgres::Row;
use vela_common::{bid_submission::BidTrace, utils::u256_from_dec_str};

use crate::error::DatabaseError;

pub fn parse_bytes_to_pubkey(bytes: &[u8]) -> Result<BlsPublicKey, DatabaseError> {
    BlsPublicKey::try_from(bytes)
        .map_err(|err| DatabaseError::RowParsingError(format!("bad pubkey: {err:?}")))
}

pub fn parse_bytes_to_hash(bytes: &[u8]) -> Result<Hash32, DatabaseError> {
    Hash32::try_from(bytes)
        .map_err(|err| DatabaseError::RowParsingError(format!("bad hash: {err:?}")))
}

pub fn parse_bytes_to_address(bytes: &[u8]) -> Result<ExecutionAddress, DatabaseError> {
    ExecutionAddress::try_from(bytes)
        .map_err(|err| DatabaseError::RowParsingError(format!("bad address: {err:?}")))
}

pub fn parse_text_to_u256(text: &str) -> Result<U256, DatabaseError> {
    u256_from_dec_str(text)
        .ok_or_else(|| DatabaseError::RowParsingError(format!("bad u256: {text}")))
}

/// Reconstructs a bid trace from the shared column layout of the submission
/// and delivered-payload tables.
pub fn parse_row_to_bid_trace(row: &Row) -> Result<BidTrace, DatabaseError> {
    Ok(BidTrace {
        slot: row.get::<_, i64>("slot") as u64,
        parent_hash: parse_bytes_to_hash(row.get("parent_hash"))?,
        block_hash: parse_bytes_to_hash(row.get("block_hash"))?,
        builder_public_key: parse_bytes_to_pubkey(row.get("builder_pubkey"))?,
        proposer_public_key: parse_bytes_to_pubkey(row.get("proposer_pubkey"))?,
        proposer_fee_recipient: parse_bytes_to_address(row.get("proposer_fee_recipient"))?,
        gas_limit: row.get::<_, i64>("gas_limit") as u64,
        gas_used: row.get::<_, i64>("gas_used") as u64,
        value: parse_text_to_u256(row.get("value"))?,
    })
}
