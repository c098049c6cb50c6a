use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ethereum_consensus::primitives::BlsPublicKey;

use crate::redis::error::RedisCacheError;

#[derive(Debug, thiserror::Error)]
pub enum AuctioneerError {
    #[error("unexpected value type")]
    UnexpectedValueType,

    #[error("redis error: {0}")]
    RedisError(#[from] RedisCacheError),

    #[error("from utf8 error: {0}")]
    FromUtf8Error(#[from] std::string::FromUtf8Error),

    #[error("parse int error: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("past slot already delivered")]
    PastSlotAlreadyDelivered,

    #[error("another payload already delivered for slot")]
    AnotherPayloadAlreadyDeliveredForSlot,

    #[error("already using a newer payload")]
    NewerPayloadAlreadyProcessed,

    #[error("no execution payload for this request")]
    ExecutionPayloadNotFound,

    #[error("builder not found for pubkey {pub_key:?}")]
    BuilderNotFound { pub_key: BlsPublicKey },

    #[error("relay pubkey mismatch with shared config. stored: {stored}, ours: {ours}")]
    RelayPubkeyMismatch { stored: String, ours: String },
}

impl IntoResponse for AuctioneerError {
    fn into_response(self) -> Response {
        let code = match self {
            AuctioneerError::UnexpectedValueType |
            AuctioneerError::FromUtf8Error(_) |
            AuctioneerError::ParseIntError(_) |
            AuctioneerError::PastSlotAlreadyDelivered |
            AuctioneerError::AnotherPayloadAlreadyDeliveredForSlot |
            AuctioneerError::NewerPayloadAlreadyProcessed |
            AuctioneerError::ExecutionPayloadNotFound |
            AuctioneerError::BuilderNotFound { .. } |
            AuctioneerError::RelayPubkeyMismatch { .. } => StatusCode::BAD_REQUEST,

            AuctioneerError::RedisError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (code, self.to_string()).into_response()
    }
}
