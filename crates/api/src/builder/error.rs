use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ethereum_consensus::primitives::{BlsPublicKey, ExecutionAddress};
use vela_common::{bid_submission::BidValidationError, simulator::BlockSimError};
use vela_datastore::AuctioneerError;

#[derive(Debug, thiserror::Error)]
pub enum BuilderApiError {
    #[error("serde decode error: {0}")]
    SerdeDecodeError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("payload too large. max size: {max_size}, size: {size}")]
    PayloadTooLarge { max_size: usize, size: usize },

    #[error("payload for this slot was already delivered")]
    PayloadAlreadyDelivered,

    #[error("submission for past slot. head: {head_slot}, got: {got}")]
    SubmissionForPastSlot { head_slot: u64, got: u64 },

    #[error("incorrect timestamp. got: {got}, expected: {expected}")]
    IncorrectTimestamp { got: u64, expected: u64 },

    #[error("could not find proposer duty for slot")]
    ProposerDutyNotFound,

    #[error("fee recipient mismatch. got: {got:?}, expected: {expected:?}")]
    FeeRecipientMismatch { got: ExecutionAddress, expected: ExecutionAddress },

    #[error("proposer public key mismatch. got: {got:?}, expected: {expected:?}")]
    ProposerPublicKeyMismatch { got: Box<BlsPublicKey>, expected: Box<BlsPublicKey> },

    #[error("{0}")]
    BidValidationError(#[from] BidValidationError),

    #[error("prev_randao not known yet")]
    PrevRandaoNotKnownYet,

    #[error("prev_randao mismatch. got: {got}, expected: {expected}")]
    PrevRandaoMismatch { got: String, expected: String },

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("already using a newer payload")]
    AlreadyUsingNewerPayload,

    #[error("block validation error: {0}")]
    BlockValidationError(#[from] BlockSimError),

    #[error("datastore error: {0}")]
    AuctioneerError(#[from] AuctioneerError),

    #[error("internal error")]
    InternalError,
}

impl IntoResponse for BuilderApiError {
    fn into_response(self) -> Response {
        match self {
            BuilderApiError::SerdeDecodeError(_) |
            BuilderApiError::IOError(_) |
            BuilderApiError::PayloadTooLarge { .. } |
            BuilderApiError::PayloadAlreadyDelivered |
            BuilderApiError::SubmissionForPastSlot { .. } |
            BuilderApiError::IncorrectTimestamp { .. } |
            BuilderApiError::ProposerDutyNotFound |
            BuilderApiError::FeeRecipientMismatch { .. } |
            BuilderApiError::ProposerPublicKeyMismatch { .. } |
            BuilderApiError::BidValidationError(_) |
            BuilderApiError::PrevRandaoMismatch { .. } |
            BuilderApiError::SignatureVerificationFailed |
            BuilderApiError::AlreadyUsingNewerPayload => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }

            BuilderApiError::BlockValidationError(ref err) => {
                if err.is_temporary() {
                    (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
                } else {
                    (StatusCode::BAD_REQUEST, self.to_string()).into_response()
                }
            }

            BuilderApiError::AuctioneerError(err) => err.into_response(),

            BuilderApiError::PrevRandaoNotKnownYet |
            BuilderApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}
