use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use vela_common::bid_submission::BidValidationError;
use vela_database::DatabaseError;
use vela_datastore::AuctioneerError;

#[derive(Debug, thiserror::Error)]
pub enum ProposerApiError {
    #[error("serde decode error: {0}")]
    SerdeDecodeError(#[from] serde_json::Error),

    #[error("empty request")]
    EmptyRequest,

    #[error("request for past slot. request slot: {request_slot}, head slot: {head_slot}")]
    RequestForPastSlot { request_slot: u64, head_slot: u64 },

    #[error("registration timestamp too far in the future. got: {got}, max: {max}")]
    TimestampTooFarInTheFuture { got: u64, max: u64 },

    #[error("not a known validator")]
    UnknownValidator,

    #[error("unknown proposer index: {0}")]
    UnknownProposerIndex(u64),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("no execution payload found for this request")]
    NoExecutionPayloadFound,

    #[error("blinded block does not match the stored payload")]
    BlindedBlockAndPayloadHeaderMismatch,

    #[error("{0}")]
    BidValidationError(#[from] BidValidationError),

    #[error("datastore error: {0}")]
    AuctioneerError(#[from] AuctioneerError),

    #[error("database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("internal server error")]
    InternalServerError,
}

impl IntoResponse for ProposerApiError {
    fn into_response(self) -> Response {
        match self {
            ProposerApiError::SerdeDecodeError(_) |
            ProposerApiError::EmptyRequest |
            ProposerApiError::RequestForPastSlot { .. } |
            ProposerApiError::TimestampTooFarInTheFuture { .. } |
            ProposerApiError::UnknownValidator |
            ProposerApiError::UnknownProposerIndex(_) |
            ProposerApiError::InvalidSignature |
            ProposerApiError::NoExecutionPayloadFound |
            ProposerApiError::BlindedBlockAndPayloadHeaderMismatch |
            ProposerApiError::BidValidationError(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }

            ProposerApiError::AuctioneerError(err) => err.into_response(),

            ProposerApiError::DatabaseError(_) | ProposerApiError::InternalServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}
