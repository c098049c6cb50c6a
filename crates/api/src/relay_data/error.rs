use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum DataApiError {
    #[error("cannot specify both slot and cursor")]
    SlotAndCursor,

    #[error("need to query for specific slot or block_hash or block_number or builder_pubkey")]
    MissingFilter,

    #[error("maximum limit is {max}")]
    LimitReached { max: u64 },

    #[error("registration not found")]
    RegistrationNotFound,

    #[error("internal server error")]
    InternalServerError,
}

impl IntoResponse for DataApiError {
    fn into_response(self) -> Response {
        match self {
            DataApiError::SlotAndCursor |
            DataApiError::MissingFilter |
            DataApiError::LimitReached { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            DataApiError::RegistrationNotFound => {
                (StatusCode::NOT_FOUND, self.to_string()).into_response()
            }
            DataApiError::InternalServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}
