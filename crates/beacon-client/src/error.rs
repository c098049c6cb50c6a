use crate::types::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum BeaconClientError {
    #[error("url parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("beacon api error: {0}")]
    Api(#[from] ApiError),

    #[error("no beacon clients configured")]
    NoBeaconClients,

    #[error("beacon node syncing")]
    BeaconNodeSyncing,

    #[error("all beacon clients failed: {0}")]
    BroadcastFailed(String),
}
