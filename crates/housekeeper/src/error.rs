use tokio::sync::TryLockError;
use vela_beacon_client::error::BeaconClientError;
use vela_database::DatabaseError;
use vela_datastore::AuctioneerError;

#[derive(Debug, thiserror::Error)]
pub enum HousekeeperError {
    #[error("already processing")]
    AlreadyProcessing(#[from] TryLockError),

    #[error("beacon client error: {0}")]
    BeaconClientError(#[from] BeaconClientError),

    #[error("database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("auctioneer error: {0}")]
    AuctioneerError(#[from] AuctioneerError),
}
