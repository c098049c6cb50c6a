pub mod beacon_client;
pub mod error;
pub mod mock_multi_beacon_client;
pub mod multi_beacon_client;
pub mod traits;
pub mod types;

pub use beacon_client::BeaconClient;
pub use mock_multi_beacon_client::MockMultiBeaconClient;
pub use multi_beacon_client::MultiBeaconClient;
pub use traits::{BeaconClientTrait, MultiBeaconClientTrait};
