pub mod chain_event_updater;
pub mod current_slot_info;
pub mod error;
pub mod housekeeper;
pub mod randao;

pub use chain_event_updater::ChainEventUpdater;
pub use current_slot_info::CurrentSlotInfo;
pub use housekeeper::Housekeeper;
pub use randao::{ExpectedRandao, RandaoOracle};
