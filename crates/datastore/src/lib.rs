pub mod auctioneer;
pub mod error;
pub mod redis;
pub mod types;

pub use auctioneer::*;
pub use error::AuctioneerError;
