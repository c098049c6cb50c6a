pub mod blinded_block;
pub mod builder_bid;
pub mod execution_payload;

pub use blinded_block::*;
pub use builder_bid::*;
pub use execution_payload::*;
