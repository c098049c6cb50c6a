pub mod builder_api;
pub mod data_api;
pub mod proposer_api;

pub use builder_api::*;
pub use data_api::*;
pub use proposer_api::*;
