pub mod api;
pub mod error;
pub mod register;

#[cfg(test)]
mod tests;

pub use api::ProposerApi;
pub use register::RegistrationProcessor;

pub(crate) const PATH_PROPOSER_API: &str = "/eth/v1/builder";
pub(crate) const PATH_STATUS: &str = "/status";
pub(crate) const PATH_REGISTER_VALIDATORS: &str = "/validators";
pub(crate) const PATH_GET_HEADER: &str = "/header/:slot/:parent_hash/:pubkey";
pub(crate) const PATH_GET_PAYLOAD: &str = "/blinded_blocks";
