pub mod api;
pub mod decode;
pub mod error;
pub mod simulator;
pub mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use api::BuilderApi;
pub use types::BlockSimRequest;

pub(crate) const PATH_BUILDER_API: &str = "/relay/v1/builder";
pub(crate) const PATH_GET_VALIDATORS: &str = "/validators";
pub(crate) const PATH_SUBMIT_BLOCK: &str = "/blocks";
