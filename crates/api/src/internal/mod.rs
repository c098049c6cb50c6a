pub mod api;

pub use api::InternalApi;

pub(crate) const PATH_INTERNAL_API: &str = "/internal/v1/builder";
pub(crate) const PATH_BUILDER_STATUS: &str = "/:pubkey";
pub(crate) const PATH_BUILDER_COLLATERAL: &str = "/collateral/:pubkey";
