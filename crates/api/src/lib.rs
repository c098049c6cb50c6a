pub mod builder;
pub mod internal;
pub mod proposer;
pub mod relay_data;
pub mod router;
pub mod service;
