pub mod error;
pub mod mock_database_service;
pub mod postgres;
pub mod traits;
pub mod types;

pub use error::DatabaseError;
pub use traits::DatabaseService;
