pub mod postgres_db_init;
pub mod postgres_db_row_parsing;
pub mod postgres_db_service;

pub use postgres_db_service::PostgresDatabaseService;
