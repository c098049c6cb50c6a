#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("postgres error: {0}")]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("pool error: {0}")]
    PoolError(#[from] deadpool_postgres::PoolError),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("malformed row: {0}")]
    RowParsingError(String),

    #[error("registration not found")]
    RegistrationNotFound,
}
