#[derive(Debug, thiserror::Error)]
pub enum RedisCacheError {
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("redis pool error: {0}")]
    PoolError(#[from] deadpool_redis::PoolError),

    #[error("redis create pool error: {0}")]
    CreatePoolError(#[from] deadpool_redis::CreatePoolError),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("unexpected value type")]
    UnexpectedValueType,
}
