pub mod error;
pub mod redis_cache;
pub mod utils;

pub use redis_cache::RedisCache;
