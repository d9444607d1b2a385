mod memory_cache;
mod redis_cache;

pub use memory_cache::MemoryCache;
pub use redis_cache::RedisCache;
