use std::time::Duration;

use async_trait::async_trait;

/// Best-effort key/value cache. Errors are reported to the caller, who is
/// expected to treat them as misses.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    /// Removes every key starting with `prefix` (a literal, not a pattern).
    async fn delete_by_prefix(&self, prefix: &str) -> anyhow::Result<u64>;
}
