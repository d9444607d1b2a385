use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::application::ports::cache_port::CacheClient;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Process-local TTL cache used when no Redis is configured.
///
/// Expiry uses tokio's clock, so paused-time tests can step past a TTL.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn live_entries(&self) -> usize {
        let now = Instant::now();
        let guard = self.entries.lock().await;
        guard.values().filter(|e| e.expires_at > now).count()
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut guard = self.entries.lock().await;
        match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                guard.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        let mut guard = self.entries.lock().await;
        let now = Instant::now();
        guard.retain(|_, e| e.expires_at > now);
        guard.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> anyhow::Result<u64> {
        let mut guard = self.entries.lock().await;
        let before = guard.len();
        guard.retain(|k, _| !k.starts_with(prefix));
        Ok((before - guard.len()) as u64)
    }
}
