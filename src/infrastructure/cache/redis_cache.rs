use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::application::ports::cache_port::CacheClient;

const SCAN_BATCH: usize = 200;

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let mut manager = ConnectionManager::new(client)
            .await
            .context("redis_connection_manager")?;
        let _: String = redis::cmd("PING")
            .query_async(&mut manager)
            .await
            .context("redis_ping")?;
        Ok(Self { manager })
    }
}

/// Escapes glob metacharacters so `prefix` matches literally in SCAN MATCH.
fn escape_glob(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.context("redis_get")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.manager.clone();
        let secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, secs).await.context("redis_set_ex")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.del(key).await.context("redis_del")?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> anyhow::Result<u64> {
        let mut conn = self.manager.clone();
        let pattern = format!("{}*", escape_glob(prefix));
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        // incremental SCAN, never KEYS
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .context("redis_scan")?;
            if !keys.is_empty() {
                let n: u64 = conn.del(keys).await.context("redis_del_batch")?;
                removed += n;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }
}
