use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::application::ports::cache_port::CacheClient;
use crate::domain::documents::filter::ListFilter;

const LIST_PREFIX: &str = "docs";
const DOCUMENT_PREFIX: &str = "doc";

// ':' separates key components, so it is escaped inside them ('%' first).
fn component(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}

/// `docs:<token>`, the root every list key of one requester hangs off.
pub fn requester_key(token: &str) -> String {
    format!("{LIST_PREFIX}:{}", component(token))
}

/// `docs:<token>[:<ownerLogin>][:<attrName>:<attrValue>][:limit:<n>]`
pub fn list_key(token: &str, filter: &ListFilter) -> String {
    let mut key = requester_key(token);
    if let Some(login) = &filter.owner_login {
        let _ = write!(key, ":{}", component(login));
    }
    if let Some(attr) = &filter.attribute {
        let _ = write!(
            key,
            ":{}:{}",
            attr.column.as_str(),
            component(&attr.value.to_string())
        );
    }
    if let Some(limit) = filter.limit {
        let _ = write!(key, ":limit:{limit}");
    }
    key
}

/// `doc:<id>`; not requester-scoped, readers are re-checked on every hit.
pub fn document_key(id: &Uuid) -> String {
    format!("{DOCUMENT_PREFIX}:{id}")
}

/// Cache access that never fails: errors, timeouts and undecodable entries
/// are logged and reported as misses.
#[derive(Clone)]
pub struct GuardedCache {
    client: Arc<dyn CacheClient>,
    timeout: Duration,
}

impl GuardedCache {
    pub fn new(client: Arc<dyn CacheClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, key: &str, fut: F) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Some(v),
            Ok(Err(e)) => {
                tracing::warn!(cache_key = %key, error = ?e, "cache_{}_failed", op);
                None
            }
            Err(_) => {
                tracing::warn!(cache_key = %key, "cache_{}_timed_out", op);
                None
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.bounded("get", key, self.client.get(key)).await??;
        match serde_json::from_slice(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(cache_key = %key, error = ?e, "cache_entry_undecodable");
                None
            }
        }
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = ?e, "cache_entry_unencodable");
                return;
            }
        };
        self.bounded("set", key, self.client.set(key, bytes, ttl))
            .await;
    }

    pub async fn evict(&self, key: &str) {
        self.bounded("delete", key, self.client.delete(key)).await;
    }

    /// Drops every cached list query of `token`.
    pub async fn evict_requester(&self, token: &str) {
        let root = requester_key(token);
        self.evict(&root).await;
        let prefix = format!("{root}:");
        if let Some(n) = self
            .bounded("delete_prefix", &prefix, self.client.delete_by_prefix(&prefix))
            .await
        {
            tracing::debug!(cache_prefix = %prefix, evicted = n, "requester_cache_invalidated");
        }
    }
}
