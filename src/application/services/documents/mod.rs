pub mod cache;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::SubsecRound;
use uuid::Uuid;

use crate::application::access::AccessChecker;
use crate::application::ports::cache_port::CacheClient;
use crate::application::ports::document_repository::{
    DocumentError, DocumentReader, DocumentWriter,
};
use crate::application::ports::session_port::SessionResolver;
use crate::domain::documents::document::{Document, NewDocument, Payload, SubmittedPayload};
use crate::domain::documents::filter::ListFilter;
use crate::domain::users::identity::Identity;

use self::cache::{GuardedCache, document_key, list_key};

#[derive(Debug, Clone)]
pub struct DocumentServiceSettings {
    pub list_ttl: Duration,
    pub document_ttl: Duration,
    pub store_timeout: Duration,
    pub cache_timeout: Duration,
}

impl Default for DocumentServiceSettings {
    fn default() -> Self {
        Self {
            list_ttl: Duration::from_secs(5 * 60),
            document_ttl: Duration::from_secs(10 * 60),
            store_timeout: Duration::from_secs(5),
            cache_timeout: Duration::from_millis(250),
        }
    }
}

/// Access rules, transactional store and cache-aside reads behind one API.
///
/// Mutations run validate, persist, then invalidate; invalidation only
/// touches the acting token's list entries (plus `doc:<id>` on delete), so
/// other requesters may see a cached list for up to one list TTL.
#[derive(Clone)]
pub struct DocumentService {
    reader: Arc<dyn DocumentReader>,
    writer: Arc<dyn DocumentWriter>,
    access: Arc<dyn AccessChecker>,
    sessions: Arc<dyn SessionResolver>,
    cache: GuardedCache,
    settings: DocumentServiceSettings,
}

impl DocumentService {
    pub fn new(
        reader: Arc<dyn DocumentReader>,
        writer: Arc<dyn DocumentWriter>,
        access: Arc<dyn AccessChecker>,
        sessions: Arc<dyn SessionResolver>,
        cache: Arc<dyn CacheClient>,
        settings: DocumentServiceSettings,
    ) -> Self {
        Self {
            reader,
            writer,
            access,
            sessions,
            cache: GuardedCache::new(cache, settings.cache_timeout),
            settings,
        }
    }

    async fn within_deadline<T, F>(&self, fut: F) -> Result<T, DocumentError>
    where
        F: Future<Output = Result<T, DocumentError>>,
    {
        tokio::time::timeout(self.settings.store_timeout, fut)
            .await
            .unwrap_or_else(|_| {
                Err(DocumentError::Storage(anyhow::anyhow!(
                    "store deadline exceeded"
                )))
            })
    }

    async fn resolve(&self, token: &str) -> Result<Identity, DocumentError> {
        if token.trim().is_empty() {
            return Err(DocumentError::Unauthenticated);
        }
        self.within_deadline(async {
            self.sessions
                .resolve_identity(token)
                .await
                .map_err(DocumentError::Storage)
        })
        .await?
        .ok_or(DocumentError::Unauthenticated)
    }

    pub async fn create(
        &self,
        token: &str,
        meta: NewDocument,
        submitted: SubmittedPayload,
    ) -> Result<Document, DocumentError> {
        let owner = self.resolve(token).await?;
        let (meta, payload) = meta.validate(submitted).map_err(DocumentError::Validation)?;

        let doc = Document {
            id: Uuid::new_v4(),
            name: meta.name,
            mime: meta.mime,
            is_file: meta.is_file,
            is_public: meta.is_public,
            // the store keeps microseconds
            created_at: chrono::Utc::now().trunc_subsecs(6),
            owner: owner.login.clone(),
            grant: meta.grant,
        };

        self.within_deadline(self.writer.create(&doc, &payload))
            .await
            .inspect_err(|e| {
                tracing::error!(document_id = %doc.id, error = ?e, "document_create_failed")
            })?;

        self.cache.evict_requester(token).await;
        tracing::info!(document_id = %doc.id, owner = %owner.login, "document_created");
        Ok(doc)
    }

    pub async fn list(
        &self,
        token: &str,
        filter: &ListFilter,
    ) -> Result<Vec<Document>, DocumentError> {
        let requester = self.resolve(token).await?;
        let key = list_key(token, filter);
        if let Some(docs) = self.cache.get_json::<Vec<Document>>(&key).await {
            return Ok(docs);
        }

        let docs = self
            .within_deadline(async {
                self.reader
                    .list_readable(&requester, filter)
                    .await
                    .map_err(DocumentError::Storage)
            })
            .await?;

        self.cache
            .put_json(&key, &docs, self.settings.list_ttl)
            .await;
        Ok(docs)
    }

    /// Metadata may come from the cache, but read access is re-evaluated
    /// for the current requester and the payload always comes from the store.
    pub async fn get_by_id(
        &self,
        token: &str,
        id: Uuid,
    ) -> Result<(Document, Payload), DocumentError> {
        let requester = self.resolve(token).await?;
        let key = document_key(&id);

        let cached = self
            .cache
            .get_json::<Document>(&key)
            .await
            .filter(|doc| doc.id == id);
        let from_cache = cached.is_some();
        let doc = match cached {
            Some(doc) => doc,
            None => self
                .within_deadline(async {
                    self.reader
                        .get_by_id(id)
                        .await
                        .map_err(DocumentError::Storage)
                })
                .await?
                .ok_or(DocumentError::NotFound)?,
        };

        if !self.access.can_read(&requester, &doc) {
            return Err(DocumentError::AccessDenied);
        }

        let payload = self
            .within_deadline(async {
                self.reader
                    .get_payload(id, doc.payload_kind())
                    .await
                    .map_err(DocumentError::Storage)
            })
            .await?;
        let Some(payload) = payload else {
            if from_cache {
                self.cache.evict(&key).await;
            }
            return Err(DocumentError::NotFound);
        };

        if !from_cache {
            self.cache
                .put_json(&key, &doc, self.settings.document_ttl)
                .await;
        }
        Ok((doc, payload))
    }

    pub async fn delete(&self, token: &str, id: Uuid) -> Result<(), DocumentError> {
        let requester = self.resolve(token).await?;
        self.within_deadline(self.writer.delete(&requester, id, self.access.as_ref()))
            .await?;

        self.cache.evict(&document_key(&id)).await;
        self.cache.evict_requester(token).await;
        tracing::info!(document_id = %id, owner = %requester.login, "document_deleted");
        Ok(())
    }

    /// Forgets cached list queries issued with `token`.
    pub async fn forget_requester(&self, token: &str) {
        self.cache.evict_requester(token).await;
    }
}
