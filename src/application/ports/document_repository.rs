use async_trait::async_trait;
use uuid::Uuid;

use crate::application::access::AccessChecker;
use crate::domain::documents::document::{Document, Payload, PayloadKind};
use crate::domain::documents::filter::ListFilter;
use crate::domain::users::identity::Identity;

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error("invalid document: {0}")]
    Validation(String),
    #[error("invalid or expired token")]
    Unauthenticated,
    #[error("access denied")]
    AccessDenied,
    #[error("document not found")]
    NotFound,
    #[error("document storage failure")]
    Storage(#[source] anyhow::Error),
}

#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Documents the requester may read, narrowed by `filter`, ordered by
    /// name then creation time.
    async fn list_readable(
        &self,
        requester: &Identity,
        filter: &ListFilter,
    ) -> anyhow::Result<Vec<Document>>;

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Document>>;

    async fn get_payload(&self, id: Uuid, kind: PayloadKind) -> anyhow::Result<Option<Payload>>;
}

#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Metadata, payload and grants land in one transaction or not at all.
    async fn create(&self, doc: &Document, payload: &Payload) -> Result<(), DocumentError>;

    /// Locks the row, asks `access` whether `requester` may delete it, then
    /// removes grants, payload and metadata in one transaction.
    async fn delete(
        &self,
        requester: &Identity,
        id: Uuid,
        access: &dyn AccessChecker,
    ) -> Result<(), DocumentError>;
}
