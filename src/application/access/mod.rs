use crate::domain::documents::document::Document;
use crate::domain::users::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    None,
    View,
    Own,
}

// Evaluated against committed document state only; callers load the
// document (from the store or a cache entry) before asking.

pub fn resolve_document(requester: &Identity, doc: &Document) -> Capability {
    if doc.owner == requester.login {
        Capability::Own
    } else if doc.is_public || doc.grant.iter().any(|g| *g == requester.login) {
        Capability::View
    } else {
        Capability::None
    }
}

pub trait AccessChecker: Send + Sync {
    fn can_read(&self, requester: &Identity, doc: &Document) -> bool;
    fn can_delete(&self, requester: &Identity, doc: &Document) -> bool;
}

/// Owner, public flag and grant list decide reads; only the owner deletes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentAccessPolicy;

impl AccessChecker for DocumentAccessPolicy {
    fn can_read(&self, requester: &Identity, doc: &Document) -> bool {
        resolve_document(requester, doc) >= Capability::View
    }

    fn can_delete(&self, requester: &Identity, doc: &Document) -> bool {
        resolve_document(requester, doc) >= Capability::Own
    }
}
