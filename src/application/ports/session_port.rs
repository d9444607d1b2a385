use async_trait::async_trait;

use crate::domain::users::identity::Identity;

#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `None` for unknown or expired tokens.
    async fn resolve_identity(&self, token: &str) -> anyhow::Result<Option<Identity>>;
}
