use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::users::identity::UserRow;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns `None` when the login is already taken.
    async fn create_user(&self, login: &str, password_hash: &str)
    -> anyhow::Result<Option<UserRow>>;
    async fn find_by_login(&self, login: &str) -> anyhow::Result<Option<UserRow>>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<()>;
    async fn delete_session(&self, token: &str) -> anyhow::Result<bool>;
}
