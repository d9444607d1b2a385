use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::application::ports::session_port::SessionResolver;
use crate::application::ports::user_repository::SessionRepository;
use crate::domain::users::identity::Identity;
use crate::infrastructure::db::PgPool;

pub struct SqlxSessionRepository {
    pub pool: PgPool,
}

impl SqlxSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionResolver for SqlxSessionRepository {
    async fn resolve_identity(&self, token: &str) -> anyhow::Result<Option<Identity>> {
        let row = sqlx::query(
            r#"SELECT u.user_id, u.login
               FROM sessions s
               JOIN users u ON u.user_id = s.user_id
               WHERE s.token = $1 AND s.expires_at > now()"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Identity {
            user_id: r.get("user_id"),
            login: r.get("login"),
        }))
    }
}
