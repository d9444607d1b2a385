use async_trait::async_trait;
use sqlx::Row;

use crate::application::ports::user_repository::UserRepository;
use crate::domain::users::identity::UserRow;
use crate::infrastructure::db::PgPool;

pub struct SqlxUserRepository {
    pub pool: PgPool,
}

impl SqlxUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<UserRow>> {
        let row = sqlx::query(
            r#"INSERT INTO users (login, password_hash) VALUES ($1, $2)
               ON CONFLICT (login) DO NOTHING
               RETURNING user_id, login"#,
        )
        .bind(login)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserRow {
            id: r.get("user_id"),
            login: r.get("login"),
            password_hash: None,
        }))
    }

    async fn find_by_login(&self, login: &str) -> anyhow::Result<Option<UserRow>> {
        let row =
            sqlx::query(r#"SELECT user_id, login, password_hash FROM users WHERE login = $1"#)
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| UserRow {
            id: r.get("user_id"),
            login: r.get("login"),
            password_hash: r.try_get("password_hash").ok(),
        }))
    }
}
