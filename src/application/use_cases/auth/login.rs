use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};

use super::AuthError;
use crate::application::ports::user_repository::{SessionRepository, UserRepository};

pub struct Login<'a, R, S>
where
    R: UserRepository + ?Sized,
    S: SessionRepository + ?Sized,
{
    pub users: &'a R,
    pub sessions: &'a S,
    pub session_ttl: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

impl<'a, R, S> Login<'a, R, S>
where
    R: UserRepository + ?Sized,
    S: SessionRepository + ?Sized,
{
    /// Verifies credentials and opens a session; returns its opaque token.
    pub async fn execute(&self, req: &LoginRequest) -> Result<String, AuthError> {
        let row = self
            .users
            .find_by_login(&req.login)
            .await
            .map_err(AuthError::Storage)?
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = row.password_hash.clone().unwrap_or_default();
        let parsed = PasswordHash::new(&hash).map_err(|_| AuthError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let token = uuid::Uuid::new_v4().to_string();
        let expires_at = chrono::Utc::now() + self.session_ttl;
        self.sessions
            .create_session(row.id, &token, expires_at)
            .await
            .map_err(AuthError::Storage)?;
        tracing::info!(login = %row.login, "session_opened");
        Ok(token)
    }
}
