use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString},
};
use password_hash::rand_core::OsRng;

use super::{AuthError, validate_login, validate_password};
use crate::application::ports::user_repository::UserRepository;

pub struct Register<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
    pub admin_token: &'a str,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub token: String,
    pub login: String,
    pub password: String,
}

impl<'a, R: UserRepository + ?Sized> Register<'a, R> {
    /// Returns the registered login.
    pub async fn execute(&self, req: &RegisterRequest) -> Result<String, AuthError> {
        if req.token != self.admin_token {
            return Err(AuthError::InvalidAdminToken);
        }
        validate_login(&req.login)?;
        validate_password(&req.password)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| AuthError::Storage(anyhow::anyhow!(e.to_string())))?
            .to_string();
        let user = self
            .repo
            .create_user(&req.login, &hash)
            .await
            .map_err(AuthError::Storage)?
            .ok_or(AuthError::LoginTaken)?;
        Ok(user.login)
    }
}
