pub mod login;
pub mod logout;
pub mod register;

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid admin token")]
    InvalidAdminToken,
    #[error("{0}")]
    Validation(String),
    #[error("login is already taken")]
    LoginTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("auth storage failure")]
    Storage(#[source] anyhow::Error),
}

static LOGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{8,}$").expect("valid regex"));

const PASSWORD_CLASSES: [&str; 4] = [
    "!@#$%^&*",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "abcdefghijklmnopqrstuvwxyz",
    "0123456789",
];

pub fn validate_login(login: &str) -> Result<(), AuthError> {
    if LOGIN_RE.is_match(login) {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "login must be at least 8 alphanumeric characters".into(),
        ))
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let strong = password.chars().count() >= 8
        && PASSWORD_CLASSES
            .iter()
            .all(|class| password.chars().any(|c| class.contains(c)));
    if strong {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "password must be at least 8 characters with upper, lower, digit and one of !@#$%^&*"
                .into(),
        ))
    }
}
