pub mod auth;
pub mod documents;
pub mod envelope;
pub mod health;
