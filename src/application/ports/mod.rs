pub mod cache_port;
pub mod document_repository;
pub mod session_port;
pub mod user_repository;
