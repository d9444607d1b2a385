pub mod document;
pub mod filter;
