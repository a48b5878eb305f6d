pub mod config;
pub mod error;
pub mod indexer;
pub mod models;
pub mod rag;
