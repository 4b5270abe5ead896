//! Storage abstraction for rota.
//!
//! Backend crates (e.g., rota-store-sqlite, rota-store-memory) implement [`RoundStore`] so
//! the protocol engine doesn't depend on any specific database engine or schema details.

mod store;
mod types;

pub use store::*;
pub use types::*;

use thiserror::Error;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}
