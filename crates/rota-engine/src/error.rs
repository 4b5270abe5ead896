use rota_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by protocol operations.
///
/// Only `Internal` is worth retrying; the rest describe the request or the
/// round's current state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invite was modified concurrently, re-read it and try again")]
    Conflict,

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::NotFound(_) => "not_found",
            EngineError::Conflict => "conflict",
            EngineError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => EngineError::NotFound("invite not found".to_string()),
            StoreError::AlreadyExists | StoreError::Conflict => EngineError::Conflict,
            StoreError::Backend(msg) => EngineError::Internal(msg),
        }
    }
}
