//! Lookups the engine needs from the rest of the product.

use async_trait::async_trait;
use rota_storage::{TargetId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("lookup failed: {0}")]
pub struct LookupError(pub String);

/// Source of mutually accepted connections.
#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
    /// Users `user` may put on a candidate list.
    async fn eligible_connections(&self, user: &UserId) -> Result<Vec<UserId>, LookupError>;
}

/// Display data used only to word notifications.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn display_name(&self, user: &UserId) -> Result<String, LookupError>;

    async fn target_title(&self, target: &TargetId) -> Result<String, LookupError>;
}
