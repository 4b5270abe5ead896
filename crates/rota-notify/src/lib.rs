//! Notification seams for invitation rounds.
//!
//! The protocol engine only decides *who* should hear about *what*; delivery
//! belongs to an external system reached through these traits:
//! - [`NotificationPreferences`]: may this recipient be notified of this kind on this channel?
//! - [`NotificationSender`]: hand one outbox message to the delivery system.
//!
//! Sends are fire-and-forget from the protocol's point of view. A failed send is
//! logged by whoever drains the outbox and never retried.

mod memory;
mod templates;

pub use memory::RecordingSender;
pub use rota_storage::{Channel, NotificationKind};
pub use templates::{NotificationContent, FALLBACK_NAME, FALLBACK_TITLE};

use async_trait::async_trait;
use rota_storage::{OutboxMessage, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error type for preference lookups and delivery
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("preference lookup failed: {0}")]
    Preferences(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("no sender configured for channel {0}")]
    NoSender(Channel),

    #[error("no address known for recipient {0}")]
    NoAddress(UserId),
}

/// Per-recipient notification preferences.
#[async_trait]
pub trait NotificationPreferences: Send + Sync {
    /// Whether `recipient` wants `kind` notifications on `channel`.
    async fn should_notify(
        &self,
        recipient: &UserId,
        kind: NotificationKind,
        channel: Channel,
    ) -> Result<bool, NotifyError>;
}

/// Delivery mechanism for claimed outbox messages.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &OutboxMessage) -> Result<(), NotifyError>;
}

/// Hands in-app notifications to the log pipeline, where the in-app feed picks them up.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSender;

#[async_trait]
impl NotificationSender for TracingSender {
    async fn send(&self, message: &OutboxMessage) -> Result<(), NotifyError> {
        tracing::info!(
            target: "rota::notification",
            notification_id = %message.id,
            round_id = %message.round_id,
            recipient = %message.recipient_id,
            kind = %message.kind,
            channel = %message.channel,
            title = %message.title,
            body = %message.body,
            "notification handed off"
        );
        Ok(())
    }
}

/// Routes each message to the sender registered for its channel.
#[derive(Clone, Default)]
pub struct ChannelRouter {
    senders: HashMap<Channel, Arc<dyn NotificationSender>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Channel, sender: Arc<dyn NotificationSender>) -> Self {
        self.senders.insert(channel, sender);
        self
    }
}

#[async_trait]
impl NotificationSender for ChannelRouter {
    async fn send(&self, message: &OutboxMessage) -> Result<(), NotifyError> {
        let sender = self
            .senders
            .get(&message.channel)
            .ok_or(NotifyError::NoSender(message.channel))?;
        sender.send(message).await
    }
}
