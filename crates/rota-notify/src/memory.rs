//! Recording sender for development and tests.

use async_trait::async_trait;
use rota_storage::OutboxMessage;
use std::sync::{Arc, Mutex};

use crate::{NotificationSender, NotifyError};

/// Keeps every delivered message in memory. Can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<OutboxMessage>>>,
    failing: bool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every delivery fails (messages are not recorded).
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<OutboxMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, message: &OutboxMessage) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Delivery("recording sender set to fail".into()));
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError::Delivery("recorder lock poisoned".into()))?
            .push(message.clone());
        Ok(())
    }
}
