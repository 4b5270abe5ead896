//! Outbox dispatcher.
//!
//! Claims committed notifications in batches and hands each to the sender for
//! its channel. Claiming removes rows before delivery, so a message is
//! attempted at most once; failures are logged and dropped.

use rota_notify::NotificationSender;
use rota_storage::RoundStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::metrics::record_notification;

/// `tokio::time::interval` rejects a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct OutboxDispatcher<S> {
    store: Arc<S>,
    sender: Arc<dyn NotificationSender>,
    batch_size: usize,
    poll_interval: Duration,
}

impl<S: RoundStore> OutboxDispatcher<S> {
    pub fn new(
        store: Arc<S>,
        sender: Arc<dyn NotificationSender>,
        batch_size: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            sender,
            batch_size: batch_size.max(1),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Poll until `shutdown` fires, then deliver whatever is already queued.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    self.drain().await;
                }
            }
        }

        let flushed = self.drain().await;
        info!(flushed, "outbox dispatcher stopped");
    }

    /// Deliver batches until the outbox is empty. Returns the number of messages attempted.
    pub async fn drain(&self) -> usize {
        let mut total = 0;
        loop {
            let claimed = self.deliver_batch().await;
            total += claimed;
            if claimed < self.batch_size {
                return total;
            }
        }
    }

    async fn deliver_batch(&self) -> usize {
        let batch = match self.store.claim_notifications(self.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "failed to claim outbox batch");
                return 0;
            }
        };
        debug!(count = batch.len(), "claimed outbox batch");

        for message in &batch {
            match self.sender.send(message).await {
                Ok(()) => record_notification(message.channel.as_str(), true),
                Err(e) => {
                    record_notification(message.channel.as_str(), false);
                    warn!(
                        notification_id = %message.id,
                        round_id = %message.round_id,
                        recipient = %message.recipient_id,
                        channel = %message.channel,
                        error = %e,
                        "notification delivery failed, dropping"
                    );
                }
            }
        }
        batch.len()
    }
}
