//! The RoundStore trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait the protocol engine depends on.
///
/// Every state-changing write to a round goes through [`RoundStore::update_if_status`].
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait RoundStore: Send + Sync {
    // ───────────────────────────────────── Rounds ─────────────────────────────────────────

    /// Insert a fresh round (Pending, pointer 0, nobody declined).
    /// Fails with `AlreadyExists` if the id is taken.
    async fn create_round(&self, params: &CreateRoundParams) -> Result<Round, StoreError>;

    /// Get round by ID.
    async fn get_round(&self, id: &RoundId) -> Result<Round, StoreError>;

    /// Atomically apply `changes` if the stored status and revision still match
    /// `expected`, writing `outbox` rows in the same transaction.
    ///
    /// Returns the post-update snapshot, `Conflict` if the precondition failed
    /// (nothing is written), or `NotFound`.
    async fn update_if_status(
        &self,
        id: &RoundId,
        expected: &Precondition,
        changes: &RoundChanges,
        outbox: &[NewNotification],
    ) -> Result<Round, StoreError>;

    /// Rounds created by a user, newest first.
    async fn list_rounds_by_creator(&self, creator: &UserId) -> Result<Vec<Round>, StoreError>;

    /// Pending rounds listing the user as a candidate, newest first.
    async fn list_pending_rounds_for_candidate(
        &self,
        candidate: &UserId,
    ) -> Result<Vec<Round>, StoreError>;

    // ───────────────────────────────────── Outbox ─────────────────────────────────────────

    /// Write notifications outside of any round update.
    async fn enqueue_notifications(&self, rows: &[NewNotification]) -> Result<(), StoreError>;

    /// Remove and return up to `limit` of the oldest outbox rows.
    async fn claim_notifications(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError>;
}
