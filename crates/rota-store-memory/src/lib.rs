//! In-memory round store backed by a sharded concurrent map.
//!
//! This implementation is suitable for:
//! - Development and testing
//! - Single process demos where losing state on restart is acceptable
//!
//! Conditional updates run while holding the round's shard lock, so the
//! compare-and-swap is atomic with respect to every other writer in the process.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rota_storage::{
    CreateRoundParams, NewNotification, OutboxId, OutboxMessage, Precondition, Progress, Round,
    RoundChanges, RoundId, RoundStatus, RoundStore, StoreError, UserId,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct MemoryStore {
    rounds: Arc<DashMap<RoundId, Round>>,
    outbox: Arc<Mutex<VecDeque<OutboxMessage>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rounds: Arc::new(DashMap::new()),
            outbox: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Number of undelivered outbox rows.
    pub fn outbox_len(&self) -> usize {
        self.outbox.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn push_outbox(&self, rows: &[NewNotification]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let mut queue = self
            .outbox
            .lock()
            .map_err(|_| StoreError::Backend("outbox lock poisoned".into()))?;
        for row in rows {
            queue.push_back(OutboxMessage::from_new(OutboxId(Uuid::now_v7()), row, now));
        }
        Ok(())
    }

    fn newest_first(mut rounds: Vec<Round>) -> Vec<Round> {
        rounds.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rounds
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoundStore for MemoryStore {
    async fn create_round(&self, params: &CreateRoundParams) -> Result<Round, StoreError> {
        match self.rounds.entry(params.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let round = Round {
                    id: params.id.clone(),
                    creator_id: params.creator_id.clone(),
                    target_id: params.target_id.clone(),
                    candidates: params.candidates.clone(),
                    progress: Progress::fresh(params.mode),
                    status: RoundStatus::Pending,
                    revision: 0,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(round.clone());
                Ok(round)
            }
        }
    }

    async fn get_round(&self, id: &RoundId) -> Result<Round, StoreError> {
        self.rounds
            .get(id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_if_status(
        &self,
        id: &RoundId,
        expected: &Precondition,
        changes: &RoundChanges,
        outbox: &[NewNotification],
    ) -> Result<Round, StoreError> {
        let mut entry = self.rounds.get_mut(id).ok_or(StoreError::NotFound)?;
        if entry.precondition() != *expected {
            return Err(StoreError::Conflict);
        }
        // Outbox rows go in before the round is released so no reader sees
        // the new state without its notifications queued.
        self.push_outbox(outbox)?;
        changes.apply_to(entry.value_mut(), Utc::now());
        Ok(entry.value().clone())
    }

    async fn list_rounds_by_creator(&self, creator: &UserId) -> Result<Vec<Round>, StoreError> {
        let rounds = self
            .rounds
            .iter()
            .filter(|r| r.creator_id == *creator)
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::newest_first(rounds))
    }

    async fn list_pending_rounds_for_candidate(
        &self,
        candidate: &UserId,
    ) -> Result<Vec<Round>, StoreError> {
        let rounds = self
            .rounds
            .iter()
            .filter(|r| r.status == RoundStatus::Pending && r.is_candidate(candidate))
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::newest_first(rounds))
    }

    async fn enqueue_notifications(&self, rows: &[NewNotification]) -> Result<(), StoreError> {
        self.push_outbox(rows)
    }

    async fn claim_notifications(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        let mut queue = self
            .outbox
            .lock()
            .map_err(|_| StoreError::Backend("outbox lock poisoned".into()))?;
        let take = limit.min(queue.len());
        Ok(queue.drain(..take).collect())
    }
}
