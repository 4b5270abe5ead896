//! Shared fixtures for engine tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rota_engine::*;
use rota_notify::{Channel, NotificationKind, NotificationPreferences, NotifyError};
use rota_storage::{OutboxMessage, Progress, RoundStore};
use rota_store_memory::MemoryStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// In-memory stand-in for the product's connection graph, profiles and
/// notification settings.
#[derive(Default)]
pub struct TestDirectory {
    pub names: HashMap<UserId, String>,
    pub connections: HashMap<UserId, Vec<UserId>>,
    pub titles: HashMap<TargetId, String>,
    pub muted: HashSet<(UserId, Channel)>,
    pub preferences_down: bool,
}

#[async_trait]
impl ConnectionDirectory for TestDirectory {
    async fn eligible_connections(&self, user: &UserId) -> Result<Vec<UserId>, LookupError> {
        Ok(self.connections.get(user).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ProfileDirectory for TestDirectory {
    async fn display_name(&self, user: &UserId) -> Result<String, LookupError> {
        self.names
            .get(user)
            .cloned()
            .ok_or_else(|| LookupError(format!("no profile for {}", user)))
    }

    async fn target_title(&self, target: &TargetId) -> Result<String, LookupError> {
        self.titles
            .get(target)
            .cloned()
            .ok_or_else(|| LookupError(format!("no target {}", target)))
    }
}

#[async_trait]
impl NotificationPreferences for TestDirectory {
    async fn should_notify(
        &self,
        recipient: &UserId,
        _kind: NotificationKind,
        channel: Channel,
    ) -> Result<bool, NotifyError> {
        if self.preferences_down {
            return Err(NotifyError::Preferences("settings service down".into()));
        }
        Ok(!self.muted.contains(&(recipient.clone(), channel)))
    }
}

pub fn user() -> UserId {
    UserId(Uuid::new_v4())
}

/// Creator "Cara" connected to `friends` named "Friend 0", "Friend 1", ...
/// and a target titled "Sunday hike".
pub struct World {
    pub creator: UserId,
    pub friends: Vec<UserId>,
    pub target: TargetId,
    pub directory: TestDirectory,
}

impl World {
    pub fn new(friend_count: usize) -> Self {
        let creator = user();
        let friends: Vec<UserId> = (0..friend_count).map(|_| user()).collect();
        let target = TargetId(Uuid::new_v4());

        let mut directory = TestDirectory::default();
        directory.names.insert(creator.clone(), "Cara".to_string());
        for (i, f) in friends.iter().enumerate() {
            directory.names.insert(f.clone(), format!("Friend {}", i));
            directory
                .connections
                .entry(f.clone())
                .or_default()
                .push(creator.clone());
        }
        directory.connections.insert(creator.clone(), friends.clone());
        directory
            .titles
            .insert(target.clone(), "Sunday hike".to_string());

        Self {
            creator,
            friends,
            target,
            directory,
        }
    }

    pub fn engine(self) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(self.directory);
        let engine = RoundEngine::new(
            store.clone(),
            directory.clone(),
            directory.clone(),
            directory,
        );
        Harness {
            engine,
            store,
            creator: self.creator,
            friends: self.friends,
            target: self.target,
        }
    }
}

pub struct Harness {
    pub engine: RoundEngine<MemoryStore>,
    pub store: Arc<MemoryStore>,
    pub creator: UserId,
    pub friends: Vec<UserId>,
    pub target: TargetId,
}

impl Harness {
    pub async fn create(&self, mode: RoundMode) -> Round {
        self.engine
            .create(
                &self.creator,
                NewRound {
                    target_id: self.target.clone(),
                    mode,
                    candidates: self.friends.clone(),
                },
            )
            .await
            .unwrap()
    }

    /// Everything enqueued since the last drain.
    pub async fn drain(&self) -> Vec<OutboxMessage> {
        self.store.claim_notifications(1000).await.unwrap()
    }
}

/// A pending round snapshot for mocked-store tests.
pub fn pending_round(mode: RoundMode, creator: &UserId, candidates: &[UserId]) -> Round {
    let now = Utc::now();
    Round {
        id: RoundId::generate(),
        creator_id: creator.clone(),
        target_id: TargetId(Uuid::new_v4()),
        candidates: candidates.to_vec(),
        progress: Progress::fresh(mode),
        status: RoundStatus::Pending,
        revision: 0,
        created_at: now,
        updated_at: now,
    }
}
