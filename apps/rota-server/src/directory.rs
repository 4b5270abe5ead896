//! Directory file: the server's view of users, connections and targets.
//!
//! ```json
//! {
//!   "users": [
//!     { "id": "…", "name": "Ana", "email": "ana@example.com",
//!       "disabled": [{ "kind": "invite_received", "channel": "email" }] }
//!   ],
//!   "connections": [["<user id>", "<user id>"]],
//!   "targets": [{ "id": "…", "title": "Sunday hike" }]
//! }
//! ```
//!
//! Connections are mutual. Users missing from the file get no display name,
//! so notifications about them use the generic wording.

use async_trait::async_trait;
use rota_engine::{ConnectionDirectory, LookupError, ProfileDirectory};
use rota_notify::{Channel, NotificationKind, NotificationPreferences, NotifyError};
use rota_storage::{TargetId, UserId};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read directory file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid directory file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DirectoryFile {
    users: Vec<UserEntry>,
    connections: Vec<(UserId, UserId)>,
    targets: Vec<TargetEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    id: UserId,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    disabled: Vec<DisabledNotification>,
}

#[derive(Debug, Deserialize)]
struct DisabledNotification {
    kind: NotificationKind,
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct TargetEntry {
    id: TargetId,
    title: String,
}

#[derive(Debug)]
struct Profile {
    name: String,
    email: Option<String>,
    disabled: HashSet<(NotificationKind, Channel)>,
}

#[derive(Debug, Default)]
pub struct FileDirectory {
    profiles: HashMap<UserId, Profile>,
    connections: HashMap<UserId, BTreeSet<UserId>>,
    targets: HashMap<TargetId, String>,
}

impl FileDirectory {
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, DirectoryError> {
        let file: DirectoryFile = serde_json::from_str(raw)?;

        let profiles = file
            .users
            .into_iter()
            .map(|u| {
                let disabled = u.disabled.into_iter().map(|d| (d.kind, d.channel)).collect();
                (
                    u.id,
                    Profile {
                        name: u.name,
                        email: u.email,
                        disabled,
                    },
                )
            })
            .collect();

        let mut connections: HashMap<UserId, BTreeSet<UserId>> = HashMap::new();
        for (a, b) in file.connections {
            if a == b {
                continue;
            }
            connections.entry(a.clone()).or_default().insert(b.clone());
            connections.entry(b).or_default().insert(a);
        }

        let targets = file.targets.into_iter().map(|t| (t.id, t.title)).collect();

        Ok(Self {
            profiles,
            connections,
            targets,
        })
    }

    pub fn email_of(&self, user: &UserId) -> Option<&str> {
        self.profiles.get(user)?.email.as_deref()
    }

    pub fn user_count(&self) -> usize {
        self.profiles.len()
    }
}

#[async_trait]
impl ConnectionDirectory for FileDirectory {
    async fn eligible_connections(&self, user: &UserId) -> Result<Vec<UserId>, LookupError> {
        Ok(self
            .connections
            .get(user)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileDirectory for FileDirectory {
    async fn display_name(&self, user: &UserId) -> Result<String, LookupError> {
        self.profiles
            .get(user)
            .map(|p| p.name.clone())
            .ok_or_else(|| LookupError(format!("unknown user {}", user)))
    }

    async fn target_title(&self, target: &TargetId) -> Result<String, LookupError> {
        self.targets
            .get(target)
            .cloned()
            .ok_or_else(|| LookupError(format!("unknown target {}", target)))
    }
}

#[async_trait]
impl NotificationPreferences for FileDirectory {
    async fn should_notify(
        &self,
        recipient: &UserId,
        kind: NotificationKind,
        channel: Channel,
    ) -> Result<bool, NotifyError> {
        Ok(self
            .profiles
            .get(recipient)
            .map(|p| !p.disabled.contains(&(kind, channel)))
            .unwrap_or(true))
    }
}
