//! Strongly-typed identifiers (avoid mixing UUIDs arbitrarily).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Invitation round identifier (UUIDv7, time ordered).
    RoundId
);

uuid_id!(
    /// User identifier, as resolved by the upstream authentication layer.
    UserId
);

uuid_id!(
    /// The resource a round recruits collaborators for.
    TargetId
);

uuid_id!(
    /// Notification outbox row identifier.
    OutboxId
);

impl RoundId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}
