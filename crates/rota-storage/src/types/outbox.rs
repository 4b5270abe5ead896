//! Notification outbox types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{OutboxId, RoundId, UnknownVariant, UserId};

/// Which protocol event a notification reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Sent to a candidate who is now being asked.
    InviteReceived,
    /// Sent to the creator when a candidate accepts.
    InviteAccepted,
    /// Sent to the creator when a candidate declines.
    InviteDeclined,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::InviteReceived => "invite_received",
            NotificationKind::InviteAccepted => "invite_accepted",
            NotificationKind::InviteDeclined => "invite_declined",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invite_received" => Ok(NotificationKind::InviteReceived),
            "invite_accepted" => Ok(NotificationKind::InviteAccepted),
            "invite_declined" => Ok(NotificationKind::InviteDeclined),
            other => Err(UnknownVariant {
                kind: "notification kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Delivery channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_app" => Ok(Channel::InApp),
            "email" => Ok(Channel::Email),
            other => Err(UnknownVariant {
                kind: "channel",
                value: other.to_string(),
            }),
        }
    }
}

/// A notification ready to be written to the outbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNotification {
    pub round_id: RoundId,
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub channel: Channel,
    pub title: String,
    pub body: String,
}

/// Outbox row awaiting delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboxMessage {
    pub id: OutboxId,
    pub round_id: RoundId,
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub channel: Channel,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn from_new(id: OutboxId, n: &NewNotification, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            round_id: n.round_id.clone(),
            recipient_id: n.recipient_id.clone(),
            kind: n.kind,
            channel: n.channel,
            title: n.title.clone(),
            body: n.body.clone(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_its_own_name() {
        for kind in [
            NotificationKind::InviteReceived,
            NotificationKind::InviteAccepted,
            NotificationKind::InviteDeclined,
        ] {
            assert_eq!(kind.to_string().parse::<NotificationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_channel_serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&Channel::InApp).unwrap(), "\"in_app\"");
        let parsed: Channel = serde_json::from_str("\"email\"").unwrap();
        assert_eq!(parsed, Channel::Email);
    }

    #[test]
    fn test_unknown_channel() {
        let err = "sms".parse::<Channel>().unwrap_err();
        assert_eq!(err.kind, "channel");
        assert_eq!(err.value, "sms");
    }
}
