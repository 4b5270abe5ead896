//! Notification text for each protocol event.

use rota_storage::NotificationKind;

/// Display name used when the profile lookup fails.
pub const FALLBACK_NAME: &str = "Someone";
/// Display title used when the target lookup fails.
pub const FALLBACK_TITLE: &str = "your activity";

/// Title and body of a notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    /// Compose content for `kind`.
    ///
    /// `actor_name` is whoever caused the event: the creator for
    /// `InviteReceived`, the responding candidate otherwise.
    pub fn new(kind: NotificationKind, actor_name: &str, target_title: &str) -> Self {
        match kind {
            NotificationKind::InviteReceived => Self {
                title: "Invite Received".to_string(),
                body: format!("{} invited you to join {}", actor_name, target_title),
            },
            NotificationKind::InviteAccepted => Self {
                title: "Invite Accepted!".to_string(),
                body: format!("{} has joined {}", actor_name, target_title),
            },
            NotificationKind::InviteDeclined => Self {
                title: "Invite Declined".to_string(),
                body: format!("{} declined your invite to {}", actor_name, target_title),
            },
        }
    }
}
