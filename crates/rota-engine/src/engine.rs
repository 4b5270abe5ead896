use rota_notify::{
    Channel, NotificationContent, NotificationKind, NotificationPreferences, FALLBACK_NAME,
    FALLBACK_TITLE,
};
use rota_storage::{
    CreateRoundParams, NewNotification, Round, RoundChanges, RoundId, RoundMode, RoundStatus,
    RoundStore, StoreError, TargetId, UserId,
};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::directory::{ConnectionDirectory, ProfileDirectory};
use crate::error::EngineError;
use crate::strategy::{strategy_for, Transition};

/// Conditional writes attempted before a lost race is reported as `Conflict`.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

const ALREADY_RESPONDED: &str = "invite has already been responded to";
const NOT_YOUR_TURN: &str = "you are not eligible to respond to this invite";

/// A candidate's answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseAction {
    Accept,
    Decline,
}

impl ResponseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseAction::Accept => "accept",
            ResponseAction::Decline => "decline",
        }
    }
}

impl fmt::Display for ResponseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(ResponseAction::Accept),
            "decline" => Ok(ResponseAction::Decline),
            other => Err(EngineError::Validation(format!(
                "invalid action '{}': expected 'accept' or 'decline'",
                other
            ))),
        }
    }
}

/// Input for [`RoundEngine::create`].
#[derive(Clone, Debug)]
pub struct NewRound {
    pub target_id: TargetId,
    pub mode: RoundMode,
    pub candidates: Vec<UserId>,
}

/// Result of a committed response.
#[derive(Clone, Debug)]
pub struct RespondOutcome {
    pub round: Round,
    pub message: String,
    /// Set only when a sequential decline moved on to another candidate.
    pub next_candidate: Option<UserId>,
}

/// Drives invitation rounds through their lifecycle.
///
/// Stateless between calls: every operation reads the round, validates, and
/// commits through the store's conditional update.
pub struct RoundEngine<S> {
    store: Arc<S>,
    connections: Arc<dyn ConnectionDirectory>,
    profiles: Arc<dyn ProfileDirectory>,
    preferences: Arc<dyn NotificationPreferences>,
    channels: Vec<Channel>,
}

impl<S> Clone for RoundEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            connections: self.connections.clone(),
            profiles: self.profiles.clone(),
            preferences: self.preferences.clone(),
            channels: self.channels.clone(),
        }
    }
}

impl<S: RoundStore> RoundEngine<S> {
    /// Engine notifying on the in-app channel only.
    pub fn new(
        store: Arc<S>,
        connections: Arc<dyn ConnectionDirectory>,
        profiles: Arc<dyn ProfileDirectory>,
        preferences: Arc<dyn NotificationPreferences>,
    ) -> Self {
        Self {
            store,
            connections,
            profiles,
            preferences,
            channels: vec![Channel::InApp],
        }
    }

    pub fn with_channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = channels;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ───────────────────────────────────── Lifecycle ─────────────────────────────────────

    /// Create a pending round. Nobody is notified until [`send`](Self::send).
    pub async fn create(&self, creator: &UserId, new: NewRound) -> Result<Round, EngineError> {
        if new.candidates.is_empty() {
            return Err(EngineError::Validation(
                "candidate order must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(new.candidates.len());
        if let Some(dup) = new.candidates.iter().find(|c| !seen.insert(*c)) {
            return Err(EngineError::Validation(format!(
                "candidate {} is listed more than once",
                dup
            )));
        }
        if new.candidates.contains(creator) {
            return Err(EngineError::Validation(
                "you cannot invite yourself".to_string(),
            ));
        }

        let eligible: HashSet<UserId> = self
            .connections
            .eligible_connections(creator)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?
            .into_iter()
            .collect();
        if let Some(outsider) = new.candidates.iter().find(|c| !eligible.contains(c)) {
            return Err(EngineError::Validation(format!(
                "candidate {} is not one of your connections",
                outsider
            )));
        }

        let round = self
            .store
            .create_round(&CreateRoundParams {
                id: RoundId::generate(),
                creator_id: creator.clone(),
                target_id: new.target_id,
                mode: new.mode,
                candidates: new.candidates,
            })
            .await?;

        info!(
            round_id = %round.id,
            creator = %round.creator_id,
            mode = %round.mode(),
            candidates = round.candidates.len(),
            "round created"
        );
        Ok(round)
    }

    /// Notify whoever is currently being asked. Changes nothing; calling it
    /// again re-notifies.
    pub async fn send(&self, round_id: &RoundId, caller: &UserId) -> Result<Round, EngineError> {
        let round = self.store.get_round(round_id).await?;
        if &round.creator_id != caller {
            return Err(EngineError::Forbidden(
                "only the creator can send this invite".to_string(),
            ));
        }
        if round.status != RoundStatus::Pending {
            return Err(EngineError::Validation(format!(
                "cannot send: invite status is {}",
                round.status
            )));
        }

        let recipients = strategy_for(round.mode()).initial_recipients(&round);
        let content = self
            .content(NotificationKind::InviteReceived, &round.creator_id, &round.target_id)
            .await;
        let mut rows = Vec::new();
        for recipient in &recipients {
            rows.extend(
                self.addressed(&round.id, recipient, NotificationKind::InviteReceived, &content)
                    .await,
            );
        }
        self.enqueue_detached(&round.id, &rows).await;

        info!(
            round_id = %round.id,
            mode = %round.mode(),
            recipients = recipients.len(),
            "round sent"
        );
        Ok(round)
    }

    /// Accept or decline on behalf of `caller`.
    ///
    /// `action` is checked before the round is read. A lost race is retried
    /// against a fresh snapshot up to [`MAX_WRITE_ATTEMPTS`] times.
    pub async fn respond(
        &self,
        round_id: &RoundId,
        caller: &UserId,
        action: &str,
    ) -> Result<RespondOutcome, EngineError> {
        let action: ResponseAction = action.parse()?;

        let mut round = self.store.get_round(round_id).await?;
        if round.status != RoundStatus::Pending {
            return Err(EngineError::Validation(format!(
                "cannot respond: invite status is {}",
                round.status
            )));
        }

        let mut decline_notice_sent = false;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let strategy = strategy_for(round.mode());
            if !strategy.may_respond(&round, caller) {
                return Err(EngineError::Forbidden(NOT_YOUR_TURN.to_string()));
            }
            let transition = match action {
                ResponseAction::Accept => strategy.on_accept(&round, caller),
                ResponseAction::Decline => strategy.on_decline(&round, caller),
            }
            .ok_or_else(|| EngineError::Forbidden(NOT_YOUR_TURN.to_string()))?;

            // The creator hears about a decline whether or not the write lands.
            if action == ResponseAction::Decline && !decline_notice_sent {
                let content = self
                    .content(NotificationKind::InviteDeclined, caller, &round.target_id)
                    .await;
                let rows = self
                    .addressed(&round.id, &round.creator_id, NotificationKind::InviteDeclined, &content)
                    .await;
                self.enqueue_detached(&round.id, &rows).await;
                decline_notice_sent = true;
            }

            let outbox = self.transition_notices(&round, caller, action, &transition).await;
            match self
                .store
                .update_if_status(&round.id, &round.precondition(), &transition.changes, &outbox)
                .await
            {
                Ok(updated) => {
                    info!(
                        round_id = %updated.id,
                        caller = %caller,
                        action = %action,
                        mode = %updated.mode(),
                        status = %updated.status,
                        pointer = updated.pointer_index(),
                        "response recorded"
                    );
                    let message = outcome_message(action, &updated, &transition);
                    return Ok(RespondOutcome {
                        round: updated,
                        message,
                        next_candidate: transition.next_candidate,
                    });
                }
                Err(StoreError::Conflict) => {
                    debug!(round_id = %round.id, attempt, "lost update race, re-reading round");
                    round = self.store.get_round(round_id).await?;
                    if round.status.is_terminal() {
                        return Err(EngineError::Validation(ALREADY_RESPONDED.to_string()));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(round_id = %round_id, caller = %caller, "giving up after repeated update conflicts");
        Err(EngineError::Conflict)
    }

    /// Cancel a pending round. Silent: nobody is notified.
    pub async fn cancel(&self, round_id: &RoundId, caller: &UserId) -> Result<Round, EngineError> {
        let mut round = self.store.get_round(round_id).await?;
        if &round.creator_id != caller {
            return Err(EngineError::Forbidden(
                "only the creator can cancel this invite".to_string(),
            ));
        }
        if round.status != RoundStatus::Pending {
            return Err(EngineError::Validation(format!(
                "cannot cancel: invite status is {}",
                round.status
            )));
        }

        let changes = RoundChanges::status(RoundStatus::Cancelled);
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            match self
                .store
                .update_if_status(&round.id, &round.precondition(), &changes, &[])
                .await
            {
                Ok(updated) => {
                    info!(round_id = %updated.id, creator = %caller, "round cancelled");
                    return Ok(updated);
                }
                Err(StoreError::Conflict) => {
                    debug!(round_id = %round.id, attempt, "lost update race, re-reading round");
                    round = self.store.get_round(round_id).await?;
                    if round.status.is_terminal() {
                        return Err(EngineError::Validation(ALREADY_RESPONDED.to_string()));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::Conflict)
    }

    // ────────────────────────────────────── Queries ──────────────────────────────────────

    /// Read a round the caller created or is a candidate on.
    pub async fn get(&self, round_id: &RoundId, caller: &UserId) -> Result<Round, EngineError> {
        let round = self.store.get_round(round_id).await?;
        if &round.creator_id != caller && !round.is_candidate(caller) {
            return Err(EngineError::Forbidden(
                "you do not have access to this invite".to_string(),
            ));
        }
        Ok(round)
    }

    pub async fn list_created(&self, caller: &UserId) -> Result<Vec<Round>, EngineError> {
        Ok(self.store.list_rounds_by_creator(caller).await?)
    }

    /// Pending rounds waiting on an answer from `caller`.
    pub async fn list_incoming(&self, caller: &UserId) -> Result<Vec<Round>, EngineError> {
        let rounds = self.store.list_pending_rounds_for_candidate(caller).await?;
        Ok(rounds
            .into_iter()
            .filter(|r| strategy_for(r.mode()).may_respond(r, caller))
            .collect())
    }

    pub async fn eligible_candidates(&self, caller: &UserId) -> Result<Vec<UserId>, EngineError> {
        self.connections
            .eligible_connections(caller)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))
    }

    // ─────────────────────────────────── Notifications ───────────────────────────────────

    /// Rows committed together with a transition.
    async fn transition_notices(
        &self,
        round: &Round,
        caller: &UserId,
        action: ResponseAction,
        transition: &Transition,
    ) -> Vec<NewNotification> {
        match (action, &transition.next_candidate) {
            (ResponseAction::Accept, _) => {
                let content = self
                    .content(NotificationKind::InviteAccepted, caller, &round.target_id)
                    .await;
                self.addressed(&round.id, &round.creator_id, NotificationKind::InviteAccepted, &content)
                    .await
            }
            (ResponseAction::Decline, Some(next)) => {
                let content = self
                    .content(NotificationKind::InviteReceived, &round.creator_id, &round.target_id)
                    .await;
                self.addressed(&round.id, next, NotificationKind::InviteReceived, &content)
                    .await
            }
            (ResponseAction::Decline, None) => Vec::new(),
        }
    }

    async fn content(
        &self,
        kind: NotificationKind,
        actor: &UserId,
        target: &TargetId,
    ) -> NotificationContent {
        let name = self.profiles.display_name(actor).await.unwrap_or_else(|e| {
            warn!(user = %actor, error = %e, "display name lookup failed");
            FALLBACK_NAME.to_string()
        });
        let title = self.profiles.target_title(target).await.unwrap_or_else(|e| {
            warn!(target = %target, error = %e, "target title lookup failed");
            FALLBACK_TITLE.to_string()
        });
        NotificationContent::new(kind, &name, &title)
    }

    /// One row per configured channel the recipient has not switched off.
    async fn addressed(
        &self,
        round_id: &RoundId,
        recipient: &UserId,
        kind: NotificationKind,
        content: &NotificationContent,
    ) -> Vec<NewNotification> {
        let mut rows = Vec::with_capacity(self.channels.len());
        for &channel in &self.channels {
            match self.preferences.should_notify(recipient, kind, channel).await {
                Ok(true) => rows.push(NewNotification {
                    round_id: round_id.clone(),
                    recipient_id: recipient.clone(),
                    kind,
                    channel,
                    title: content.title.clone(),
                    body: content.body.clone(),
                }),
                Ok(false) => {
                    debug!(recipient = %recipient, kind = %kind, channel = %channel, "notification muted")
                }
                Err(e) => {
                    warn!(recipient = %recipient, kind = %kind, channel = %channel, error = %e, "preference lookup failed, skipping")
                }
            }
        }
        rows
    }

    async fn enqueue_detached(&self, round_id: &RoundId, rows: &[NewNotification]) {
        if rows.is_empty() {
            return;
        }
        if let Err(e) = self.store.enqueue_notifications(rows).await {
            warn!(round_id = %round_id, error = %e, count = rows.len(), "failed to enqueue notifications");
        }
    }
}

fn outcome_message(action: ResponseAction, round: &Round, transition: &Transition) -> String {
    match (action, round.status, &transition.next_candidate) {
        (ResponseAction::Accept, _, _) => "Invite accepted".to_string(),
        (ResponseAction::Decline, _, Some(_)) => {
            "Invite declined, asking the next candidate".to_string()
        }
        (ResponseAction::Decline, RoundStatus::Completed, None) => {
            "Invite declined, no candidates remain".to_string()
        }
        (ResponseAction::Decline, _, None) => "Invite declined".to_string(),
    }
}
