//! Mode-specific rules.
//!
//! Each [`RoundMode`] has one strategy deciding who may respond and what a
//! response does to the round. The engine owns validation order, persistence
//! and notifications; strategies are pure functions of the round snapshot.

use rota_storage::{Progress, Round, RoundChanges, RoundMode, RoundStatus, UserId};

/// Changes a response makes to a round.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub changes: RoundChanges,
    /// Candidate who is asked next, set when a sequential decline moves the pointer on.
    pub next_candidate: Option<UserId>,
}

impl Transition {
    fn to(changes: RoundChanges) -> Self {
        Self {
            changes,
            next_candidate: None,
        }
    }
}

pub trait ModeStrategy: Send + Sync {
    fn mode(&self) -> RoundMode;

    /// Whether `caller` may respond to a pending round right now.
    fn may_respond(&self, round: &Round, caller: &UserId) -> bool;

    /// Who hears about the round when the creator sends it.
    fn initial_recipients(&self, round: &Round) -> Vec<UserId>;

    /// Returns `None` when `caller` may not respond.
    fn on_accept(&self, round: &Round, caller: &UserId) -> Option<Transition>;

    /// Returns `None` when `caller` may not respond.
    fn on_decline(&self, round: &Round, caller: &UserId) -> Option<Transition>;
}

/// Ask candidates one at a time in list order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

/// Ask everyone at once; first acceptance wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct Parallel;

pub fn strategy_for(mode: RoundMode) -> &'static dyn ModeStrategy {
    match mode {
        RoundMode::Sequential => &Sequential,
        RoundMode::Parallel => &Parallel,
    }
}

impl ModeStrategy for Sequential {
    fn mode(&self) -> RoundMode {
        RoundMode::Sequential
    }

    fn may_respond(&self, round: &Round, caller: &UserId) -> bool {
        round.candidates.get(round.pointer_index()) == Some(caller)
    }

    fn initial_recipients(&self, round: &Round) -> Vec<UserId> {
        round
            .candidates
            .get(round.pointer_index())
            .cloned()
            .into_iter()
            .collect()
    }

    fn on_accept(&self, round: &Round, caller: &UserId) -> Option<Transition> {
        if !self.may_respond(round, caller) {
            return None;
        }
        Some(Transition::to(RoundChanges::status(RoundStatus::Accepted)))
    }

    fn on_decline(&self, round: &Round, caller: &UserId) -> Option<Transition> {
        if !self.may_respond(round, caller) {
            return None;
        }
        let next = round.pointer_index() + 1;
        let progress = Progress::Sequential { pointer: next };
        match round.candidates.get(next) {
            Some(next_candidate) => Some(Transition {
                changes: RoundChanges::default().with_progress(progress),
                next_candidate: Some(next_candidate.clone()),
            }),
            None => Some(Transition::to(
                RoundChanges::status(RoundStatus::Completed).with_progress(progress),
            )),
        }
    }
}

impl ModeStrategy for Parallel {
    fn mode(&self) -> RoundMode {
        RoundMode::Parallel
    }

    fn may_respond(&self, round: &Round, caller: &UserId) -> bool {
        round.is_candidate(caller) && !round.has_declined(caller)
    }

    fn initial_recipients(&self, round: &Round) -> Vec<UserId> {
        round
            .candidates
            .iter()
            .filter(|c| !round.has_declined(c))
            .cloned()
            .collect()
    }

    fn on_accept(&self, round: &Round, caller: &UserId) -> Option<Transition> {
        if round.has_declined(caller) {
            return None;
        }
        let index = round.position_of(caller)?;
        let progress = Progress::Parallel {
            declined: round.declined().to_vec(),
            accepted: Some(index),
        };
        Some(Transition::to(
            RoundChanges::status(RoundStatus::Accepted).with_progress(progress),
        ))
    }

    fn on_decline(&self, round: &Round, caller: &UserId) -> Option<Transition> {
        if !self.may_respond(round, caller) {
            return None;
        }
        let mut declined = round.declined().to_vec();
        declined.push(caller.clone());
        let everyone_declined = declined.len() >= round.candidates.len();
        let changes = RoundChanges::default().with_progress(Progress::Parallel {
            declined,
            accepted: None,
        });
        let changes = if everyone_declined {
            RoundChanges {
                status: Some(RoundStatus::Completed),
                ..changes
            }
        } else {
            changes
        };
        Some(Transition::to(changes))
    }
}
