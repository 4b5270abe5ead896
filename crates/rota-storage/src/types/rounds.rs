//! Invitation round types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{RoundId, TargetId, UserId};

/// Returned when a stored or user-supplied string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// How candidates are asked. Fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundMode {
    /// One candidate at a time, in list order; a decline moves on to the next.
    Sequential,
    /// Everyone at once; the first acceptance wins.
    Parallel,
}

impl RoundMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundMode::Sequential => "sequential",
            RoundMode::Parallel => "parallel",
        }
    }
}

impl fmt::Display for RoundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(RoundMode::Sequential),
            "parallel" => Ok(RoundMode::Parallel),
            other => Err(UnknownVariant {
                kind: "round mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Round lifecycle status. Everything except `Pending` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Accepted => "accepted",
            RoundStatus::Completed => "completed",
            RoundStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RoundStatus::Pending)
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RoundStatus::Pending),
            "accepted" => Ok(RoundStatus::Accepted),
            "completed" => Ok(RoundStatus::Completed),
            "cancelled" => Ok(RoundStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "round status",
                value: other.to_string(),
            }),
        }
    }
}

/// Mode-specific progress of a round.
///
/// Persisted as the `pointer_index` / declined columns; in Parallel mode the
/// pointer is only meaningful once someone has accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Index into the candidate order of whoever is currently being asked.
    /// Equal to the candidate count once everybody declined.
    Sequential { pointer: usize },
    /// Candidates who declined (in decline order) and the accepter's index.
    Parallel {
        declined: Vec<UserId>,
        accepted: Option<usize>,
    },
}

impl Progress {
    /// Progress of a round nobody has responded to yet.
    pub fn fresh(mode: RoundMode) -> Self {
        match mode {
            RoundMode::Sequential => Progress::Sequential { pointer: 0 },
            RoundMode::Parallel => Progress::Parallel {
                declined: Vec::new(),
                accepted: None,
            },
        }
    }

    pub fn mode(&self) -> RoundMode {
        match self {
            Progress::Sequential { .. } => RoundMode::Sequential,
            Progress::Parallel { .. } => RoundMode::Parallel,
        }
    }

    /// The flat `pointerIndex` representation.
    pub fn pointer_index(&self) -> usize {
        match self {
            Progress::Sequential { pointer } => *pointer,
            Progress::Parallel { accepted, .. } => accepted.unwrap_or(0),
        }
    }

    pub fn declined(&self) -> &[UserId] {
        match self {
            Progress::Sequential { .. } => &[],
            Progress::Parallel { declined, .. } => declined,
        }
    }
}

/// Invitation round record
#[derive(Clone, Debug, PartialEq)]
pub struct Round {
    pub id: RoundId,
    pub creator_id: UserId,
    pub target_id: TargetId,
    pub candidates: Vec<UserId>,
    pub progress: Progress,
    pub status: RoundStatus,
    /// Bumped on every committed update.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Round {
    pub fn mode(&self) -> RoundMode {
        self.progress.mode()
    }

    pub fn pointer_index(&self) -> usize {
        self.progress.pointer_index()
    }

    pub fn declined(&self) -> &[UserId] {
        self.progress.declined()
    }

    pub fn position_of(&self, user: &UserId) -> Option<usize> {
        self.candidates.iter().position(|c| c == user)
    }

    pub fn is_candidate(&self, user: &UserId) -> bool {
        self.position_of(user).is_some()
    }

    pub fn has_declined(&self, user: &UserId) -> bool {
        self.declined().contains(user)
    }

    /// The candidate who accepted, if the round was accepted.
    pub fn accepted_candidate(&self) -> Option<&UserId> {
        if self.status != RoundStatus::Accepted {
            return None;
        }
        self.candidates.get(self.pointer_index())
    }

    /// The precondition a conditional write against this snapshot must carry.
    pub fn precondition(&self) -> Precondition {
        Precondition {
            status: self.status,
            revision: self.revision,
        }
    }

    /// Check the at-rest invariants of the record.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.candidates.is_empty() {
            return Err("candidate order is empty".to_string());
        }
        for (i, c) in self.candidates.iter().enumerate() {
            if self.candidates[..i].contains(c) {
                return Err(format!("duplicate candidate {}", c));
            }
        }
        if self.pointer_index() > self.candidates.len() {
            return Err(format!(
                "pointer {} out of bounds for {} candidates",
                self.pointer_index(),
                self.candidates.len()
            ));
        }
        if let Some(outsider) = self.declined().iter().find(|d| !self.is_candidate(d)) {
            return Err(format!("declined user {} is not a candidate", outsider));
        }
        if self.status == RoundStatus::Accepted && self.accepted_candidate().is_none() {
            return Err("accepted round does not identify an accepter".to_string());
        }
        Ok(())
    }
}

/// Parameters for creating a round
#[derive(Clone, Debug)]
pub struct CreateRoundParams {
    pub id: RoundId,
    pub creator_id: UserId,
    pub target_id: TargetId,
    pub mode: RoundMode,
    pub candidates: Vec<UserId>,
}

/// Expected stored state for a conditional update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Precondition {
    pub status: RoundStatus,
    pub revision: i64,
}

/// Field-level changes applied by a conditional update. `None` leaves the field as is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoundChanges {
    pub status: Option<RoundStatus>,
    pub progress: Option<Progress>,
}

impl RoundChanges {
    pub fn status(status: RoundStatus) -> Self {
        Self {
            status: Some(status),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Apply to an in-memory record, bumping revision and `updated_at`.
    pub fn apply_to(&self, round: &mut Round, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            round.status = status;
        }
        if let Some(progress) = &self.progress {
            round.progress = progress.clone();
        }
        round.revision += 1;
        round.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    fn round(mode: RoundMode, candidates: Vec<UserId>) -> Round {
        let now = Utc::now();
        Round {
            id: RoundId::generate(),
            creator_id: user(),
            target_id: TargetId(Uuid::new_v4()),
            candidates,
            progress: Progress::fresh(mode),
            status: RoundStatus::Pending,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            RoundStatus::Pending,
            RoundStatus::Accepted,
            RoundStatus::Completed,
            RoundStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RoundStatus>().unwrap(), status);
        }
        assert!("maybe".parse::<RoundStatus>().is_err());
    }

    #[test]
    fn test_only_pending_is_non_terminal() {
        assert!(!RoundStatus::Pending.is_terminal());
        assert!(RoundStatus::Accepted.is_terminal());
        assert!(RoundStatus::Completed.is_terminal());
        assert!(RoundStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_unknown_mode_error_names_value() {
        let err = "roundrobin".parse::<RoundMode>().unwrap_err();
        assert_eq!(err.to_string(), "unknown round mode: roundrobin");
    }

    #[test]
    fn test_parallel_pointer_defaults_to_zero_until_accepted() {
        let progress = Progress::Parallel {
            declined: vec![],
            accepted: None,
        };
        assert_eq!(progress.pointer_index(), 0);

        let progress = Progress::Parallel {
            declined: vec![],
            accepted: Some(2),
        };
        assert_eq!(progress.pointer_index(), 2);
    }

    #[test]
    fn test_accepted_candidate_requires_accepted_status() {
        let (a, b) = (user(), user());
        let mut r = round(RoundMode::Parallel, vec![a.clone(), b.clone()]);
        r.progress = Progress::Parallel {
            declined: vec![],
            accepted: Some(1),
        };
        assert_eq!(r.accepted_candidate(), None);

        r.status = RoundStatus::Accepted;
        assert_eq!(r.accepted_candidate(), Some(&b));
    }

    #[test]
    fn test_invariants_reject_duplicates_and_outsiders() {
        let a = user();
        let r = round(RoundMode::Sequential, vec![a.clone(), a.clone()]);
        assert!(r.check_invariants().is_err());

        let mut r = round(RoundMode::Parallel, vec![a]);
        r.progress = Progress::Parallel {
            declined: vec![user()],
            accepted: None,
        };
        assert!(r.check_invariants().unwrap_err().contains("not a candidate"));
    }

    #[test]
    fn test_invariants_allow_pointer_one_past_end() {
        let mut r = round(RoundMode::Sequential, vec![user(), user()]);
        r.progress = Progress::Sequential { pointer: 2 };
        r.status = RoundStatus::Completed;
        assert!(r.check_invariants().is_ok());

        r.progress = Progress::Sequential { pointer: 3 };
        assert!(r.check_invariants().is_err());
    }

    #[test]
    fn test_apply_bumps_revision_and_keeps_untouched_fields() {
        let mut r = round(RoundMode::Sequential, vec![user(), user()]);
        let later = r.updated_at + chrono::Duration::seconds(5);

        RoundChanges::default()
            .with_progress(Progress::Sequential { pointer: 1 })
            .apply_to(&mut r, later);

        assert_eq!(r.pointer_index(), 1);
        assert_eq!(r.status, RoundStatus::Pending);
        assert_eq!(r.revision, 1);
        assert_eq!(r.updated_at, later);
    }
}
