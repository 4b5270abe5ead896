//! Invitation round protocol.
//!
//! A creator asks an ordered list of candidates to join a target, either one
//! at a time ([`RoundMode::Sequential`]) or all at once
//! ([`RoundMode::Parallel`]). [`RoundEngine`] validates every request, picks the
//! transition through the mode's [`ModeStrategy`], and commits it with the
//! store's conditional update together with the notifications it causes.

mod directory;
mod engine;
mod error;
mod strategy;

pub use directory::{ConnectionDirectory, LookupError, ProfileDirectory};
pub use engine::{NewRound, RespondOutcome, ResponseAction, RoundEngine, MAX_WRITE_ATTEMPTS};
pub use error::EngineError;
pub use rota_storage::{Round, RoundId, RoundMode, RoundStatus, TargetId, UserId};
pub use strategy::{strategy_for, ModeStrategy, Parallel, Sequential, Transition};
