//! HTTP handlers
//!
//! - rounds: create, send, respond, cancel, get, list created/incoming, candidates
//! - health: liveness, readiness and the Prometheus scrape endpoint

pub mod health;
pub mod rounds;
