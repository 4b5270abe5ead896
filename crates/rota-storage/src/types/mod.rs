//! Type definitions for rota storage.

mod ids;
mod outbox;
mod rounds;

// Re-export all types from submodules
pub use ids::*;
pub use outbox::*;
pub use rounds::*;
