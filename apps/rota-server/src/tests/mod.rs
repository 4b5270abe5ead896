//! Server integration tests.
//!
//! - `common` - test server on an ephemeral port and request helpers
//! - `handlers` - HTTP behaviour of the round endpoints
//! - `serve` - full serve path with health and readiness listeners

pub mod common;
