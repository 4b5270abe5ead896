use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;
use rota_engine::RoundEngine;
use rota_storage::UserId;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::StoreBackend;
use crate::error::ApiError;
use crate::handlers::rounds;

/// Header carrying the authenticated user's id, set by the auth proxy in front of us.
pub const CALLER_HEADER: &str = "x-rota-caller";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RoundEngine<StoreBackend>>,
}

impl AppState {
    pub fn new(engine: RoundEngine<StoreBackend>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// The user making the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", CALLER_HEADER)))?;
        let id = raw
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("malformed {} header", CALLER_HEADER)))?;
        Ok(Caller(UserId(id)))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rounds", post(rounds::create_round).get(rounds::list_created))
        .route("/rounds/incoming", get(rounds::list_incoming))
        .route(
            "/rounds/{id}",
            get(rounds::get_round).patch(rounds::update_round),
        )
        .route("/rounds/{id}/send", post(rounds::send_round))
        .route("/rounds/{id}/respond", post(rounds::respond))
        .route("/candidates", get(rounds::eligible_candidates))
        .with_state(state)
}
