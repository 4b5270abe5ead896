//! Round handlers: create, send, respond, cancel, read and list

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rota_engine::{EngineError, NewRound, ResponseAction};
use rota_storage::{Round, RoundId, RoundMode, RoundStatus, TargetId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::{record_transition, RequestTimer};
use crate::server::{AppState, Caller};

// ────────────────────────────────────── Wire types ──────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub id: RoundId,
    pub creator_id: UserId,
    pub target_id: TargetId,
    pub mode: RoundMode,
    pub candidate_order: Vec<UserId>,
    pub pointer_index: usize,
    pub declined: Vec<UserId>,
    pub status: RoundStatus,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Round> for RoundView {
    fn from(round: Round) -> Self {
        Self {
            mode: round.mode(),
            pointer_index: round.pointer_index(),
            declined: round.declined().to_vec(),
            id: round.id,
            creator_id: round.creator_id,
            target_id: round.target_id,
            candidate_order: round.candidates,
            status: round.status,
            revision: round.revision,
            created_at: round.created_at,
            updated_at: round.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoundEnvelope {
    pub round: RoundView,
}

impl From<Round> for RoundEnvelope {
    fn from(round: Round) -> Self {
        Self {
            round: round.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoundList {
    pub rounds: Vec<RoundView>,
}

#[derive(Debug, Serialize)]
pub struct CandidateList {
    pub candidates: Vec<UserId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondResponse {
    pub round: RoundView,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_candidate_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoundRequest {
    pub target_id: TargetId,
    pub mode: RoundMode,
    pub candidate_order: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoundRequest {
    pub status: String,
}

// ─────────────────────────────────────── Helpers ───────────────────────────────────────

fn parse_round_id(raw: &str) -> Result<RoundId, ApiError> {
    Uuid::parse_str(raw)
        .map(RoundId)
        .map_err(|_| ApiError::BadRequest(format!("invalid invite id: {}", raw)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn observe<T>(timer: RequestTimer, result: Result<T, ApiError>) -> Result<T, ApiError> {
    match &result {
        Ok(_) => timer.success(),
        Err(e) => timer.error(e.kind()),
    }
    result
}

// ─────────────────────────────────────── Handlers ──────────────────────────────────────

pub async fn create_round(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<CreateRoundRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoundEnvelope>), ApiError> {
    let timer = RequestTimer::new("create_round");
    let result = async {
        let req = body(payload)?;
        let round = state
            .engine
            .create(
                &caller,
                NewRound {
                    target_id: req.target_id,
                    mode: req.mode,
                    candidates: req.candidate_order,
                },
            )
            .await?;
        Ok::<_, ApiError>((StatusCode::CREATED, Json(RoundEnvelope::from(round))))
    }
    .await;
    observe(timer, result)
}

pub async fn send_round(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<RoundEnvelope>, ApiError> {
    let timer = RequestTimer::new("send_round");
    let result = async {
        let id = parse_round_id(&id)?;
        let round = state.engine.send(&id, &caller).await?;
        Ok::<_, ApiError>(Json(RoundEnvelope::from(round)))
    }
    .await;
    observe(timer, result)
}

pub async fn respond(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<RespondRequest>, JsonRejection>,
) -> Result<Json<RespondResponse>, ApiError> {
    let timer = RequestTimer::new("respond");
    let result = async {
        let id = parse_round_id(&id)?;
        let req = body(payload)?;
        let action: ResponseAction = req.action.parse()?;
        let outcome = state.engine.respond(&id, &caller, action.as_str()).await?;
        record_transition(action.as_str(), outcome.round.status.as_str());
        Ok::<_, ApiError>(Json(RespondResponse {
            round: outcome.round.into(),
            message: outcome.message,
            next_candidate_id: outcome.next_candidate,
        }))
    }
    .await;
    observe(timer, result)
}

/// `PATCH /rounds/{id}`: the only supported change is `{"status": "cancelled"}`.
pub async fn update_round(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateRoundRequest>, JsonRejection>,
) -> Result<Json<RoundEnvelope>, ApiError> {
    let timer = RequestTimer::new("update_round");
    let result = async {
        let id = parse_round_id(&id)?;
        let req = body(payload)?;
        if req.status != RoundStatus::Cancelled.as_str() {
            return Err(ApiError::from(EngineError::Validation(format!(
                "unsupported status change '{}': only 'cancelled' is allowed",
                req.status
            ))));
        }
        let round = state.engine.cancel(&id, &caller).await?;
        record_transition("cancel", round.status.as_str());
        Ok::<_, ApiError>(Json(RoundEnvelope::from(round)))
    }
    .await;
    observe(timer, result)
}

pub async fn get_round(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<RoundEnvelope>, ApiError> {
    let timer = RequestTimer::new("get_round");
    let result = async {
        let id = parse_round_id(&id)?;
        let round = state.engine.get(&id, &caller).await?;
        Ok::<_, ApiError>(Json(RoundEnvelope::from(round)))
    }
    .await;
    observe(timer, result)
}

pub async fn list_created(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<RoundList>, ApiError> {
    let timer = RequestTimer::new("list_created");
    let result = state
        .engine
        .list_created(&caller)
        .await
        .map(|rounds| {
            Json(RoundList {
                rounds: rounds.into_iter().map(RoundView::from).collect(),
            })
        })
        .map_err(ApiError::from);
    observe(timer, result)
}

pub async fn list_incoming(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<RoundList>, ApiError> {
    let timer = RequestTimer::new("list_incoming");
    let result = state
        .engine
        .list_incoming(&caller)
        .await
        .map(|rounds| {
            Json(RoundList {
                rounds: rounds.into_iter().map(RoundView::from).collect(),
            })
        })
        .map_err(ApiError::from);
    observe(timer, result)
}

pub async fn eligible_candidates(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<CandidateList>, ApiError> {
    let timer = RequestTimer::new("eligible_candidates");
    let result = state
        .engine
        .eligible_candidates(&caller)
        .await
        .map(|candidates| Json(CandidateList { candidates }))
        .map_err(ApiError::from);
    observe(timer, result)
}
