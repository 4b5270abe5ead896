use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rota_engine::EngineError;
use serde::Serialize;

/// Error returned by HTTP handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Unauthorized(String),
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Conflict => StatusCode::CONFLICT,
                EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Label for the error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Engine(e) => e.kind(),
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::BadRequest(_) => "bad_request",
        }
    }

    fn message(&self) -> String {
        match self {
            // Backend details stay in the log.
            ApiError::Engine(EngineError::Internal(_)) => "internal server error".to_string(),
            ApiError::Engine(e) => e.to_string(),
            ApiError::Unauthorized(msg) | ApiError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Engine(EngineError::Internal(detail)) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        let body = ErrorBody {
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
