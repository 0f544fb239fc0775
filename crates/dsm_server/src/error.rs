//! Maps [`DsmError`] onto HTTP responses behind a uniform
//! `{ "error": { "code", "message" } }` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dsm_state::DsmError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

pub struct ApiError(pub DsmError);

impl From<DsmError> for ApiError {
    fn from(e: DsmError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            DsmError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            DsmError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            DsmError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
            DsmError::StageMismatch => (StatusCode::BAD_REQUEST, "STAGE_MISMATCH"),
            DsmError::DuplicateSubmission => (StatusCode::CONFLICT, "DUPLICATE_SUBMISSION"),
            DsmError::InvalidRanking(_) => (StatusCode::BAD_REQUEST, "INVALID_RANKING"),
            DsmError::TransientModelFailure(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "TRANSIENT_MODEL_FAILURE")
            }
            DsmError::StoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            DsmError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, code, "request failed");
        } else {
            tracing::debug!(error = %self.0, code, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
