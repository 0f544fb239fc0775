//! `X-API-Key` extraction: the header carries the opaque bearer token
//! handed out by `POST /agents/register`; the server hashes and looks it
//! up. Missing or unknown token is `401 UNAUTHENTICATED`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use dsm_state::{DsmError, Participant};

use crate::error::ApiError;
use crate::state::AppState;

const HEADER_NAME: &str = "x-api-key";

pub struct AuthenticatedParticipant(pub Participant);

impl FromRequestParts<AppState> for AuthenticatedParticipant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .ok_or(DsmError::Unauthenticated)?;
        let participant = state.service.authenticate(token).await?;
        Ok(Self(participant))
    }
}
