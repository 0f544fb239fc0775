//! The deliberation platform's HTTP entrypoint: wires [`Config`] into a
//! [`DeliberationService`], builds the axum [`Router`] over the full
//! endpoint table, and serves it with `tower_http`'s tracing layer —
//! parse config once, build the pipeline, run it.

mod auth;
mod config;
mod dto;
mod error;
mod llm_client;
mod state;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use dsm_algo::generator::{ChainOfThoughtGenerator, MockGenerator, StatementGenerator};
use dsm_algo::predictor::{ChainOfThoughtPredictor, MockPredictor, RankingPredictor};
use dsm_state::{DeliberationService, InMemoryStore, Store};

use crate::auth::AuthenticatedParticipant;
use crate::config::Config;
use crate::dto::{
    CreateDeliberationRequest, DeliberationDetailResponse, DeliberationListResponse,
    DeliberationResultResponse, HealthResponse, RegisterRequest, RegisterResponse, StageQuery,
    SubmitCritiqueRequest, SubmitFeedbackRequest, SubmitOpinionRequest, SubmitRankingRequest,
};
use crate::error::ApiError;
use crate::llm_client::HttpSampleTextClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    tracing::info!(bind_addr = %config.bind_addr, text_model_id = %config.text_model_id, "starting dsm_server");

    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let (generator, predictor): (Arc<dyn StatementGenerator>, Arc<dyn RankingPredictor>) =
        if config.text_model_id == "mock" {
            (Arc::new(MockGenerator::default()), Arc::new(MockPredictor))
        } else {
            let endpoint = config.text_model_endpoint.clone().ok_or_else(|| {
                anyhow::anyhow!("DSM_TEXT_MODEL_ENDPOINT must be set when DSM_TEXT_MODEL_ID is not \"mock\"")
            })?;
            let client = Arc::new(HttpSampleTextClient::new(endpoint, config.text_model_id.clone()));
            (
                Arc::new(ChainOfThoughtGenerator::new(client.clone())),
                Arc::new(ChainOfThoughtPredictor::new(client)),
            )
        };

    let service = DeliberationService::spawn(store, generator, predictor, config.engine_config());
    let state = AppState {
        service,
        config: Arc::new(config),
    };

    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agents/register", post(register))
        .route("/deliberations", post(create_deliberation).get(list_deliberations))
        .route("/deliberations/{id}", get(get_deliberation))
        .route("/deliberations/{id}/opinions", post(submit_opinion))
        .route("/deliberations/{id}/statements", get(get_statements))
        .route("/deliberations/{id}/rankings", post(submit_ranking))
        .route("/deliberations/{id}/critiques", post(submit_critique))
        .route("/deliberations/{id}/feedback", post(submit_feedback))
        .route("/deliberations/{id}/result", get(get_result))
        .route("/deliberations/{id}/recheck", post(recheck_transition))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        text_model_id: state.config.text_model_id.clone(),
    })
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let (participant, token) = state.service.register_participant(request.name, request.human_name).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse::new(participant, token))))
}

async fn create_deliberation(
    State(state): State<AppState>,
    AuthenticatedParticipant(creator): AuthenticatedParticipant,
    Json(request): Json<CreateDeliberationRequest>,
) -> Result<(StatusCode, Json<dsm_state::Deliberation>), ApiError> {
    let deliberation = state
        .service
        .create(
            request.question,
            request.max_participants,
            request.num_critique_rounds,
            request.metadata,
            creator.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(deliberation)))
}

/// The heartbeat endpoint agents poll to discover deliberations;
/// unauthenticated, since discovery happens before a participant has a
/// reason to authenticate against any particular deliberation.
async fn list_deliberations(
    State(state): State<AppState>,
    Query(query): Query<StageQuery>,
) -> Result<Json<DeliberationListResponse>, ApiError> {
    let stage = query.parse().map_err(|e| ApiError(dsm_state::DsmError::Validation(e)))?;
    let deliberations = state.service.list(stage).await?;
    Ok(Json(DeliberationListResponse {
        total: deliberations.len(),
        deliberations,
    }))
}

async fn get_deliberation(
    State(state): State<AppState>,
    Path(id): Path<dsm_core::DeliberationId>,
) -> Result<Json<DeliberationDetailResponse>, ApiError> {
    let detail = state.service.get(id).await?;
    Ok(Json(detail.into()))
}

async fn submit_opinion(
    State(state): State<AppState>,
    Path(id): Path<dsm_core::DeliberationId>,
    AuthenticatedParticipant(participant): AuthenticatedParticipant,
    Json(request): Json<SubmitOpinionRequest>,
) -> Result<(StatusCode, Json<dsm_state::Opinion>), ApiError> {
    let opinion = state.service.submit_opinion(id, participant.id, request.text).await?;
    Ok((StatusCode::CREATED, Json(opinion)))
}

async fn get_statements(
    State(state): State<AppState>,
    Path(id): Path<dsm_core::DeliberationId>,
    AuthenticatedParticipant(_participant): AuthenticatedParticipant,
) -> Result<Json<Vec<dsm_state::Statement>>, ApiError> {
    let statements = state.service.get_current_statements(id).await?;
    Ok(Json(statements))
}

async fn submit_ranking(
    State(state): State<AppState>,
    Path(id): Path<dsm_core::DeliberationId>,
    AuthenticatedParticipant(participant): AuthenticatedParticipant,
    Json(request): Json<SubmitRankingRequest>,
) -> Result<(StatusCode, Json<dsm_state::Ranking>), ApiError> {
    let ranked = request
        .statement_rankings
        .into_iter()
        .map(|entry| (entry.statement_id, entry.rank))
        .collect();
    let ranking = state.service.submit_ranking(id, participant.id, ranked).await?;
    Ok((StatusCode::CREATED, Json(ranking)))
}

async fn submit_critique(
    State(state): State<AppState>,
    Path(id): Path<dsm_core::DeliberationId>,
    AuthenticatedParticipant(participant): AuthenticatedParticipant,
    Json(request): Json<SubmitCritiqueRequest>,
) -> Result<(StatusCode, Json<dsm_state::Critique>), ApiError> {
    let critique = state.service.submit_critique(id, participant.id, request.text).await?;
    Ok((StatusCode::CREATED, Json(critique)))
}

async fn submit_feedback(
    State(state): State<AppState>,
    Path(id): Path<dsm_core::DeliberationId>,
    AuthenticatedParticipant(participant): AuthenticatedParticipant,
    Json(request): Json<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<dsm_state::HumanFeedback>), ApiError> {
    let feedback = state
        .service
        .submit_feedback(id, participant.id, request.agreement_level, request.text)
        .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<dsm_core::DeliberationId>,
) -> Result<Json<DeliberationResultResponse>, ApiError> {
    let result = state.service.get_result(id).await?;
    Ok(Json(result.into()))
}

/// Operator action (SUPPLEMENTED FEATURES): re-check `id`'s transition
/// predicate without waiting for the next submission. Always `202`; the
/// recheck itself happens off the request path on the job queue.
async fn recheck_transition(
    State(state): State<AppState>,
    Path(id): Path<dsm_core::DeliberationId>,
) -> StatusCode {
    state.service.recheck_transition(id);
    StatusCode::ACCEPTED
}
