//! REST endpoints for driving onboarding and the completion flags.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::form::FormPatch;
use super::orchestrator::OnboardingOrchestrator;
use crate::error::SequenceError;
use crate::sequencer::{AdvanceOutcome, MoveOutcome};
use crate::session::SessionState;
use crate::storage::FlagStore;
use crate::transition::TransitionEffect;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub orchestrator: Arc<OnboardingOrchestrator>,
    pub flags: FlagStore,
}

#[derive(Debug, Default, Deserialize)]
struct AdvanceParams {
    effect: Option<String>,
}

/// Body returned by every navigation endpoint.
#[derive(Debug, Serialize)]
struct StepResponse {
    outcome: &'static str,
    session: SessionState,
}

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(serde_json::json!({"error": message.to_string()}))).into_response()
}

fn sequence_error(e: SequenceError) -> Response {
    let status = match e {
        SequenceError::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::CONFLICT,
    };
    error_response(status, e)
}

async fn step_response(state: &OnboardingRouteState, outcome: &'static str) -> Response {
    let session = state.orchestrator.sequencer().snapshot().await;
    Json(StepResponse { outcome, session }).into_response()
}

fn move_label(outcome: MoveOutcome) -> &'static str {
    match outcome {
        MoveOutcome::Moved { .. } => "moved",
        MoveOutcome::Busy => "busy",
        MoveOutcome::Unchanged => "unchanged",
        MoveOutcome::Ended => "ended",
    }
}

/// GET /api/guide/onboarding
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.orchestrator.status().await)
}

/// POST /api/guide/onboarding/advance?effect=flip-3d
///
/// A busy sequencer is a normal outcome, not an error.
async fn advance(
    State(state): State<OnboardingRouteState>,
    Query(params): Query<AdvanceParams>,
) -> Response {
    let effect = match params.effect.as_deref().map(str::parse::<TransitionEffect>) {
        Some(Ok(effect)) => Some(effect),
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e),
        None => None,
    };
    let label = match state.orchestrator.next(effect).await {
        AdvanceOutcome::Advanced { .. } => "advanced",
        AdvanceOutcome::Busy => "busy",
        AdvanceOutcome::AtEnd => "at_end",
        AdvanceOutcome::Ended => "ended",
    };
    step_response(&state, label).await
}

/// POST /api/guide/onboarding/back
async fn back(State(state): State<OnboardingRouteState>) -> Response {
    let outcome = state.orchestrator.back().await;
    step_response(&state, move_label(outcome)).await
}

/// POST /api/guide/onboarding/jump/{index}
async fn jump(State(state): State<OnboardingRouteState>, Path(index): Path<usize>) -> Response {
    match state.orchestrator.jump_to(index).await {
        Ok(outcome) => step_response(&state, move_label(outcome)).await,
        Err(e) => sequence_error(e),
    }
}

/// POST /api/guide/onboarding/skip
async fn skip(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let skipped = state.orchestrator.skip().await;
    Json(serde_json::json!({ "skipped": skipped }))
}

/// POST /api/guide/onboarding/complete
async fn complete(State(state): State<OnboardingRouteState>) -> Response {
    match state.orchestrator.complete().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => sequence_error(e),
    }
}

/// PUT /api/guide/onboarding/form
async fn update_form(
    State(state): State<OnboardingRouteState>,
    Json(patch): Json<FormPatch>,
) -> Response {
    match state.orchestrator.update_form(patch).await {
        Ok(form) => Json(form).into_response(),
        Err(e) => sequence_error(e),
    }
}

/// GET /api/guide/flags
async fn get_flags(State(state): State<OnboardingRouteState>) -> Response {
    match state.flags.load().await {
        Ok(flags) => Json(flags).into_response(),
        Err(e) => {
            tracing::warn!("Failed to read completion flags: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// POST /api/guide/flags/reset
async fn reset_flags(State(state): State<OnboardingRouteState>) -> Response {
    if let Err(e) = state.flags.reset().await {
        tracing::warn!("Failed to reset completion flags: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
    }
    get_flags(State(state)).await
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/guide/onboarding", get(get_status))
        .route("/api/guide/onboarding/advance", post(advance))
        .route("/api/guide/onboarding/back", post(back))
        .route("/api/guide/onboarding/jump/{index}", post(jump))
        .route("/api/guide/onboarding/skip", post(skip))
        .route("/api/guide/onboarding/complete", post(complete))
        .route("/api/guide/onboarding/form", put(update_form))
        .route("/api/guide/flags", get(get_flags))
        .route("/api/guide/flags/reset", post(reset_flags))
        .with_state(state)
}
