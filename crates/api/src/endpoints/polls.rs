//! Poll endpoints.

use agora_common::AppResult;
use agora_core::{CreatePollInput, CreatedPoll, PollView, SubmitBallotInput};
use axum::{Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{JsonBody, MaybeCapability, RequireCapability},
    middleware::AppState,
    response::ApiResponse,
};

/// Request naming a poll by token.
#[derive(Debug, Deserialize)]
pub struct PollTokenRequest {
    pub token: String,
}

/// Organizer login request.
#[derive(Debug, Deserialize)]
pub struct OrganizerLoginRequest {
    pub token: String,
    pub code: String,
}

/// Organizer login response.
#[derive(Serialize)]
pub struct OrganizerLoginResponse {
    pub token: String,
}

/// Archive request.
#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub token: String,
    #[serde(default = "default_archived")]
    pub archived: bool,
}

const fn default_archived() -> bool {
    true
}

/// Deadline request. A missing or blank deadline clears it.
#[derive(Debug, Deserialize)]
pub struct DeadlineRequest {
    pub token: String,
    #[serde(default)]
    pub deadline: Option<String>,
}

/// Create a poll.
async fn create(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreatePollInput>,
) -> AppResult<ApiResponse<CreatedPoll>> {
    let created = state.poll_service.create_poll(req).await?;
    Ok(ApiResponse::ok(created))
}

/// Get poll details and results.
async fn show(
    MaybeCapability(capability): MaybeCapability,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PollTokenRequest>,
) -> AppResult<ApiResponse<PollView>> {
    let view = state
        .poll_service
        .view_poll(&req.token, capability.as_ref())
        .await?;
    Ok(ApiResponse::ok(view))
}

/// Submit or replace a ballot.
async fn vote(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SubmitBallotInput>,
) -> AppResult<ApiResponse<PollView>> {
    let view = state.poll_service.submit_ballot(req).await?;
    Ok(ApiResponse::ok(view))
}

/// Exchange the organizer code for an organizer token.
async fn admin_login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<OrganizerLoginRequest>,
) -> AppResult<ApiResponse<OrganizerLoginResponse>> {
    let token = state
        .poll_service
        .organizer_login(&req.token, &req.code)
        .await?;
    Ok(ApiResponse::ok(OrganizerLoginResponse { token }))
}

/// Archive or reopen a poll.
async fn archive(
    RequireCapability(capability): RequireCapability,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ArchiveRequest>,
) -> AppResult<ApiResponse<PollView>> {
    let view = state
        .poll_service
        .set_archived(&req.token, req.archived, &capability)
        .await?;
    Ok(ApiResponse::ok(view))
}

/// Set or clear the deadline.
async fn deadline(
    RequireCapability(capability): RequireCapability,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DeadlineRequest>,
) -> AppResult<ApiResponse<PollView>> {
    let view = state
        .poll_service
        .set_deadline(&req.token, req.deadline.as_deref(), &capability)
        .await?;
    Ok(ApiResponse::ok(view))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/show", post(show))
        .route("/vote", post(vote))
        .route("/admin-login", post(admin_login))
        .route("/archive", post(archive))
        .route("/deadline", post(deadline))
}
