//! Authentication endpoints.

use agora_common::AppResult;
use agora_core::{AccountSession, SigninInput, SignupInput};
use axum::{Router, extract::State, routing::post};
use serde::Serialize;

use crate::{extractors::JsonBody, middleware::AppState, response::ApiResponse};

/// Account response.
#[derive(Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
    /// Capability token for the `Authorization` header.
    pub token: String,
}

impl From<AccountSession> for AccountResponse {
    fn from(session: AccountSession) -> Self {
        Self {
            id: session.user.id,
            username: session.user.username,
            is_admin: session.user.is_admin,
            token: session.token,
        }
    }
}

/// Create a new user account.
async fn signup(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignupInput>,
) -> AppResult<ApiResponse<AccountResponse>> {
    let session = state.user_service.signup(req).await?;
    Ok(ApiResponse::ok(session.into()))
}

/// Sign in to an existing account.
async fn signin(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SigninInput>,
) -> AppResult<ApiResponse<AccountResponse>> {
    let session = state.user_service.signin(req).await?;
    Ok(ApiResponse::ok(session.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
}
