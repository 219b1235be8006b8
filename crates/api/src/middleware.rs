//! API middleware.

#![allow(missing_docs)]

use agora_core::{CapabilityService, PollService, UserService};
use agora_weather::WeatherService;
use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub poll_service: PollService,
    pub weather_service: WeatherService,
    pub capability_service: CapabilityService,
}

/// Authentication middleware.
///
/// A valid bearer token attaches its [`agora_core::Capability`] to the
/// request. Invalid tokens are ignored here; handlers that need a capability
/// reject the request themselves.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.capability_service.verify(token.trim()) {
            Ok(capability) => {
                req.extensions_mut().insert(capability);
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid bearer token"),
        }
    }

    next.run(req).await
}
