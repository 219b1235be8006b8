//! API endpoints.

mod auth;
mod polls;
mod weather;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/polls", polls::router())
        .nest("/weather", weather::router())
}
