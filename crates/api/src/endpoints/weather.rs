//! Weather endpoints.

use agora_common::AppResult;
use agora_weather::{Forecast, ForecastQuery, Suggestion};
use axum::{Router, extract::State, routing::get};
use serde::Deserialize;

use crate::{extractors::QueryParams, middleware::AppState, response::ApiResponse};

/// City suggestion query.
#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub q: String,
}

/// Places matching a partial city name.
async fn suggest(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SuggestQuery>,
) -> AppResult<ApiResponse<Vec<Suggestion>>> {
    let suggestions = state.weather_service.suggest(&query.q).await?;
    Ok(ApiResponse::ok(suggestions))
}

/// Current conditions and daily forecast.
async fn forecast(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ForecastQuery>,
) -> AppResult<ApiResponse<Forecast>> {
    let forecast = state.weather_service.forecast(query).await?;
    Ok(ApiResponse::ok(forecast))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/suggest", get(suggest))
        .route("/forecast", get(forecast))
}
