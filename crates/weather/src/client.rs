//! HTTP client for the geocoding and forecast APIs.

use std::time::Duration;

use agora_common::{AppError, AppResult, config::WeatherConfig};
use reqwest::Client;
use serde::Deserialize;

use crate::model::{Forecast, ForecastResponse, GeocodingResponse, Place, Suggestion};

/// Queries shorter than this return no suggestions.
const MIN_SUGGEST_CHARS: usize = 2;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code";
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max";

/// Parameters of a forecast lookup.
///
/// Either `city`, or both `lat` and `lon`, must be present. Coordinates win
/// when both are given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastQuery {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
}

/// Weather service.
#[derive(Clone)]
pub struct WeatherService {
    config: WeatherConfig,
    http_client: Client,
}

impl WeatherService {
    /// Create a new weather service.
    pub fn new(config: WeatherConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("agora/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Places matching a partial city name.
    pub async fn suggest(&self, query: &str) -> AppResult<Vec<Suggestion>> {
        let query = query.trim();
        if query.chars().count() < MIN_SUGGEST_CHARS {
            return Ok(Vec::new());
        }

        let places = self.geocode(query, self.config.suggestion_count).await?;
        Ok(places.into_iter().map(Suggestion::from).collect())
    }

    /// Current conditions and daily forecast for a city or coordinates.
    pub async fn forecast(&self, query: ForecastQuery) -> AppResult<Forecast> {
        let city = query
            .city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);

        let place = match (query.lat, query.lon) {
            (Some(latitude), Some(longitude)) => Place {
                name: Some(city.unwrap_or_else(|| "Ville sélectionnée".to_string())),
                admin1: query.admin1,
                country: Some(query.country.unwrap_or_else(|| "Pays inconnu".to_string())),
                latitude,
                longitude,
            },
            _ => {
                let Some(city) = city else {
                    return Err(AppError::Validation(
                        "Ville ou coordonnées manquantes.".to_string(),
                    ));
                };
                self.geocode(&city, 1)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| AppError::NotFound("Aucune ville trouvée.".to_string()))?
            }
        };

        let response = self.fetch_forecast(place.latitude, place.longitude).await?;
        Ok(Forecast::from_response(&place, response))
    }

    async fn geocode(&self, name: &str, count: u32) -> AppResult<Vec<Place>> {
        let count = count.to_string();
        let response = self
            .http_client
            .get(&self.config.geocoding_url)
            .query(&[
                ("name", name),
                ("count", count.as_str()),
                ("language", self.config.language.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| upstream_error("geocoding", &e))?;

        let parsed: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| upstream_error("geocoding", &e))?;

        tracing::debug!(query = %name, results = parsed.results.len(), "Geocoded city");
        Ok(parsed.results)
    }

    async fn fetch_forecast(&self, latitude: f64, longitude: f64) -> AppResult<ForecastResponse> {
        let response = self
            .http_client
            .get(&self.config.forecast_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", self.config.forecast_days.to_string()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| upstream_error("forecast", &e))?;

        response
            .json()
            .await
            .map_err(|e| upstream_error("forecast", &e))
    }
}

fn upstream_error(api: &str, err: &reqwest::Error) -> AppError {
    tracing::warn!(api, error = %err, "Weather upstream call failed");
    AppError::UpstreamUnavailable(format!("{api} request failed: {err}"))
}
