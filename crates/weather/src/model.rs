//! Upstream payloads and the shaped forecast.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codes::describe;

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    /// Display label: `name, admin1, country`, or `name, country` without
    /// a region.
    #[must_use]
    pub fn label(&self) -> String {
        let name = self.name.as_deref().unwrap_or("Ville");
        let country = self.country.as_deref().unwrap_or("Pays");
        match self.admin1.as_deref().filter(|a| !a.is_empty()) {
            Some(admin) => format!("{name}, {admin}, {country}"),
            None => format!("{name}, {country}"),
        }
    }
}

/// A place offered while typing a city name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub label: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub admin1: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Place> for Suggestion {
    fn from(place: Place) -> Self {
        Self {
            label: place.label(),
            name: place.name,
            country: place.country,
            admin1: place.admin1,
            latitude: place.latitude,
            longitude: place.longitude,
        }
    }
}

/// Geocoding search response. A missing `results` field means no match.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct GeocodingResponse {
    #[serde(default)]
    pub results: Vec<Place>,
}

/// Forecast response, kept loose: any field may be absent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ForecastResponse {
    #[serde(default)]
    pub current: RawCurrent,
    #[serde(default)]
    pub daily: RawDaily,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawCurrent {
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    /// Kept raw: only integer codes are looked up.
    pub weather_code: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDaily {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub weather_code: Vec<Value>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability_max: Vec<Option<f64>>,
}

/// Current conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind: Option<f64>,
    pub weather: String,
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub date: String,
    pub weather: String,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    /// Maximum precipitation probability, in percent.
    pub rain: Option<f64>,
}

/// Forecast for one place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub location: String,
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
}

impl Forecast {
    /// Shape an upstream response. Days follow `daily.time`; shorter parallel
    /// arrays leave the missing entries empty.
    pub(crate) fn from_response(place: &Place, response: ForecastResponse) -> Self {
        let ForecastResponse { current, daily } = response;

        let days = daily
            .time
            .iter()
            .enumerate()
            .map(|(i, date)| DailyForecast {
                date: date.clone(),
                weather: describe(daily.weather_code.get(i).and_then(Value::as_i64)).to_string(),
                temp_min: daily.temperature_2m_min.get(i).copied().flatten(),
                temp_max: daily.temperature_2m_max.get(i).copied().flatten(),
                rain: daily.precipitation_probability_max.get(i).copied().flatten(),
            })
            .collect();

        Self {
            location: place.label(),
            current: CurrentConditions {
                temperature: current.temperature_2m,
                humidity: current.relative_humidity_2m,
                wind: current.wind_speed_10m,
                weather: describe(current.weather_code.as_ref().and_then(Value::as_i64)).to_string(),
            },
            daily: days,
        }
    }
}
