//! Weather lookup for agora.
//!
//! Geocodes city names and fetches current conditions plus a daily forecast
//! from Open-Meteo compatible endpoints. Conditions are described in French.

pub mod client;
pub mod codes;
pub mod model;

pub use client::{ForecastQuery, WeatherService};
pub use codes::describe;
pub use model::{CurrentConditions, DailyForecast, Forecast, Place, Suggestion};
