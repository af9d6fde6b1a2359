//! Shared data types for city search and current-weather lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A city returned by the geocoding search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityMatch {
    /// Stable identifier in the form `"{name},{country}"`.
    pub id: String,
    pub name: String,
    /// Provider's state/region field; empty when the provider omits it.
    pub region: String,
    pub country: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Where the provider says an observation was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedPlace {
    pub name: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// A normalized current-weather observation fetched from the provider.
///
/// Fields the provider omitted are `None`; a sparse observation is still a
/// successful one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub temperature_c: Option<f64>,
    /// Relative humidity in percent.
    pub humidity: Option<i64>,
    pub conditions: Option<String>,
    /// Wind speed converted to km/h, rounded to one decimal.
    pub wind_speed_kmh: Option<f64>,
    pub place: ObservedPlace,
}

/// Current weather as served to callers: the cached fields plus when they
/// were cached. Cache expiry is internal to the store and never exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature_c: Option<f64>,
    pub humidity: Option<i64>,
    pub conditions: Option<String>,
    pub wind_speed_kmh: Option<f64>,
    pub cached_at: DateTime<Utc>,
}

impl CurrentWeather {
    /// Build the caller-facing record from a fresh observation.
    pub fn from_observation(obs: &Observation, cached_at: DateTime<Utc>) -> Self {
        Self {
            temperature_c: obs.temperature_c,
            humidity: obs.humidity,
            conditions: obs.conditions.clone(),
            wind_speed_kmh: obs.wind_speed_kmh,
            cached_at,
        }
    }
}
