//! Weather caching and fallback layer for Vane.
//!
//! Fronts the OpenWeatherMap API with a durable TTL cache per location and a
//! short-lived dedupe cache for city searches. Serves cached data first,
//! falls back to stale data when the upstream is down, and degrades to
//! empty/absent results when no API key is configured.

pub mod client;
pub mod config;
pub mod error;
pub mod location;
pub mod search_cache;
pub mod service;
pub mod store;
pub mod types;

pub use client::OpenWeatherClient;
pub use config::WeatherConfig;
pub use error::UpstreamError;
pub use location::location_key;
pub use search_cache::SearchCache;
pub use service::WeatherService;
pub use store::WeatherStore;
pub use types::{CityMatch, CurrentWeather, Observation, ObservedPlace};
