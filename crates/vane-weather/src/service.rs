//! Weather orchestrator: cache-first lookups with stale-on-error fallback.
//!
//! Sits between the zone layer and the upstream provider. Upstream
//! availability problems never escape this module: search failures degrade
//! to empty results, weather failures degrade to stale cache data or an
//! explicit absence. Only storage errors propagate, since a swallowed write
//! failure would silently break the TTL contract.

use anyhow::Result;
use chrono::Utc;
use tracing::instrument;

use crate::client::OpenWeatherClient;
use crate::config::WeatherConfig;
use crate::location::location_key;
use crate::search_cache::SearchCache;
use crate::store::WeatherStore;
use crate::types::{CityMatch, CurrentWeather};

/// The weather subsystem's entry points, with all collaborators injected.
pub struct WeatherService {
    config: WeatherConfig,
    client: OpenWeatherClient,
    store: WeatherStore,
    search_cache: SearchCache,
}

impl WeatherService {
    pub fn new(
        config: WeatherConfig,
        client: OpenWeatherClient,
        store: WeatherStore,
        search_cache: SearchCache,
    ) -> Self {
        Self {
            config,
            client,
            store,
            search_cache,
        }
    }

    /// Search cities by name. Never errors: upstream failures degrade to an
    /// empty result list.
    ///
    /// Results are deduped through a five-second in-process cache keyed by
    /// the trimmed lower-cased query; the upstream sees the trimmed query in
    /// its original case.
    #[instrument(skip(self))]
    pub async fn search_cities(&self, query: &str) -> Vec<CityMatch> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let cache_key = trimmed.to_lowercase();

        if let Some(hit) = self.search_cache.get(&cache_key) {
            tracing::debug!(query = %trimmed, "search served from dedupe cache");
            return hit;
        }

        if !self.config.has_api_key() {
            return Vec::new();
        }

        match self.client.search_cities(&self.config.api_key, trimmed).await {
            Ok(results) => {
                self.search_cache.insert(&cache_key, results.clone());
                results
            }
            Err(e) => {
                tracing::warn!(query = %trimmed, error = %e, "city search failed");
                Vec::new()
            }
        }
    }

    /// Current weather for a coordinate pair, cache-first with stale
    /// fallback.
    ///
    /// `Ok(None)` means no data could be produced by any path. Upstream
    /// failures never surface as errors here; only storage failures do.
    ///
    /// # Errors
    ///
    /// Returns an error when reading from or writing to the cache store
    /// fails.
    #[instrument(skip(self))]
    pub async fn current_weather(&self, lat: f64, lon: f64) -> Result<Option<CurrentWeather>> {
        let key = location_key(Some(lat), Some(lon), None, None);
        let now = Utc::now();

        // Cache-first: a live hit skips the upstream entirely.
        if let Some(cached) = self.store.get_live(&key, now)? {
            tracing::debug!(%key, "weather served from cache");
            return Ok(Some(cached));
        }

        // No key means no live fetch. Stale rows are deliberately not
        // consulted here: only a failed upstream call triggers fallback.
        if !self.config.has_api_key() {
            return Ok(None);
        }

        match self.client.current_weather(&self.config.api_key, lat, lon).await {
            Ok(Some(obs)) => {
                let record = CurrentWeather::from_observation(&obs, now);
                self.store.upsert(&key, &record, now + self.config.cache_ttl())?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            // Any failure kind, transient or not: serve last-known-good if
            // a row exists under this key, absent otherwise.
            Err(e) => {
                tracing::warn!(%key, error = %e, "upstream weather fetch failed, trying stale cache");
                self.store.get_any(&key)
            }
        }
    }
}
