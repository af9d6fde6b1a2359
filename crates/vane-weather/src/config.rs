//! Configuration for the weather subsystem.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key. Empty means no key is configured and the
    /// service runs in degraded mode (cached data only, no upstream calls).
    #[serde(default)]
    pub api_key: String,

    /// How long a cached observation stays live, in minutes.
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: u32,
}

fn default_cache_ttl_minutes() -> u32 {
    20
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
        }
    }
}

impl WeatherConfig {
    /// Load settings from the environment.
    ///
    /// The API key is read from `OPENWEATHERMAP_API_KEY`, falling back to
    /// `WEATHER_API_KEY`; values are trimmed and blank counts as unset.
    /// `WEATHER_CACHE_TTL_MINUTES` overrides the TTL, with unparsable values
    /// falling back to the default.
    pub fn from_env() -> Self {
        let api_key = env_nonblank("OPENWEATHERMAP_API_KEY")
            .or_else(|| env_nonblank("WEATHER_API_KEY"))
            .unwrap_or_default();

        let cache_ttl_minutes = std::env::var("WEATHER_CACHE_TTL_MINUTES")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or_else(default_cache_ttl_minutes);

        Self {
            api_key,
            cache_ttl_minutes,
        }
    }

    /// Check if an API key is configured (non-blank after trimming)
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Cache lifetime as a duration
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.cache_ttl_minutes))
    }
}

fn env_nonblank(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
