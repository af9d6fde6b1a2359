//! Vane: cached weather lookups from the command line.
//!
//! Smoke binary for the weather subsystem: searches for a city, then fetches
//! current weather for the first match through the cache. Runs in degraded
//! mode (cached data only) when no API key is configured.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use vane_weather::{OpenWeatherClient, SearchCache, WeatherConfig, WeatherService, WeatherStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = WeatherConfig::from_env();
    if !config.has_api_key() {
        tracing::warn!("no API key configured; serving cached data only");
    }

    let db_path =
        std::env::var("VANE_CACHE_DB").unwrap_or_else(|_| "vane_weather.db".to_string());
    let store = WeatherStore::new(&db_path)?;
    let service = WeatherService::new(config, OpenWeatherClient::new()?, store, SearchCache::new());

    let query = std::env::args().nth(1).unwrap_or_else(|| "Berlin".to_string());
    let cities = service.search_cities(&query).await;
    if cities.is_empty() {
        println!("No matches for \"{query}\"");
        return Ok(());
    }

    println!("Matches for \"{query}\":");
    for city in &cities {
        let region = if city.region.is_empty() {
            String::new()
        } else {
            format!(" ({})", city.region)
        };
        println!("  {}, {}{}", city.name, city.country, region);
    }

    let Some((lat, lon)) = cities.iter().find_map(|c| c.lat.zip(c.lon)) else {
        println!("No coordinates available for any match");
        return Ok(());
    };

    match service.current_weather(lat, lon).await? {
        Some(weather) => {
            println!("\nCurrent weather at {lat:.4},{lon:.4} (as of {}):", weather.cached_at);
            if let Some(temp) = weather.temperature_c {
                println!("  Temperature: {temp:.1} °C");
            }
            if let Some(humidity) = weather.humidity {
                println!("  Humidity:    {humidity}%");
            }
            if let Some(conditions) = &weather.conditions {
                println!("  Conditions:  {conditions}");
            }
            if let Some(wind) = weather.wind_speed_kmh {
                println!("  Wind:        {wind:.1} km/h");
            }
        }
        None => println!("\nNo weather data available"),
    }

    Ok(())
}
