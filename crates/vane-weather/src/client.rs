//! OpenWeatherMap HTTP client: city geocoding search and current weather.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::error::UpstreamError;
use crate::types::{CityMatch, Observation, ObservedPlace};

const GEO_URL: &str = "https://api.openweathermap.org/geo/1.0/direct";
const WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: usize = 2;
const RETRY_BACKOFF: [Duration; MAX_RETRIES] = [Duration::from_secs(1), Duration::from_secs(2)];

/// HTTP client for the two OpenWeatherMap read endpoints.
///
/// Both operations no-op (empty result, zero network calls) when the API key
/// is blank, so callers can run without credentials. Transport failures and
/// 5xx responses are retried with bounded backoff before an error surfaces.
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    geo_url: String,
    weather_url: String,
    backoff: [Duration; MAX_RETRIES],
}

impl OpenWeatherClient {
    /// Build a client with the fixed per-request timeout.
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            geo_url: GEO_URL.to_string(),
            weather_url: WEATHER_URL.to_string(),
            backoff: RETRY_BACKOFF,
        })
    }

    /// Client pointed at a mock server, with retry delays zeroed.
    #[cfg(test)]
    pub(crate) fn new_with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            geo_url: format!("{base_url}/geo/1.0/direct"),
            weather_url: format!("{base_url}/data/2.5/weather"),
            backoff: [Duration::ZERO; MAX_RETRIES],
        }
    }

    /// Search cities by name via the geocoding endpoint.
    ///
    /// A blank API key or query returns an empty list without any network
    /// call.
    #[instrument(skip(self, api_key), level = "info")]
    pub async fn search_cities(
        &self,
        api_key: &str,
        query: &str,
    ) -> Result<Vec<CityMatch>, UpstreamError> {
        if api_key.trim().is_empty() {
            return Ok(Vec::new());
        }
        let q = query.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .get_with_retry(
                &self.geo_url,
                &[
                    ("q", q.to_string()),
                    ("limit", "10".to_string()),
                    ("appid", api_key.to_string()),
                ],
            )
            .await?;

        if response.status() != StatusCode::OK {
            return Err(error_from_status("geocoding", response).await);
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Unexpected(format!("geocoding response decode: {e}")))?;

        // The provider signals some failures inside a 200 body.
        if let Some(cod) = data.get("cod") {
            if cod_truthy(cod) {
                return Err(rejected_from_body(&data, cod));
            }
        }

        match data {
            Value::Array(_) => {
                let entries: Vec<GeoEntry> = serde_json::from_value(data).map_err(|e| {
                    UpstreamError::Unexpected(format!("geocoding response decode: {e}"))
                })?;
                Ok(entries.into_iter().map(CityMatch::from).collect())
            }
            // 200 with neither a result array nor an error object: no results.
            _ => Ok(Vec::new()),
        }
    }

    /// Fetch current weather for a coordinate pair, normalized to metric.
    ///
    /// A blank API key returns `Ok(None)` without any network call. Missing
    /// response sections yield `None` fields, never an error.
    #[instrument(skip(self, api_key), level = "info")]
    pub async fn current_weather(
        &self,
        api_key: &str,
        lat: f64,
        lon: f64,
    ) -> Result<Option<Observation>, UpstreamError> {
        if api_key.trim().is_empty() {
            return Ok(None);
        }

        let response = self
            .get_with_retry(
                &self.weather_url,
                &[
                    ("lat", lat.to_string()),
                    ("lon", lon.to_string()),
                    ("appid", api_key.to_string()),
                    ("units", "metric".to_string()),
                ],
            )
            .await?;

        if response.status() != StatusCode::OK {
            return Err(error_from_status("weather", response).await);
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Unexpected(format!("weather response decode: {e}")))?;

        // Weather responses carry `cod: 200` on success, an error code
        // (number or string) otherwise.
        if let Some(cod) = data.get("cod") {
            if cod_truthy(cod) && cod_status(cod) != Some(200) {
                return Err(rejected_from_body(&data, cod));
            }
        }

        let body: CurrentResponse = serde_json::from_value(data)
            .map_err(|e| UpstreamError::Unexpected(format!("weather response decode: {e}")))?;

        Ok(Some(body.into_observation()))
    }

    /// GET with bounded retries on 5xx responses, timeouts, and connection
    /// failures. The final attempt's response is returned as-is; callers
    /// classify non-200 statuses.
    async fn get_with_retry(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, UpstreamError> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).query(params).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt < MAX_RETRIES {
                        tracing::warn!(%status, attempt, "upstream server error, retrying");
                        tokio::time::sleep(self.backoff[attempt]).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if attempt < MAX_RETRIES {
                        tracing::warn!(error = %e, attempt, "upstream unreachable, retrying");
                        tokio::time::sleep(self.backoff[attempt]).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(UpstreamError::Transient {
                        message: e.to_string(),
                        status: None,
                        body: None,
                    });
                }
                Err(e) => return Err(UpstreamError::Unexpected(e.to_string())),
            }
        }
    }
}

/// Classify a non-200 response once retries are exhausted.
async fn error_from_status(what: &str, response: reqwest::Response) -> UpstreamError {
    let status = response.status();
    let body = response.text().await.ok();
    let message = format!("OpenWeatherMap {what} failed: {}", status.as_u16());
    if status.is_server_error() {
        UpstreamError::Transient {
            message,
            status: Some(status.as_u16()),
            body,
        }
    } else {
        UpstreamError::Rejected {
            message,
            status: Some(status.as_u16()),
            body,
        }
    }
}

/// Error embedded in a 200 body (`{"cod": ..., "message": ...}`).
fn rejected_from_body(data: &Value, cod: &Value) -> UpstreamError {
    let message = data
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string();
    UpstreamError::Rejected {
        message,
        status: cod_status(cod),
        body: Some(data.to_string()),
    }
}

/// The provider sends `cod` as a number or a string; normalize leniently.
fn cod_status(cod: &Value) -> Option<u16> {
    match cod {
        Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cod_truthy(cod: &Value) -> bool {
    match cod {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// One entry of the geocoding response array.
#[derive(Debug, Deserialize)]
struct GeoEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    country: String,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl From<GeoEntry> for CityMatch {
    fn from(entry: GeoEntry) -> Self {
        Self {
            id: format!("{},{}", entry.name, entry.country),
            name: entry.name,
            region: entry.state,
            country: entry.country,
            lat: entry.lat,
            lon: entry.lon,
        }
    }
}

/// Current-weather response, reduced to the fields consumed.
#[derive(Debug, Deserialize)]
struct CurrentResponse {
    main: Option<CurrentMain>,
    weather: Option<Vec<CurrentCondition>>,
    wind: Option<CurrentWind>,
    name: Option<String>,
    sys: Option<CurrentSys>,
    coord: Option<CurrentCoord>,
}

#[derive(Debug, Deserialize)]
struct CurrentMain {
    temp: Option<f64>,
    humidity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CurrentCondition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CurrentSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentCoord {
    lat: Option<f64>,
    lon: Option<f64>,
}

impl CurrentResponse {
    fn into_observation(self) -> Observation {
        // wind.speed arrives in m/s; convert to km/h, one decimal.
        let wind_speed_kmh = self
            .wind
            .and_then(|w| w.speed)
            .map(|ms| (ms * 3.6 * 10.0).round() / 10.0);

        let (temperature_c, humidity) = match self.main {
            Some(main) => (main.temp, main.humidity),
            None => (None, None),
        };

        let conditions = self
            .weather
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.description);

        let (lat, lon) = match self.coord {
            Some(coord) => (coord.lat, coord.lon),
            None => (None, None),
        };

        Observation {
            temperature_c,
            humidity,
            conditions,
            wind_speed_kmh,
            place: ObservedPlace {
                name: self.name,
                country: self.sys.and_then(|s| s.country),
                lat,
                lon,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_cities_maps_results() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "Berlin"))
            .and(query_param("limit", "10"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Berlin", "state": "Berlin", "country": "DE", "lat": 52.52, "lon": 13.405},
                {"name": "Berlin", "country": "US", "lat": 39.79, "lon": -89.9}
            ])))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let cities = client.search_cities("test-key", "Berlin").await.unwrap();

        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].id, "Berlin,DE");
        assert_eq!(cities[0].region, "Berlin");
        assert_eq!(cities[0].lat, Some(52.52));
        assert_eq!(cities[1].id, "Berlin,US");
        assert_eq!(cities[1].region, "");
    }

    #[tokio::test]
    async fn test_blank_key_or_query_skips_network() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());

        assert!(client.search_cities("  ", "Berlin").await.unwrap().is_empty());
        assert!(client.search_cities("key", "  ").await.unwrap().is_empty());
        assert!(client.current_weather("", 52.52, 13.405).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_embedded_error_is_rejected_without_retry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": 401,
                "message": "Invalid API key"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let err = client.search_cities("bad-key", "Berlin").await.unwrap_err();

        match err {
            UpstreamError::Rejected { message, status, .. } => {
                assert_eq!(message, "Invalid API key");
                assert_eq!(status, Some(401));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_unexpected_shape_yields_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "unexpected": "shape"
            })))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let cities = client.search_cities("key", "Berlin").await.unwrap();

        assert!(cities.is_empty());
    }

    #[tokio::test]
    async fn test_current_weather_normalizes_fields() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": 200,
                "main": {"temp": 21.3, "humidity": 64},
                "weather": [{"description": "light rain"}],
                "wind": {"speed": 10.0},
                "name": "Berlin",
                "sys": {"country": "DE"},
                "coord": {"lat": 52.52, "lon": 13.405}
            })))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let obs = client
            .current_weather("test-key", 52.52, 13.405)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(obs.temperature_c, Some(21.3));
        assert_eq!(obs.humidity, Some(64));
        assert_eq!(obs.conditions.as_deref(), Some("light rain"));
        // 10.0 m/s is 36.0 km/h.
        assert_eq!(obs.wind_speed_kmh, Some(36.0));
        assert_eq!(obs.place.name.as_deref(), Some("Berlin"));
        assert_eq!(obs.place.country.as_deref(), Some("DE"));
        assert_eq!(obs.place.lat, Some(52.52));
    }

    #[tokio::test]
    async fn test_current_weather_rounds_wind_to_one_decimal() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": 200,
                "wind": {"speed": 4.12}
            })))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let obs = client.current_weather("key", 0.0, 0.0).await.unwrap().unwrap();

        // 4.12 m/s = 14.832 km/h, rounded to 14.8.
        assert_eq!(obs.wind_speed_kmh, Some(14.8));
    }

    #[tokio::test]
    async fn test_current_weather_missing_sections_default_to_absent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"cod": 200})),
            )
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let obs = client.current_weather("key", 52.52, 13.405).await.unwrap().unwrap();

        assert_eq!(obs.temperature_c, None);
        assert_eq!(obs.humidity, None);
        assert_eq!(obs.conditions, None);
        assert_eq!(obs.wind_speed_kmh, None);
        assert_eq!(obs.place, ObservedPlace::default());
    }

    #[tokio::test]
    async fn test_current_weather_embedded_string_cod() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let err = client.current_weather("key", 0.0, 0.0).await.unwrap_err();

        match err {
            UpstreamError::Rejected { message, status, .. } => {
                assert_eq!(message, "city not found");
                assert_eq!(status, Some(404));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_4xx_rejected_after_single_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let err = client.current_weather("key", 0.0, 0.0).await.unwrap_err();

        match err {
            UpstreamError::Rejected { status, body, .. } => {
                assert_eq!(status, Some(404));
                assert_eq!(body.as_deref(), Some("not found"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_persistent_5xx_makes_exactly_three_attempts() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let err = client.current_weather("key", 52.52, 13.405).await.unwrap_err();

        match err {
            UpstreamError::Transient { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("expected Transient, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recovers_when_5xx_clears() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Oslo", "country": "NO", "lat": 59.91, "lon": 10.75}
            ])))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new_with_base_url(&mock_server.uri());
        let cities = client.search_cities("key", "Oslo").await.unwrap();

        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].id, "Oslo,NO");
    }

    #[tokio::test]
    async fn test_connection_failure_is_transient() {
        // Nothing listens on this port; every attempt fails to connect.
        let client = OpenWeatherClient::new_with_base_url("http://127.0.0.1:9");
        let err = client.current_weather("key", 52.52, 13.405).await.unwrap_err();

        match err {
            UpstreamError::Transient { status, .. } => assert_eq!(status, None),
            other => panic!("expected Transient, got {other:?}"),
        }
    }
}
