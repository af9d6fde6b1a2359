//! Cache key derivation for weather lookups.

/// Derive the canonical cache key for a location.
///
/// Coordinate pairs win over city names: when both `lat` and `lon` are
/// present the key is `latlon:{lat:.4},{lon:.4}` (four decimals, so nearby
/// float representations of the same place collapse to one key). Otherwise
/// the key is `city:{city},{country}` with missing parts as empty strings.
pub fn location_key(
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<&str>,
    country: Option<&str>,
) -> String {
    match (lat, lon) {
        (Some(lat), Some(lon)) => format!("latlon:{:.4},{:.4}", lat, lon),
        _ => format!(
            "city:{},{}",
            city.unwrap_or_default(),
            country.unwrap_or_default()
        ),
    }
}
