//! SQLite-backed durable cache of last-known-good weather per location key.
//!
//! Rows are written through on every successful upstream fetch and never
//! proactively deleted: a row past its expiry is invisible to live reads but
//! stays retrievable as fallback data, and survives process restarts.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::types::CurrentWeather;

/// Durable TTL cache keyed by location key, one row per key.
///
/// The connection sits behind a mutex so the store can be shared across
/// concurrent request handlers.
pub struct WeatherStore {
    conn: Mutex<Connection>,
}

impl WeatherStore {
    /// Open (or create) the cache database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    #[cfg(test)]
    pub(crate) fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS weather_cache (
                location_key   TEXT PRIMARY KEY,
                temperature_c  REAL,
                humidity       INTEGER,
                conditions     TEXT,
                wind_speed_kmh REAL,
                cached_at      INTEGER NOT NULL,
                expires_at     INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_weather_cache_expires ON weather_cache(expires_at);
            "#,
        )?;
        Ok(())
    }

    /// Fetch the row for `key` if it is still live at `now`.
    ///
    /// A row whose expiry equals `now` is already expired and not returned.
    pub fn get_live(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CurrentWeather>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT temperature_c, humidity, conditions, wind_speed_kmh, cached_at
             FROM weather_cache
             WHERE location_key = ?1 AND expires_at > ?2",
        )?;
        let mut rows = stmt.query(params![key, now.timestamp_millis()])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_record(row)?)),
            None => Ok(None),
        }
    }

    /// Fetch the row for `key` regardless of expiry (stale fallback lookup).
    pub fn get_any(&self, key: &str) -> Result<Option<CurrentWeather>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT temperature_c, humidity, conditions, wind_speed_kmh, cached_at
             FROM weather_cache
             WHERE location_key = ?1",
        )?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_record(row)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite the row for `key`.
    ///
    /// The primary key resolves concurrent writers for the same key to a
    /// single winning row; the upsert is atomic, not query-then-branch.
    pub fn upsert(
        &self,
        key: &str,
        record: &CurrentWeather,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.lock().execute(
            r#"
            INSERT INTO weather_cache
            (location_key, temperature_c, humidity, conditions, wind_speed_kmh, cached_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(location_key) DO UPDATE SET
                temperature_c = excluded.temperature_c,
                humidity = excluded.humidity,
                conditions = excluded.conditions,
                wind_speed_kmh = excluded.wind_speed_kmh,
                cached_at = excluded.cached_at,
                expires_at = excluded.expires_at
            "#,
            params![
                key,
                record.temperature_c,
                record.humidity,
                record.conditions,
                record.wind_speed_kmh,
                record.cached_at.timestamp_millis(),
                expires_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Total number of cached rows, live or stale.
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM weather_cache", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CurrentWeather> {
        let cached_at_ms: i64 = row.get(4)?;
        Ok(CurrentWeather {
            temperature_c: row.get(0)?,
            humidity: row.get(1)?,
            conditions: row.get(2)?,
            wind_speed_kmh: row.get(3)?,
            cached_at: DateTime::from_timestamp_millis(cached_at_ms).unwrap_or_default(),
        })
    }
}
