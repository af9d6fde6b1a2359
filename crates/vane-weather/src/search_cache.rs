//! Short-lived in-process cache for city search results.
//!
//! Shields the geocoding endpoint from duplicate rapid queries (a user typing
//! in a search box). Entries live for five seconds and are evicted lazily on
//! the next read; there is no background sweep and no bound on key count.
//! This cache is per-process and purely load-shedding, never a source of
//! truth.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::CityMatch;

const SEARCH_CACHE_TTL: Duration = Duration::from_secs(5);

type Clock = Box<dyn Fn() -> Instant + Send + Sync>;

struct SearchEntry {
    results: Vec<CityMatch>,
    expires_at: Instant,
}

/// In-memory dedupe cache, keyed by the trimmed lower-cased query.
///
/// Owned by whoever wires the service together and passed in explicitly; the
/// clock is injectable so expiry can be tested without sleeping.
pub struct SearchCache {
    entries: Mutex<HashMap<String, SearchEntry>>,
    clock: Clock,
}

impl SearchCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: Box::new(Instant::now),
        }
    }

    /// Cache with a caller-supplied clock (for testing expiry).
    #[cfg(test)]
    pub(crate) fn with_clock(clock: Clock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Look up an unexpired entry. An expired entry is evicted and reported
    /// as a miss.
    pub fn get(&self, key: &str) -> Option<Vec<CityMatch>> {
        let now = (self.clock)();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.results.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store results under `key` for the next five seconds.
    pub fn insert(&self, key: &str, results: Vec<CityMatch>) {
        let expires_at = (self.clock)() + SEARCH_CACHE_TTL;
        self.entries.lock().insert(
            key.to_string(),
            SearchEntry {
                results,
                expires_at,
            },
        );
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new()
    }
}
