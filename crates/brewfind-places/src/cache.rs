//! On-disk result cache for free-provider responses.
//!
//! SQLite key/value store with a TTL enforced on read. The cache is
//! best-effort: storage faults degrade to a miss on read and a no-op on
//! write, and must never be the reason a caller-visible operation fails.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;

use crate::types::Place;

/// Shared on-disk cache keyed by query signature.
///
/// Opened once at process start and passed by handle to the engine, so
/// concurrent callers share one store. The connection sits behind a mutex;
/// SQLite's own transaction guarantees cover durability.
pub struct SearchCache {
    conn: Mutex<Connection>,
}

impl SearchCache {
    /// Open (or create) the cache at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Open the cache at the platform default location
    /// (`<cache_dir>/brewfind/cache.db`).
    pub fn open_default() -> anyhow::Result<Self> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("no cache directory available on this platform"))?
            .join("brewfind");
        std::fs::create_dir_all(&dir)?;
        Self::open(dir.join("cache.db"))
    }

    /// Create an in-memory cache (for testing).
    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                k TEXT PRIMARY KEY,
                v TEXT NOT NULL,
                ts INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Look up a cached result list no older than `max_age`.
    ///
    /// Absent keys, stale entries, corrupt values, and storage faults all
    /// yield `None`; faults are logged and swallowed.
    pub fn get(&self, key: &str, max_age: Duration) -> Option<Vec<Place>> {
        match self.try_get(key, max_age) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::debug!("cache read for '{key}' failed: {e}");
                None
            }
        }
    }

    fn try_get(&self, key: &str, max_age: Duration) -> anyhow::Result<Option<Vec<Place>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT v, ts FROM cache WHERE k = ?1")?;
        let mut rows = stmt.query(params![key])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let value: String = row.get(0)?;
        let ts: i64 = row.get(1)?;

        if Utc::now().timestamp() - ts > max_age.as_secs() as i64 {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&value)?))
    }

    /// Upsert a result list under `key` with the current timestamp.
    ///
    /// Best-effort: storage faults are logged and swallowed.
    pub fn set(&self, key: &str, value: &[Place]) {
        if let Err(e) = self.try_set(key, value) {
            tracing::debug!("cache write for '{key}' failed: {e}");
        }
    }

    fn try_set(&self, key: &str, value: &[Place]) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(value)?;
        self.conn.lock().execute(
            "REPLACE INTO cache (k, v, ts) VALUES (?1, ?2, ?3)",
            params![key, serialized, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Shift a stored entry's timestamp into the past (test hook).
    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    fn backdate(&self, key: &str, secs: i64) {
        self.conn
            .lock()
            .execute(
                "UPDATE cache SET ts = ts - ?1 WHERE k = ?2",
                params![secs, key],
            )
            .unwrap();
    }

    /// Store a raw value, bypassing serialization (test hook).
    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    fn insert_raw(&self, key: &str, value: &str) {
        self.conn
            .lock()
            .execute(
                "REPLACE INTO cache (k, v, ts) VALUES (?1, ?2, ?3)",
                params![key, value, Utc::now().timestamp()],
            )
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::types::PlaceSource;

    fn sample_places() -> Vec<Place> {
        vec![Place {
            name: "Bean There".to_string(),
            latitude: Some(40.0),
            longitude: Some(-74.0),
            address: "1 Main St".to_string(),
            rating: None,
            distance_meters: Some(120.0),
            source: PlaceSource::FreeProvider,
        }]
    }

    #[test]
    fn test_set_then_get_within_ttl() {
        let cache = SearchCache::in_memory().unwrap();
        cache.set("k1", &sample_places());

        let hit = cache.get("k1", Duration::from_secs(60)).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "Bean There");
    }

    #[test]
    fn test_missing_key_is_none() {
        let cache = SearchCache::in_memory().unwrap();
        assert!(cache.get("absent", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_stale_entry_is_none() {
        let cache = SearchCache::in_memory().unwrap();
        cache.set("k1", &sample_places());
        cache.backdate("k1", 100);

        assert!(cache.get("k1", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_entry_at_exact_max_age_is_still_valid() {
        let cache = SearchCache::in_memory().unwrap();
        cache.set("k1", &sample_places());
        cache.backdate("k1", 100);

        // age <= max_age keeps the entry; allow a second of clock skew.
        assert!(cache.get("k1", Duration::from_secs(101)).is_some());
    }

    #[test]
    fn test_corrupt_entry_is_none() {
        let cache = SearchCache::in_memory().unwrap();
        cache.insert_raw("k1", "not json at all");

        assert!(cache.get("k1", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_set_overwrites_prior_entry() {
        let cache = SearchCache::in_memory().unwrap();
        cache.set("k1", &sample_places());
        cache.backdate("k1", 100);

        let mut fresher = sample_places();
        fresher[0].name = "Roast Office".to_string();
        cache.set("k1", &fresher);

        let hit = cache.get("k1", Duration::from_secs(60)).unwrap();
        assert_eq!(hit[0].name, "Roast Office");
    }

    #[test]
    fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = SearchCache::open(&path).unwrap();
            cache.set("k1", &sample_places());
        }

        let reopened = SearchCache::open(&path).unwrap();
        assert!(reopened.get("k1", Duration::from_secs(60)).is_some());
    }
}
