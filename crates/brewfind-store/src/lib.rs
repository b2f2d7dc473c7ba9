//! Local user data for Brewfind: home location and saved coffee places.
//!
//! Unlike the result cache, this is real user data — storage faults surface
//! as [`DatabaseError`] instead of being swallowed.

use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

use brewfind_core::error::{DatabaseError, RusqliteErrorExt};
use brewfind_places::Place;

/// A user's stored home location.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeLocation {
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A coffee place pinned by a user.
#[derive(Debug, Clone)]
pub struct SavedPlace {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub source: String,
    pub saved_at: String,
}

/// SQLite store for per-user data.
pub struct UserStore {
    conn: Connection,
}

impl UserStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
        let store = Self { conn };
        store.init_schema()?;
        store.migrate()?;
        Ok(store)
    }

    /// Open the store at the platform default location
    /// (`<data_dir>/brewfind/user.db`).
    pub fn open_default() -> Result<Self, DatabaseError> {
        let dir = dirs::data_dir()
            .ok_or_else(|| {
                DatabaseError::ConnectionFailed("no data directory available".to_string())
            })?
            .join("brewfind");
        std::fs::create_dir_all(&dir)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
        Self::new(dir.join("user.db"))
    }

    /// Create an in-memory store (for testing).
    #[cfg(test)]
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
        let store = Self { conn };
        store.init_schema()?;
        store.migrate()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS home_location (
                    id INTEGER PRIMARY KEY,
                    username TEXT NOT NULL,
                    name TEXT,
                    lat REAL NOT NULL,
                    lng REAL NOT NULL,
                    saved_at TEXT NOT NULL,
                    UNIQUE(username)
                );

                CREATE TABLE IF NOT EXISTS saved_places (
                    id INTEGER PRIMARY KEY,
                    username TEXT NOT NULL,
                    name TEXT NOT NULL,
                    lat REAL NOT NULL,
                    lng REAL NOT NULL,
                    address TEXT NOT NULL DEFAULT '',
                    source TEXT NOT NULL DEFAULT '',
                    saved_at TEXT NOT NULL,
                    UNIQUE(username, name, lat, lng)
                );

                CREATE INDEX IF NOT EXISTS idx_saved_places_user ON saved_places(username);
                "#,
            )
            .map_err(|e| e.into_database_error())?;
        Ok(())
    }

    /// Add the `username` column to tables created before per-user support.
    fn migrate(&self) -> Result<(), DatabaseError> {
        for table in ["home_location", "saved_places"] {
            let has_username = self
                .has_column(table, "username")
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            if !has_username {
                self.conn
                    .execute(
                        &format!(
                            "ALTER TABLE {table} ADD COLUMN username TEXT NOT NULL DEFAULT 'default_user'"
                        ),
                        [],
                    )
                    .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
                tracing::info!("Added username column to {table}");
            }
        }
        Ok(())
    }

    fn has_column(&self, table: &str, column: &str) -> rusqlite::Result<bool> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        for name in names {
            if name? == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Store (or replace) a user's home location.
    pub fn set_home(
        &mut self,
        username: &str,
        name: Option<&str>,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| e.into_database_error())?;

        // Delete-then-insert keeps "one home per user" even on databases
        // migrated from the pre-username schema, which lack the constraint.
        tx.execute(
            "DELETE FROM home_location WHERE username = ?1",
            params![username],
        )
        .map_err(|e| e.into_database_error())?;
        tx.execute(
            "INSERT INTO home_location (username, name, lat, lng, saved_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, name, latitude, longitude, Utc::now().to_rfc3339()],
        )
        .map_err(|e| e.into_database_error())?;

        tx.commit().map_err(|e| e.into_database_error())?;
        Ok(())
    }

    /// A user's home location, if one is stored.
    pub fn home(&self, username: &str) -> Result<Option<HomeLocation>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, lat, lng FROM home_location WHERE username = ?1")
            .map_err(|e| e.into_database_error())?;

        let mut rows = stmt
            .query(params![username])
            .map_err(|e| e.into_database_error())?;

        let Some(row) = rows.next().map_err(|e| e.into_database_error())? else {
            return Ok(None);
        };

        let home = HomeLocation {
            name: row.get(0).map_err(|e| e.into_database_error())?,
            latitude: row.get(1).map_err(|e| e.into_database_error())?,
            longitude: row.get(2).map_err(|e| e.into_database_error())?,
        };
        Ok(Some(home))
    }

    /// Pin a place for a user. Saving the same place twice replaces the
    /// earlier row.
    pub fn save_place(&self, username: &str, place: &Place) -> Result<i64, DatabaseError> {
        let (Some(latitude), Some(longitude)) = (place.latitude, place.longitude) else {
            return Err(DatabaseError::QueryFailed(
                "place has no coordinates".to_string(),
            ));
        };

        self.conn
            .execute(
                r#"
                INSERT OR REPLACE INTO saved_places
                (username, name, lat, lng, address, source, saved_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    username,
                    place.name,
                    latitude,
                    longitude,
                    place.address,
                    place.source.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| e.into_database_error())?;

        Ok(self.conn.last_insert_rowid())
    }

    /// All places pinned by a user, most recently saved first.
    pub fn saved_places(&self, username: &str) -> Result<Vec<SavedPlace>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, name, lat, lng, address, source, saved_at
                FROM saved_places
                WHERE username = ?1
                ORDER BY saved_at DESC, id DESC
                "#,
            )
            .map_err(|e| e.into_database_error())?;

        let rows = stmt
            .query_map(params![username], |row| {
                Ok(SavedPlace {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                    address: row.get(4)?,
                    source: row.get(5)?,
                    saved_at: row.get(6)?,
                })
            })
            .map_err(|e| e.into_database_error())?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.into_database_error())
    }

    /// Remove a pinned place. Returns false if no row matched.
    pub fn delete_place(&self, username: &str, id: i64) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM saved_places WHERE username = ?1 AND id = ?2",
                params![username, id],
            )
            .map_err(|e| e.into_database_error())?;
        Ok(affected > 0)
    }
}
