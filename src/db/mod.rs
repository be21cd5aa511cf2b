pub mod models;
pub mod queries;
pub mod resolve;
pub mod store;

use rusqlite::Connection;
use rusqlite::ffi::ErrorCode;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
}

impl DbError {
    /// True when SQLite rejected the statement for a constraint
    /// (foreign key restrict, duplicate primary key, NOT NULL).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation
        )
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

const SCHEMA_VERSION: i32 = 1;

/// Storage session handle. Owns one SQLite connection with foreign keys enforced.
pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        // WAL mode for better concurrent read performance
        db.conn.pragma_update(None, "journal_mode", "WAL")?;
        db.conn.pragma_update(None, "synchronous", "NORMAL")?;
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // Cascade / restrict / set-null policies are only enforced with this on
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: artists, songs, venues, sets, tracklists and per-set analytics.
    ///
    /// `set_datetime` holds RFC 3339 UTC text (`2024-05-01T22:00:00Z`) so that
    /// text ordering is chronological; `release_date` holds `YYYY-MM-DD`.
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS artists (
                artist_id       INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name    TEXT NOT NULL,
                country         TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_artists_display_name ON artists(display_name);

            CREATE TABLE IF NOT EXISTS songs (
                song_id             INTEGER PRIMARY KEY AUTOINCREMENT,
                title               TEXT NOT NULL,
                release_date        TEXT,
                duration_seconds    INTEGER,
                genre               TEXT,
                bpm                 INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_songs_title ON songs(title);

            CREATE TABLE IF NOT EXISTS venues (
                venue_id    INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT,
                capacity    INTEGER,
                address     TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_venues_name ON venues(name);

            CREATE TABLE IF NOT EXISTS song_artists (
                song_id     INTEGER NOT NULL REFERENCES songs(song_id) ON DELETE CASCADE,
                artist_id   INTEGER NOT NULL REFERENCES artists(artist_id) ON DELETE CASCADE,
                PRIMARY KEY (song_id, artist_id)
            );
            CREATE INDEX IF NOT EXISTS idx_song_artists_artist ON song_artists(artist_id);

            CREATE TABLE IF NOT EXISTS dj_sets (
                dj_set_id           INTEGER PRIMARY KEY AUTOINCREMENT,
                artist_id           INTEGER NOT NULL REFERENCES artists(artist_id) ON DELETE RESTRICT,
                title               TEXT,
                set_datetime        TEXT,
                duration_minutes    INTEGER,
                source_url          TEXT,
                venue_id            INTEGER REFERENCES venues(venue_id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_dj_sets_artist ON dj_sets(artist_id);
            CREATE INDEX IF NOT EXISTS idx_dj_sets_venue ON dj_sets(venue_id);
            CREATE INDEX IF NOT EXISTS idx_dj_sets_datetime ON dj_sets(set_datetime);

            CREATE TABLE IF NOT EXISTS set_songs (
                set_song_id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                song_id                     INTEGER NOT NULL REFERENCES songs(song_id) ON DELETE CASCADE,
                dj_set_id                   INTEGER NOT NULL REFERENCES dj_sets(dj_set_id) ON DELETE CASCADE,
                timestamp_in_set_seconds    INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_set_songs_set ON set_songs(dj_set_id);
            CREATE INDEX IF NOT EXISTS idx_set_songs_song ON set_songs(song_id);

            CREATE TABLE IF NOT EXISTS set_analytics (
                dj_set_id           INTEGER PRIMARY KEY REFERENCES dj_sets(dj_set_id) ON DELETE CASCADE,
                tickets_sold        INTEGER,
                attendance_count    INTEGER,
                gross_revenue       INTEGER,
                stream_count        INTEGER,
                like_count          INTEGER
            );
            ",
        )?;
        Ok(())
    }
}
