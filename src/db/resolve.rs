//! Find-or-create by display name, shared by artists, venues and songs.
//!
//! Two lookup modes:
//! - [`find_exact`] / [`resolve`]: equality on the name column, used by the
//!   API-style write paths.
//! - [`search`]: substring candidates for the interactive selection paths,
//!   where the caller picks one or creates a new row.
//!
//! Both are case-sensitive (`=` under BINARY collation, and `instr`).
//! Callers reject blank names before getting here.

use super::Result;
use super::models::{Artist, NewArtist, NewSong, NewVenue, Song, Venue};
use super::store;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// An entity that can be looked up by its display name and created from one.
pub trait Resolvable: Sized {
    /// Human-readable entity name for logs.
    const KIND: &'static str;
    /// `FROM` clause, including the alias the column list uses.
    const FROM: &'static str;
    const ID_COLUMN: &'static str;
    const NAME_COLUMN: &'static str;
    const COLUMNS: &'static str;

    fn from_row(row: &Row) -> rusqlite::Result<Self>;

    /// Insert a new row carrying only the name; every optional field absent.
    fn create(conn: &Connection, name: &str) -> Result<Self>;

    fn id(&self) -> i64;
}

impl Resolvable for Artist {
    const KIND: &'static str = "artist";
    const FROM: &'static str = "artists a";
    const ID_COLUMN: &'static str = "a.artist_id";
    const NAME_COLUMN: &'static str = "a.display_name";
    const COLUMNS: &'static str = store::ARTIST_COLS;

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        store::read_artist(row, 0)
    }

    fn create(conn: &Connection, name: &str) -> Result<Self> {
        store::insert_artist(conn, &NewArtist { display_name: name.to_string(), country: None })
    }

    fn id(&self) -> i64 {
        self.artist_id
    }
}

impl Resolvable for Venue {
    const KIND: &'static str = "venue";
    const FROM: &'static str = "venues v";
    const ID_COLUMN: &'static str = "v.venue_id";
    const NAME_COLUMN: &'static str = "v.name";
    const COLUMNS: &'static str = store::VENUE_COLS;

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        store::read_venue(row, 0)
    }

    fn create(conn: &Connection, name: &str) -> Result<Self> {
        store::insert_venue(conn, &NewVenue { name: Some(name.to_string()), ..Default::default() })
    }

    fn id(&self) -> i64 {
        self.venue_id
    }
}

impl Resolvable for Song {
    const KIND: &'static str = "song";
    const FROM: &'static str = "songs g";
    const ID_COLUMN: &'static str = "g.song_id";
    const NAME_COLUMN: &'static str = "g.title";
    const COLUMNS: &'static str = store::SONG_COLS;

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        store::read_song(row, 0)
    }

    fn create(conn: &Connection, name: &str) -> Result<Self> {
        store::insert_song(conn, &NewSong { title: name.to_string(), ..Default::default() })
    }

    fn id(&self) -> i64 {
        self.song_id
    }
}

/// Oldest row whose name equals `name` exactly.
pub fn find_exact<T: Resolvable>(conn: &Connection, name: &str) -> Result<Option<T>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {} LIMIT 1",
        T::COLUMNS,
        T::FROM,
        T::NAME_COLUMN,
        T::ID_COLUMN
    );
    Ok(conn.query_row(&sql, params![name], T::from_row).optional()?)
}

/// Every row whose name contains `term`, oldest first.
pub fn search<T: Resolvable>(conn: &Connection, term: &str) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE instr({}, ?1) > 0 ORDER BY {}",
        T::COLUMNS,
        T::FROM,
        T::NAME_COLUMN,
        T::ID_COLUMN
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params![term], T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Return the row named exactly `name`, inserting it first if there is none.
/// Inserts at most one row per call.
pub fn resolve<T: Resolvable>(conn: &Connection, name: &str) -> Result<T> {
    if let Some(existing) = find_exact::<T>(conn, name)? {
        log::debug!("Resolved {} \"{}\" to existing id {}", T::KIND, name, existing.id());
        return Ok(existing);
    }
    let created = T::create(conn, name)?;
    log::debug!("Created {} \"{}\" with id {}", T::KIND, name, created.id());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_resolve_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let first: Artist = resolve(&db.conn, "Daft Punk").unwrap();
        let second: Artist = resolve(&db.conn, "Daft Punk").unwrap();
        assert_eq!(first.artist_id, second.artist_id);

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_resolve_never_merges_different_names() {
        let db = Database::open_in_memory().unwrap();
        let a: Artist = resolve(&db.conn, "Daft Punk").unwrap();
        let b: Artist = resolve(&db.conn, "Daft").unwrap();
        let c: Artist = resolve(&db.conn, "daft punk").unwrap();
        assert_ne!(a.artist_id, b.artist_id);
        assert_ne!(a.artist_id, c.artist_id);
    }

    #[test]
    fn test_resolve_creates_with_absent_optionals() {
        let db = Database::open_in_memory().unwrap();
        let v: Venue = resolve(&db.conn, "Printworks").unwrap();
        assert_eq!(v.name.as_deref(), Some("Printworks"));
        assert_eq!(v.capacity, None);
        assert_eq!(v.address, None);

        let s: Song = resolve(&db.conn, "Opener").unwrap();
        assert_eq!(s.title, "Opener");
        assert_eq!(s.bpm, None);
    }

    #[test]
    fn test_find_exact_prefers_oldest_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let first = NewArtist {
            display_name: "Solomun".into(),
            country: None,
        };
        let first = store::insert_artist(&db.conn, &first).unwrap();
        let second = NewArtist {
            display_name: "Solomun".into(),
            country: Some("DE".into()),
        };
        store::insert_artist(&db.conn, &second).unwrap();

        let found: Artist = find_exact(&db.conn, "Solomun").unwrap().unwrap();
        assert_eq!(found.artist_id, first.artist_id);
        assert!(find_exact::<Artist>(&db.conn, "Nobody").unwrap().is_none());
    }

    #[test]
    fn test_search_is_case_sensitive_substring() {
        let db = Database::open_in_memory().unwrap();
        for name in ["Fabric", "Fabric Room 2", "Berghain", "fabric live"] {
            let _: Venue = resolve(&db.conn, name).unwrap();
        }

        let hits: Vec<Venue> = search(&db.conn, "Fabric").unwrap();
        let names: Vec<_> = hits.iter().filter_map(|v| v.name.clone()).collect();
        assert_eq!(names, vec!["Fabric", "Fabric Room 2"]);

        let none: Vec<Venue> = search(&db.conn, "Ministry").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_search_skips_null_venue_names() {
        let db = Database::open_in_memory().unwrap();
        store::insert_venue(&db.conn, &NewVenue::default()).unwrap();
        let hits: Vec<Venue> = search(&db.conn, "a").unwrap();
        assert!(hits.is_empty());
    }
}
