//! Single-row reads and writes against a borrowed connection.
//!
//! Everything here takes `&Connection` rather than `&Database` so that the
//! composite workflows can run several of these inside one transaction
//! (`Transaction` derefs to `Connection`).

use super::Result;
use super::models::{
    Artist, DjSet, NewArtist, NewDjSet, NewSong, NewVenue, SetAnalytics, Song, Venue,
    at_stored_precision, decode_date, decode_datetime, encode_date, encode_datetime,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

pub(crate) const ARTIST_COLS: &str = "a.artist_id, a.display_name, a.country";
pub(crate) const SONG_COLS: &str =
    "g.song_id, g.title, g.release_date, g.duration_seconds, g.genre, g.bpm";
pub(crate) const VENUE_COLS: &str = "v.venue_id, v.name, v.capacity, v.address";
pub(crate) const SET_COLS: &str =
    "s.dj_set_id, s.artist_id, s.title, s.set_datetime, s.duration_minutes, s.source_url, s.venue_id";
pub(crate) const ANALYTICS_COLS: &str =
    "x.dj_set_id, x.tickets_sold, x.attendance_count, x.gross_revenue, x.stream_count, x.like_count";

// Row readers. `base` is the index of the first column of the entity in the row.

pub(crate) fn read_artist(row: &Row, base: usize) -> rusqlite::Result<Artist> {
    Ok(Artist {
        artist_id: row.get(base)?,
        display_name: row.get(base + 1)?,
        country: row.get(base + 2)?,
    })
}

pub(crate) fn read_song(row: &Row, base: usize) -> rusqlite::Result<Song> {
    Ok(Song {
        song_id: row.get(base)?,
        title: row.get(base + 1)?,
        release_date: decode_date(base + 2, row.get(base + 2)?)?,
        duration_seconds: row.get(base + 3)?,
        genre: row.get(base + 4)?,
        bpm: row.get(base + 5)?,
    })
}

pub(crate) fn read_venue(row: &Row, base: usize) -> rusqlite::Result<Venue> {
    Ok(Venue {
        venue_id: row.get(base)?,
        name: row.get(base + 1)?,
        capacity: row.get(base + 2)?,
        address: row.get(base + 3)?,
    })
}

/// Venue from a LEFT JOIN: absent when the key column is null.
pub(crate) fn read_venue_opt(row: &Row, base: usize) -> rusqlite::Result<Option<Venue>> {
    let id: Option<i64> = row.get(base)?;
    match id {
        Some(_) => read_venue(row, base).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn read_set(row: &Row, base: usize) -> rusqlite::Result<DjSet> {
    Ok(DjSet {
        dj_set_id: row.get(base)?,
        artist_id: row.get(base + 1)?,
        title: row.get(base + 2)?,
        set_datetime: decode_datetime(base + 3, row.get(base + 3)?)?,
        duration_minutes: row.get(base + 4)?,
        source_url: row.get(base + 5)?,
        venue_id: row.get(base + 6)?,
    })
}

pub(crate) fn read_analytics(row: &Row, base: usize) -> rusqlite::Result<SetAnalytics> {
    Ok(SetAnalytics {
        dj_set_id: row.get(base)?,
        tickets_sold: row.get(base + 1)?,
        attendance_count: row.get(base + 2)?,
        gross_revenue: row.get(base + 3)?,
        stream_count: row.get(base + 4)?,
        like_count: row.get(base + 5)?,
    })
}

/// Analytics from a LEFT JOIN: absent when the key column is null.
pub(crate) fn read_analytics_opt(row: &Row, base: usize) -> rusqlite::Result<Option<SetAnalytics>> {
    let id: Option<i64> = row.get(base)?;
    match id {
        Some(_) => read_analytics(row, base).map(Some),
        None => Ok(None),
    }
}

// Inserts

pub fn insert_artist(conn: &Connection, a: &NewArtist) -> Result<Artist> {
    conn.execute(
        "INSERT INTO artists (display_name, country) VALUES (?1, ?2)",
        params![a.display_name, a.country],
    )?;
    Ok(Artist {
        artist_id: conn.last_insert_rowid(),
        display_name: a.display_name.clone(),
        country: a.country.clone(),
    })
}

pub fn insert_venue(conn: &Connection, v: &NewVenue) -> Result<Venue> {
    conn.execute(
        "INSERT INTO venues (name, capacity, address) VALUES (?1, ?2, ?3)",
        params![v.name, v.capacity, v.address],
    )?;
    Ok(Venue {
        venue_id: conn.last_insert_rowid(),
        name: v.name.clone(),
        capacity: v.capacity,
        address: v.address.clone(),
    })
}

pub fn insert_song(conn: &Connection, s: &NewSong) -> Result<Song> {
    conn.execute(
        "INSERT INTO songs (title, release_date, duration_seconds, genre, bpm)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            s.title,
            s.release_date.as_ref().map(encode_date),
            s.duration_seconds,
            s.genre,
            s.bpm,
        ],
    )?;
    Ok(Song {
        song_id: conn.last_insert_rowid(),
        title: s.title.clone(),
        release_date: s.release_date,
        duration_seconds: s.duration_seconds,
        genre: s.genre.clone(),
        bpm: s.bpm,
    })
}

pub fn insert_set(conn: &Connection, s: &NewDjSet) -> Result<DjSet> {
    conn.execute(
        "INSERT INTO dj_sets (artist_id, title, set_datetime, duration_minutes, source_url, venue_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            s.artist_id,
            s.title,
            s.set_datetime.as_ref().map(encode_datetime),
            s.duration_minutes,
            s.source_url,
            s.venue_id,
        ],
    )?;
    Ok(DjSet {
        dj_set_id: conn.last_insert_rowid(),
        artist_id: s.artist_id,
        title: s.title.clone(),
        set_datetime: s.set_datetime.map(at_stored_precision),
        duration_minutes: s.duration_minutes,
        source_url: s.source_url.clone(),
        venue_id: s.venue_id,
    })
}

/// Link a song to an artist. Returns false if the pair was already linked.
pub fn link_song_artist(conn: &Connection, song_id: i64, artist_id: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO song_artists (song_id, artist_id) VALUES (?1, ?2)
         ON CONFLICT(song_id, artist_id) DO NOTHING",
        params![song_id, artist_id],
    )?;
    Ok(inserted > 0)
}

/// Append a song to a set's tracklist. The same song may appear more than once.
pub fn insert_set_song(
    conn: &Connection,
    dj_set_id: i64,
    song_id: i64,
    timestamp_in_set_seconds: Option<i32>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO set_songs (song_id, dj_set_id, timestamp_in_set_seconds) VALUES (?1, ?2, ?3)",
        params![song_id, dj_set_id, timestamp_in_set_seconds],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Plain insert: a second row for the same set fails with a constraint violation.
pub fn insert_analytics(conn: &Connection, a: &SetAnalytics) -> Result<()> {
    conn.execute(
        "INSERT INTO set_analytics (
            dj_set_id, tickets_sold, attendance_count, gross_revenue, stream_count, like_count
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            a.dj_set_id,
            a.tickets_sold,
            a.attendance_count,
            a.gross_revenue,
            a.stream_count,
            a.like_count,
        ],
    )?;
    Ok(())
}

// Updates

/// Create the analytics row if missing, otherwise overwrite only `tickets_sold`.
pub fn upsert_tickets_sold(
    conn: &Connection,
    dj_set_id: i64,
    tickets_sold: Option<i32>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO set_analytics (dj_set_id, tickets_sold) VALUES (?1, ?2)
         ON CONFLICT(dj_set_id) DO UPDATE SET tickets_sold = excluded.tickets_sold",
        params![dj_set_id, tickets_sold],
    )?;
    Ok(())
}

/// Overwrite every scalar column of a set. Returns rows changed (0 if absent).
pub fn update_set_row(conn: &Connection, s: &DjSet) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE dj_sets SET
            artist_id = ?2, title = ?3, set_datetime = ?4,
            duration_minutes = ?5, source_url = ?6, venue_id = ?7
         WHERE dj_set_id = ?1",
        params![
            s.dj_set_id,
            s.artist_id,
            s.title,
            s.set_datetime.as_ref().map(encode_datetime),
            s.duration_minutes,
            s.source_url,
            s.venue_id,
        ],
    )?;
    Ok(changed)
}

/// Fill in a song's bpm only when it has none yet.
pub fn set_song_bpm_if_absent(conn: &Connection, song_id: i64, bpm: i32) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE songs SET bpm = ?2 WHERE song_id = ?1 AND bpm IS NULL",
        params![song_id, bpm],
    )?;
    Ok(changed > 0)
}

// Deletes. Each returns the number of rows removed.

pub fn clear_set_songs(conn: &Connection, dj_set_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM set_songs WHERE dj_set_id = ?1", params![dj_set_id])?)
}

pub fn delete_analytics(conn: &Connection, dj_set_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM set_analytics WHERE dj_set_id = ?1", params![dj_set_id])?)
}

pub fn delete_set_row(conn: &Connection, dj_set_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM dj_sets WHERE dj_set_id = ?1", params![dj_set_id])?)
}

pub fn delete_artist_row(conn: &Connection, artist_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM artists WHERE artist_id = ?1", params![artist_id])?)
}

pub fn delete_venue_row(conn: &Connection, venue_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM venues WHERE venue_id = ?1", params![venue_id])?)
}

pub fn delete_song_row(conn: &Connection, song_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM songs WHERE song_id = ?1", params![song_id])?)
}

// Lookups by id

pub fn get_artist(conn: &Connection, artist_id: i64) -> Result<Option<Artist>> {
    let sql = format!("SELECT {ARTIST_COLS} FROM artists a WHERE a.artist_id = ?1");
    Ok(conn
        .query_row(&sql, params![artist_id], |row| read_artist(row, 0))
        .optional()?)
}

pub fn get_venue(conn: &Connection, venue_id: i64) -> Result<Option<Venue>> {
    let sql = format!("SELECT {VENUE_COLS} FROM venues v WHERE v.venue_id = ?1");
    Ok(conn
        .query_row(&sql, params![venue_id], |row| read_venue(row, 0))
        .optional()?)
}

pub fn get_song(conn: &Connection, song_id: i64) -> Result<Option<Song>> {
    let sql = format!("SELECT {SONG_COLS} FROM songs g WHERE g.song_id = ?1");
    Ok(conn
        .query_row(&sql, params![song_id], |row| read_song(row, 0))
        .optional()?)
}

pub fn get_set(conn: &Connection, dj_set_id: i64) -> Result<Option<DjSet>> {
    let sql = format!("SELECT {SET_COLS} FROM dj_sets s WHERE s.dj_set_id = ?1");
    Ok(conn
        .query_row(&sql, params![dj_set_id], |row| read_set(row, 0))
        .optional()?)
}

pub fn get_analytics(conn: &Connection, dj_set_id: i64) -> Result<Option<SetAnalytics>> {
    let sql = format!("SELECT {ANALYTICS_COLS} FROM set_analytics x WHERE x.dj_set_id = ?1");
    Ok(conn
        .query_row(&sql, params![dj_set_id], |row| read_analytics(row, 0))
        .optional()?)
}

/// Artists linked to a song, in link order.
pub fn artists_for_song(conn: &Connection, song_id: i64) -> Result<Vec<Artist>> {
    let sql = format!(
        "SELECT {ARTIST_COLS}
         FROM song_artists sa
         JOIN artists a ON a.artist_id = sa.artist_id
         WHERE sa.song_id = ?1
         ORDER BY sa.rowid"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let artists = stmt
        .query_map(params![song_id], |row| read_artist(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(artists)
}
