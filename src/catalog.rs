//! Composite workflows over the storage layer.
//!
//! Every front end (HTTP, console, CLI) calls into these functions with an
//! explicit `&Database`. Create/Update/Delete Set each run in one transaction:
//! a failure at any step rolls back every write made by that call, including
//! artists, venues and songs created along the way.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::models::{
    Artist, DjSet, NewArtist, NewDjSet, NewSong, NewVenue, SetAnalytics, SetDetails, SetListing,
    Song, Venue, at_stored_precision,
};
use crate::db::resolve::{self, Resolvable};
use crate::db::{Database, DbError, store};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Storage failure: {0}")]
    Persistence(DbError),
}

impl From<DbError> for CatalogError {
    fn from(err: DbError) -> Self {
        if err.is_constraint_violation() {
            CatalogError::ConstraintViolation(err.to_string())
        } else {
            CatalogError::Persistence(err)
        }
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::from(err).into()
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

fn not_found(entity: &'static str, id: i64) -> CatalogError {
    CatalogError::NotFound { entity, id }
}

/// Trimmed, non-empty text or a validation error naming `field`.
pub fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed)
}

/// `None` for absent or blank text, otherwise the trimmed text.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

// Datetime input

/// Parse a set datetime. Accepts RFC 3339 with an offset (converted to UTC),
/// `YYYY-MM-DD[T| ]HH:MM[:SS]` without one (taken as UTC), or a bare date
/// (midnight UTC).
pub fn parse_set_datetime(input: &str) -> Result<DateTime<Utc>> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(at_stored_precision(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(CatalogError::Validation(format!("unrecognised date/time \"{s}\"")))
}

/// Parse the upper bound of a date range. A bare date covers that whole day.
pub fn parse_range_end(input: &str) -> Result<DateTime<Utc>> {
    let s = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let next_day = date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1);
        return Ok(next_day - Duration::seconds(1));
    }
    parse_set_datetime(s)
}

// Set summaries (the API projection)

/// Flat view of a set: display names resolved, tracklist as titles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSummary {
    pub dj_set_id: i64,
    pub title: Option<String>,
    pub artist_name: String,
    pub date: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub tickets_sold: Option<i32>,
    pub tracklist: Vec<String>,
}

impl SetSummary {
    fn assemble(
        set: &DjSet,
        artist: &Artist,
        venue: Option<&Venue>,
        tickets_sold: Option<i32>,
        tracklist: Vec<String>,
    ) -> Self {
        Self {
            dj_set_id: set.dj_set_id,
            title: set.title.clone(),
            artist_name: artist.display_name.clone(),
            date: set.set_datetime,
            venue_name: venue.and_then(|v| v.name.clone()),
            tickets_sold,
            tracklist,
        }
    }
}

fn summarize(db: &Database, listing: SetListing) -> Result<SetSummary> {
    let titles = db.tracklist_titles(listing.set.dj_set_id)?;
    Ok(SetSummary::assemble(
        &listing.set,
        &listing.artist,
        listing.venue.as_ref(),
        listing.analytics.and_then(|a| a.tickets_sold),
        titles,
    ))
}

fn summarize_all(db: &Database, listings: Vec<SetListing>) -> Result<Vec<SetSummary>> {
    listings.into_iter().map(|l| summarize(db, l)).collect()
}

pub fn set_summary(db: &Database, dj_set_id: i64) -> Result<SetSummary> {
    let listing = db.set_listing(dj_set_id)?.ok_or(not_found("set", dj_set_id))?;
    summarize(db, listing)
}

pub fn list_set_summaries(db: &Database) -> Result<Vec<SetSummary>> {
    summarize_all(db, db.all_sets()?)
}

pub fn set_summaries_by_artist(db: &Database, artist_id: i64) -> Result<Vec<SetSummary>> {
    summarize_all(db, db.sets_by_artist_id(artist_id)?)
}

pub fn set_summaries_by_venue(db: &Database, venue_id: i64) -> Result<Vec<SetSummary>> {
    summarize_all(db, db.sets_by_venue_id(venue_id)?)
}

pub fn set_summaries_in_range(
    db: &Database,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<SetSummary>> {
    summarize_all(db, db.sets_in_range(start, end)?)
}

/// Substring search on artist or venue name. Exactly one term must be given.
pub fn search_set_summaries(
    db: &Database,
    artist: Option<&str>,
    venue: Option<&str>,
) -> Result<Vec<SetSummary>> {
    let listings = match (non_blank(artist), non_blank(venue)) {
        (Some(term), None) => db.sets_by_artist_name(term)?,
        (None, Some(term)) => db.sets_by_venue_name(term)?,
        _ => {
            return Err(CatalogError::Validation(
                "give exactly one of artist or venue".to_string(),
            ));
        }
    };
    summarize_all(db, listings)
}

pub fn set_details(db: &Database, dj_set_id: i64) -> Result<SetDetails> {
    db.set_details(dj_set_id)?.ok_or(not_found("set", dj_set_id))
}

/// Analytics for an existing set; `None` if none were recorded.
pub fn set_analytics(db: &Database, dj_set_id: i64) -> Result<Option<SetAnalytics>> {
    store::get_set(&db.conn, dj_set_id)?.ok_or(not_found("set", dj_set_id))?;
    Ok(db.set_analytics(dj_set_id)?)
}

// Create / update / delete set (API path)

/// One requested tracklist entry. Blank titles are skipped.
#[derive(Debug, Clone, Default)]
pub struct TrackRequest {
    pub song_title: String,
    pub artist_name: Option<String>,
}

impl TrackRequest {
    pub fn titled(song_title: impl Into<String>) -> Self {
        Self { song_title: song_title.into(), artist_name: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateSet {
    pub title: Option<String>,
    pub artist_name: String,
    pub set_datetime: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub tickets_sold: Option<i32>,
    pub tracklist: Vec<TrackRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSet {
    pub title: Option<String>,
    pub artist_name: String,
    pub set_datetime: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub tickets_sold: Option<i32>,
    pub tracklist: Vec<String>,
}

/// Resolve a blank-checked name inside the current transaction.
fn resolve_named<T: Resolvable>(
    conn: &rusqlite::Connection,
    field: &str,
    name: &str,
) -> Result<T> {
    let name = require_text(field, name)?;
    Ok(resolve::resolve::<T>(conn, name)?)
}

/// Create a set with its artist, venue, analytics row and tracklist.
///
/// The returned summary carries the resolved artist/venue names and the
/// tracklist titles as supplied (blank entries dropped), not re-read.
pub fn create_set(db: &Database, req: &CreateSet) -> Result<SetSummary> {
    let artist_name = require_text("artist", &req.artist_name)?;
    let tx = db.conn.unchecked_transaction()?;

    let artist: Artist = resolve::resolve(&tx, artist_name)?;
    let venue: Option<Venue> = match non_blank(req.venue_name.as_deref()) {
        Some(name) => Some(resolve::resolve(&tx, name)?),
        None => None,
    };

    let set = store::insert_set(
        &tx,
        &NewDjSet {
            artist_id: artist.artist_id,
            title: req.title.clone(),
            set_datetime: req.set_datetime,
            venue_id: venue.as_ref().map(|v| v.venue_id),
            ..Default::default()
        },
    )?;

    store::insert_analytics(
        &tx,
        &SetAnalytics {
            dj_set_id: set.dj_set_id,
            tickets_sold: req.tickets_sold,
            ..Default::default()
        },
    )?;

    let mut titles = Vec::new();
    for entry in &req.tracklist {
        let Some(title) = non_blank(Some(entry.song_title.as_str())) else {
            continue;
        };
        let song: Song = resolve::resolve(&tx, title)?;
        if let Some(artist_name) = non_blank(entry.artist_name.as_deref()) {
            let song_artist: Artist = resolve::resolve(&tx, artist_name)?;
            store::link_song_artist(&tx, song.song_id, song_artist.artist_id)?;
        }
        store::insert_set_song(&tx, set.dj_set_id, song.song_id, None)?;
        titles.push(title.to_string());
    }

    tx.commit()?;
    log::info!(
        "Created set {} for \"{}\" with {} tracks",
        set.dj_set_id,
        artist.display_name,
        titles.len()
    );

    Ok(SetSummary::assemble(&set, &artist, venue.as_ref(), req.tickets_sold, titles))
}

/// Replace a set's title, datetime, artist, venue, ticket count and tracklist.
///
/// Other analytics fields, duration and source URL are left untouched. An
/// absent venue name keeps the current venue.
pub fn update_set(db: &Database, dj_set_id: i64, req: &UpdateSet) -> Result<SetSummary> {
    let artist_name = require_text("artist", &req.artist_name)?;
    let tx = db.conn.unchecked_transaction()?;

    let mut set = store::get_set(&tx, dj_set_id)?.ok_or(not_found("set", dj_set_id))?;

    let artist: Artist = resolve::resolve(&tx, artist_name)?;
    let venue: Option<Venue> = match non_blank(req.venue_name.as_deref()) {
        Some(name) => Some(resolve::resolve(&tx, name)?),
        None => match set.venue_id {
            Some(id) => store::get_venue(&tx, id)?,
            None => None,
        },
    };

    set.title = req.title.clone();
    set.set_datetime = req.set_datetime.map(at_stored_precision);
    set.artist_id = artist.artist_id;
    set.venue_id = venue.as_ref().map(|v| v.venue_id);
    store::update_set_row(&tx, &set)?;

    store::upsert_tickets_sold(&tx, dj_set_id, req.tickets_sold)?;

    let removed = store::clear_set_songs(&tx, dj_set_id)?;
    let mut titles = Vec::new();
    for title in req.tracklist.iter().filter_map(|t| non_blank(Some(t.as_str()))) {
        let song: Song = resolve::resolve(&tx, title)?;
        store::insert_set_song(&tx, dj_set_id, song.song_id, None)?;
        titles.push(title.to_string());
    }

    tx.commit()?;
    log::info!(
        "Updated set {dj_set_id}: replaced {removed} tracks with {}",
        titles.len()
    );

    Ok(SetSummary::assemble(&set, &artist, venue.as_ref(), req.tickets_sold, titles))
}

/// Remove a set with its tracklist and analytics.
pub fn delete_set(db: &Database, dj_set_id: i64) -> Result<()> {
    let tx = db.conn.unchecked_transaction()?;
    store::get_set(&tx, dj_set_id)?.ok_or(not_found("set", dj_set_id))?;

    let tracks = store::clear_set_songs(&tx, dj_set_id)?;
    store::delete_analytics(&tx, dj_set_id)?;
    store::delete_set_row(&tx, dj_set_id)?;

    tx.commit()?;
    log::info!("Deleted set {dj_set_id} ({tracks} tracklist rows)");
    Ok(())
}

// Set creation from already-selected rows (interactive path)

/// A set whose artist, venue and songs were already chosen by id.
#[derive(Debug, Clone, Default)]
pub struct SetDraft {
    pub set: NewDjSet,
    /// `(song_id, timestamp_in_set_seconds)` in play order.
    pub tracks: Vec<(i64, Option<i32>)>,
    pub analytics: Option<SetAnalytics>,
}

/// Insert a drafted set, its tracklist and (optionally) full analytics.
pub fn create_set_from_draft(db: &Database, draft: &SetDraft) -> Result<DjSet> {
    let tx = db.conn.unchecked_transaction()?;
    let set = store::insert_set(&tx, &draft.set)?;
    for (song_id, ts) in &draft.tracks {
        store::insert_set_song(&tx, set.dj_set_id, *song_id, *ts)?;
    }
    if let Some(analytics) = &draft.analytics {
        let row = SetAnalytics {
            dj_set_id: set.dj_set_id,
            ..analytics.clone()
        };
        store::insert_analytics(&tx, &row)?;
    }
    tx.commit()?;
    log::info!("Created set {} with {} tracks", set.dj_set_id, draft.tracks.len());
    Ok(set)
}

/// Per-field edit of a set. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct SetEdit {
    pub title: Option<String>,
    pub set_datetime: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub source_url: Option<String>,
    pub artist_id: Option<i64>,
    pub venue_id: Option<i64>,
    pub tickets_sold: Option<i32>,
    /// Replacement tracklist; `None` keeps the current one.
    pub tracks: Option<Vec<(i64, Option<i32>)>>,
}

pub fn edit_set(db: &Database, dj_set_id: i64, edit: &SetEdit) -> Result<DjSet> {
    let tx = db.conn.unchecked_transaction()?;
    let mut set = store::get_set(&tx, dj_set_id)?.ok_or(not_found("set", dj_set_id))?;

    if let Some(title) = &edit.title {
        set.title = Some(title.clone());
    }
    if let Some(dt) = edit.set_datetime {
        set.set_datetime = Some(at_stored_precision(dt));
    }
    if let Some(minutes) = edit.duration_minutes {
        set.duration_minutes = Some(minutes);
    }
    if let Some(url) = &edit.source_url {
        set.source_url = Some(url.clone());
    }
    if let Some(artist_id) = edit.artist_id {
        set.artist_id = artist_id;
    }
    if let Some(venue_id) = edit.venue_id {
        set.venue_id = Some(venue_id);
    }
    store::update_set_row(&tx, &set)?;

    if edit.tickets_sold.is_some() {
        store::upsert_tickets_sold(&tx, dj_set_id, edit.tickets_sold)?;
    }
    if let Some(tracks) = &edit.tracks {
        store::clear_set_songs(&tx, dj_set_id)?;
        for (song_id, ts) in tracks {
            store::insert_set_song(&tx, dj_set_id, *song_id, *ts)?;
        }
    }

    tx.commit()?;
    log::info!("Edited set {dj_set_id}");
    Ok(set)
}

/// Record the full analytics row for a set. Fails if one already exists.
pub fn record_analytics(db: &Database, analytics: &SetAnalytics) -> Result<()> {
    store::get_set(&db.conn, analytics.dj_set_id)?.ok_or(not_found("set", analytics.dj_set_id))?;
    store::insert_analytics(&db.conn, analytics)?;
    Ok(())
}

// Artists, venues, songs

/// Always inserts a new artist (no lookup).
pub fn create_artist(db: &Database, name: &str, country: Option<&str>) -> Result<Artist> {
    let name = require_text("name", name)?;
    let artist = store::insert_artist(
        &db.conn,
        &NewArtist {
            display_name: name.to_string(),
            country: non_blank(country).map(str::to_string),
        },
    )?;
    log::debug!("Created artist {} \"{}\"", artist.artist_id, artist.display_name);
    Ok(artist)
}

#[derive(Debug, Clone, Default)]
pub struct VenueInput {
    pub name: String,
    pub location: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub capacity: Option<i32>,
    pub address: Option<String>,
}

impl VenueInput {
    /// Explicit address if given, else the non-blank location parts joined by ", ".
    fn address(&self) -> Option<String> {
        if let Some(address) = non_blank(self.address.as_deref()) {
            return Some(address.to_string());
        }
        let parts: Vec<&str> = [&self.location, &self.city, &self.country]
            .into_iter()
            .filter_map(|p| non_blank(p.as_deref()))
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// Always inserts a new venue (no lookup).
pub fn create_venue(db: &Database, input: &VenueInput) -> Result<Venue> {
    let name = require_text("name", &input.name)?;
    let venue = store::insert_venue(
        &db.conn,
        &NewVenue {
            name: Some(name.to_string()),
            capacity: input.capacity,
            address: input.address(),
        },
    )?;
    log::debug!("Created venue {} \"{}\"", venue.venue_id, name);
    Ok(venue)
}

/// Insert a fully specified song and link it to each named artist.
pub fn create_song(db: &Database, song: &NewSong, artist_ids: &[i64]) -> Result<Song> {
    require_text("title", &song.title)?;
    let tx = db.conn.unchecked_transaction()?;
    let created = store::insert_song(&tx, song)?;
    for artist_id in artist_ids {
        store::link_song_artist(&tx, created.song_id, *artist_id)?;
    }
    tx.commit()?;
    log::debug!("Created song {} \"{}\"", created.song_id, created.title);
    Ok(created)
}

#[derive(Debug, Clone, Default)]
pub struct AddSong {
    pub name: String,
    pub artist: String,
    pub bpm: Option<i32>,
    /// Musical key. Accepted for API compatibility; there is no column for it.
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSummary {
    pub song_id: i64,
    pub title: String,
    pub bpm: Option<i32>,
    pub artist: String,
}

/// Find-or-create a song by exact title and link it to one artist.
pub fn add_song(db: &Database, req: &AddSong) -> Result<SongSummary> {
    let tx = db.conn.unchecked_transaction()?;
    let song: Song = resolve_named(&tx, "name", &req.name)?;
    let artist: Artist = resolve_named(&tx, "artist", &req.artist)?;
    if let Some(bpm) = req.bpm {
        store::set_song_bpm_if_absent(&tx, song.song_id, bpm)?;
    }
    store::link_song_artist(&tx, song.song_id, artist.artist_id)?;
    let bpm = store::get_song(&tx, song.song_id)?.and_then(|s| s.bpm);
    tx.commit()?;

    if let Some(key) = &req.key {
        log::debug!("Ignoring key \"{key}\" for song {}", song.song_id);
    }
    Ok(SongSummary {
        song_id: song.song_id,
        title: song.title,
        bpm,
        artist: artist.display_name,
    })
}

pub fn delete_artist(db: &Database, artist_id: i64) -> Result<()> {
    store::get_artist(&db.conn, artist_id)?.ok_or(not_found("artist", artist_id))?;
    store::delete_artist_row(&db.conn, artist_id)?;
    log::info!("Deleted artist {artist_id}");
    Ok(())
}

pub fn delete_venue(db: &Database, venue_id: i64) -> Result<()> {
    store::get_venue(&db.conn, venue_id)?.ok_or(not_found("venue", venue_id))?;
    store::delete_venue_row(&db.conn, venue_id)?;
    log::info!("Deleted venue {venue_id}");
    Ok(())
}

pub fn delete_song(db: &Database, song_id: i64) -> Result<()> {
    store::get_song(&db.conn, song_id)?.ok_or(not_found("song", song_id))?;
    store::delete_song_row(&db.conn, song_id)?;
    log::info!("Deleted song {song_id}");
    Ok(())
}
