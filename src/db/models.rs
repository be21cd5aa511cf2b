use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use serde::Serialize;

/// A performing or producing artist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub artist_id: i64,
    pub display_name: String,
    pub country: Option<String>,
}

/// Data for inserting an artist.
#[derive(Debug, Clone, Default)]
pub struct NewArtist {
    pub display_name: String,
    pub country: Option<String>,
}

/// A song row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub song_id: i64,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub duration_seconds: Option<i32>,
    pub genre: Option<String>,
    pub bpm: Option<i32>,
}

/// Data for inserting a song.
#[derive(Debug, Clone, Default)]
pub struct NewSong {
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub duration_seconds: Option<i32>,
    pub genre: Option<String>,
    pub bpm: Option<i32>,
}

/// A venue row. The schema allows a null name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub venue_id: i64,
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub address: Option<String>,
}

/// Data for inserting a venue.
#[derive(Debug, Clone, Default)]
pub struct NewVenue {
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub address: Option<String>,
}

/// A DJ set (one performance) as stored in `dj_sets`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DjSet {
    pub dj_set_id: i64,
    pub artist_id: i64,
    pub title: Option<String>,
    pub set_datetime: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub source_url: Option<String>,
    pub venue_id: Option<i64>,
}

/// Data for inserting a DJ set. Artist and venue are already resolved to ids.
#[derive(Debug, Clone, Default)]
pub struct NewDjSet {
    pub artist_id: i64,
    pub title: Option<String>,
    pub set_datetime: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub source_url: Option<String>,
    pub venue_id: Option<i64>,
}

/// One tracklist row: a song played during a set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSong {
    pub set_song_id: i64,
    pub song_id: i64,
    pub dj_set_id: i64,
    pub timestamp_in_set_seconds: Option<i32>,
}

/// Post-show numbers for a set, keyed 1:1 by the set id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAnalytics {
    pub dj_set_id: i64,
    pub tickets_sold: Option<i32>,
    pub attendance_count: Option<i32>,
    pub gross_revenue: Option<i32>,
    pub stream_count: Option<i32>,
    pub like_count: Option<i32>,
}

/// A set with its artist, venue and analytics eagerly attached (list display).
#[derive(Debug, Clone)]
pub struct SetListing {
    pub set: DjSet,
    pub artist: Artist,
    pub venue: Option<Venue>,
    pub analytics: Option<SetAnalytics>,
}

/// A song with every artist linked to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongWithArtists {
    #[serde(flatten)]
    pub song: Song,
    pub artists: Vec<Artist>,
}

impl SongWithArtists {
    /// "A, B" style credit line.
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One entry of a set's tracklist with the song resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracklistItem {
    pub set_song_id: i64,
    pub timestamp_in_set_seconds: Option<i32>,
    pub song: SongWithArtists,
}

/// Everything known about one set (detail display).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDetails {
    pub set: DjSet,
    pub artist: Artist,
    pub venue: Option<Venue>,
    pub tracklist: Vec<TracklistItem>,
    pub analytics: Option<SetAnalytics>,
}

/// Order a tracklist for display: timestamped entries ascending, untimed
/// entries after all of them. The sort is stable, so ties keep insertion order.
pub fn sort_tracklist(items: &mut [TracklistItem]) {
    items.sort_by_key(|item| {
        (item.timestamp_in_set_seconds.is_none(), item.timestamp_in_set_seconds)
    });
}

/// Drop sub-second precision, which storage does not keep.
pub fn at_stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(0)
}

/// Format a set datetime the way it is stored: second precision, `Z` suffix.
pub fn encode_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Read a stored set datetime back. `idx` is the column index, for error reporting.
pub fn decode_datetime(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub fn encode_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn decode_date(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
