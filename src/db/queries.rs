use super::models::{
    SetAnalytics, SetDetails, SetListing, Song, SongWithArtists, TracklistItem, encode_datetime,
    sort_tracklist,
};
use super::store::{
    self, ANALYTICS_COLS, ARTIST_COLS, SET_COLS, SONG_COLS, VENUE_COLS, read_analytics_opt,
    read_artist, read_set, read_song, read_venue_opt,
};
use super::{Database, Result};
use chrono::{DateTime, Utc};
use rusqlite::{ToSql, params};

/// Base select for set listings. Column layout: set (0..7), artist (7..10),
/// venue (10..14), analytics (14..20).
fn listing_select() -> String {
    format!(
        "SELECT {SET_COLS}, {ARTIST_COLS}, {VENUE_COLS}, {ANALYTICS_COLS}
         FROM dj_sets s
         JOIN artists a ON a.artist_id = s.artist_id
         LEFT JOIN venues v ON v.venue_id = s.venue_id
         LEFT JOIN set_analytics x ON x.dj_set_id = s.dj_set_id"
    )
}

// Newest first; sets without a datetime sort after dated ones (NULLs last under DESC).
const NEWEST_FIRST: &str = "ORDER BY s.set_datetime DESC, s.dj_set_id DESC";

impl Database {
    fn query_listings(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<SetListing>> {
        let sql = format!("{} {} {}", listing_select(), filter, NEWEST_FIRST);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let sets = stmt
            .query_map(args, |row| {
                Ok(SetListing {
                    set: read_set(row, 0)?,
                    artist: read_artist(row, 7)?,
                    venue: read_venue_opt(row, 10)?,
                    analytics: read_analytics_opt(row, 14)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sets)
    }

    /// All sets, newest first.
    pub fn all_sets(&self) -> Result<Vec<SetListing>> {
        self.query_listings("", &[])
    }

    /// Sets whose performing artist's name contains `term`.
    pub fn sets_by_artist_name(&self, term: &str) -> Result<Vec<SetListing>> {
        self.query_listings("WHERE instr(a.display_name, ?1) > 0", &[&term])
    }

    /// Sets whose venue name contains `term`. Sets without a venue never match.
    pub fn sets_by_venue_name(&self, term: &str) -> Result<Vec<SetListing>> {
        self.query_listings("WHERE instr(v.name, ?1) > 0", &[&term])
    }

    pub fn sets_by_artist_id(&self, artist_id: i64) -> Result<Vec<SetListing>> {
        self.query_listings("WHERE s.artist_id = ?1", &[&artist_id])
    }

    pub fn sets_by_venue_id(&self, venue_id: i64) -> Result<Vec<SetListing>> {
        self.query_listings("WHERE s.venue_id = ?1", &[&venue_id])
    }

    /// Sets with `start <= set_datetime <= end`. A missing bound is unbounded;
    /// with either bound present, sets without a datetime are excluded.
    pub fn sets_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<SetListing>> {
        if start.is_none() && end.is_none() {
            return self.all_sets();
        }
        let start = start.as_ref().map(encode_datetime);
        let end = end.as_ref().map(encode_datetime);
        self.query_listings(
            "WHERE s.set_datetime IS NOT NULL
               AND (?1 IS NULL OR s.set_datetime >= ?1)
               AND (?2 IS NULL OR s.set_datetime <= ?2)",
            &[&start, &end],
        )
    }

    /// One set listing by id.
    pub fn set_listing(&self, dj_set_id: i64) -> Result<Option<SetListing>> {
        Ok(self
            .query_listings("WHERE s.dj_set_id = ?1", &[&dj_set_id])?
            .into_iter()
            .next())
    }

    fn query_songs(&self, filter: &str, term: &str) -> Result<Vec<SongWithArtists>> {
        let sql = format!("SELECT {SONG_COLS} FROM songs g {filter} ORDER BY g.song_id");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let songs: Vec<Song> = stmt
            .query_map(params![term], |row| read_song(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        songs
            .into_iter()
            .map(|song| -> Result<SongWithArtists> {
                let artists = store::artists_for_song(&self.conn, song.song_id)?;
                Ok(SongWithArtists { song, artists })
            })
            .collect()
    }

    /// Songs whose title contains `term`, in insertion order.
    pub fn songs_by_title(&self, term: &str) -> Result<Vec<SongWithArtists>> {
        self.query_songs("WHERE instr(g.title, ?1) > 0", term)
    }

    /// Songs linked to at least one artist whose name contains `term`.
    pub fn songs_by_artist_name(&self, term: &str) -> Result<Vec<SongWithArtists>> {
        self.query_songs(
            "WHERE EXISTS (
                SELECT 1 FROM song_artists sa
                JOIN artists a ON a.artist_id = sa.artist_id
                WHERE sa.song_id = g.song_id AND instr(a.display_name, ?1) > 0
             )",
            term,
        )
    }

    /// Songs whose genre contains `term`. Songs without a genre never match.
    pub fn songs_by_genre(&self, term: &str) -> Result<Vec<SongWithArtists>> {
        self.query_songs("WHERE instr(g.genre, ?1) > 0", term)
    }

    /// Tracklist of a set in display order, each song with its artists.
    pub fn tracklist(&self, dj_set_id: i64) -> Result<Vec<TracklistItem>> {
        let sql = format!(
            "SELECT ss.set_song_id, ss.timestamp_in_set_seconds, {SONG_COLS}
             FROM set_songs ss
             JOIN songs g ON g.song_id = ss.song_id
             WHERE ss.dj_set_id = ?1
             ORDER BY ss.set_song_id"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows: Vec<(i64, Option<i32>, Song)> = stmt
            .query_map(params![dj_set_id], |row| {
                Ok((row.get(0)?, row.get(1)?, read_song(row, 2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut items = rows
            .into_iter()
            .map(|(set_song_id, timestamp_in_set_seconds, song)| -> Result<TracklistItem> {
                let artists = store::artists_for_song(&self.conn, song.song_id)?;
                Ok(TracklistItem {
                    set_song_id,
                    timestamp_in_set_seconds,
                    song: SongWithArtists { song, artists },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        sort_tracklist(&mut items);
        Ok(items)
    }

    /// Song titles of a set's tracklist in display order.
    pub fn tracklist_titles(&self, dj_set_id: i64) -> Result<Vec<String>> {
        Ok(self
            .tracklist(dj_set_id)?
            .into_iter()
            .map(|item| item.song.song.title)
            .collect())
    }

    /// A set with artist, venue, full tracklist and analytics, or `None`.
    pub fn set_details(&self, dj_set_id: i64) -> Result<Option<SetDetails>> {
        let Some(listing) = self.set_listing(dj_set_id)? else {
            return Ok(None);
        };
        let tracklist = self.tracklist(dj_set_id)?;
        Ok(Some(SetDetails {
            set: listing.set,
            artist: listing.artist,
            venue: listing.venue,
            tracklist,
            analytics: listing.analytics,
        }))
    }

    pub fn set_analytics(&self, dj_set_id: i64) -> Result<Option<SetAnalytics>> {
        store::get_analytics(&self.conn, dj_set_id)
    }

    /// Number of tracklist rows for a set.
    pub fn count_set_songs(&self, dj_set_id: i64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM set_songs WHERE dj_set_id = ?1",
            params![dj_set_id],
            |row| row.get(0),
        )?)
    }
}
