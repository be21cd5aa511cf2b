use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;

use super::error::{ApiError, ApiResult};
use super::ServerState;
use crate::catalog::{
    self, AddSong, CreateSet, SetSummary, SongSummary, TrackRequest, UpdateSet, VenueInput,
};
use crate::db::models::{Artist, SetAnalytics, SetDetails, SongWithArtists, Venue};

/// Path segment meaning "no bound" in `/sets/date/{start}/{end}`.
const UNBOUNDED: &str = "-";

#[derive(Deserialize, Debug)]
pub struct ArtistBody {
    pub name: String,
    pub country: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct VenueBody {
    pub name: String,
    pub location: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub capacity: Option<i32>,
}

/// A tracklist entry: a bare song title, or a title with its artist.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum TrackBody {
    Title(String),
    #[serde(rename_all = "camelCase")]
    Credited {
        song_title: String,
        artist_name: Option<String>,
    },
}

impl TrackBody {
    fn title(&self) -> &str {
        match self {
            TrackBody::Title(title) => title,
            TrackBody::Credited { song_title, .. } => song_title,
        }
    }
}

impl From<TrackBody> for TrackRequest {
    fn from(body: TrackBody) -> Self {
        match body {
            TrackBody::Title(song_title) => TrackRequest {
                song_title,
                artist_name: None,
            },
            TrackBody::Credited {
                song_title,
                artist_name,
            } => TrackRequest {
                song_title,
                artist_name,
            },
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetBody {
    pub title: Option<String>,
    pub artist: String,
    pub date: Option<String>,
    pub venue: Option<String>,
    pub tickets_sold: Option<i32>,
    #[serde(default)]
    pub tracklist: Vec<TrackBody>,
}

impl SetBody {
    fn parsed_date(&self) -> ApiResult<Option<chrono::DateTime<chrono::Utc>>> {
        match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(date) => Ok(Some(catalog::parse_set_datetime(date)?)),
            None => Ok(None),
        }
    }
}

/// Full analytics record for one set; every figure optional.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsBody {
    pub tickets_sold: Option<i32>,
    pub attendance_count: Option<i32>,
    pub gross_revenue: Option<i32>,
    pub stream_count: Option<i32>,
    pub like_count: Option<i32>,
}

#[derive(Deserialize, Debug)]
pub struct SongBody {
    pub name: String,
    pub artist: String,
    pub bpm: Option<i32>,
    pub key: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SongSearch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SetSearch {
    pub artist: Option<String>,
    pub venue: Option<String>,
}

// Artists and venues

pub async fn post_artist(
    State(state): State<ServerState>,
    payload: Result<Json<ArtistBody>, JsonRejection>,
) -> ApiResult<Json<Artist>> {
    let Json(body) = payload?;
    let db = state.session()?;
    Ok(Json(catalog::create_artist(&db, &body.name, body.country.as_deref())?))
}

pub async fn delete_artist(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    let db = state.session()?;
    catalog::delete_artist(&db, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn post_venue(
    State(state): State<ServerState>,
    payload: Result<Json<VenueBody>, JsonRejection>,
) -> ApiResult<Json<Venue>> {
    let Json(body) = payload?;
    let input = VenueInput {
        name: body.name,
        location: body.location,
        city: body.city,
        country: body.country,
        capacity: body.capacity,
        address: None,
    };
    let db = state.session()?;
    Ok(Json(catalog::create_venue(&db, &input)?))
}

pub async fn delete_venue(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    let db = state.session()?;
    catalog::delete_venue(&db, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Sets

pub async fn get_sets(State(state): State<ServerState>) -> ApiResult<Json<Vec<SetSummary>>> {
    let db = state.session()?;
    Ok(Json(catalog::list_set_summaries(&db)?))
}

pub async fn search_sets(
    State(state): State<ServerState>,
    query: Result<Query<SetSearch>, QueryRejection>,
) -> ApiResult<Json<Vec<SetSummary>>> {
    let Query(search) = query?;
    let db = state.session()?;
    Ok(Json(catalog::search_set_summaries(
        &db,
        search.artist.as_deref(),
        search.venue.as_deref(),
    )?))
}

pub async fn get_set(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<SetSummary>> {
    let Path(id) = path?;
    let db = state.session()?;
    Ok(Json(catalog::set_summary(&db, id)?))
}

pub async fn get_set_details(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<SetDetails>> {
    let Path(id) = path?;
    let db = state.session()?;
    Ok(Json(catalog::set_details(&db, id)?))
}

pub async fn get_set_analytics(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<SetAnalytics>> {
    let Path(id) = path?;
    let db = state.session()?;
    catalog::set_analytics(&db, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no analytics recorded for set {id}")))
}

pub async fn post_set_analytics(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AnalyticsBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SetAnalytics>)> {
    let Path(id) = path?;
    let Json(body) = payload?;
    let analytics = SetAnalytics {
        dj_set_id: id,
        tickets_sold: body.tickets_sold,
        attendance_count: body.attendance_count,
        gross_revenue: body.gross_revenue,
        stream_count: body.stream_count,
        like_count: body.like_count,
    };
    let db = state.session()?;
    catalog::record_analytics(&db, &analytics)?;
    Ok((StatusCode::CREATED, Json(analytics)))
}

pub async fn get_sets_by_artist(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<SetSummary>>> {
    let Path(artist_id) = path?;
    let db = state.session()?;
    Ok(Json(catalog::set_summaries_by_artist(&db, artist_id)?))
}

pub async fn get_sets_by_venue(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<SetSummary>>> {
    let Path(venue_id) = path?;
    let db = state.session()?;
    Ok(Json(catalog::set_summaries_by_venue(&db, venue_id)?))
}

pub async fn get_sets_by_date(
    State(state): State<ServerState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<Vec<SetSummary>>> {
    let Path((start, end)) = path?;
    let start = match start.as_str() {
        UNBOUNDED => None,
        s => Some(catalog::parse_set_datetime(s)?),
    };
    let end = match end.as_str() {
        UNBOUNDED => None,
        s => Some(catalog::parse_range_end(s)?),
    };
    let db = state.session()?;
    Ok(Json(catalog::set_summaries_in_range(&db, start, end)?))
}

pub async fn post_set(
    State(state): State<ServerState>,
    payload: Result<Json<SetBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SetSummary>)> {
    let Json(body) = payload?;
    let req = CreateSet {
        set_datetime: body.parsed_date()?,
        title: body.title,
        artist_name: body.artist,
        venue_name: body.venue,
        tickets_sold: body.tickets_sold,
        tracklist: body.tracklist.into_iter().map(TrackRequest::from).collect(),
    };
    let db = state.session()?;
    let created = catalog::create_set(&db, &req)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn put_set(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SetBody>, JsonRejection>,
) -> ApiResult<Json<SetSummary>> {
    let Path(id) = path?;
    let Json(body) = payload?;
    // The update contract takes song titles only
    let req = UpdateSet {
        set_datetime: body.parsed_date()?,
        tracklist: body.tracklist.iter().map(|t| t.title().to_string()).collect(),
        title: body.title,
        artist_name: body.artist,
        venue_name: body.venue,
        tickets_sold: body.tickets_sold,
    };
    let db = state.session()?;
    Ok(Json(catalog::update_set(&db, id, &req)?))
}

pub async fn delete_set(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    let db = state.session()?;
    catalog::delete_set(&db, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Songs

pub async fn post_song(
    State(state): State<ServerState>,
    payload: Result<Json<SongBody>, JsonRejection>,
) -> ApiResult<Json<SongSummary>> {
    let Json(body) = payload?;
    let req = AddSong {
        name: body.name,
        artist: body.artist,
        bpm: body.bpm,
        key: body.key,
    };
    let db = state.session()?;
    Ok(Json(catalog::add_song(&db, &req)?))
}

pub async fn delete_song(
    State(state): State<ServerState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    let db = state.session()?;
    catalog::delete_song(&db, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_songs(
    State(state): State<ServerState>,
    query: Result<Query<SongSearch>, QueryRejection>,
) -> ApiResult<Json<Vec<SongWithArtists>>> {
    let Query(search) = query?;
    let terms = [&search.title, &search.artist, &search.genre]
        .iter()
        .filter(|t| t.as_deref().is_some_and(|s| !s.trim().is_empty()))
        .count();
    if terms != 1 {
        return Err(ApiError::BadRequest(
            "give exactly one of title, artist or genre".to_string(),
        ));
    }

    let db = state.session()?;
    let songs = if let Some(title) = &search.title {
        db.songs_by_title(title.trim())
    } else if let Some(artist) = &search.artist {
        db.songs_by_artist_name(artist.trim())
    } else {
        db.songs_by_genre(search.genre.as_deref().unwrap_or_default().trim())
    };
    Ok(Json(songs.map_err(catalog::CatalogError::from)?))
}
