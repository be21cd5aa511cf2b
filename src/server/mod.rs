//! JSON HTTP front end over the catalog workflows.

mod error;
mod routes;

pub use error::{ApiError, ApiResult};

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::db::Database;

/// Shared storage session. Each request holds the lock for one workflow.
#[derive(Clone)]
pub struct ServerState {
    db: Arc<Mutex<Database>>,
}

impl ServerState {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(Mutex::new(db)) }
    }

    pub fn session(&self) -> ApiResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/artists", post(routes::post_artist))
        .route("/artists/{id}", delete(routes::delete_artist))
        .route("/venues", post(routes::post_venue))
        .route("/venues/{id}", delete(routes::delete_venue))
        .route("/sets", get(routes::get_sets).post(routes::post_set))
        .route("/sets/search", get(routes::search_sets))
        .route(
            "/sets/{id}",
            get(routes::get_set).put(routes::put_set).delete(routes::delete_set),
        )
        .route("/sets/{id}/details", get(routes::get_set_details))
        .route(
            "/sets/{id}/analytics",
            get(routes::get_set_analytics).post(routes::post_set_analytics),
        )
        .route("/sets/artists/{artist_id}", get(routes::get_sets_by_artist))
        .route("/sets/venue/{venue_id}", get(routes::get_sets_by_venue))
        .route("/sets/date/{start}/{end}", get(routes::get_sets_by_date))
        .route("/songs", get(routes::get_songs).post(routes::post_song))
        .route("/songs/{id}", delete(routes::delete_song))
        .with_state(state)
}

pub async fn run_server(db: Database, bind: &str) -> anyhow::Result<()> {
    let app = make_app(ServerState::new(db));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_app() -> Router {
        make_app(ServerState::new(Database::open_in_memory().unwrap()))
    }

    async fn make_request(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn essential_mix() -> Value {
        json!({
            "title": "Essential Mix",
            "artist": "Carl Cox",
            "date": "2024-05-01T22:00:00Z",
            "venue": "Printworks",
            "ticketsSold": 500,
            "tracklist": [{ "songTitle": "Opener" }]
        })
    }

    #[tokio::test]
    async fn test_create_then_get_set() {
        let app = test_app();
        let (status, created) = make_request(&app, "POST", "/sets", Some(essential_mix())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["djSetId"].as_i64().unwrap() > 0);
        assert_eq!(created["artistName"], "Carl Cox");
        assert_eq!(created["venueName"], "Printworks");
        assert_eq!(created["ticketsSold"], 500);
        assert_eq!(created["tracklist"], json!(["Opener"]));

        let id = created["djSetId"].as_i64().unwrap();
        let (status, fetched) = make_request(&app, "GET", &format!("/sets/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_tracklist_accepts_plain_titles() {
        let app = test_app();
        let body = json!({
            "artist": "Peggy Gou",
            "tracklist": [
                "Starry Night",
                "  ",
                { "songTitle": "It Goes Like", "artistName": "Peggy Gou" }
            ]
        });
        let (status, created) = make_request(&app, "POST", "/sets", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["tracklist"], json!(["Starry Night", "It Goes Like"]));
        assert_eq!(created["venueName"], Value::Null);

        let (status, songs) = make_request(&app, "GET", "/songs?artist=Peggy", None).await;
        assert_eq!(status, StatusCode::OK);
        let songs = songs.as_array().unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0]["title"], "It Goes Like");
    }

    #[tokio::test]
    async fn test_missing_set_is_404() {
        let app = test_app();
        let (status, body) = make_request(&app, "GET", "/sets/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, _) = make_request(&app, "DELETE", "/sets/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = make_request(&app, "PUT", "/sets/42", Some(essential_mix())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_input_is_400() {
        let app = test_app();

        let request = Request::builder()
            .method("POST")
            .uri("/sets")
            .header("content-type", "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, body) =
            make_request(&app, "POST", "/sets", Some(json!({ "artist": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        let (status, _) = make_request(
            &app,
            "POST",
            "/sets",
            Some(json!({ "artist": "Carl Cox", "date": "next friday" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = make_request(&app, "GET", "/sets/date/yesterday/-", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = make_request(&app, "GET", "/songs", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unparseable_path_id_is_json_400() {
        let app = test_app();
        for (method, uri) in [
            ("GET", "/sets/abc"),
            ("DELETE", "/artists/abc"),
            ("GET", "/sets/venue/1.5"),
        ] {
            let (status, body) = make_request(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body["error"]["code"], "BAD_REQUEST", "{method} {uri}");
            assert!(body["error"]["message"].as_str().unwrap().starts_with("Invalid request"));
        }
    }

    #[tokio::test]
    async fn test_update_replaces_tracklist() {
        let app = test_app();
        let (_, created) = make_request(&app, "POST", "/sets", Some(essential_mix())).await;
        let id = created["djSetId"].as_i64().unwrap();

        let body = json!({
            "title": "Essential Mix (Extended)",
            "artist": "Carl Cox",
            "ticketsSold": 750,
            "tracklist": ["Closer", "Encore"]
        });
        let (status, updated) = make_request(&app, "PUT", &format!("/sets/{id}"), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Essential Mix (Extended)");
        assert_eq!(updated["venueName"], "Printworks");
        assert_eq!(updated["ticketsSold"], 750);
        assert_eq!(updated["tracklist"], json!(["Closer", "Encore"]));

        let (_, details) = make_request(&app, "GET", &format!("/sets/{id}/details"), None).await;
        let titles: Vec<_> = details["tracklist"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["song"]["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Closer", "Encore"]);
        assert_eq!(details["analytics"]["ticketsSold"], 750);
    }

    #[tokio::test]
    async fn test_delete_set() {
        let app = test_app();
        let (_, created) = make_request(&app, "POST", "/sets", Some(essential_mix())).await;
        let id = created["djSetId"].as_i64().unwrap();

        let (status, body) = make_request(&app, "DELETE", &format!("/sets/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = make_request(&app, "GET", &format!("/sets/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, all) = make_request(&app, "GET", "/sets", None).await;
        assert!(all.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_artist_with_sets_cannot_be_deleted() {
        let app = test_app();
        let (_, created) = make_request(&app, "POST", "/sets", Some(essential_mix())).await;
        let set_id = created["djSetId"].as_i64().unwrap();
        let (_, details) =
            make_request(&app, "GET", &format!("/sets/{set_id}/details"), None).await;
        let artist_id = details["artist"]["artistId"].as_i64().unwrap();
        let venue_id = details["venue"]["venueId"].as_i64().unwrap();

        let (status, body) =
            make_request(&app, "DELETE", &format!("/artists/{artist_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, _) = make_request(&app, "DELETE", &format!("/venues/{venue_id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, fetched) = make_request(&app, "GET", &format!("/sets/{set_id}"), None).await;
        assert_eq!(fetched["venueName"], Value::Null);

        let (status, _) = make_request(&app, "DELETE", "/artists/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_artist_and_venue() {
        let app = test_app();
        let (status, artist) =
            make_request(&app, "POST", "/artists", Some(json!({ "name": "Nina Kraviz" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(artist["displayName"], "Nina Kraviz");

        let body = json!({
            "name": "Berghain",
            "location": "Am Wriezener Bahnhof",
            "city": "Berlin",
            "country": "Germany",
            "capacity": 1500
        });
        let (status, venue) = make_request(&app, "POST", "/venues", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(venue["address"], "Am Wriezener Bahnhof, Berlin, Germany");
        assert_eq!(venue["capacity"], 1500);

        let (status, _) =
            make_request(&app, "POST", "/artists", Some(json!({ "name": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_add_song() {
        let app = test_app();
        let body = json!({
            "name": "Windowlicker",
            "artist": "Aphex Twin",
            "bpm": 128,
            "key": "Am"
        });
        let (status, song) = make_request(&app, "POST", "/songs", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(song["songId"].as_i64().unwrap() > 0);
        assert_eq!(song["title"], "Windowlicker");
        assert_eq!(song["bpm"], 128);
        assert_eq!(song["artist"], "Aphex Twin");

        let (status, found) = make_request(&app, "GET", "/songs?title=Window", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found[0]["artists"][0]["displayName"], "Aphex Twin");
    }

    #[tokio::test]
    async fn test_filtered_set_lists() {
        let app = test_app();
        make_request(&app, "POST", "/sets", Some(essential_mix())).await;
        let later = json!({
            "title": "Closing",
            "artist": "Carl Cox",
            "date": "2024-06-10T23:00:00Z",
            "venue": "Space",
            "tracklist": []
        });
        let (_, closing) = make_request(&app, "POST", "/sets", Some(later)).await;
        make_request(&app, "POST", "/sets", Some(json!({ "artist": "Richie Hawtin" }))).await;

        let (_, all) = make_request(&app, "GET", "/sets", None).await;
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, in_may) =
            make_request(&app, "GET", "/sets/date/2024-05-01/2024-05-31", None).await;
        let in_may = in_may.as_array().unwrap();
        assert_eq!(in_may.len(), 1);
        assert_eq!(in_may[0]["title"], "Essential Mix");

        let (_, from_june) = make_request(&app, "GET", "/sets/date/2024-06-01/-", None).await;
        assert_eq!(from_june[0]["djSetId"], closing["djSetId"]);

        let (_, by_venue) = make_request(&app, "GET", "/sets/search?venue=Print", None).await;
        assert_eq!(by_venue.as_array().unwrap().len(), 1);

        let (status, _) =
            make_request(&app, "GET", "/sets/search?artist=Carl&venue=Space", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, details) = make_request(
            &app,
            "GET",
            &format!("/sets/{}/details", closing["djSetId"]),
            None,
        )
        .await;
        let artist_id = details["artist"]["artistId"].as_i64().unwrap();
        let venue_id = details["venue"]["venueId"].as_i64().unwrap();

        let (_, by_artist) =
            make_request(&app, "GET", &format!("/sets/artists/{artist_id}"), None).await;
        assert_eq!(by_artist.as_array().unwrap().len(), 2);
        let (_, at_space) =
            make_request(&app, "GET", &format!("/sets/venue/{venue_id}"), None).await;
        assert_eq!(at_space.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_analytics_route() {
        let app = test_app();
        let (_, created) = make_request(&app, "POST", "/sets", Some(essential_mix())).await;
        let id = created["djSetId"].as_i64().unwrap();

        let (status, analytics) =
            make_request(&app, "GET", &format!("/sets/{id}/analytics"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(analytics["ticketsSold"], 500);
        assert_eq!(analytics["likeCount"], Value::Null);

        let (status, _) = make_request(&app, "GET", "/sets/77/analytics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_record_analytics_route() {
        let app = test_app();
        let body = json!({ "artist": "Ben UFO", "tracklist": ["Opener"] });
        let (_, created) = make_request(&app, "POST", "/sets", Some(body)).await;
        let id = created["djSetId"].as_i64().unwrap();

        // create_set always writes an analytics row, so a full record conflicts
        let figures = json!({ "ticketsSold": 300, "attendanceCount": 280, "likeCount": 12 });
        let uri = format!("/sets/{id}/analytics");
        let (status, _) = make_request(&app, "POST", &uri, Some(figures.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = make_request(&app, "POST", "/sets/404/analytics", Some(figures)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_song_drops_it_from_tracklists() {
        let app = test_app();
        let body = json!({ "artist": "Ben UFO", "tracklist": ["Opener", "Closer"] });
        let (_, created) = make_request(&app, "POST", "/sets", Some(body)).await;
        let id = created["djSetId"].as_i64().unwrap();

        let (_, songs) = make_request(&app, "GET", "/songs?title=Opener", None).await;
        let song_id = songs[0]["songId"].as_i64().unwrap();

        let (status, _) = make_request(&app, "DELETE", &format!("/songs/{song_id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, fetched) = make_request(&app, "GET", &format!("/sets/{id}"), None).await;
        assert_eq!(fetched["tracklist"], json!(["Closer"]));

        let (status, _) = make_request(&app, "DELETE", &format!("/songs/{song_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
