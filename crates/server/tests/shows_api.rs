//! Show and episode endpoints, including searches queued through the API.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestConfig, TestFixture};
use medusa_core::{EpisodeStatus, HistoryFilter, HistoryStore, LibraryStore};

#[tokio::test]
async fn test_health_needs_no_auth() {
    let fixture = TestFixture::with_config(TestConfig {
        api_key: Some("secret".to_string()),
    })
    .await;

    let response = fixture.get("/api/v2/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");

    let response = fixture.get("/api/v2/shows").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.body["error"].is_string());

    let response = fixture.get("/api/v2/shows?apikey=secret").await;
    assert_eq!(response.status, StatusCode::OK);

    let response = fixture
        .get_with_headers("/api/v2/shows", &[("Authorization", "Bearer secret")])
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_add_list_get_delete_show() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 3).await;

    let response = fixture.get("/api/v2/shows").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_array().unwrap().len(), 1);
    assert_eq!(response.body[0]["name"], "Show Name");

    let response = fixture.get(&format!("/api/v2/shows/{}", id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], id);
    assert_eq!(response.body["episode_counts"]["wanted"], 3);

    let response = fixture.delete(&format!("/api/v2/shows/{}", id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Show Name");

    let response = fixture.get(&format!("/api/v2/shows/{}", id)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(fixture.library.list_episodes(id, None).unwrap().is_empty());

    fixture.flush_history().await;
    let added = fixture
        .history_store
        .count(&HistoryFilter::new().with_event_type("show_added"))
        .unwrap();
    let removed = fixture
        .history_store
        .count(&HistoryFilter::new().with_event_type("show_removed"))
        .unwrap();
    assert_eq!((added, removed), (1, 1));
}

#[tokio::test]
async fn test_add_show_validation() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v2/shows", json!({ "name": "  ", "location": "/tv/x" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // missing location
    let response = fixture
        .post("/api/v2/shows", json!({ "name": "Show" }))
        .await;
    assert!(response.status.is_client_error());

    fixture.add_show("Show Name", 0).await;
    let response = fixture
        .post(
            "/api/v2/shows",
            json!({ "name": "Show Name", "location": "/tv/other" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_pause_and_resume_show() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 1).await;

    let response = fixture
        .post_empty(&format!("/api/v2/shows/{}/pause", id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["paused"], true);

    let response = fixture
        .post_empty(&format!("/api/v2/shows/{}/resume", id))
        .await;
    assert_eq!(response.body["paused"], false);

    let response = fixture.post_empty("/api/v2/shows/999/pause").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_episodes_list_upsert_and_update() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 2).await;

    let response = fixture
        .post(
            &format!("/api/v2/shows/{}/episodes", id),
            json!([
                { "season": 1, "episode": 2, "name": "Renamed" },
                { "season": 2, "episode": 1, "name": "Future", "airdate": "2999-01-01" }
            ]),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["inserted"], 1);
    assert_eq!(response.body["updated"], 1);

    let response = fixture
        .get(&format!("/api/v2/shows/{}/episodes", id))
        .await;
    assert_eq!(response.body.as_array().unwrap().len(), 3);

    let response = fixture
        .get(&format!("/api/v2/shows/{}/episodes?season=2", id))
        .await;
    let season_two = response.body.as_array().unwrap();
    assert_eq!(season_two.len(), 1);
    assert_eq!(season_two[0]["status"], "unaired");

    let response = fixture
        .put(
            &format!("/api/v2/shows/{}/episodes/1/1", id),
            json!({ "status": "skipped" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "skipped");

    let response = fixture
        .put(&format!("/api/v2/shows/{}/episodes/1/1", id), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture
        .put(
            &format!("/api/v2/shows/{}/episodes/9/9", id),
            json!({ "status": "wanted" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = fixture
        .post("/api/v2/shows/999/episodes", json!([{ "season": 1, "episode": 1 }]))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_search_snatches_through_queue() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 1).await;

    fixture
        .provider
        .set_results(vec![fixtures::torrent_result(
            "Show.Name.S01E01.720p.HDTV.x264-GRP",
            20,
        )])
        .await;

    let response = fixture
        .post_empty(&format!("/api/v2/shows/{}/episodes/1/1/search", id))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["queue"], "search");
    assert!(response.body["item_id"].is_string());

    // same episode again while queued
    let response = fixture
        .post_empty(&format!("/api/v2/shows/{}/episodes/1/1/search", id))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    fixture.drain_search_queue().await;

    assert_eq!(fixture.client.snatched().await.len(), 1);
    let episode = fixture.library.get_episode(id, 1, 1).unwrap();
    assert_eq!(episode.status, EpisodeStatus::Snatched);

    let response = fixture.get("/api/v2/queues/search").await;
    assert_eq!(response.body["recent"][0]["kind"], "manual_search");
    assert_eq!(response.body["recent"][0]["success"], true);
}

#[tokio::test]
async fn test_search_unknown_episode_is_not_found() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 1).await;

    let response = fixture
        .post_empty(&format!("/api/v2/shows/{}/episodes/3/7/search", id))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(fixture.search_queue.is_empty());
}

#[tokio::test]
async fn test_retry_marks_release_failed_and_picks_another() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 1).await;

    fixture
        .provider
        .set_results(vec![
            fixtures::torrent_result("Show.Name.S01E01.1080p.WEB-DL-BAD", 50),
            fixtures::torrent_result("Show.Name.S01E01.720p.HDTV.x264-GOOD", 5),
        ])
        .await;

    fixture
        .post_empty(&format!("/api/v2/shows/{}/episodes/1/1/search", id))
        .await;
    fixture.drain_search_queue().await;

    let response = fixture
        .post(
            &format!("/api/v2/shows/{}/episodes/1/1/retry", id),
            json!({ "release_name": "Show.Name.S01E01.1080p.WEB-DL-BAD" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    fixture.drain_search_queue().await;

    let episode = fixture.library.get_episode(id, 1, 1).unwrap();
    assert_eq!(
        episode.release_name.as_deref(),
        Some("Show.Name.S01E01.720p.HDTV.x264-GOOD")
    );

    let response = fixture
        .post(&format!("/api/v2/shows/{}/episodes/1/1/retry", id), json!("nope"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_backlog_search_endpoint() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 2).await;

    fixture
        .provider
        .set_results(vec![
            fixtures::torrent_result("Show.Name.S01E01.720p.HDTV.x264-A", 10),
            fixtures::torrent_result("Show.Name.S01E02.720p.HDTV.x264-A", 10),
        ])
        .await;

    let response = fixture
        .post_empty(&format!("/api/v2/shows/{}/backlog", id))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let response = fixture.get("/api/v2/queues/search").await;
    assert_eq!(response.body["items"][0]["kind"], "backlog_search");
    assert_eq!(response.body["items"][0]["priority"], "low");

    fixture.drain_search_queue().await;
    assert_eq!(fixture.client.snatched().await.len(), 2);

    let response = fixture.post_empty("/api/v2/shows/999/backlog").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
