//! Queue, scheduler, post-processing, history, cache, config and metrics
//! endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestFixture};
use medusa_core::{EpisodeStatus, LibraryStore};

#[tokio::test]
async fn test_list_queues() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v2/queues").await;
    assert_eq!(response.status, StatusCode::OK);

    let names: Vec<&str> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["search", "postprocess"]);
    assert_eq!(response.body[0]["paused"], false);
    assert_eq!(response.body[0]["queued"], 0);

    let response = fixture.get("/api/v2/queues/nope").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pause_queue_and_remove_item() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 1).await;

    let response = fixture.post_empty("/api/v2/queues/search/pause").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["paused"], true);

    fixture
        .post_empty(&format!("/api/v2/shows/{}/backlog", id))
        .await;

    // a paused queue holds its items
    fixture.search_queue.run(false);
    let response = fixture.get("/api/v2/queues/search").await;
    assert_eq!(response.body["queued"], 1);
    assert!(response.body["current"].is_null());
    let item_id = response.body["items"][0]["id"].as_str().unwrap().to_string();

    let path = format!("/api/v2/queues/search/items/{}", item_id);
    let response = fixture.delete(&path).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["kind"], "backlog_search");

    let response = fixture.delete(&path).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = fixture.post_empty("/api/v2/queues/search/resume").await;
    assert_eq!(response.body["paused"], false);
    assert!(fixture.search_queue.is_empty());
}

#[tokio::test]
async fn test_schedulers_list_and_force_run() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v2/schedulers").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body[0]["name"], "daily_search");
    assert_eq!(response.body[0]["force_pending"], false);

    let response = fixture
        .post_empty("/api/v2/schedulers/daily_search/run")
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["force_pending"], true);

    let response = fixture.post_empty("/api/v2/schedulers/nope/run").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_process_endpoint() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 1).await;

    std::fs::write(
        fixture
            .download_dir
            .join("Show.Name.S01E01.720p.HDTV.x264-GRP.mkv"),
        b"video",
    )
    .unwrap();

    let response = fixture.post("/api/v2/postprocess", json!({})).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["queue"], "postprocess");

    fixture.drain_postprocess_queue().await;

    let episode = fixture.library.get_episode(id, 1, 1).unwrap();
    assert_eq!(episode.status, EpisodeStatus::Downloaded);
    let location = episode.location.expect("episode location");
    assert!(location.starts_with(fixture.tv_dir.join("Show Name")));
    assert!(location.exists());

    let response = fixture
        .post("/api/v2/postprocess", json!({ "dir": "/definitely/not/here" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_query() {
    let fixture = TestFixture::new().await;
    let first = fixture.add_show("First Show", 0).await;
    fixture.add_show("Second Show", 0).await;
    fixture.flush_history().await;

    let response = fixture.get("/api/v2/history").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["limit"], 100);

    let response = fixture
        .get(&format!("/api/v2/history?show_id={}", first))
        .await;
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["events"][0]["data"]["name"], "First Show");

    let response = fixture
        .get("/api/v2/history?event_type=show_added&limit=1&offset=1")
        .await;
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["events"].as_array().unwrap().len(), 1);

    let response = fixture.get("/api/v2/history?limit=0").await;
    assert_eq!(response.body["limit"], 1);
}

#[tokio::test]
async fn test_cache_stats_and_clear() {
    let fixture = TestFixture::new().await;
    let id = fixture.add_show("Show Name", 1).await;

    fixture
        .provider
        .set_results(vec![
            fixtures::torrent_result("Show.Name.S01E01.720p.HDTV.x264-A", 10),
            fixtures::torrent_result("Show.Name.S01E01.1080p.WEB-DL-B", 10),
        ])
        .await;
    fixture
        .post_empty(&format!("/api/v2/shows/{}/episodes/1/1/search", id))
        .await;
    fixture.drain_search_queue().await;

    let response = fixture.get("/api/v2/cache/stats").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["by_provider"]["mock"], 2);

    let response = fixture.delete("/api/v2/cache/mock").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["removed"], 2);

    let response = fixture.get("/api/v2/cache/stats").await;
    assert_eq!(response.body["total"], 0);
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v2/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["auth"]["method"], "none");
    assert_eq!(response.body["post_processing"]["enabled"], true);
    assert_eq!(response.body["library"]["season_folders"], true);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v2/nothing-here").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
