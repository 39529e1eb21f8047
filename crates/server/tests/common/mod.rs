//! Common test utilities for API testing with mocks.
//!
//! [`TestFixture`] builds the real router over a temporary SQLite database
//! with a mock provider and a mock download client injected. Queues are not
//! driven by schedulers here; tests call [`TestFixture::drain_search_queue`]
//! to run queued work deterministically.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use medusa_core::search::DailySearchScheduler;
use medusa_core::{
    create_history_system, load_config_from_str, Authenticator, Config, GenericQueue,
    HistoryHandle, NoneAuthenticator, PostProcessor, Scheduler, SchedulerRegistry, SearchContext,
    SqliteHistoryStore, SqliteLibraryStore, SqliteProviderCache,
    testing::{MockDownloadClient, MockProvider},
};
use medusa_server::state::{AppState, POSTPROCESS_QUEUE, SEARCH_QUEUE};

/// Re-export fixtures for test convenience
pub use medusa_core::testing::fixtures;

/// Options for building a [`TestFixture`].
#[derive(Default)]
pub struct TestConfig {
    /// Require this API key instead of running without auth.
    pub api_key: Option<String>,
}

/// In-process server with controllable mocks.
pub struct TestFixture {
    pub router: Router,
    pub provider: Arc<MockProvider>,
    pub client: Arc<MockDownloadClient>,
    pub library: Arc<SqliteLibraryStore>,
    pub cache: Arc<SqliteProviderCache>,
    pub history_store: Arc<SqliteHistoryStore>,
    pub history: HistoryHandle,
    pub search_queue: Arc<GenericQueue>,
    pub postprocess_queue: Arc<GenericQueue>,
    pub schedulers: Arc<SchedulerRegistry>,
    /// Directory post-processing reads from.
    pub download_dir: PathBuf,
    /// Root of the show directories.
    pub tv_dir: PathBuf,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("medusa.db");
        let download_dir = temp_dir.path().join("downloads");
        let tv_dir = temp_dir.path().join("tv");
        std::fs::create_dir_all(&download_dir).expect("Failed to create download dir");
        std::fs::create_dir_all(&tv_dir).expect("Failed to create tv dir");

        let auth = match &test_config.api_key {
            Some(key) => format!("[auth]\nmethod = \"api_key\"\napi_key = \"{}\"\n", key),
            None => "[auth]\nmethod = \"none\"\n".to_string(),
        };
        let config_toml = format!(
            "{}\n[database]\npath = {:?}\n\n[post_processing]\nenabled = true\ndownload_dir = {:?}\nmethod = \"copy\"\n",
            auth,
            db_path.display().to_string(),
            download_dir.display().to_string(),
        );
        let config: Config = load_config_from_str(&config_toml).expect("Failed to parse config");

        let authenticator: Arc<dyn Authenticator> = match &test_config.api_key {
            Some(_) => Arc::from(
                medusa_core::create_authenticator(&config.auth)
                    .expect("Failed to create authenticator"),
            ),
            None => Arc::new(NoneAuthenticator),
        };

        let library = Arc::new(SqliteLibraryStore::new(&db_path).expect("library store"));
        let cache = Arc::new(SqliteProviderCache::new(&db_path).expect("provider cache"));
        let history_store = Arc::new(SqliteHistoryStore::new(&db_path).expect("history store"));
        let (history, writer) = create_history_system(history_store.clone(), 100);
        tokio::spawn(writer.run());

        let provider = Arc::new(MockProvider::new("mock"));
        let client = Arc::new(MockDownloadClient::torrent());

        let search = Arc::new(SearchContext {
            library: library.clone(),
            providers: vec![provider.clone()],
            cache: cache.clone(),
            clients: vec![client.clone()],
            history: history.clone(),
            history_store: history_store.clone(),
            config: config.search.clone(),
        });
        let postprocessor = Arc::new(
            PostProcessor::new(
                library.clone(),
                config.library.clone(),
                config.post_processing.clone(),
            )
            .with_history(history.clone()),
        );

        let search_queue = Arc::new(GenericQueue::new(SEARCH_QUEUE).with_history(history.clone()));
        let postprocess_queue =
            Arc::new(GenericQueue::new(POSTPROCESS_QUEUE).with_history(history.clone()));

        // Registered but never started; forced runs only set a flag.
        let schedulers = Arc::new(SchedulerRegistry::new());
        schedulers.register(Arc::new(Scheduler::new(
            "daily_search",
            Arc::new(DailySearchScheduler::new(
                search_queue.clone(),
                search.clone(),
            )),
            Duration::from_secs(40 * 60),
        )));

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            search,
            search_queue.clone(),
            postprocessor,
            postprocess_queue.clone(),
            schedulers.clone(),
        ));
        let router = medusa_server::create_router(state);

        Self {
            router,
            provider,
            client,
            library,
            cache,
            history_store,
            history,
            search_queue,
            postprocess_queue,
            schedulers,
            download_dir,
            tv_dir,
            temp_dir,
        }
    }

    /// Add a show through the API with `episodes` aired episodes in season 1.
    pub async fn add_show(&self, name: &str, episodes: u32) -> i64 {
        let response = self
            .post(
                "/api/v2/shows",
                serde_json::json!({
                    "name": name,
                    "location": self.tv_dir.join(name),
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        let id = response.body["id"].as_i64().expect("show id");

        let aired = chrono::Local::now().date_naive() - chrono::Duration::days(10);
        let list: Vec<Value> = (1..=episodes)
            .map(|e| {
                serde_json::json!({
                    "season": 1,
                    "episode": e,
                    "name": format!("Episode {}", e),
                    "airdate": aired,
                })
            })
            .collect();
        let response = self
            .post(&format!("/api/v2/shows/{}/episodes", id), Value::Array(list))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        id
    }

    /// Run queue items until the search queue is empty and idle.
    pub async fn drain_search_queue(&self) {
        drain(&self.search_queue).await;
    }

    pub async fn drain_postprocess_queue(&self) {
        drain(&self.postprocess_queue).await;
    }

    /// Wait for the history writer to catch up.
    pub async fn flush_history(&self) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    /// POST without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None, &[]).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, &[]).await
    }

    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", path, None, headers).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => request_builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&json).unwrap()))
                .unwrap(),
            None => request_builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

async fn drain(queue: &GenericQueue) {
    for _ in 0..500 {
        queue.run(false);
        if queue.is_empty() && !queue.is_busy() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue {} did not drain", queue.name());
}
