use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Write a config file into `dir` with the database next to it.
fn write_config(dir: &Path, body: &str) -> PathBuf {
    let db_path = dir.join("medusa.db");
    let content = format!(
        "{}\n[database]\npath = {:?}\n",
        body,
        db_path.display().to_string()
    );
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, content).unwrap();
    config_path
}

fn minimal_config(dir: &Path, port: u16) -> PathBuf {
    write_config(
        dir,
        &format!(
            r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = {}
"#,
            port
        ),
    )
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_medusa"))
        .env("MEDUSA_CONFIG", config_path)
        .env("RUST_LOG", "error")
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v2/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let mut server = spawn_server(&minimal_config(dir.path(), port)).await;

    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v2/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config_path = write_config(
        dir.path(),
        &format!(
            r#"
[auth]
method = "api_key"
api_key = "top-secret"

[server]
host = "127.0.0.1"
port = {}

[[providers]]
name = "jackett"
kind = "jackett"
url = "http://127.0.0.1:9"
api_key = "provider-secret"
"#,
            port
        ),
    );
    let mut server = spawn_server(&config_path).await;

    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let unauthorized = client
        .get(format!("http://127.0.0.1:{}/api/v2/config", port))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(unauthorized.status(), reqwest::StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("http://127.0.0.1:{}/api/v2/config", port))
        .header("X-Api-Key", "top-secret")
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let text = response.text().await.unwrap();
    assert!(!text.contains("top-secret"));
    assert!(!text.contains("provider-secret"));

    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["auth"]["method"], "api_key");
    assert_eq!(json["auth"]["api_key_configured"], true);
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["providers"][0]["api_key_configured"], true);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let mut server = spawn_server(&minimal_config(dir.path(), port)).await;

    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let body = Client::new()
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .unwrap();
    assert!(body.contains("medusa_http_requests_total"));
    assert!(body.contains("medusa_queue_length"));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_medusa"))
            .env("MEDUSA_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_auth_section_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), "[server]\nport = 8080\n");

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_medusa"))
            .env("MEDUSA_CONFIG", &config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(
        dir.path(),
        "[auth]\nmethod = \"none\"\n\n[post_processing]\nenabled = true\n",
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_medusa"))
            .env("MEDUSA_CONFIG", &config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
