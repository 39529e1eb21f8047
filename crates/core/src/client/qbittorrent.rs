//! qBittorrent Web API v2 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{ClientError, DownloadClient};
use crate::config::QBittorrentConfig;
use crate::provider::{ProviderResult, ResultKind};

pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Set once the cookie jar holds a valid session.
    authenticated: RwLock<bool>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            config,
            authenticated: RwLock::new(false),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), endpoint)
    }

    async fn login(&self) -> Result<(), ClientError> {
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(self.url("/api/v2/auth/login"))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.authenticated.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(ClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(ClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), ClientError> {
        if *self.authenticated.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Authenticated form POST; a 403 means the session expired, so log in
    /// again and retry once.
    async fn post_form(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, ClientError> {
        self.ensure_authenticated().await?;

        let url = self.url(endpoint);
        let mut response = self.client.post(&url).form(params).send().await?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session expired, re-authenticating");
            *self.authenticated.write().await = false;
            self.login().await?;
            response = self.client.post(&url).form(params).send().await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api(format!("HTTP {}", status)));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    fn handles(&self, kind: ResultKind) -> bool {
        kind == ResultKind::Torrent
    }

    async fn snatch(&self, result: &ProviderResult) -> Result<(), ClientError> {
        let body = self
            .post_form(
                "/api/v2/torrents/add",
                &[
                    ("urls", result.url.as_str()),
                    ("category", self.config.category.as_str()),
                ],
            )
            .await?;

        if body.contains("Fails.") {
            return Err(ClientError::Api(format!(
                "qBittorrent refused torrent '{}'",
                result.title
            )));
        }

        info!(release = %result.title, "Sent torrent to qBittorrent");
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        *self.authenticated.write().await = false;
        self.login().await?;

        let response = self.client.get(self.url("/api/v2/app/version")).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!("HTTP {}", response.status())));
        }
        let version = response.text().await?;
        debug!(version = %version.trim(), "qBittorrent reachable");
        Ok(())
    }
}
