//! Jackett results API provider (torrents).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{Provider, ProviderError, ProviderResult, RateLimiterPool, ResultKind, SearchRequest};
use crate::config::ProviderConfig;
use crate::metrics;

/// Torrent provider backed by a Jackett indexer (or the `all` aggregate).
pub struct JackettProvider {
    name: String,
    client: Client,
    url: String,
    api_key: String,
    indexer: String,
    categories: Vec<u32>,
    max_results: usize,
    limiter: Arc<RateLimiterPool>,
}

impl JackettProvider {
    pub fn new(
        config: &ProviderConfig,
        max_results: usize,
        limiter: Arc<RateLimiterPool>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        Ok(Self {
            name: config.name.clone(),
            client,
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            indexer: config.indexer.clone(),
            categories: config.categories.clone(),
            max_results,
            limiter,
        })
    }

    fn build_url(&self, query: &str) -> String {
        let mut url = format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            self.url,
            urlencoding::encode(&self.indexer),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(query)
        );
        for cat in &self.categories {
            url.push_str(&format!("&Category[]={}", cat));
        }
        url
    }

    async fn fetch(&self, query: &str, op: &str) -> Result<Vec<ProviderResult>, ProviderError> {
        self.limiter.try_acquire(&self.name).await?;

        let start = Instant::now();
        debug!(provider = %self.name, query, "Querying Jackett");

        let result = async {
            let response = self.client.get(self.build_url(query)).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api(format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )));
            }
            let body = response.text().await?;
            parse_results(&body, &self.name, self.max_results)
        }
        .await;

        metrics::record_provider_request(&self.name, op, result.is_ok(), start.elapsed());
        if let Ok(results) = &result {
            debug!(provider = %self.name, results = results.len(), "Jackett query complete");
        }
        result
    }
}

#[async_trait]
impl Provider for JackettProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResultKind {
        ResultKind::Torrent
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError> {
        self.fetch(&request.query_string(), "search").await
    }

    async fn recent(&self) -> Result<Vec<ProviderResult>, ProviderError> {
        self.fetch("", "recent").await
    }
}

/// Parse a Jackett results payload. Results without a magnet or link are
/// dropped.
fn parse_results(
    body: &str,
    provider: &str,
    max_results: usize,
) -> Result<Vec<ProviderResult>, ProviderError> {
    let response: JackettResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    Ok(response
        .results
        .into_iter()
        .filter_map(|r| {
            let url = r.magnet_uri.filter(|m| !m.is_empty()).or(r.link)?;
            let seeders = r.seeders.unwrap_or(0).max(0);
            let peers = r.peers.unwrap_or(0).max(0);
            Some(ProviderResult {
                title: r.title,
                url,
                kind: ResultKind::Torrent,
                size_bytes: r.size.unwrap_or(0).max(0) as u64,
                seeders: Some(seeders as u32),
                leechers: Some(peers.saturating_sub(seeders) as u32),
                published: r.publish_date.as_deref().and_then(parse_jackett_date),
                provider: provider.to_string(),
            })
        })
        .take(max_results)
        .collect())
}

fn parse_jackett_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JackettResponse {
    results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JackettResult {
    title: String,
    magnet_uri: Option<String>,
    link: Option<String>,
    size: Option<i64>,
    seeders: Option<i32>,
    peers: Option<i32>,
    publish_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    fn provider(url: &str, categories: Vec<u32>) -> JackettProvider {
        let config = ProviderConfig {
            name: "jackett".to_string(),
            kind: ProviderKind::Jackett,
            url: url.to_string(),
            api_key: "test-key".to_string(),
            indexer: "all".to_string(),
            categories,
            enabled: true,
            rate_limit_rpm: 10,
            timeout_secs: 5,
        };
        JackettProvider::new(&config, 100, Arc::new(RateLimiterPool::new([("jackett", 10)])))
            .unwrap()
    }

    #[test]
    fn test_build_url() {
        let p = provider("http://localhost:9117/", vec![5030, 5040]);
        let url = p.build_url("Show Name S01E02");
        assert!(url.starts_with("http://localhost:9117/api/v2.0/indexers/all/results?"));
        assert!(url.contains("apikey=test-key"));
        assert!(url.contains("Query=Show%20Name%20S01E02"));
        assert!(url.contains("Category[]=5030"));
        assert!(url.contains("Category[]=5040"));
    }

    #[test]
    fn test_parse_results() {
        let body = r#"{
            "Results": [
                {
                    "Title": "Show.S01E02.720p.HDTV.x264-GRP",
                    "MagnetUri": "magnet:?xt=urn:btih:abc",
                    "Link": "http://jackett/dl/1.torrent",
                    "Size": 734003200,
                    "Seeders": 12,
                    "Peers": 20,
                    "PublishDate": "2024-06-15T10:30:00Z"
                },
                {
                    "Title": "Show.S01E02.1080p.WEB-DL-GRP",
                    "MagnetUri": null,
                    "Link": "http://jackett/dl/2.torrent",
                    "Size": null,
                    "Seeders": null,
                    "Peers": null,
                    "PublishDate": "2024-06-15T10:30:00"
                },
                { "Title": "No link at all" }
            ]
        }"#;

        let results = parse_results(body, "jackett", 100).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].url, "magnet:?xt=urn:btih:abc");
        assert_eq!(results[0].seeders, Some(12));
        assert_eq!(results[0].leechers, Some(8));
        assert_eq!(results[0].size_bytes, 734003200);
        assert!(results[0].published.is_some());
        assert_eq!(results[0].provider, "jackett");

        assert_eq!(results[1].url, "http://jackett/dl/2.torrent");
        assert_eq!(results[1].seeders, Some(0));
        assert!(results[1].published.is_some());
    }

    #[test]
    fn test_parse_results_respects_limit_and_rejects_garbage() {
        let body = r#"{"Results": [
            {"Title": "a", "Link": "http://x/1"},
            {"Title": "b", "Link": "http://x/2"}
        ]}"#;
        assert_eq!(parse_results(body, "j", 1).unwrap().len(), 1);
        assert!(matches!(
            parse_results("<html>", "j", 10),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_jackett_date() {
        assert!(parse_jackett_date("2024-06-15T10:30:00+02:00").is_some());
        assert!(parse_jackett_date("invalid").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let p = provider("http://127.0.0.1:1", vec![5000]);
        let err = p.recent().await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::ConnectionFailed(_) | ProviderError::Timeout
        ));
    }
}
