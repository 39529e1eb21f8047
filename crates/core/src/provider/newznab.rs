//! Newznab API provider (NZB indexers).

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

pub struct NewznabProvider {
    name: String,
    client: Client,
    url: String,
    api_key: String,
    categories: Vec<u32>,
    max_results: usize,
    limiter: Arc<RateLimiterPool>,
}

impl NewznabProvider {
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
            categories: config.categories.clone(),
            max_results,
            limiter,
        })
    }

    fn base_url(&self) -> String {
        let cats = self
            .categories
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/api?t=tvsearch&o=json&apikey={}&cat={}&limit={}",
            self.url,
            urlencoding::encode(&self.api_key),
            cats,
            self.max_results
        )
    }

    /// Air-by-date shows are searched with the year as season and `MM/DD`
    /// as episode, which is what newznab indexers expect.
    fn search_url(&self, request: &SearchRequest) -> String {
        let mut url = self.base_url();
        url.push_str(&format!("&q={}", urlencoding::encode(&request.search_name())));

        if let Some(date) = request.air_date {
            url.push_str(&format!(
                "&season={}&ep={}",
                date.format("%Y"),
                urlencoding::encode(&date.format("%m/%d").to_string())
            ));
        } else if let Some(season) = request.season {
            url.push_str(&format!("&season={}", season));
            if let Some(episode) = request.episodes.first() {
                url.push_str(&format!("&ep={}", episode));
            }
        }
        url
    }

    async fn fetch(&self, url: String, op: &str) -> Result<Vec<ProviderResult>, ProviderError> {
        self.limiter.try_acquire(&self.name).await?;

        let start = Instant::now();
        debug!(provider = %self.name, op, "Querying newznab indexer");

        let result = async {
            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::Api(format!("HTTP {}", response.status())));
            }
            let body = response.text().await?;
            parse_results(&body, &self.name, self.max_results)
        }
        .await;

        metrics::record_provider_request(&self.name, op, result.is_ok(), start.elapsed());
        result
    }
}

#[async_trait]
impl Provider for NewznabProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResultKind {
        ResultKind::Nzb
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError> {
        self.fetch(self.search_url(request), "search").await
    }

    async fn recent(&self) -> Result<Vec<ProviderResult>, ProviderError> {
        self.fetch(self.base_url(), "recent").await
    }
}

fn parse_results(
    body: &str,
    provider: &str,
    max_results: usize,
) -> Result<Vec<ProviderResult>, ProviderError> {
    let response: NewznabResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(ProviderError::Api(format!(
            "{} ({})",
            error.attributes.description.unwrap_or_default(),
            error.attributes.code.unwrap_or_default()
        )));
    }

    let items = response
        .channel
        .and_then(|c| c.item)
        .map(OneOrMany::into_vec)
        .unwrap_or_default();

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let url = item
                .enclosure
                .as_ref()
                .and_then(|e| e.attributes.url.clone())
                .or(item.link)?;

            let size = item
                .attr
                .map(OneOrMany::into_vec)
                .unwrap_or_default()
                .into_iter()
                .find(|a| a.attributes.name == "size")
                .and_then(|a| a.attributes.value.parse::<u64>().ok())
                .or_else(|| {
                    item.enclosure
                        .and_then(|e| e.attributes.length)
                        .and_then(|l| l.parse::<u64>().ok())
                })
                .unwrap_or(0);

            Some(ProviderResult {
                title: item.title,
                url,
                kind: ResultKind::Nzb,
                size_bytes: size,
                seeders: None,
                leechers: None,
                published: item.pub_date.as_deref().and_then(parse_pub_date),
                provider: provider.to_string(),
            })
        })
        .take(max_results)
        .collect())
}

fn parse_pub_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(t) => vec![t],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NewznabResponse {
    channel: Option<Channel>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "@attributes")]
    attributes: ErrorAttributes,
}

#[derive(Debug, Deserialize)]
struct ErrorAttributes {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    item: Option<OneOrMany<Item>>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: String,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    enclosure: Option<Enclosure>,
    attr: Option<OneOrMany<Attr>>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@attributes")]
    attributes: EnclosureAttributes,
}

#[derive(Debug, Deserialize)]
struct EnclosureAttributes {
    url: Option<String>,
    length: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attr {
    #[serde(rename = "@attributes")]
    attributes: AttrAttributes,
}

#[derive(Debug, Deserialize)]
struct AttrAttributes {
    name: String,
    value: String,
}
