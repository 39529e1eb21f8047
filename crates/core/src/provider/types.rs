//! Types shared by provider backends.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a provider hands out, and therefore which client downloads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Torrent,
    Nzb,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Torrent => "torrent",
            ResultKind::Nzb => "nzb",
        }
    }
}

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub show_name: String,
    pub season: Option<u32>,
    pub episodes: Vec<u32>,
    pub air_date: Option<NaiveDate>,
}

impl SearchRequest {
    pub fn episode(show_name: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            show_name: show_name.into(),
            season: Some(season),
            episodes: vec![episode],
            air_date: None,
        }
    }

    pub fn air_date(show_name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            show_name: show_name.into(),
            season: None,
            episodes: Vec::new(),
            air_date: Some(date),
        }
    }

    pub fn season_pack(show_name: impl Into<String>, season: u32) -> Self {
        Self {
            show_name: show_name.into(),
            season: Some(season),
            episodes: Vec::new(),
            air_date: None,
        }
    }

    /// Show name with punctuation removed, as indexers expect it.
    pub fn search_name(&self) -> String {
        self.show_name
            .replace('\'', "")
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Free-text query: `Show Name S01E02`, `Show Name 2024 03 05` or
    /// `Show Name S01`.
    pub fn query_string(&self) -> String {
        let name = self.search_name();
        if let Some(date) = self.air_date {
            return format!("{} {}", name, date.format("%Y %m %d"));
        }
        match (self.season, self.episodes.first()) {
            (Some(season), Some(episode)) => format!("{} S{:02}E{:02}", name, season, episode),
            (Some(season), None) => format!("{} S{:02}", name, season),
            _ => name,
        }
    }
}

/// A release offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub title: String,
    /// Magnet URI or download link.
    pub url: String,
    pub kind: ResultKind,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    pub provider: String,
}

impl ProviderResult {
    pub fn is_magnet(&self) -> bool {
        self.url.starts_with("magnet:")
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {provider} rate limited, retry in {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::ConnectionFailed(e.to_string())
        } else {
            ProviderError::Api(e.to_string())
        }
    }
}

/// A searchable indexer.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ResultKind;

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError>;

    /// Latest releases (RSS-style feed).
    async fn recent(&self) -> Result<Vec<ProviderResult>, ProviderError>;
}
