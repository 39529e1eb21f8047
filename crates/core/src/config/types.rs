use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::quality::Quality;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub clients: ClientsConfig,
    #[serde(default)]
    pub post_processing: PostProcessingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8081
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Required when `method = "api_key"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("medusa.db")
}

/// Library layout and naming.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Episode file name pattern, see [`crate::naming::NamingPattern`].
    #[serde(default = "default_naming_pattern")]
    pub naming_pattern: String,
    /// Place episodes in a per-season folder below the show location.
    #[serde(default = "default_true")]
    pub season_folders: bool,
    #[serde(default = "default_season_folder_format")]
    pub season_folder_format: String,
    /// Qualities assigned to shows added without an explicit list.
    #[serde(default = "default_qualities")]
    pub default_qualities: Vec<Quality>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            naming_pattern: default_naming_pattern(),
            season_folders: true,
            season_folder_format: default_season_folder_format(),
            default_qualities: default_qualities(),
        }
    }
}

fn default_naming_pattern() -> String {
    "%SN - S%0SE%0E - %EN".to_string()
}

fn default_season_folder_format() -> String {
    "Season %0S".to_string()
}

fn default_qualities() -> Vec<Quality> {
    vec![Quality::HdTv, Quality::HdWebDl, Quality::HdBluRay]
}

fn default_true() -> bool {
    true
}

/// Search behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_daily_interval")]
    pub daily_interval_minutes: u64,
    #[serde(default = "default_backlog_interval")]
    pub backlog_interval_minutes: u64,
    /// Provider cache rows older than this are trimmed.
    #[serde(default = "default_cache_retention")]
    pub cache_retention_days: u32,
    /// Releases containing any of these words are never picked.
    #[serde(default = "default_ignored_words")]
    pub ignored_words: Vec<String>,
    /// When non-empty, releases must contain at least one of these words.
    #[serde(default)]
    pub required_words: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results_per_provider: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            daily_interval_minutes: default_daily_interval(),
            backlog_interval_minutes: default_backlog_interval(),
            cache_retention_days: default_cache_retention(),
            ignored_words: default_ignored_words(),
            required_words: Vec::new(),
            max_results_per_provider: default_max_results(),
        }
    }
}

fn default_daily_interval() -> u64 {
    40
}

fn default_backlog_interval() -> u64 {
    1440
}

fn default_cache_retention() -> u32 {
    7
}

fn default_ignored_words() -> Vec<String> {
    ["german", "french", "core2hd", "dutch", "swedish", "reenc", "MrLss"]
        .iter()
        .map(|w| w.to_string())
        .collect()
}

fn default_max_results() -> usize {
    100
}

/// Provider backend type.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Jackett results API (torrents).
    Jackett,
    /// Newznab API with JSON output (NZBs).
    Newznab,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Jackett => "jackett",
            ProviderKind::Newznab => "newznab",
        }
    }
}

/// A configured provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// Jackett indexer id (`all` aggregates every configured indexer).
    #[serde(default = "default_indexer")]
    pub indexer: String,
    /// Newznab/Torznab category ids.
    #[serde(default = "default_categories")]
    pub categories: Vec<u32>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rpm: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_indexer() -> String {
    "all".to_string()
}

fn default_categories() -> Vec<u32> {
    vec![5000, 5030, 5040]
}

fn default_rate_limit() -> u32 {
    30
}

fn default_timeout() -> u32 {
    30
}

/// Download clients, one per result kind.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent: Option<ClientConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nzb: Option<ClientConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientConfig {
    #[serde(rename = "qbittorrent")]
    QBittorrent(QBittorrentConfig),
    Blackhole(BlackholeConfig),
}

/// qBittorrent Web API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_category() -> String {
    "tv".to_string()
}

/// Watch-folder client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlackholeConfig {
    pub dir: PathBuf,
}

/// How post-processed files reach the library.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMethod {
    #[default]
    Move,
    Copy,
    Hardlink,
    Symlink,
}

impl ProcessMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessMethod::Move => "move",
            ProcessMethod::Copy => "copy",
            ProcessMethod::Hardlink => "hardlink",
            ProcessMethod::Symlink => "symlink",
        }
    }
}

/// Post-processing of completed downloads.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostProcessingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    #[serde(default = "default_pp_interval")]
    pub interval_minutes: u64,
    #[serde(default)]
    pub method: ProcessMethod,
    #[serde(default = "default_true")]
    pub delete_empty_dirs: bool,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
    /// Files sharing the video's stem with one of these extensions travel with it.
    #[serde(default = "default_associated_extensions")]
    pub associated_extensions: Vec<String>,
}

impl Default for PostProcessingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            download_dir: None,
            interval_minutes: default_pp_interval(),
            method: ProcessMethod::default(),
            delete_empty_dirs: true,
            video_extensions: default_video_extensions(),
            associated_extensions: default_associated_extensions(),
        }
    }
}

fn default_pp_interval() -> u64 {
    10
}

fn default_video_extensions() -> Vec<String> {
    ["mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "mpg", "mpeg", "ogm", "webm"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_associated_extensions() -> Vec<String> {
    ["srt", "sub", "idx", "nfo"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

/// Scheduler timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// How often the queue runners look for the next item.
    #[serde(default = "default_queue_cycle")]
    pub queue_cycle_ms: u64,
    /// Resolution of every scheduler's timing check.
    #[serde(default = "default_tick")]
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_cycle_ms: default_queue_cycle(),
            tick_ms: default_tick(),
        }
    }
}

fn default_queue_cycle() -> u64 {
    1000
}

fn default_tick() -> u64 {
    1000
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub library: LibraryConfig,
    pub search: SearchConfig,
    pub providers: Vec<SanitizedProviderConfig>,
    pub clients: SanitizedClientsConfig,
    pub post_processing: PostProcessingConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

/// Provider config with the API key hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProviderConfig {
    pub name: String,
    pub kind: String,
    pub url: String,
    pub api_key_configured: bool,
    pub indexer: String,
    pub categories: Vec<u32>,
    pub enabled: bool,
    pub rate_limit_rpm: u32,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedClientsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent: Option<SanitizedClientConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nzb: Option<SanitizedClientConfig>,
}

/// Client config with credentials hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedClientConfig {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub credentials_configured: bool,
}

impl From<&ClientConfig> for SanitizedClientConfig {
    fn from(config: &ClientConfig) -> Self {
        match config {
            ClientConfig::QBittorrent(q) => Self {
                kind: "qbittorrent".to_string(),
                url: Some(q.url.clone()),
                dir: None,
                credentials_configured: !q.username.is_empty() || !q.password.is_empty(),
            },
            ClientConfig::Blackhole(b) => Self {
                kind: "blackhole".to_string(),
                url: None,
                dir: Some(b.dir.clone()),
                credentials_configured: false,
            },
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            library: config.library.clone(),
            search: config.search.clone(),
            providers: config
                .providers
                .iter()
                .map(|p| SanitizedProviderConfig {
                    name: p.name.clone(),
                    kind: p.kind.as_str().to_string(),
                    url: p.url.clone(),
                    api_key_configured: !p.api_key.is_empty(),
                    indexer: p.indexer.clone(),
                    categories: p.categories.clone(),
                    enabled: p.enabled,
                    rate_limit_rpm: p.rate_limit_rpm,
                    timeout_secs: p.timeout_secs,
                })
                .collect(),
            clients: SanitizedClientsConfig {
                torrent: config.clients.torrent.as_ref().map(SanitizedClientConfig::from),
                nzb: config.clients.nzb.as_ref().map(SanitizedClientConfig::from),
            },
            post_processing: config.post_processing.clone(),
            scheduler: config.scheduler.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        toml::from_str(
            r#"
[auth]
method = "none"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = minimal();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "medusa.db");
        assert_eq!(config.library.naming_pattern, "%SN - S%0SE%0E - %EN");
        assert!(config.library.season_folders);
        assert_eq!(config.search.daily_interval_minutes, 40);
        assert_eq!(config.search.cache_retention_days, 7);
        assert!(config.search.ignored_words.contains(&"german".to_string()));
        assert!(!config.post_processing.enabled);
        assert_eq!(config.post_processing.method, ProcessMethod::Move);
        assert_eq!(config.scheduler.queue_cycle_ms, 1000);
        assert!(config.clients.torrent.is_none());
    }

    #[test]
    fn test_deserialize_missing_auth_fails() {
        let result: Result<Config, _> = toml::from_str("[server]\nport = 8081\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_providers_and_clients() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "secret"

[[providers]]
name = "jackett"
kind = "jackett"
url = "http://localhost:9117"
api_key = "jk"
indexer = "eztv"

[[providers]]
name = "geek"
kind = "newznab"
url = "https://api.nzbgeek.info"
api_key = "nz"
categories = [5030]
enabled = false

[clients.torrent]
kind = "qbittorrent"
url = "http://localhost:8080"
username = "admin"
password = "adminadmin"

[clients.nzb]
kind = "blackhole"
dir = "/downloads/watch"

[post_processing]
enabled = true
download_dir = "/downloads/complete"
method = "hardlink"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::ApiKey);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::Jackett);
        assert_eq!(config.providers[0].indexer, "eztv");
        assert_eq!(config.providers[0].rate_limit_rpm, 30);
        assert_eq!(config.providers[1].categories, vec![5030]);
        assert!(!config.providers[1].enabled);

        match config.clients.torrent.as_ref().unwrap() {
            ClientConfig::QBittorrent(q) => {
                assert_eq!(q.url, "http://localhost:8080");
                assert_eq!(q.category, "tv");
            }
            other => panic!("unexpected client: {:?}", other),
        }
        assert!(matches!(
            config.clients.nzb.as_ref().unwrap(),
            ClientConfig::Blackhole(_)
        ));
        assert_eq!(config.post_processing.method, ProcessMethod::Hardlink);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config = minimal();
        config.auth = AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some("top-secret".to_string()),
        };
        config.providers.push(ProviderConfig {
            name: "jackett".to_string(),
            kind: ProviderKind::Jackett,
            url: "http://localhost:9117".to_string(),
            api_key: "provider-secret".to_string(),
            indexer: "all".to_string(),
            categories: vec![5000],
            enabled: true,
            rate_limit_rpm: 10,
            timeout_secs: 30,
        });
        config.clients.torrent = Some(ClientConfig::QBittorrent(QBittorrentConfig {
            url: "http://localhost:8080".to_string(),
            username: "admin".to_string(),
            password: "client-secret".to_string(),
            category: "tv".to_string(),
            timeout_secs: 30,
        }));

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert!(sanitized.auth.api_key_configured);
        assert!(sanitized.providers[0].api_key_configured);
        assert!(sanitized.clients.torrent.as_ref().unwrap().credentials_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("top-secret"));
        assert!(!json.contains("provider-secret"));
        assert!(!json.contains("client-secret"));
    }
}
