//! Testing utilities and mock implementations for integration tests.
//!
//! Mocks stand in for indexers and download clients so searches and
//! snatches can be exercised without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use medusa_core::testing::{fixtures, MockDownloadClient, MockProvider};
//!
//! let provider = MockProvider::new("mock");
//! provider.set_results(vec![fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-GRP", 10)]).await;
//!
//! let client = MockDownloadClient::torrent();
//! // ... run a search, then:
//! assert_eq!(client.snatched().await.len(), 1);
//! ```

mod mock_download_client;
mod mock_provider;

pub use mock_download_client::MockDownloadClient;
pub use mock_provider::MockProvider;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use chrono::{NaiveDate, Utc};

    use crate::library::{Episode, EpisodeStatus, NewEpisode, NewShow, Show};
    use crate::provider::{ProviderResult, ResultKind};

    /// A show with no quality restriction.
    pub fn show(id: i64, name: &str) -> Show {
        Show {
            id,
            name: name.to_string(),
            aliases: Vec::new(),
            location: PathBuf::from(format!("/tv/{}", name)),
            qualities: Vec::new(),
            paused: false,
            air_by_date: false,
            created_at: Utc::now(),
        }
    }

    pub fn new_show(name: &str, location: impl Into<PathBuf>) -> NewShow {
        NewShow {
            name: name.to_string(),
            aliases: Vec::new(),
            location: location.into(),
            qualities: Vec::new(),
            paused: false,
            air_by_date: false,
        }
    }

    /// A wanted episode that aired a week ago.
    pub fn episode(show_id: i64, season: u32, episode: u32) -> Episode {
        Episode {
            show_id,
            season,
            episode,
            name: format!("Episode {}", episode),
            airdate: Some(Utc::now().date_naive() - chrono::Duration::days(7)),
            status: EpisodeStatus::Wanted,
            quality: None,
            location: None,
            release_name: None,
            updated_at: Utc::now(),
        }
    }

    pub fn new_episode(season: u32, episode: u32, airdate: Option<NaiveDate>) -> NewEpisode {
        NewEpisode {
            season,
            episode,
            name: format!("Episode {}", episode),
            airdate,
            status: None,
        }
    }

    /// A magnet result with the given seeders.
    pub fn torrent_result(title: &str, seeders: u32) -> ProviderResult {
        ProviderResult {
            title: title.to_string(),
            url: format!("magnet:?xt=urn:btih:{}", title.to_lowercase().replace('.', "")),
            kind: ResultKind::Torrent,
            size_bytes: 1024 * 1024 * 700,
            seeders: Some(seeders),
            leechers: Some(1),
            published: Some(Utc::now()),
            provider: "mock".to_string(),
        }
    }

    pub fn nzb_result(title: &str) -> ProviderResult {
        ProviderResult {
            title: title.to_string(),
            url: format!("http://indexer.test/get/{}", title.len()),
            kind: ResultKind::Nzb,
            size_bytes: 1024 * 1024 * 700,
            seeders: None,
            leechers: None,
            published: Some(Utc::now()),
            provider: "mock-nzb".to_string(),
        }
    }
}
