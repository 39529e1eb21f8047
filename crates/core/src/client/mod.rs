//! Download clients: where snatched releases are sent.

mod blackhole;
mod qbittorrent;

pub use blackhole::BlackholeClient;
pub use qbittorrent::QBittorrentClient;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ClientConfig, ClientsConfig};
use crate::provider::{ProviderResult, ResultKind};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no client configured for {0} results")]
    NoClient(&'static str),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_connect() {
            ClientError::ConnectionFailed(e.to_string())
        } else {
            ClientError::Api(e.to_string())
        }
    }
}

#[async_trait]
pub trait DownloadClient: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this client downloads results of `kind`.
    fn handles(&self, kind: ResultKind) -> bool;

    /// Hand the release over for download.
    async fn snatch(&self, result: &ProviderResult) -> Result<(), ClientError>;

    async fn test_connection(&self) -> Result<(), ClientError>;
}

/// Create the configured clients. qBittorrent can only serve the torrent
/// slot.
pub fn build_clients(config: &ClientsConfig) -> Result<Vec<Arc<dyn DownloadClient>>, ClientError> {
    let mut clients: Vec<Arc<dyn DownloadClient>> = Vec::new();

    if let Some(torrent) = &config.torrent {
        clients.push(match torrent {
            ClientConfig::QBittorrent(qb) => Arc::new(QBittorrentClient::new(qb.clone())?),
            ClientConfig::Blackhole(bh) => {
                Arc::new(BlackholeClient::new(bh.dir.clone(), ResultKind::Torrent)?)
            }
        });
    }

    if let Some(nzb) = &config.nzb {
        clients.push(match nzb {
            ClientConfig::QBittorrent(_) => {
                return Err(ClientError::Configuration(
                    "qbittorrent cannot download nzb results".to_string(),
                ))
            }
            ClientConfig::Blackhole(bh) => {
                Arc::new(BlackholeClient::new(bh.dir.clone(), ResultKind::Nzb)?)
            }
        });
    }

    Ok(clients)
}

/// First client that handles `kind`.
pub fn client_for(
    clients: &[Arc<dyn DownloadClient>],
    kind: ResultKind,
) -> Option<&Arc<dyn DownloadClient>> {
    clients.iter().find(|c| c.handles(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlackholeConfig, QBittorrentConfig};

    fn qbit() -> ClientConfig {
        ClientConfig::QBittorrent(QBittorrentConfig {
            url: "http://localhost:8080".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            category: "tv".to_string(),
            timeout_secs: 5,
        })
    }

    #[test]
    fn test_build_clients() {
        let dir = tempfile::tempdir().unwrap();
        let clients = build_clients(&ClientsConfig {
            torrent: Some(qbit()),
            nzb: Some(ClientConfig::Blackhole(BlackholeConfig {
                dir: dir.path().to_path_buf(),
            })),
        })
        .unwrap();

        assert_eq!(clients.len(), 2);
        assert_eq!(client_for(&clients, ResultKind::Torrent).unwrap().name(), "qbittorrent");
        assert_eq!(client_for(&clients, ResultKind::Nzb).unwrap().name(), "blackhole");
    }

    #[test]
    fn test_qbittorrent_rejected_for_nzb() {
        let result = build_clients(&ClientsConfig {
            torrent: None,
            nzb: Some(qbit()),
        });
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_no_clients() {
        let clients = build_clients(&ClientsConfig::default()).unwrap();
        assert!(client_for(&clients, ResultKind::Torrent).is_none());
    }
}
