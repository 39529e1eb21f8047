//! Watch-folder client: drops magnets, torrents and NZBs into a directory
//! that an external downloader watches.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{ClientError, DownloadClient};
use crate::naming::sanitize_file_name;
use crate::provider::{ProviderResult, ResultKind};

const WRITE_CHECK_FILE: &str = ".medusa-write-check";

pub struct BlackholeClient {
    dir: PathBuf,
    kind: ResultKind,
    client: Client,
}

impl BlackholeClient {
    pub fn new(dir: PathBuf, kind: ResultKind) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        Ok(Self { dir, kind, client })
    }

    fn file_path(&self, result: &ProviderResult) -> PathBuf {
        let extension = if result.is_magnet() {
            "magnet"
        } else {
            result.kind.as_str()
        };
        let mut stem = sanitize_file_name(&result.title);
        if stem.is_empty() {
            stem = "release".to_string();
        }
        self.dir.join(format!("{}.{}", stem, extension))
    }
}

#[async_trait]
impl DownloadClient for BlackholeClient {
    fn name(&self) -> &str {
        "blackhole"
    }

    fn handles(&self, kind: ResultKind) -> bool {
        kind == self.kind
    }

    async fn snatch(&self, result: &ProviderResult) -> Result<(), ClientError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.file_path(result);

        if result.is_magnet() {
            tokio::fs::write(&path, result.url.as_bytes()).await?;
        } else {
            let response = self.client.get(&result.url).send().await?;
            if !response.status().is_success() {
                return Err(ClientError::Api(format!(
                    "download of '{}' failed: HTTP {}",
                    result.title,
                    response.status()
                )));
            }
            let bytes = response.bytes().await?;
            tokio::fs::write(&path, &bytes).await?;
        }

        info!(release = %result.title, path = %path.display(), "Wrote release to blackhole");
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let check = self.dir.join(WRITE_CHECK_FILE);
        tokio::fs::write(&check, b"").await.map_err(|e| {
            ClientError::Configuration(format!(
                "blackhole directory {} is not writable: {}",
                self.dir.display(),
                e
            ))
        })?;
        tokio::fs::remove_file(&check).await?;
        Ok(())
    }
}
