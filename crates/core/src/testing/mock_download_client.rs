//! Mock download client for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::client::{ClientError, DownloadClient};
use crate::provider::{ProviderResult, ResultKind};

/// Records snatched releases instead of downloading them.
pub struct MockDownloadClient {
    name: String,
    kind: ResultKind,
    snatched: Arc<RwLock<Vec<ProviderResult>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockDownloadClient {
    pub fn new(name: &str, kind: ResultKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            snatched: Arc::new(RwLock::new(Vec::new())),
            fail: Arc::new(RwLock::new(false)),
        }
    }

    pub fn torrent() -> Self {
        Self::new("mock-torrent", ResultKind::Torrent)
    }

    pub fn nzb() -> Self {
        Self::new("mock-nzb", ResultKind::Nzb)
    }

    pub async fn snatched(&self) -> Vec<ProviderResult> {
        self.snatched.read().await.clone()
    }

    /// Make every snatch fail until reset.
    pub async fn set_failing(&self, fail: bool) {
        *self.fail.write().await = fail;
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, kind: ResultKind) -> bool {
        kind == self.kind
    }

    async fn snatch(&self, result: &ProviderResult) -> Result<(), ClientError> {
        if *self.fail.read().await {
            return Err(ClientError::ConnectionFailed("mock client offline".to_string()));
        }
        self.snatched.write().await.push(result.clone());
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        if *self.fail.read().await {
            return Err(ClientError::ConnectionFailed("mock client offline".to_string()));
        }
        Ok(())
    }
}
