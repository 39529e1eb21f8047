//! Mock provider for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::provider::{Provider, ProviderError, ProviderResult, ResultKind, SearchRequest};

/// Mock implementation of the Provider trait.
///
/// `search()` returns the configured results whatever the request,
/// `recent()` returns the recent list. Every search request is recorded.
pub struct MockProvider {
    name: String,
    kind: ResultKind,
    results: Arc<RwLock<Vec<ProviderResult>>>,
    recent: Arc<RwLock<Vec<ProviderResult>>>,
    searches: Arc<RwLock<Vec<SearchRequest>>>,
    /// If set, the next call fails with this message.
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self::with_kind(name, ResultKind::Torrent)
    }

    pub fn with_kind(name: &str, kind: ResultKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            results: Arc::new(RwLock::new(Vec::new())),
            recent: Arc::new(RwLock::new(Vec::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Results for `search()`.
    pub async fn set_results(&self, results: Vec<ProviderResult>) {
        *self.results.write().await = results;
    }

    /// Results for `recent()`.
    pub async fn set_recent(&self, results: Vec<ProviderResult>) {
        *self.recent.write().await = results;
    }

    pub async fn set_next_error(&self, message: &str) {
        *self.next_error.write().await = Some(message.to_string());
    }

    pub async fn recorded_searches(&self) -> Vec<SearchRequest> {
        self.searches.read().await.clone()
    }

    async fn take_error(&self) -> Result<(), ProviderError> {
        match self.next_error.write().await.take() {
            Some(message) => Err(ProviderError::Api(message)),
            None => Ok(()),
        }
    }

    fn with_provider(&self, results: &[ProviderResult]) -> Vec<ProviderResult> {
        results
            .iter()
            .cloned()
            .map(|mut r| {
                r.provider = self.name.clone();
                r
            })
            .collect()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResultKind {
        self.kind
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError> {
        self.searches.write().await.push(request.clone());
        self.take_error().await?;
        Ok(self.with_provider(&self.results.read().await))
    }

    async fn recent(&self) -> Result<Vec<ProviderResult>, ProviderError> {
        self.take_error().await?;
        Ok(self.with_provider(&self.recent.read().await))
    }
}
