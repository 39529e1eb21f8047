use std::sync::Arc;

use medusa_core::{
    Authenticator, Config, GenericQueue, HistoryHandle, HistoryStore, LibraryStore,
    PostProcessor, ProviderCache, SanitizedConfig, SchedulerRegistry, SearchContext,
};

/// Name of the queue running searches.
pub const SEARCH_QUEUE: &str = "search";

/// Name of the queue running post-processing.
pub const POSTPROCESS_QUEUE: &str = "postprocess";

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    search: Arc<SearchContext>,
    search_queue: Arc<GenericQueue>,
    postprocessor: Arc<PostProcessor>,
    postprocess_queue: Arc<GenericQueue>,
    schedulers: Arc<SchedulerRegistry>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        search: Arc<SearchContext>,
        search_queue: Arc<GenericQueue>,
        postprocessor: Arc<PostProcessor>,
        postprocess_queue: Arc<GenericQueue>,
        schedulers: Arc<SchedulerRegistry>,
    ) -> Self {
        Self {
            config,
            authenticator,
            search,
            search_queue,
            postprocessor,
            postprocess_queue,
            schedulers,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn library(&self) -> &Arc<dyn LibraryStore> {
        &self.search.library
    }

    pub fn cache(&self) -> &Arc<dyn ProviderCache> {
        &self.search.cache
    }

    pub fn history(&self) -> &HistoryHandle {
        &self.search.history
    }

    pub fn history_store(&self) -> &Arc<dyn HistoryStore> {
        &self.search.history_store
    }

    pub fn search(&self) -> &Arc<SearchContext> {
        &self.search
    }

    pub fn search_queue(&self) -> &Arc<GenericQueue> {
        &self.search_queue
    }

    pub fn postprocessor(&self) -> &Arc<PostProcessor> {
        &self.postprocessor
    }

    pub fn postprocess_queue(&self) -> &Arc<GenericQueue> {
        &self.postprocess_queue
    }

    pub fn schedulers(&self) -> &SchedulerRegistry {
        &self.schedulers
    }

    pub fn queues(&self) -> [&Arc<GenericQueue>; 2] {
        [&self.search_queue, &self.postprocess_queue]
    }

    /// Look up a queue by its API name.
    pub fn queue(&self, name: &str) -> Option<&Arc<GenericQueue>> {
        self.queues().into_iter().find(|q| q.name() == name)
    }
}
