pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod history;
pub mod library;
pub mod metrics;
pub mod naming;
pub mod postprocess;
pub mod provider;
pub mod quality;
pub mod queue;
pub mod scheduler;
pub mod search;
pub mod testing;

pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
};
pub use cache::{CacheError, CacheStats, CachedResult, ProviderCache, SqliteProviderCache};
pub use client::{build_clients, ClientError, DownloadClient};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use history::{
    create_history_system, HistoryError, HistoryEvent, HistoryFilter, HistoryHandle,
    HistoryRecord, HistoryStore, HistoryWriter, SqliteHistoryStore,
};
pub use library::{
    Episode, EpisodeStatus, EpisodeUpdate, LibraryError, LibraryStore, NewEpisode, NewShow, Show,
    SqliteLibraryStore,
};
pub use postprocess::{PostProcessError, PostProcessReport, PostProcessor};
pub use provider::{build_providers, Provider, ProviderError, ProviderResult, ResultKind};
pub use quality::Quality;
pub use queue::{GenericQueue, Priority, QueueAction, QueueError, QueueItemInfo, QueueStatus};
pub use scheduler::{ScheduledAction, Scheduler, SchedulerRegistry, SchedulerStatus};
pub use search::{SearchContext, SearchError};
