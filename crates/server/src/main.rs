use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use medusa_core::postprocess::PostProcessScheduler;
use medusa_core::search::{BacklogScheduler, DailySearchScheduler};
use medusa_core::{
    build_clients, build_providers, create_authenticator, create_history_system, load_config,
    validate_config, Authenticator, GenericQueue, HistoryEvent, HistoryStore, LibraryStore,
    PostProcessor, ProviderCache, Scheduler, SchedulerRegistry, SearchContext, SqliteHistoryStore,
    SqliteLibraryStore, SqliteProviderCache,
};
use medusa_server::state::{POSTPROCESS_QUEUE, SEARCH_QUEUE};
use medusa_server::{create_router, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the history event channel
const HISTORY_BUFFER_SIZE: usize = 1000;

/// Delay before the first backlog search after startup
const BACKLOG_START_DELAY: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("MEDUSA_LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("MEDUSA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {}", config.auth.method.as_str());
    info!("Database path: {:?}", config.database.path);

    // Compute config hash for history
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Stores, each with its own connection to the same database
    let library_store = SqliteLibraryStore::new(&config.database.path)
        .context("Failed to open library database")?;
    info!(
        schema_version = library_store.schema_version().unwrap_or_default(),
        "Library store initialized"
    );
    let library: Arc<dyn LibraryStore> = Arc::new(library_store);

    let cache: Arc<dyn ProviderCache> = Arc::new(
        SqliteProviderCache::new(&config.database.path)
            .context("Failed to open provider cache")?,
    );
    let history_store: Arc<dyn HistoryStore> = Arc::new(
        SqliteHistoryStore::new(&config.database.path).context("Failed to open history store")?,
    );

    let (history, history_writer) =
        create_history_system(Arc::clone(&history_store), HISTORY_BUFFER_SIZE);
    let writer_handle = tokio::spawn(history_writer.run());

    // Providers and download clients
    let providers = build_providers(&config.providers, config.search.max_results_per_provider)
        .context("Failed to create providers")?;
    if providers.is_empty() {
        warn!("No providers enabled, searches will find nothing");
    }
    for provider in &providers {
        info!(provider = %provider.name(), kind = ?provider.kind(), "Provider enabled");
    }

    let clients = build_clients(&config.clients).context("Failed to create download clients")?;
    for client in &clients {
        let client = Arc::clone(client);
        tokio::spawn(async move {
            match client.test_connection().await {
                Ok(()) => info!(client = %client.name(), "Download client reachable"),
                Err(e) => warn!(client = %client.name(), error = %e, "Download client check failed"),
            }
        });
    }

    let search = Arc::new(SearchContext {
        library: Arc::clone(&library),
        providers,
        cache,
        clients,
        history: history.clone(),
        history_store,
        config: config.search.clone(),
    });

    let postprocessor = Arc::new(
        PostProcessor::new(
            Arc::clone(&library),
            config.library.clone(),
            config.post_processing.clone(),
        )
        .with_history(history.clone()),
    );

    // Queues
    let search_queue = Arc::new(GenericQueue::new(SEARCH_QUEUE).with_history(history.clone()));
    let postprocess_queue =
        Arc::new(GenericQueue::new(POSTPROCESS_QUEUE).with_history(history.clone()));

    // Schedulers
    let tick = Duration::from_millis(config.scheduler.tick_ms);
    let queue_cycle = Duration::from_millis(config.scheduler.queue_cycle_ms);
    let minutes = |m: u64| Duration::from_secs(m * 60);

    let schedulers = Arc::new(SchedulerRegistry::new());
    schedulers.register(Arc::new(
        Scheduler::new("search_queue", search_queue.clone(), queue_cycle).with_tick(tick),
    ));
    schedulers.register(Arc::new(
        Scheduler::new("postprocess_queue", postprocess_queue.clone(), queue_cycle)
            .with_tick(tick),
    ));
    schedulers.register(Arc::new(
        Scheduler::new(
            "daily_search",
            Arc::new(DailySearchScheduler::new(
                Arc::clone(&search_queue),
                Arc::clone(&search),
            )),
            minutes(config.search.daily_interval_minutes),
        )
        .with_tick(tick),
    ));
    schedulers.register(Arc::new(
        Scheduler::new(
            "backlog_search",
            Arc::new(BacklogScheduler::new(
                Arc::clone(&search_queue),
                Arc::clone(&search),
            )),
            minutes(config.search.backlog_interval_minutes),
        )
        .with_run_delay(BACKLOG_START_DELAY)
        .with_tick(tick),
    ));
    schedulers.register(Arc::new(
        Scheduler::new(
            "post_processing",
            Arc::new(PostProcessScheduler::new(
                Arc::clone(&postprocess_queue),
                Arc::clone(&postprocessor),
            )),
            minutes(config.post_processing.interval_minutes),
        )
        .with_enabled(config.post_processing.enabled)
        .with_tick(tick),
    ));
    schedulers.start_all();
    info!("Schedulers started");

    history
        .emit(HistoryEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;
    info!("Emitted ServiceStarted history event");

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        search,
        search_queue,
        postprocessor,
        postprocess_queue,
        Arc::clone(&schedulers),
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Stopping schedulers...");
    schedulers.stop_all().await;
    info!("Schedulers stopped");

    info!("Server shutting down...");
    history
        .emit(HistoryEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The writer exits once every HistoryHandle is gone. Queues, search
    // context and post-processor hold clones through the schedulers.
    drop(schedulers);
    drop(history);

    match tokio::time::timeout(Duration::from_secs(5), writer_handle).await {
        Ok(_) => info!("History writer stopped"),
        Err(_) => warn!("History writer did not drain in time"),
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
