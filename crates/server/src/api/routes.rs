use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{cache, handlers, history, postprocess, queues, schedulers, shows};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Authenticated API routes
    let protected = Router::new()
        .route("/config", get(handlers::get_config))
        // Shows
        .route("/shows", get(shows::list_shows).post(shows::add_show))
        .route("/shows/{id}", get(shows::get_show).delete(shows::delete_show))
        .route("/shows/{id}/pause", post(shows::pause_show))
        .route("/shows/{id}/resume", post(shows::resume_show))
        .route("/shows/{id}/backlog", post(shows::backlog_search))
        // Episodes
        .route(
            "/shows/{id}/episodes",
            get(shows::list_episodes).post(shows::upsert_episodes),
        )
        .route(
            "/shows/{id}/episodes/{season}/{episode}",
            put(shows::update_episode),
        )
        .route(
            "/shows/{id}/episodes/{season}/{episode}/search",
            post(shows::search_episode),
        )
        .route(
            "/shows/{id}/episodes/{season}/{episode}/retry",
            post(shows::retry_episode),
        )
        // Queues
        .route("/queues", get(queues::list_queues))
        .route("/queues/{name}", get(queues::get_queue))
        .route("/queues/{name}/pause", post(queues::pause_queue))
        .route("/queues/{name}/resume", post(queues::resume_queue))
        .route("/queues/{name}/items/{id}", delete(queues::remove_item))
        // Post-processing
        .route("/postprocess", post(postprocess::post_process))
        // Schedulers
        .route("/schedulers", get(schedulers::list_schedulers))
        .route("/schedulers/{name}/run", post(schedulers::run_scheduler))
        // History
        .route("/history", get(history::query_history))
        // Provider cache
        .route("/cache/stats", get(cache::get_stats))
        .route("/cache/{provider}", delete(cache::clear_provider))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    Router::new()
        .nest("/api/v2", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
