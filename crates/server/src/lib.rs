//! HTTP API for the Medusa TV library manager.
//!
//! The router, its shared state and the HTTP metrics live here so the
//! `medusa` binary and the integration tests build the same server.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
