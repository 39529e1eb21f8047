pub mod cache;
pub mod error;
pub mod handlers;
pub mod history;
pub mod middleware;
pub mod postprocess;
pub mod queues;
pub mod routes;
pub mod schedulers;
pub mod shows;

pub use error::ApiError;
pub use routes::create_router;
