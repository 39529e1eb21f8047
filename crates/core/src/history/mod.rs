//! Library history: what was snatched, downloaded or failed, and when.
//!
//! Events are emitted through a cheap [`HistoryHandle`] and persisted by a
//! background [`HistoryWriter`].

mod events;
mod handle;
mod sqlite;
mod store;
mod writer;

pub use events::{HistoryEvent, HistoryRecord};
pub use handle::{HistoryEventEnvelope, HistoryHandle};
pub use sqlite::SqliteHistoryStore;
pub use store::{HistoryError, HistoryFilter, HistoryStore};
pub use writer::{create_history_system, HistoryWriter};
