//! Scheduled actions that enqueue searches.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{today, BacklogSearch, DailySearch, SearchContext};
use crate::queue::{GenericQueue, Priority, QueueError};
use crate::scheduler::ScheduledAction;

fn log_add_result(result: Result<uuid::Uuid, QueueError>) {
    match result {
        Ok(_) => {}
        Err(QueueError::Duplicate(key)) => debug!(key, "Search already queued"),
        Err(e) => warn!(error = %e, "Failed to queue search"),
    }
}

/// Enqueues a [`DailySearch`].
pub struct DailySearchScheduler {
    queue: Arc<GenericQueue>,
    ctx: Arc<SearchContext>,
}

impl DailySearchScheduler {
    pub fn new(queue: Arc<GenericQueue>, ctx: Arc<SearchContext>) -> Self {
        Self { queue, ctx }
    }
}

#[async_trait]
impl ScheduledAction for DailySearchScheduler {
    async fn run(&self, _force: bool) {
        log_add_result(
            self.queue
                .add_item(Arc::new(DailySearch::new(Arc::clone(&self.ctx))), Priority::Normal),
        );
    }
}

/// Enqueues a [`BacklogSearch`] for every active show with wanted episodes.
pub struct BacklogScheduler {
    queue: Arc<GenericQueue>,
    ctx: Arc<SearchContext>,
}

impl BacklogScheduler {
    pub fn new(queue: Arc<GenericQueue>, ctx: Arc<SearchContext>) -> Self {
        Self { queue, ctx }
    }
}

#[async_trait]
impl ScheduledAction for BacklogScheduler {
    async fn run(&self, _force: bool) {
        let shows = match self.ctx.library.list_shows() {
            Ok(shows) => shows,
            Err(e) => {
                warn!(error = %e, "Backlog: failed to list shows");
                return;
            }
        };

        let today = today();
        for show in shows.iter().filter(|s| !s.paused) {
            match self.ctx.library.wanted_episodes(show.id, today) {
                Ok(wanted) if wanted.is_empty() => {}
                Ok(wanted) => {
                    debug!(show = %show.name, wanted = wanted.len(), "Queueing backlog search");
                    log_add_result(self.queue.add_item(
                        Arc::new(BacklogSearch::new(Arc::clone(&self.ctx), show)),
                        Priority::Low,
                    ));
                }
                Err(e) => warn!(show = %show.name, error = %e, "Backlog: failed to list wanted episodes"),
            }
        }
    }
}
