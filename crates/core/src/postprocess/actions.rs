//! Post-processing queue item and its scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::PostProcessor;
use crate::queue::{GenericQueue, Priority, QueueAction, QueueError, QueueItemError};
use crate::scheduler::ScheduledAction;

/// Post-process one directory.
pub struct PostProcessItem {
    processor: Arc<PostProcessor>,
    dir: PathBuf,
    force: bool,
}

impl PostProcessItem {
    pub fn new(processor: Arc<PostProcessor>, dir: PathBuf, force: bool) -> Self {
        Self {
            processor,
            dir,
            force,
        }
    }
}

#[async_trait]
impl QueueAction for PostProcessItem {
    fn name(&self) -> String {
        format!("Post-process {}", self.dir.display())
    }

    fn kind(&self) -> &'static str {
        "post_process"
    }

    fn dedup_key(&self) -> Option<String> {
        Some(format!("postprocess:{}", self.dir.display()))
    }

    async fn run(&self) -> Result<(), QueueItemError> {
        let report = self
            .processor
            .process_dir(&self.dir, self.force)
            .await
            .map_err(QueueItemError::new)?;

        if !report.failed.is_empty() {
            return Err(QueueItemError(format!(
                "{} of {} files failed",
                report.failed.len(),
                report.failed.len() + report.processed.len() + report.skipped.len()
            )));
        }
        Ok(())
    }
}

/// Enqueues post-processing of the configured download directory.
pub struct PostProcessScheduler {
    queue: Arc<GenericQueue>,
    processor: Arc<PostProcessor>,
}

impl PostProcessScheduler {
    pub fn new(queue: Arc<GenericQueue>, processor: Arc<PostProcessor>) -> Self {
        Self { queue, processor }
    }
}

#[async_trait]
impl ScheduledAction for PostProcessScheduler {
    async fn run(&self, _force: bool) {
        let Some(dir) = self.processor.download_dir() else {
            debug!("No download directory configured");
            return;
        };

        // a forced scheduler run only means "now"; the quality guard stays on
        let item = PostProcessItem::new(Arc::clone(&self.processor), dir.to_path_buf(), false);
        match self.queue.add_item(Arc::new(item), Priority::Normal) {
            Ok(_) => {}
            Err(QueueError::Duplicate(_)) => debug!(dir = %dir.display(), "Post-processing already queued"),
            Err(e) => warn!(error = %e, "Failed to queue post-processing"),
        }
    }
}
