use std::sync::{Arc, RwLock};

use super::{Scheduler, SchedulerStatus};

/// Named schedulers, looked up by the API.
#[derive(Default)]
pub struct SchedulerRegistry {
    schedulers: RwLock<Vec<Arc<Scheduler>>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scheduler; a scheduler with the same name is replaced.
    pub fn register(&self, scheduler: Arc<Scheduler>) {
        let mut schedulers = self.schedulers.write().unwrap_or_else(|e| e.into_inner());
        schedulers.retain(|s| s.name() != scheduler.name());
        schedulers.push(scheduler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Scheduler>> {
        self.schedulers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    pub fn list(&self) -> Vec<SchedulerStatus> {
        self.all().iter().map(|s| s.status()).collect()
    }

    pub fn start_all(&self) {
        for scheduler in self.all() {
            scheduler.start();
        }
    }

    pub async fn stop_all(&self) {
        for scheduler in self.all() {
            if scheduler.is_running() {
                scheduler.stop().await;
            }
        }
    }

    fn all(&self) -> Vec<Arc<Scheduler>> {
        self.schedulers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ScheduledAction;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Noop;

    #[async_trait]
    impl ScheduledAction for Noop {
        async fn run(&self, _force: bool) {}
    }

    fn scheduler(name: &str) -> Arc<Scheduler> {
        Arc::new(Scheduler::new(name, Arc::new(Noop), Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_register_get_and_stop_all() {
        let registry = SchedulerRegistry::new();
        registry.register(scheduler("daily_search"));
        registry.register(scheduler("backlog"));
        registry.register(scheduler("backlog"));

        assert_eq!(registry.list().len(), 2);
        assert!(registry.get("daily_search").is_some());
        assert!(registry.get("missing").is_none());

        registry.start_all();
        assert!(registry.list().iter().all(|s| s.running));

        registry.stop_all().await;
        assert!(registry.list().iter().all(|s| !s.running));
    }
}
