//! Periodic background tasks.
//!
//! A [`Scheduler`] owns a loop that wakes every tick, decides whether its
//! action is due and awaits it. Queue runners, the daily search, the backlog
//! search and post-processing all run through here.

mod registry;

pub use registry::SchedulerRegistry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;

/// Work invoked by a scheduler.
#[async_trait]
pub trait ScheduledAction: Send + Sync {
    /// `force` is set when the run was requested through [`Scheduler::force_run`].
    async fn run(&self, force: bool);
}

/// Snapshot of a scheduler for the API.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub name: String,
    pub enabled: bool,
    pub running: bool,
    pub cycle_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    /// The action is executing right now.
    pub active: bool,
    pub force_pending: bool,
}

struct Timing {
    cycle: Duration,
    start_time: Option<NaiveTime>,
    /// Reference point for cycle arithmetic; the first run is due one cycle
    /// after it.
    anchor: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
    last_run_day: Option<NaiveDate>,
}

impl Timing {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.start_time {
            Some(start) => {
                let local = now.with_timezone(&Local);
                local.time() >= start && self.last_run_day != Some(local.date_naive())
            }
            None => now.signed_duration_since(self.anchor) >= chrono_duration(self.cycle),
        }
    }

    fn time_left(&self, now: DateTime<Utc>) -> Duration {
        match self.start_time {
            Some(start) => {
                let local = now.with_timezone(&Local);
                let today = local.date_naive();
                let day = if local.time() < start && self.last_run_day != Some(today) {
                    today
                } else {
                    today.succ_opt().unwrap_or(today)
                };
                let next = day
                    .and_time(start)
                    .and_local_timezone(Local)
                    .earliest()
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or(now);
                next.signed_duration_since(now).to_std().unwrap_or_default()
            }
            None => {
                let elapsed = now
                    .signed_duration_since(self.anchor)
                    .to_std()
                    .unwrap_or_default();
                self.cycle.saturating_sub(elapsed)
            }
        }
    }

    fn mark_run(&mut self, now: DateTime<Utc>) {
        self.anchor = now;
        self.last_run = Some(now);
        self.last_run_day = Some(now.with_timezone(&Local).date_naive());
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

struct Shared {
    timing: Mutex<Timing>,
    enabled: AtomicBool,
    active: AtomicBool,
    force: AtomicBool,
}

impl Shared {
    fn timing(&self) -> MutexGuard<'_, Timing> {
        self.timing.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Runs an action on a fixed cycle (or once a day at a fixed time).
pub struct Scheduler {
    name: String,
    action: Arc<dyn ScheduledAction>,
    tick: Duration,
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// New scheduler whose first run is due immediately.
    pub fn new(name: impl Into<String>, action: Arc<dyn ScheduledAction>, cycle: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let now = Utc::now();

        Self {
            name: name.into(),
            action,
            tick: Duration::from_secs(1),
            shared: Arc::new(Shared {
                timing: Mutex::new(Timing {
                    cycle,
                    start_time: None,
                    anchor: now - chrono_duration(cycle),
                    last_run: None,
                    last_run_day: None,
                }),
                enabled: AtomicBool::new(true),
                active: AtomicBool::new(false),
                force: AtomicBool::new(false),
            }),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    /// Postpone the first run until `delay` has passed.
    pub fn with_run_delay(self, delay: Duration) -> Self {
        {
            let mut timing = self.shared.timing();
            timing.anchor = Utc::now() + chrono_duration(delay) - chrono_duration(timing.cycle);
        }
        self
    }

    /// Run once a day, at or after `start` local time. The cycle is ignored.
    pub fn with_start_time(self, start: NaiveTime) -> Self {
        self.shared.timing().start_time = Some(start);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Run the action on the next tick with `force = true`, ignoring timing
    /// and the enabled flag.
    pub fn force_run(&self) {
        debug!(scheduler = %self.name, "Force run requested");
        self.shared.force.store(true, Ordering::SeqCst);
    }

    /// Time until the next regular run.
    pub fn time_left(&self) -> Duration {
        self.shared.timing().time_left(Utc::now())
    }

    pub fn status(&self) -> SchedulerStatus {
        let now = Utc::now();
        let timing = self.shared.timing();
        let left = timing.time_left(now);

        SchedulerStatus {
            name: self.name.clone(),
            enabled: self.is_enabled(),
            running: self.is_running(),
            cycle_secs: timing.cycle.as_secs(),
            start_time: timing.start_time,
            last_run: timing.last_run,
            next_run: now + chrono_duration(left),
            active: self.shared.active.load(Ordering::SeqCst),
            force_pending: self.shared.force.load(Ordering::SeqCst),
        }
    }

    /// Spawn the scheduler loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!(scheduler = %self.name, "Scheduler already running");
            return;
        }

        let name = self.name.clone();
        let action = Arc::clone(&self.action);
        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let tick = self.tick;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            info!(scheduler = %name, "Scheduler started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    _ = tokio::time::sleep(tick) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        run_if_due(&name, action.as_ref(), &shared).await;
                    }
                }
            }
            info!(scheduler = %name, "Scheduler stopped");
        });

        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!(scheduler = %self.name, "Scheduler not running");
            return;
        }

        let _ = self.shutdown_tx.send(());
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_if_due(name: &str, action: &dyn ScheduledAction, shared: &Shared) {
    let force = shared.force.swap(false, Ordering::SeqCst);
    let now = Utc::now();

    let due = force || (shared.enabled.load(Ordering::SeqCst) && shared.timing().is_due(now));
    if !due {
        return;
    }

    shared.timing().mark_run(now);
    shared.active.store(true, Ordering::SeqCst);
    metrics::SCHEDULER_RUNS_TOTAL
        .with_label_values(&[name, if force { "forced" } else { "scheduled" }])
        .inc();

    action.run(force).await;

    shared.active.store(false, Ordering::SeqCst);
}
