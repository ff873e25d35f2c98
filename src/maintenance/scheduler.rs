use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::MaintenanceConfig;
use super::task::MaintenanceTask;

/// Outcome of one task within a maintenance pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: String,
    pub succeeded: bool,
    pub detail: String,
}

/// Runs registered [`MaintenanceTask`]s on a fixed interval until shut down.
pub struct MaintenanceScheduler {
    config: MaintenanceConfig,
    tasks: Vec<Arc<dyn MaintenanceTask>>,
    passes: Arc<AtomicU64>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tasks.iter().map(|t| t.name()).collect();
        f.debug_struct("MaintenanceScheduler")
            .field("config", &self.config)
            .field("tasks", &names)
            .field("passes", &self.passes())
            .finish()
    }
}

impl MaintenanceScheduler {
    pub fn new(config: MaintenanceConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            tasks: Vec::new(),
            passes: Arc::new(AtomicU64::new(0)),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    pub fn with_task(mut self, task: Arc<dyn MaintenanceTask>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name().to_string()).collect()
    }

    /// Completed passes, manual and scheduled.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Spawns the background loop. Returns `false` when disabled or already running.
    pub fn start(&self) -> bool {
        if !self.config.enabled || self.tasks.is_empty() {
            debug!("Maintenance scheduler not started");
            return false;
        }
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let tasks = self.tasks.clone();
        let passes = Arc::clone(&self.passes);
        let period = self.config.interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        *handle = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        run_tasks(&tasks).await;
                        passes.fetch_add(1, Ordering::AcqRel);
                    }
                }
            }
            debug!("Maintenance loop stopped");
        }));
        info!(interval_secs = period.as_secs(), tasks = self.tasks.len(), "Maintenance scheduler started");
        true
    }

    /// Runs every task once, now, on the caller's task.
    pub async fn run_once(&self) -> Vec<TaskReport> {
        let reports = run_tasks(&self.tasks).await;
        self.passes.fetch_add(1, Ordering::AcqRel);
        reports
    }

    /// Signals the loop and waits for it. A pass in progress finishes first.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Maintenance loop did not exit cleanly");
        }
    }
}

async fn run_tasks(tasks: &[Arc<dyn MaintenanceTask>]) -> Vec<TaskReport> {
    let mut reports = Vec::with_capacity(tasks.len());
    for task in tasks {
        let report = match task.run().await {
            Ok(detail) => {
                info!(task = task.name(), detail = %detail, "Maintenance task completed");
                TaskReport {
                    task: task.name().to_string(),
                    succeeded: true,
                    detail,
                }
            }
            Err(e) => {
                warn!(task = task.name(), error = %e, "Maintenance task failed");
                TaskReport {
                    task: task.name().to_string(),
                    succeeded: false,
                    detail: e.to_string(),
                }
            }
        };
        reports.push(report);
    }
    reports
}
