use std::sync::Arc;

use async_trait::async_trait;

use super::error::{MaintenanceError, MaintenanceResult};
use crate::cache::{Cacheable, ResponseCache};
use crate::rules::{RefreshOutcome, RuleRepository};

/// A unit of periodic work. `run` returns a short human-readable summary.
#[async_trait]
pub trait MaintenanceTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> MaintenanceResult<String>;
}

/// Runs [`ResponseCache::optimize`].
pub struct CacheOptimizeTask<T: Cacheable> {
    cache: ResponseCache<T>,
}

impl<T: Cacheable> CacheOptimizeTask<T> {
    pub fn new(cache: ResponseCache<T>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl<T: Cacheable> MaintenanceTask for CacheOptimizeTask<T> {
    fn name(&self) -> &str {
        "cache_optimize"
    }

    async fn run(&self) -> MaintenanceResult<String> {
        let report = self.cache.optimize();
        Ok(format!(
            "removed {} entries, freed {} bytes",
            report.removed, report.freed
        ))
    }
}

/// Pulls rule tables from the repository's source.
///
/// A failed pull re-arms the repository so the next run tries again; a successful pull
/// stays in effect for the rest of the process.
pub struct RuleRefreshTask {
    repository: Arc<RuleRepository>,
}

impl RuleRefreshTask {
    pub fn new(repository: Arc<RuleRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl MaintenanceTask for RuleRefreshTask {
    fn name(&self) -> &str {
        "rule_refresh"
    }

    async fn run(&self) -> MaintenanceResult<String> {
        match self.repository.refresh().await {
            RefreshOutcome::Refreshed { rules, limits } => {
                Ok(format!("loaded {rules} rules and {limits} limits"))
            }
            RefreshOutcome::AlreadyRefreshed => Ok("already refreshed".to_string()),
            RefreshOutcome::NoSource => Ok("no rule source configured".to_string()),
            RefreshOutcome::Failed { reason } => {
                self.repository.reset_refresh();
                Err(MaintenanceError::Task {
                    task: self.name().to_string(),
                    reason,
                })
            }
        }
    }
}
