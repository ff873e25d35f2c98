//! Pluggable checkers, kept sorted by priority.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::error::CheckerError;
use super::types::{CheckConfig, CheckerStats};
use crate::domain::{Interaction, SubstanceContext};

pub type CheckOutcome = Result<Vec<Interaction>, CheckerError>;
pub type CanHandleFn = Arc<dyn Fn(&[SubstanceContext]) -> bool + Send + Sync>;
pub type CheckFn = Arc<
    dyn for<'a> Fn(&'a [SubstanceContext], &'a CheckConfig) -> BoxFuture<'a, CheckOutcome>
        + Send
        + Sync,
>;

/// `(type, priority, can_handle, check)`. Cheap to clone.
#[derive(Clone)]
pub struct InteractionChecker {
    pub checker_type: String,
    pub priority: i32,
    pub can_handle: CanHandleFn,
    pub check: CheckFn,
}

impl std::fmt::Debug for InteractionChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionChecker")
            .field("checker_type", &self.checker_type)
            .field("priority", &self.priority)
            .finish()
    }
}

impl InteractionChecker {
    pub fn new<H, C>(checker_type: &str, priority: i32, can_handle: H, check: C) -> Self
    where
        H: Fn(&[SubstanceContext]) -> bool + Send + Sync + 'static,
        C: for<'a> Fn(&'a [SubstanceContext], &'a CheckConfig) -> BoxFuture<'a, CheckOutcome>
            + Send
            + Sync
            + 'static,
    {
        Self {
            checker_type: checker_type.to_string(),
            priority,
            can_handle: Arc::new(can_handle),
            check: Arc::new(check),
        }
    }
}

/// Checker set plus per-checker counters. Owned by one engine.
#[derive(Default)]
pub struct CheckerRegistry {
    checkers: RwLock<Vec<InteractionChecker>>,
    stats: Mutex<HashMap<String, CheckerStats>>,
}

impl std::fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckerRegistry")
            .field("checkers", &self.checker_types())
            .finish()
    }
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `checker`, replacing any checker of the same type.
    pub fn register(&self, checker: InteractionChecker) {
        let mut checkers = self.checkers.write();
        checkers.retain(|c| c.checker_type != checker.checker_type);
        info!(
            checker = %checker.checker_type,
            priority = checker.priority,
            "Registered interaction checker"
        );
        checkers.push(checker);
        // Stable: equal priorities keep registration order.
        checkers.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn unregister(&self, checker_type: &str) -> bool {
        let mut checkers = self.checkers.write();
        let before = checkers.len();
        checkers.retain(|c| c.checker_type != checker_type);
        before != checkers.len()
    }

    pub fn len(&self) -> usize {
        self.checkers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.read().is_empty()
    }

    /// Registered types in dispatch order.
    pub fn checker_types(&self) -> Vec<String> {
        self.checkers
            .read()
            .iter()
            .map(|c| c.checker_type.clone())
            .collect()
    }

    /// Checkers whose predicate accepts `substances`, highest priority first.
    pub fn applicable(&self, substances: &[SubstanceContext]) -> Vec<InteractionChecker> {
        let applicable: Vec<InteractionChecker> = self
            .checkers
            .read()
            .iter()
            .filter(|c| (c.can_handle)(substances))
            .cloned()
            .collect();
        debug!(count = applicable.len(), "Selected applicable checkers");
        applicable
    }

    pub fn record(&self, checker_type: &str, ok: bool, elapsed: Duration) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(checker_type.to_string()).or_default();
        entry.invocations += 1;
        if !ok {
            entry.failures += 1;
        }
        entry.total_duration_ms += elapsed.as_millis() as u64;
    }

    pub fn stats(&self) -> HashMap<String, CheckerStats> {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        self.stats.lock().clear();
    }
}
