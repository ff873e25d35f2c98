//! Checker registry and the substance-only interaction engine.
//!
//! A request walks: cache lookup → checker dispatch (priority order, failures isolated)
//! → deduplication → personalization → minimum-severity filter → cache store.

pub mod builtin;
pub mod engine;
pub mod error;
pub mod personalize;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;

pub use builtin::{
    DUPLICATION_CHECKER, DUPLICATION_CHECKER_PRIORITY, RULE_CHECKER, RULE_CHECKER_PRIORITY,
    duplication_checker, rule_checker,
};
pub use engine::{EngineConfig, InteractionEngine};
pub use error::{CheckerError, EngineError, EngineResult};
pub use personalize::personalize;
pub use registry::{CanHandleFn, CheckFn, CheckOutcome, CheckerRegistry, InteractionChecker};
pub use types::{
    CheckConfig, CheckerStats, EngineMetrics, InteractionCheckResult, InteractionSummary,
};
