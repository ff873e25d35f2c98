//! Periodic background work: cache optimization and rule refresh.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod task;


pub use config::MaintenanceConfig;
pub use error::{MaintenanceError, MaintenanceResult};
pub use scheduler::{MaintenanceScheduler, TaskReport};
pub use task::{CacheOptimizeTask, MaintenanceTask, RuleRefreshTask};
