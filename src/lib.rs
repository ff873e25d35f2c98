//! StackSafe library crate (used by the server and integration tests).
//!
//! Decides whether adding a product to a supplement/medication stack is safe, escalating
//! through three tiers ordered by cost:
//!
//! 1. [`RuleEvaluator`] - critical interaction rules and nutrient upper limits.
//! 2. [`ResponseCache`] - quality-weighted, TTL- and tag-aware cache of earlier analyses.
//! 3. [`GenerativeAnalyzer`] - the delegated, expensive analysis call.
//!
//! [`TierRouter`] orchestrates the tiers. [`InteractionEngine`] is a separate entry point
//! for substance-only checks through a [`CheckerRegistry`].
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod domain;
pub mod gateway;
pub mod hashing;
pub mod interactions;
pub mod maintenance;
pub mod router;
pub mod rules;

pub use cache::{
    CacheConfig, CacheError, CacheResult, CacheStats, Cacheable, EvictionPriority, FileKv,
    MemoryKv, OptimizeReport, PersistentKv, ResponseCache, SetOptions,
};
#[cfg(any(test, feature = "mock"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigError};
pub use domain::{
    DetectedInteraction, Dosage, HealthProfile, Ingredient, Interaction, InteractionType,
    PairKey, Product, RiskLevel, Severity, StackItem, SubstanceContext, SubstanceSource,
    UserContext,
};
pub use hashing::{hash_parts, hash_parts_hex, hash_to_u64};
pub use interactions::{
    CheckConfig, CheckerRegistry, EngineConfig, EngineError, EngineMetrics, InteractionChecker,
    InteractionCheckResult, InteractionEngine,
};
pub use maintenance::{
    CacheOptimizeTask, MaintenanceConfig, MaintenanceScheduler, MaintenanceTask, RuleRefreshTask,
};
#[cfg(any(test, feature = "mock"))]
pub use router::{MockAnalyzer, RecordingCostTracker};
pub use router::{
    AnalysisPayload, AnalysisPriority, AnalyzeOptions, GenaiAnalyzer, GenerativeAnalyzer,
    NetworkStatus, RouterConfig, RouterError, RouterStats, StaticNetworkStatus, Tier,
    TierResult, TierRouter,
};
#[cfg(any(test, feature = "mock"))]
pub use rules::MockRuleSource;
pub use rules::{
    HttpRuleSource, RuleCheckResult, RuleEvaluator, RuleRepository, RuleSource,
};
