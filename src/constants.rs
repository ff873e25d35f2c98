//! Cross-cutting, shared constants.
//!
//! Cost figures are rough per-call estimates in USD and only feed the savings counters.

use std::time::Duration;

/// Estimated cost of one delegated (tier 3) analysis call.
pub const ESTIMATED_ANALYSIS_COST_USD: f64 = 0.02;

/// Confidence reported by a successful rule-tier evaluation.
pub const RULE_TIER_CONFIDENCE: f64 = 0.95;

/// Confidence reported for a cache hit before the payload's own quality is considered.
pub const CACHED_TIER_CONFIDENCE: f64 = 0.85;

/// Confidence floor for a live analysis whose payload omits its own confidence.
pub const LIVE_TIER_DEFAULT_CONFIDENCE: f64 = 0.8;

pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);
pub const ANALYSIS_RETRIES: usize = 3;
pub const ANALYSIS_RETRY_BASE: Duration = Duration::from_millis(500);
pub const ANALYSIS_RETRY_CAP: Duration = Duration::from_secs(5);

pub const ENGINE_RESULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const ENGINE_RESULT_CAPACITY: u64 = 10_000;

pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Source label attached to interactions produced from the critical rule tables.
pub const RULE_SOURCE_LABEL: &str = "critical_rules";
pub const CACHE_SOURCE_LABEL: &str = "response_cache";
pub const LIVE_SOURCE_LABEL: &str = "live_analysis";
