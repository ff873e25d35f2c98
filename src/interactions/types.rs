use serde::{Deserialize, Serialize};

use crate::domain::{DetectedInteraction, RiskLevel, Severity};

/// Per-request options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Interactions whose personalized severity is below this are not returned.
    #[serde(default)]
    pub min_severity: Option<Severity>,
    #[serde(default = "default_true")]
    pub personalize: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            min_severity: None,
            personalize: true,
        }
    }
}

impl CheckConfig {
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn without_personalization(mut self) -> Self {
        self.personalize = false;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
    /// Highest personalized severity seen, before minimum-severity filtering.
    pub overall_risk: RiskLevel,
}

impl InteractionSummary {
    pub fn from_interactions(returned: &[DetectedInteraction], overall_risk: RiskLevel) -> Self {
        let count = |s: Severity| {
            returned
                .iter()
                .filter(|i| i.personalized_severity == s)
                .count()
        };
        Self {
            total: returned.len(),
            critical: count(Severity::Critical),
            high: count(Severity::High),
            moderate: count(Severity::Moderate),
            low: count(Severity::Low),
            overall_risk,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionCheckResult {
    pub interactions: Vec<DetectedInteraction>,
    pub summary: InteractionSummary,
    /// Checker types that contributed, in dispatch order.
    pub checkers_run: Vec<String>,
    pub failed_checkers: Vec<String>,
    pub from_cache: bool,
    pub duration_ms: u64,
}

/// Counters for one registered checker.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckerStats {
    pub invocations: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
}

/// Engine-wide counters. `interactions_found` counts before minimum-severity filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub total_checks: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub checker_invocations: u64,
    pub checker_failures: u64,
    pub error_rate: f64,
    pub interactions_found: u64,
    pub average_check_ms: f64,
    pub registered_checkers: usize,
}
