use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::domain::{Interaction, RiskLevel};
use crate::rules::NutrientWarning;

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    RuleBased,
    Cached,
    LiveAi,
}

impl Tier {
    pub fn as_header_value(&self) -> &'static str {
        match self {
            Tier::RuleBased => "RULE_BASED",
            Tier::Cached => "CACHED",
            Tier::LiveAi => "LIVE_AI",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_header_value())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPriority {
    /// Return rule findings without escalating when any exist.
    Speed,
    #[default]
    Balanced,
    Accuracy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    #[serde(default)]
    pub priority: AnalysisPriority,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Overall budget for the delegated call, retries included.
    #[serde(default, with = "duration_ms_opt")]
    pub latency_budget: Option<Duration>,
}

impl AnalyzeOptions {
    pub fn priority(mut self, priority: AnalysisPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget = Some(budget);
        self
    }
}

mod duration_ms_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

/// Safety analysis of one product against a stack. Cached by tier 2.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub overall_risk_level: RiskLevel,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub nutrient_warnings: Vec<NutrientWarning>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Per-category scores in `[0, 1]` (e.g. `absorption`, `bleeding`), keyed by lowercase name.
    #[serde(default)]
    pub category_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Routed result plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierResult {
    pub result: AnalysisPayload,
    pub tier: Tier,
    pub response_time_ms: u64,
    pub cost_savings: f64,
    pub confidence: f64,
    pub source: String,
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub fallback_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TierResult {
    pub fn is_degraded(&self) -> bool {
        self.offline_mode || self.fallback_mode
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierUsage {
    pub rule_based: u64,
    pub cached: u64,
    pub live_ai: u64,
}

/// Snapshot of router counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouterStats {
    pub total_requests: u64,
    pub tier_usage: TierUsage,
    pub fallbacks: u64,
    pub offline_responses: u64,
    pub analysis_calls: u64,
    pub analysis_failures: u64,
    pub average_response_ms: f64,
    pub total_cost_savings: f64,
    pub cache: CacheStats,
}
