//! The tier-routing orchestrator.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::error::{RouterError, RouterResult};
use super::merge::{analysis_key, analysis_tags, merge, payload_quality};
use super::ports::{
    CostTracker, GenerativeAnalyzer, NetworkStatus, StaticNetworkStatus, TracingCostTracker,
};
use super::types::{
    AnalysisPayload, AnalysisPriority, AnalyzeOptions, RouterStats, Tier, TierResult, TierUsage,
};
use crate::cache::{ResponseCache, SetOptions};
use crate::constants::{
    ANALYSIS_RETRIES, ANALYSIS_RETRY_BASE, ANALYSIS_RETRY_CAP, CACHE_SOURCE_LABEL,
    CACHED_TIER_CONFIDENCE, DEFAULT_ANALYSIS_TIMEOUT, ESTIMATED_ANALYSIS_COST_USD,
    LIVE_SOURCE_LABEL, LIVE_TIER_DEFAULT_CONFIDENCE, RULE_SOURCE_LABEL, RULE_TIER_CONFIDENCE,
};
use crate::domain::{HealthProfile, Product, StackItem};
use crate::rules::{RuleCheckResult, RuleEvaluator, validate_doses};

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Per-attempt timeout for the delegated call.
    pub analysis_timeout: Duration,
    /// Total attempts, first call included.
    pub retries: usize,
    pub retry_base: Duration,
    pub retry_cap: Duration,
    /// TTL for stored payloads; the cache default when `None`.
    pub cache_ttl: Option<Duration>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
            retries: ANALYSIS_RETRIES,
            retry_base: ANALYSIS_RETRY_BASE,
            retry_cap: ANALYSIS_RETRY_CAP,
            cache_ttl: None,
        }
    }
}

impl RouterConfig {
    pub fn analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn retry_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.retry_base = base;
        self.retry_cap = cap;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as u32;
        self.retry_base
            .saturating_mul(1u32 << exp)
            .min(self.retry_cap)
    }
}

#[derive(Debug, Default)]
struct StatsState {
    total_requests: u64,
    usage: TierUsage,
    fallbacks: u64,
    offline_responses: u64,
    analysis_calls: u64,
    analysis_failures: u64,
    average_response_ms: f64,
    total_cost_savings: f64,
}

/// Routes a product check through rules, the response cache and the delegated analyzer.
pub struct TierRouter {
    evaluator: RuleEvaluator,
    cache: ResponseCache<AnalysisPayload>,
    analyzer: Arc<dyn GenerativeAnalyzer>,
    network: Arc<dyn NetworkStatus>,
    cost_tracker: Arc<dyn CostTracker>,
    config: RouterConfig,
    stats: Mutex<StatsState>,
}

impl std::fmt::Debug for TierRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierRouter")
            .field("config", &self.config)
            .field("cache_entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl TierRouter {
    /// Online by default, with cost events going to tracing.
    pub fn new(
        evaluator: RuleEvaluator,
        cache: ResponseCache<AnalysisPayload>,
        analyzer: Arc<dyn GenerativeAnalyzer>,
    ) -> Self {
        Self {
            evaluator,
            cache,
            analyzer,
            network: Arc::new(StaticNetworkStatus::new(false)),
            cost_tracker: Arc::new(TracingCostTracker),
            config: RouterConfig::default(),
            stats: Mutex::new(StatsState::default()),
        }
    }

    pub fn with_network(mut self, network: Arc<dyn NetworkStatus>) -> Self {
        self.network = network;
        self
    }

    pub fn with_cost_tracker(mut self, tracker: Arc<dyn CostTracker>) -> Self {
        self.cost_tracker = tracker;
        self
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    pub fn cache(&self) -> &ResponseCache<AnalysisPayload> {
        &self.cache
    }

    /// Analyzes `product` against `stack`, escalating only as far as needed.
    ///
    /// Tier 1 always runs. Analyzer failures never surface as errors: the caller gets the
    /// tier-1 result with `fallback_mode` set and the failure in `error`.
    #[instrument(skip_all, fields(product = %product.name, stack = stack.len(), priority = ?options.priority))]
    pub async fn analyze_product(
        &self,
        product: &Product,
        stack: &[StackItem],
        profile: Option<&HealthProfile>,
        options: &AnalyzeOptions,
    ) -> RouterResult<TierResult> {
        if product.name.trim().is_empty() {
            return Err(RouterError::InvalidInput {
                reason: "product name is empty".to_string(),
            });
        }
        validate_doses(product, stack).map_err(|e| RouterError::InvalidInput {
            reason: e.to_string(),
        })?;

        let started = Instant::now();
        let medications = collect_medications(stack, profile);
        let rules = self
            .evaluator
            .check_interactions_for(product, stack, &medications, profile);
        let offline = self.network.is_offline();

        if rules.has_interactions && (options.priority == AnalysisPriority::Speed || offline) {
            debug!(offline, "Returning rule findings without escalation");
            let mut result = rule_tier_result(&rules);
            result.offline_mode = offline;
            return Ok(self.finish(result, started));
        }

        let key = analysis_key(product, stack, profile);

        if !options.force_refresh {
            let no_tags: [&str; 0] = [];
            if let Some(cached) = self.cache.get(&key, &no_tags) {
                debug!(key = %key, "Tier 2 hit");
                let result = TierResult {
                    result: merge(&rules, cached),
                    tier: Tier::Cached,
                    response_time_ms: 0,
                    cost_savings: ESTIMATED_ANALYSIS_COST_USD,
                    confidence: CACHED_TIER_CONFIDENCE,
                    source: CACHE_SOURCE_LABEL.to_string(),
                    offline_mode: offline,
                    fallback_mode: false,
                    error: None,
                };
                return Ok(self.finish(result, started));
            }
        }

        if offline {
            info!("Offline with no cached analysis, serving rule findings");
            let mut result = rule_tier_result(&rules);
            result.offline_mode = true;
            return Ok(self.finish(result, started));
        }

        match self.call_analyzer(product, stack, profile, options).await {
            Ok(payload) => {
                let merged = merge(&rules, payload);
                let quality = payload_quality(&merged);
                let tags = analysis_tags(product, options.user_id.as_deref(), merged.overall_risk_level);
                let mut set_options = SetOptions::default().quality(quality).tags(tags);
                if let Some(ttl) = self.config.cache_ttl {
                    set_options = set_options.ttl(ttl);
                }
                if !self.cache.set(&key, merged.clone(), set_options) {
                    debug!(key = %key, "Analysis payload not cached");
                }

                let confidence = merged
                    .confidence
                    .filter(|c| c.is_finite())
                    .unwrap_or(LIVE_TIER_DEFAULT_CONFIDENCE)
                    .clamp(0.0, 1.0);
                let result = TierResult {
                    result: merged,
                    tier: Tier::LiveAi,
                    response_time_ms: 0,
                    cost_savings: 0.0,
                    confidence,
                    source: LIVE_SOURCE_LABEL.to_string(),
                    offline_mode: false,
                    fallback_mode: false,
                    error: None,
                };
                Ok(self.finish(result, started))
            }
            Err(e) => {
                warn!(error = %e, "Analysis failed, falling back to rule findings");
                let mut result = rule_tier_result(&rules);
                result.fallback_mode = true;
                result.error = Some(e.to_string());
                Ok(self.finish(result, started))
            }
        }
    }

    /// Calls the analyzer with per-attempt timeouts and capped exponential backoff, all
    /// inside the caller's latency budget when one is given.
    async fn call_analyzer(
        &self,
        product: &Product,
        stack: &[StackItem],
        profile: Option<&HealthProfile>,
        options: &AnalyzeOptions,
    ) -> RouterResult<AnalysisPayload> {
        let attempts = async {
            let mut attempt = 0usize;
            loop {
                attempt += 1;
                self.stats.lock().analysis_calls += 1;

                let call = self.analyzer.analyze(product, stack, profile, options);
                let (err, retryable) =
                    match tokio::time::timeout(self.config.analysis_timeout, call).await {
                        Ok(Ok(payload)) => return Ok(payload),
                        Ok(Err(e)) => {
                            let retryable = e.is_retryable();
                            (RouterError::from(e), retryable)
                        }
                        Err(_) => (
                            RouterError::Timeout {
                                elapsed_ms: self.config.analysis_timeout.as_millis() as u64,
                            },
                            true,
                        ),
                    };
                self.stats.lock().analysis_failures += 1;

                if !retryable || attempt >= self.config.retries {
                    return Err(err);
                }

                let delay = self.config.backoff(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying analysis");
                tokio::time::sleep(delay).await;
            }
        };

        match options.latency_budget {
            Some(budget) => tokio::time::timeout(budget, attempts)
                .await
                .map_err(|_| RouterError::Timeout {
                    elapsed_ms: budget.as_millis() as u64,
                })?,
            None => attempts.await,
        }
    }

    fn finish(&self, mut result: TierResult, started: Instant) -> TierResult {
        let elapsed = started.elapsed();
        result.response_time_ms = elapsed.as_millis() as u64;

        {
            let mut stats = self.stats.lock();
            stats.total_requests += 1;
            match result.tier {
                Tier::RuleBased => stats.usage.rule_based += 1,
                Tier::Cached => stats.usage.cached += 1,
                Tier::LiveAi => stats.usage.live_ai += 1,
            }
            if result.fallback_mode {
                stats.fallbacks += 1;
            }
            if result.offline_mode {
                stats.offline_responses += 1;
            }
            let n = stats.total_requests as f64;
            stats.average_response_ms +=
                (result.response_time_ms as f64 - stats.average_response_ms) / n;
            stats.total_cost_savings += result.cost_savings;
        }

        self.cost_tracker
            .record(result.tier, elapsed, result.cost_savings);
        result
    }

    pub fn stats(&self) -> RouterStats {
        let stats = self.stats.lock();
        RouterStats {
            total_requests: stats.total_requests,
            tier_usage: stats.usage.clone(),
            fallbacks: stats.fallbacks,
            offline_responses: stats.offline_responses,
            analysis_calls: stats.analysis_calls,
            analysis_failures: stats.analysis_failures,
            average_response_ms: stats.average_response_ms,
            total_cost_savings: stats.total_cost_savings,
            cache: self.cache.stats(),
        }
    }

    /// Resets router counters. Cache contents and cache counters are untouched.
    pub fn reset_stats(&self) {
        *self.stats.lock() = StatsState::default();
    }

    pub fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        self.cache.invalidate_by_tags(tags)
    }

    pub fn clear(&self, pattern: Option<&str>) -> usize {
        self.cache.clear(pattern)
    }
}

fn rule_tier_result(rules: &RuleCheckResult) -> TierResult {
    let confidence = if rules.error.is_some() {
        rules.confidence
    } else {
        RULE_TIER_CONFIDENCE
    };
    TierResult {
        result: AnalysisPayload::from_rules(rules),
        tier: Tier::RuleBased,
        response_time_ms: 0,
        cost_savings: ESTIMATED_ANALYSIS_COST_USD,
        confidence,
        source: RULE_SOURCE_LABEL.to_string(),
        offline_mode: false,
        fallback_mode: false,
        error: rules.error.clone(),
    }
}

/// Profile medications not already present in the stack. Stack medications are matched as
/// stack items by the evaluator.
fn collect_medications(stack: &[StackItem], profile: Option<&HealthProfile>) -> Vec<String> {
    let Some(profile) = profile else {
        return Vec::new();
    };
    let mut medications: Vec<String> = Vec::new();
    for name in &profile.medications {
        let trimmed = name.trim();
        let known = stack
            .iter()
            .any(|item| item.name.trim().eq_ignore_ascii_case(trimmed))
            || medications.iter().any(|m| m.eq_ignore_ascii_case(trimmed));
        if !trimmed.is_empty() && !known {
            medications.push(trimmed.to_string());
        }
    }
    medications
}
