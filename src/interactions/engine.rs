//! Substance-only interaction checks across every registered checker.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use moka::sync::Cache;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::builtin::{duplication_checker, rule_checker};
use super::error::{CheckerError, EngineError, EngineResult};
use super::personalize::personalize;
use super::registry::{CheckerRegistry, InteractionChecker};
use super::types::{CheckConfig, EngineMetrics, InteractionCheckResult, InteractionSummary};
use crate::constants::{ENGINE_RESULT_CAPACITY, ENGINE_RESULT_TTL};
use crate::domain::{
    DetectedInteraction, Interaction, InteractionType, PairKey, RiskLevel, SubstanceContext,
    UserContext,
};
use crate::hashing::hash_parts;
use crate::rules::{RuleEvaluator, validate_context_doses};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub result_ttl: Duration,
    pub result_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            result_ttl: ENGINE_RESULT_TTL,
            result_capacity: ENGINE_RESULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn result_capacity(mut self, capacity: u64) -> Self {
        self.result_capacity = capacity;
        self
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    total_checks: u64,
    cache_hits: u64,
    cache_misses: u64,
    checker_invocations: u64,
    checker_failures: u64,
    interactions_found: u64,
    completed: u64,
    total_duration_ms: u64,
}

/// Runs every applicable checker, merges and personalizes their findings, and caches
/// the outcome for a short while.
pub struct InteractionEngine {
    registry: CheckerRegistry,
    results: Cache<u64, InteractionCheckResult>,
    metrics: Mutex<MetricsState>,
}

impl std::fmt::Debug for InteractionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionEngine")
            .field("registry", &self.registry)
            .field("cached_results", &self.results.entry_count())
            .finish()
    }
}

impl InteractionEngine {
    pub fn new(registry: CheckerRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            results: Cache::builder()
                .max_capacity(config.result_capacity)
                .time_to_live(config.result_ttl)
                .build(),
            metrics: Mutex::new(MetricsState::default()),
        }
    }

    /// Engine with the rule and duplication checkers registered.
    pub fn with_default_checkers(evaluator: RuleEvaluator, config: EngineConfig) -> Self {
        let registry = CheckerRegistry::new();
        registry.register(rule_checker(evaluator.clone()));
        registry.register(duplication_checker(evaluator));
        Self::new(registry, config)
    }

    /// Read access to the checker set and its counters. Changes go through
    /// [`register_checker`](Self::register_checker) and
    /// [`unregister_checker`](Self::unregister_checker).
    pub fn registry(&self) -> &CheckerRegistry {
        &self.registry
    }

    /// Registers `checker` and drops cached results, which no longer reflect the
    /// checker set.
    pub fn register_checker(&self, checker: InteractionChecker) {
        self.registry.register(checker);
        self.results.invalidate_all();
    }

    pub fn unregister_checker(&self, checker_type: &str) -> bool {
        let removed = self.registry.unregister(checker_type);
        if removed {
            self.results.invalidate_all();
        }
        removed
    }

    pub fn clear_cache(&self) {
        self.results.invalidate_all();
    }

    #[instrument(skip_all, fields(substances = substances.len()))]
    pub async fn check_interactions(
        &self,
        substances: &[SubstanceContext],
        user: Option<&UserContext>,
        config: &CheckConfig,
    ) -> EngineResult<InteractionCheckResult> {
        validate(substances)?;
        let started = Instant::now();
        self.metrics.lock().total_checks += 1;

        let key = result_key(substances, user, config);
        if let Some(mut cached) = self.results.get(&key) {
            self.metrics.lock().cache_hits += 1;
            debug!(key = key, "Interaction result served from cache");
            cached.from_cache = true;
            return Ok(cached);
        }
        self.metrics.lock().cache_misses += 1;

        let checkers = self.registry.applicable(substances);
        if checkers.is_empty() {
            warn!(
                registered = self.registry.len(),
                "No checker covers these substances; returning empty result"
            );
        }

        let mut collected = Vec::new();
        let mut checkers_run = Vec::new();
        let mut failed_checkers = Vec::new();
        for checker in &checkers {
            let checker_started = Instant::now();
            let outcome = run_checker(checker, substances, config).await;
            let ok = outcome.is_ok();
            self.registry
                .record(&checker.checker_type, ok, checker_started.elapsed());
            {
                let mut metrics = self.metrics.lock();
                metrics.checker_invocations += 1;
                if !ok {
                    metrics.checker_failures += 1;
                }
            }

            match outcome {
                Ok(found) => {
                    debug!(
                        checker = %checker.checker_type,
                        found = found.len(),
                        "Checker completed"
                    );
                    collected.extend(found);
                    checkers_run.push(checker.checker_type.clone());
                }
                Err(e) => {
                    warn!(error = %e, "Checker failed; continuing without it");
                    failed_checkers.push(checker.checker_type.clone());
                }
            }
        }

        let personalize_for = if config.personalize { user } else { None };
        let mut detected: Vec<DetectedInteraction> = deduplicate(collected)
            .into_iter()
            .map(|i| personalize(i, personalize_for))
            .collect();
        detected.sort_by(|a, b| b.personalized_severity.cmp(&a.personalized_severity));

        let overall_risk =
            RiskLevel::from_severities(detected.iter().map(|d| d.personalized_severity));
        let found_count = detected.len();
        if let Some(floor) = config.min_severity {
            detected.retain(|d| d.personalized_severity >= floor);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = InteractionCheckResult {
            summary: InteractionSummary::from_interactions(&detected, overall_risk),
            interactions: detected,
            checkers_run,
            failed_checkers,
            from_cache: false,
            duration_ms: elapsed_ms,
        };

        {
            let mut metrics = self.metrics.lock();
            metrics.interactions_found += found_count as u64;
            metrics.completed += 1;
            metrics.total_duration_ms += elapsed_ms;
        }
        info!(
            found = found_count,
            returned = result.interactions.len(),
            risk = %overall_risk,
            duration_ms = elapsed_ms,
            "Interaction check complete"
        );

        self.results.insert(key, result.clone());
        Ok(result)
    }

    pub fn metrics(&self) -> EngineMetrics {
        let m = self.metrics.lock();
        EngineMetrics {
            total_checks: m.total_checks,
            cache_hits: m.cache_hits,
            cache_misses: m.cache_misses,
            checker_invocations: m.checker_invocations,
            checker_failures: m.checker_failures,
            error_rate: if m.checker_invocations == 0 {
                0.0
            } else {
                m.checker_failures as f64 / m.checker_invocations as f64
            },
            interactions_found: m.interactions_found,
            average_check_ms: if m.completed == 0 {
                0.0
            } else {
                m.total_duration_ms as f64 / m.completed as f64
            },
            registered_checkers: self.registry.len(),
        }
    }

    pub fn reset_metrics(&self) {
        *self.metrics.lock() = MetricsState::default();
        self.registry.reset_stats();
    }
}

fn validate(substances: &[SubstanceContext]) -> EngineResult<()> {
    if substances.len() < 2 {
        return Err(EngineError::InvalidInput {
            reason: format!(
                "at least 2 substances are required, got {}",
                substances.len()
            ),
        });
    }
    if substances.iter().any(|s| s.normalized_name().is_empty()) {
        return Err(EngineError::InvalidInput {
            reason: "substance names must not be empty".to_string(),
        });
    }
    validate_context_doses(substances).map_err(|e| EngineError::InvalidInput {
        reason: e.to_string(),
    })
}

/// Runs one checker, converting both errors and panics into a [`CheckerError`].
async fn run_checker(
    checker: &InteractionChecker,
    substances: &[SubstanceContext],
    config: &CheckConfig,
) -> Result<Vec<Interaction>, CheckerError> {
    let panicked = || CheckerError::Panicked {
        checker: checker.checker_type.clone(),
    };

    let future = std::panic::catch_unwind(AssertUnwindSafe(|| {
        (checker.check)(substances, config)
    }))
    .map_err(|_| panicked())?;

    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|_| panicked())?
}

/// Keeps one interaction per (pair, type); the higher severity wins and
/// recommendations are unioned.
fn deduplicate(interactions: Vec<Interaction>) -> Vec<Interaction> {
    let mut index: HashMap<(PairKey, InteractionType), usize> = HashMap::new();
    let mut merged: Vec<Interaction> = Vec::new();

    for interaction in interactions {
        let key = interaction.dedup_key();
        let Some(&pos) = index.get(&key) else {
            index.insert(key, merged.len());
            merged.push(interaction);
            continue;
        };

        let existing = &mut merged[pos];
        let mut recommendations = std::mem::take(&mut existing.recommendations);
        if interaction.severity > existing.severity {
            *existing = interaction;
            for r in std::mem::take(&mut existing.recommendations) {
                if !recommendations.contains(&r) {
                    recommendations.push(r);
                }
            }
        } else {
            for r in interaction.recommendations {
                if !recommendations.contains(&r) {
                    recommendations.push(r);
                }
            }
        }
        existing.recommendations = recommendations;
    }
    merged
}

/// Order-independent key over substances, user context, and options.
fn result_key(
    substances: &[SubstanceContext],
    user: Option<&UserContext>,
    config: &CheckConfig,
) -> u64 {
    let mut parts: Vec<String> = substances
        .iter()
        .map(|s| {
            let dose = s
                .dosage
                .as_ref()
                .map(|d| format!("{}{}", d.amount, d.unit.to_lowercase()))
                .unwrap_or_default();
            format!("{}:{}:{:?}", s.normalized_name(), dose, s.source)
        })
        .collect();
    parts.sort();

    match user {
        Some(user) => {
            let mut conditions = user.normalized_conditions();
            conditions.sort();
            parts.push(format!(
                "user:{}:{}:{}",
                user.age_group().map(|g| g.as_str()).unwrap_or("-"),
                user.pregnant,
                conditions.join(",")
            ));
        }
        None => parts.push("user:-".to_string()),
    }
    parts.push(format!(
        "config:{}:{}",
        config.min_severity.map(|s| s.as_str()).unwrap_or("-"),
        config.personalize
    ));

    hash_parts(&parts)
}
