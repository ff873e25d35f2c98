//! Rule storage: built-in tables plus an at-most-once refresh from a [`RuleSource`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::builtin;
use super::error::RuleResult;
use super::source::RuleSource;
use super::types::{NutrientLimit, RuleRecord};
use crate::domain::{AgeGroup, HealthProfile, normalize_name};

/// Immutable snapshot of every rule table. Swapped wholesale on refresh.
#[derive(Debug, Clone, Default)]
pub struct RuleTables {
    rules: Vec<RuleRecord>,
    limits: Vec<NutrientLimit>,
    /// canonical name → alternative names.
    aliases: HashMap<String, Vec<String>>,
    /// any known name → canonical name.
    canonical: HashMap<String, String>,
}

impl RuleTables {
    pub fn new(
        rules: Vec<RuleRecord>,
        limits: Vec<NutrientLimit>,
        aliases: HashMap<String, Vec<String>>,
    ) -> Self {
        let mut tables = Self {
            rules,
            limits,
            aliases: HashMap::new(),
            canonical: HashMap::new(),
        };
        tables.add_aliases(aliases);
        tables
    }

    pub fn builtin() -> Self {
        Self::new(
            builtin::critical_rules(),
            builtin::nutrient_limits(),
            builtin::aliases(),
        )
    }

    pub fn rules(&self) -> &[RuleRecord] {
        &self.rules
    }

    pub fn limits(&self) -> &[NutrientLimit] {
        &self.limits
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.values().map(Vec::len).sum()
    }

    /// Canonical form of `name`: the alias-group head when `name` is a known alias,
    /// otherwise the normalized name itself.
    pub fn canonical(&self, name: &str) -> String {
        let normalized = normalize_name(name);
        self.canonical
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Every name that should be treated as `name` when matching.
    pub fn expand(&self, name: &str) -> Vec<String> {
        let canonical = self.canonical(name);
        let mut names = vec![canonical.clone()];
        if let Some(alternatives) = self.aliases.get(&canonical) {
            names.extend(alternatives.iter().cloned());
        }
        names
    }

    /// Most specific limit for `nutrient` given the caller's profile.
    ///
    /// Rows for another age group or gender are skipped; rows without a group apply to
    /// adults and act as the fallback for everyone.
    pub fn limit_for(
        &self,
        nutrient: &str,
        profile: Option<&HealthProfile>,
    ) -> Option<&NutrientLimit> {
        let nutrient = self.canonical(nutrient);
        let age_group = profile.and_then(HealthProfile::age_group);
        let gender = profile.and_then(|p| p.gender);

        self.limits
            .iter()
            .filter(|l| self.canonical(&l.nutrient) == nutrient)
            .filter_map(|l| {
                let mut score = 0u8;
                match (l.age_group, age_group) {
                    (None, _) => {}
                    (Some(AgeGroup::Adult), None) => score += 1,
                    (Some(want), Some(have)) if want == have => score += 2,
                    _ => return None,
                }
                match (l.gender, gender) {
                    (None, _) => {}
                    (Some(want), Some(have)) if want == have => score += 1,
                    _ => return None,
                }
                Some((score, l))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, l)| l)
    }

    /// Returns a copy extended by `other`'s rows: rules replace by id, limits replace by
    /// (nutrient, age group, gender), alias groups are unioned.
    pub fn merged(
        &self,
        rules: Vec<RuleRecord>,
        limits: Vec<NutrientLimit>,
        aliases: HashMap<String, Vec<String>>,
    ) -> Self {
        let mut next = self.clone();
        for rule in rules {
            match next.rules.iter_mut().find(|r| r.id == rule.id) {
                Some(existing) => *existing = rule,
                None => next.rules.push(rule),
            }
        }
        for limit in limits {
            let key = (normalize_name(&limit.nutrient), limit.age_group, limit.gender);
            match next
                .limits
                .iter_mut()
                .find(|l| (normalize_name(&l.nutrient), l.age_group, l.gender) == key)
            {
                Some(existing) => *existing = limit,
                None => next.limits.push(limit),
            }
        }
        next.add_aliases(aliases);
        next
    }

    fn add_aliases(&mut self, aliases: HashMap<String, Vec<String>>) {
        for (canonical, names) in aliases {
            let canonical = normalize_name(&canonical);
            let group = self.aliases.entry(canonical.clone()).or_default();
            for name in names {
                let name = normalize_name(&name);
                if name.is_empty() || name == canonical {
                    continue;
                }
                if !group.contains(&name) {
                    group.push(name.clone());
                }
                self.canonical.insert(name, canonical.clone());
            }
        }
    }
}

/// Outcome of [`RuleRepository::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { rules: usize, limits: usize },
    /// A refresh already ran in this process.
    AlreadyRefreshed,
    NoSource,
    /// The source failed; the previous tables stay in effect.
    Failed { reason: String },
}

/// Shared rule store. Reads take a cheap `Arc` snapshot.
pub struct RuleRepository {
    tables: RwLock<Arc<RuleTables>>,
    source: Option<Arc<dyn RuleSource>>,
    refresh_attempted: AtomicBool,
}

impl std::fmt::Debug for RuleRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("RuleRepository")
            .field("rules", &tables.rules.len())
            .field("limits", &tables.limits.len())
            .field("has_source", &self.source.is_some())
            .field(
                "refresh_attempted",
                &self.refresh_attempted.load(Ordering::Acquire),
            )
            .finish()
    }
}

impl Default for RuleRepository {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleRepository {
    pub fn builtin() -> Self {
        Self::from_tables(RuleTables::builtin(), None)
    }

    pub fn with_source(source: Arc<dyn RuleSource>) -> Self {
        Self::from_tables(RuleTables::builtin(), Some(source))
    }

    pub fn from_tables(tables: RuleTables, source: Option<Arc<dyn RuleSource>>) -> Self {
        Self {
            tables: RwLock::new(Arc::new(tables)),
            source,
            refresh_attempted: AtomicBool::new(false),
        }
    }

    /// Current snapshot.
    pub fn tables(&self) -> Arc<RuleTables> {
        Arc::clone(&self.tables.read())
    }

    pub fn has_refreshed(&self) -> bool {
        self.refresh_attempted.load(Ordering::Acquire)
    }

    /// Allows the next [`refresh`](Self::refresh) to hit the source again.
    pub fn reset_refresh(&self) {
        self.refresh_attempted.store(false, Ordering::Release);
    }

    /// Pulls tables from the source at most once per process (until
    /// [`reset_refresh`](Self::reset_refresh)). Failures keep the current tables.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(source) = &self.source else {
            return RefreshOutcome::NoSource;
        };
        if self
            .refresh_attempted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rule refresh already attempted in this process");
            return RefreshOutcome::AlreadyRefreshed;
        }

        match fetch_all(source.as_ref()).await {
            Ok((rules, limits, aliases)) => {
                let (rule_count, limit_count) = (rules.len(), limits.len());
                let next = self.tables().merged(rules, limits, aliases);
                *self.tables.write() = Arc::new(next);
                info!(
                    rules = rule_count,
                    limits = limit_count,
                    "Rule tables refreshed from source"
                );
                RefreshOutcome::Refreshed {
                    rules: rule_count,
                    limits: limit_count,
                }
            }
            Err(e) => {
                warn!(error = %e, "Rule refresh failed, keeping current tables");
                RefreshOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

type FetchedTables = (
    Vec<RuleRecord>,
    Vec<NutrientLimit>,
    HashMap<String, Vec<String>>,
);

async fn fetch_all(source: &dyn RuleSource) -> RuleResult<FetchedTables> {
    let rules = source.fetch_critical_rules().await?;
    let limits = source.fetch_nutrient_limits().await?;
    let aliases = source.fetch_aliases().await?;
    Ok((rules, limits, aliases))
}
