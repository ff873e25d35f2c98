//! Tier 1: deterministic matching against the critical rule tables and nutrient limits.

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, instrument};

use super::error::{RuleError, RuleResult};
use super::repository::{RuleRepository, RuleTables};
use super::types::{NutrientWarning, RuleCheckResult, RuleInteraction, RuleRecord};
use super::units;
use crate::constants::{ESTIMATED_ANALYSIS_COST_USD, RULE_TIER_CONFIDENCE};
use crate::domain::{
    Dosage, HealthProfile, Ingredient, Product, RiskLevel, Severity, StackItem,
    SubstanceContext, normalize_name,
};

/// One side of a pairwise rule match.
#[derive(Debug, Clone)]
struct Participant {
    label: String,
    names: Vec<String>,
    dosage: Option<Dosage>,
}

impl Participant {
    fn from_product(product: &Product) -> Self {
        Self {
            label: product.name.clone(),
            names: product.match_names(),
            dosage: product.primary_dosage(),
        }
    }

    fn from_stack_item(item: &StackItem) -> Self {
        Self {
            label: item.name.clone(),
            names: item.match_names(),
            dosage: item.primary_dosage(),
        }
    }

    fn from_context(substance: &SubstanceContext) -> Self {
        Self {
            label: substance.name.clone(),
            names: vec![substance.normalized_name()],
            dosage: substance.dosage.clone(),
        }
    }
}

/// One dose counted toward a nutrient total.
struct Contribution {
    amount: f64,
    unit: String,
    source: String,
}

/// Stateless evaluator over a shared [`RuleRepository`].
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    repository: Arc<RuleRepository>,
}

impl RuleEvaluator {
    pub fn new(repository: Arc<RuleRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<RuleRepository> {
        &self.repository
    }

    /// Checks `product` against the current stack and medications using adult limits.
    pub fn check_interactions(
        &self,
        product: &Product,
        stack: &[StackItem],
        medications: &[String],
    ) -> RuleCheckResult {
        self.check_interactions_for(product, stack, medications, None)
    }

    /// Same as [`check_interactions`](Self::check_interactions), picking nutrient limits
    /// for the profile's age group and gender.
    ///
    /// Never returns an error. Negative or non-finite doses count as unknown;
    /// [`validate_doses`] rejects them up front. A panicking evaluation yields an empty
    /// result with zero confidence and the reason in `error`.
    #[instrument(skip_all, fields(product = %product.name, stack = stack.len(), medications = medications.len()))]
    pub fn check_interactions_for(
        &self,
        product: &Product,
        stack: &[StackItem],
        medications: &[String],
        profile: Option<&HealthProfile>,
    ) -> RuleCheckResult {
        let started = Instant::now();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluate(product, stack, medications, profile)
        }));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(mut result) => {
                result.response_time_ms = elapsed_ms;
                debug!(
                    interactions = result.interactions.len(),
                    warnings = result.nutrient_warnings.len(),
                    risk = %result.overall_risk_level,
                    "Rule tier evaluated"
                );
                result
            }
            Err(_) => {
                error!("Rule evaluation panicked");
                RuleCheckResult::failed("rule evaluation panicked", elapsed_ms)
            }
        }
    }

    /// Every rule matching any pair of `substances`. Used by the checker engine.
    pub fn match_substances(&self, substances: &[SubstanceContext]) -> Vec<RuleInteraction> {
        let tables = self.repository.tables();
        let participants: Vec<Participant> =
            substances.iter().map(Participant::from_context).collect();

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        for (i, a) in participants.iter().enumerate() {
            for b in &participants[i + 1..] {
                for hit in match_pair(&tables, a, b) {
                    if seen.insert(dedup_key(&hit)) {
                        found.push(hit);
                    }
                }
            }
        }
        found
    }

    fn evaluate(
        &self,
        product: &Product,
        stack: &[StackItem],
        medications: &[String],
        profile: Option<&HealthProfile>,
    ) -> RuleCheckResult {
        let tables = self.repository.tables();
        let candidate = Participant::from_product(product);

        let mut others: Vec<Participant> = stack.iter().map(Participant::from_stack_item).collect();
        others.extend(
            medications
                .iter()
                .map(|m| Participant::from_stack_item(&StackItem::medication(m.as_str()))),
        );

        let mut interactions = Vec::new();
        let mut seen = HashSet::new();
        for other in &others {
            for hit in match_pair(&tables, &candidate, other) {
                if seen.insert(dedup_key(&hit)) {
                    interactions.push(hit);
                }
            }
        }

        let nutrient_warnings = nutrient_warnings(&tables, product, stack, profile);
        let overall_risk_level = overall_risk(&interactions, &nutrient_warnings);

        RuleCheckResult {
            has_interactions: !interactions.is_empty() || !nutrient_warnings.is_empty(),
            interactions,
            nutrient_warnings,
            overall_risk_level,
            confidence: RULE_TIER_CONFIDENCE,
            response_time_ms: 0,
            cost_savings_estimate: ESTIMATED_ANALYSIS_COST_USD,
            error: None,
        }
    }
}

/// Highest matched rule severity; warnings alone floor the risk at MODERATE.
fn overall_risk(interactions: &[RuleInteraction], warnings: &[NutrientWarning]) -> RiskLevel {
    let from_rules = RiskLevel::from_severities(interactions.iter().map(|i| i.severity));
    if interactions.is_empty() && !warnings.is_empty() {
        from_rules.max(RiskLevel::Moderate)
    } else {
        from_rules
    }
}

/// Rejects a negative or non-finite amount anywhere in `product` or `stack`.
pub fn validate_doses(product: &Product, stack: &[StackItem]) -> RuleResult<()> {
    check_ingredients(&product.ingredients)?;
    for item in stack {
        check_ingredients(&item.ingredients)?;
        if let Some(dosage) = &item.dosage {
            check_amount(&item.name, dosage.amount)?;
        }
    }
    Ok(())
}

/// Rejects a negative or non-finite dose on any substance.
pub fn validate_context_doses(substances: &[SubstanceContext]) -> RuleResult<()> {
    for substance in substances {
        if let Some(dosage) = &substance.dosage {
            check_amount(&substance.name, dosage.amount)?;
        }
    }
    Ok(())
}

fn check_ingredients(ingredients: &[Ingredient]) -> RuleResult<()> {
    for ingredient in ingredients {
        if let Some(amount) = ingredient.amount {
            check_amount(&ingredient.name, amount)?;
        }
    }
    Ok(())
}

fn check_amount(substance: &str, amount: f64) -> RuleResult<()> {
    if usable_amount(amount) {
        Ok(())
    } else {
        Err(RuleError::InvalidDosage {
            substance: substance.to_string(),
            amount,
        })
    }
}

fn usable_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}

fn dedup_key(hit: &RuleInteraction) -> (String, String, String) {
    (
        hit.rule_id.clone(),
        normalize_name(&hit.substance1),
        normalize_name(&hit.substance2),
    )
}

fn names_match(tables: &RuleTables, rule_item: &str, names: &[String]) -> bool {
    let expanded = tables.expand(rule_item);
    names
        .iter()
        .any(|name| expanded.iter().any(|alias| name.contains(alias.as_str())))
}

/// Rules whose items match `a` and `b` in either order.
fn match_pair(tables: &RuleTables, a: &Participant, b: &Participant) -> Vec<RuleInteraction> {
    let mut hits = Vec::new();
    for rule in tables.rules() {
        let ordered = if names_match(tables, &rule.substance1, &a.names)
            && names_match(tables, &rule.substance2, &b.names)
        {
            Some((a, b))
        } else if names_match(tables, &rule.substance1, &b.names)
            && names_match(tables, &rule.substance2, &a.names)
        {
            Some((b, a))
        } else {
            None
        };

        let Some((first, second)) = ordered else {
            continue;
        };
        if !meets_threshold(tables, rule, first) {
            debug!(rule = %rule.id, substance = %first.label, "Dose below rule threshold");
            continue;
        }
        hits.push(RuleInteraction::from_rule(rule, &first.label, &second.label));
    }
    hits
}

/// Unknown, unusable or unconvertible doses count as meeting the threshold.
fn meets_threshold(tables: &RuleTables, rule: &RuleRecord, participant: &Participant) -> bool {
    let (Some(threshold), Some(dosage)) = (&rule.dosage_threshold, &participant.dosage) else {
        return true;
    };
    if !usable_amount(dosage.amount) {
        debug!(substance = %participant.label, amount = dosage.amount, "Unusable dose treated as unknown");
        return true;
    }
    let nutrient = tables.canonical(&rule.substance1);
    match units::convert(dosage.amount, &dosage.unit, &threshold.unit, &nutrient) {
        Some(amount) => amount >= threshold.amount,
        None => true,
    }
}

fn collect_contributions(
    tables: &RuleTables,
    label: &str,
    ingredients: &[Ingredient],
    fallback: Option<Dosage>,
    totals: &mut BTreeMap<String, Vec<Contribution>>,
) {
    let mut counted = false;
    for ingredient in ingredients {
        if let (Some(amount), Some(unit)) = (ingredient.amount, &ingredient.unit) {
            if !usable_amount(amount) {
                debug!(ingredient = %ingredient.name, amount, "Skipping unusable dose in totals");
                continue;
            }
            totals
                .entry(tables.canonical(&ingredient.name))
                .or_default()
                .push(Contribution {
                    amount,
                    unit: unit.clone(),
                    source: label.to_string(),
                });
            counted = true;
        }
    }

    if !counted
        && let Some(dosage) = fallback
        && usable_amount(dosage.amount)
    {
        totals
            .entry(tables.canonical(&units::strip_dose_tokens(label)))
            .or_default()
            .push(Contribution {
                amount: dosage.amount,
                unit: dosage.unit,
                source: label.to_string(),
            });
    }
}

fn nutrient_warnings(
    tables: &RuleTables,
    product: &Product,
    stack: &[StackItem],
    profile: Option<&HealthProfile>,
) -> Vec<NutrientWarning> {
    let mut totals: BTreeMap<String, Vec<Contribution>> = BTreeMap::new();
    collect_contributions(
        tables,
        &product.name,
        &product.ingredients,
        product.primary_dosage(),
        &mut totals,
    );
    for item in stack.iter().filter(|i| !i.is_medication()) {
        collect_contributions(
            tables,
            &item.name,
            &item.ingredients,
            item.primary_dosage(),
            &mut totals,
        );
    }

    let mut warnings = Vec::new();
    for (nutrient, contributions) in totals {
        let Some(limit) = tables.limit_for(&nutrient, profile) else {
            continue;
        };

        let mut total = 0.0;
        let mut sources = Vec::new();
        for c in contributions {
            match units::convert(c.amount, &c.unit, &limit.unit, &nutrient) {
                Some(amount) => {
                    total += amount;
                    if !sources.contains(&c.source) {
                        sources.push(c.source);
                    }
                }
                None => debug!(
                    nutrient = %nutrient,
                    unit = %c.unit,
                    limit_unit = %limit.unit,
                    "Skipping dose in incompatible unit"
                ),
            }
        }

        if limit.upper_limit <= 0.0 || total <= limit.upper_limit {
            continue;
        }
        let percent = round_to(total / limit.upper_limit * 100.0, 1);
        warnings.push(NutrientWarning {
            nutrient,
            total_amount: round_to(total, 3),
            unit: limit.unit.clone(),
            upper_limit: limit.upper_limit,
            percent_of_limit: percent,
            severity: Severity::Moderate,
            health_risk: limit.health_risk.clone(),
            sources,
        });
    }
    warnings
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
