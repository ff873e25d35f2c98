//! Combining rule findings with analysis payloads, plus tier-2 key and quality derivation.

use std::collections::HashSet;

use crate::constants::RULE_SOURCE_LABEL;
use crate::domain::{
    HealthProfile, Ingredient, Product, RiskLevel, StackItem, StackItemKind,
    normalize_name,
};
use crate::hashing::hash_parts_hex;
use crate::rules::RuleCheckResult;

use super::types::AnalysisPayload;

pub const ANALYSIS_KEY_PREFIX: &str = "analysis:";

impl AnalysisPayload {
    /// Payload built from tier-1 findings alone.
    pub fn from_rules(rules: &RuleCheckResult) -> Self {
        let interactions: Vec<_> = rules
            .interactions
            .iter()
            .map(|r| r.to_interaction(RULE_SOURCE_LABEL))
            .collect();

        let mut recommendations = Vec::new();
        for interaction in &interactions {
            for rec in &interaction.recommendations {
                push_unique(&mut recommendations, rec);
            }
        }
        for warning in &rules.nutrient_warnings {
            push_unique(
                &mut recommendations,
                &format!(
                    "Reduce combined {} intake below {} {}",
                    warning.nutrient, warning.upper_limit, warning.unit
                ),
            );
        }

        Self {
            summary: rule_summary(rules),
            overall_risk_level: rules.overall_risk_level,
            interactions,
            nutrient_warnings: rules.nutrient_warnings.clone(),
            recommendations,
            category_scores: Default::default(),
            confidence: Some(rules.confidence),
        }
    }
}

fn rule_summary(rules: &RuleCheckResult) -> String {
    if let Some(error) = &rules.error {
        return format!("Rule check incomplete: {error}");
    }
    match (rules.interactions.len(), rules.nutrient_warnings.len()) {
        (0, 0) => "No known interactions or nutrient excesses found".to_string(),
        (i, w) => format!(
            "{i} known interaction(s) and {w} nutrient warning(s); overall risk {}",
            rules.overall_risk_level
        ),
    }
}

/// Puts tier-1 findings on top of `payload`.
///
/// Rule-sourced interactions come first. Stale rule entries in the payload (from an
/// earlier merge) are dropped, as are payload entries duplicating a rule finding's pair and
/// type. Tier-1 nutrient warnings replace payload warnings for the same nutrient. Risk is
/// the maximum of both sides.
pub fn merge(rules: &RuleCheckResult, payload: AnalysisPayload) -> AnalysisPayload {
    let rule_payload = AnalysisPayload::from_rules(rules);

    let rule_keys: HashSet<_> = rule_payload
        .interactions
        .iter()
        .map(|i| i.dedup_key())
        .collect();
    let mut interactions = rule_payload.interactions;
    interactions.extend(
        payload
            .interactions
            .into_iter()
            .filter(|i| i.source != RULE_SOURCE_LABEL && !rule_keys.contains(&i.dedup_key())),
    );

    let rule_nutrients: HashSet<String> = rule_payload
        .nutrient_warnings
        .iter()
        .map(|w| normalize_name(&w.nutrient))
        .collect();
    let mut nutrient_warnings = rule_payload.nutrient_warnings;
    nutrient_warnings.extend(
        payload
            .nutrient_warnings
            .into_iter()
            .filter(|w| !rule_nutrients.contains(&normalize_name(&w.nutrient))),
    );

    let mut recommendations = rule_payload.recommendations;
    for rec in &payload.recommendations {
        push_unique(&mut recommendations, rec);
    }

    let summary = if payload.summary.trim().is_empty() {
        rule_payload.summary
    } else {
        payload.summary
    };

    AnalysisPayload {
        summary,
        overall_risk_level: rules.overall_risk_level.max(payload.overall_risk_level),
        interactions,
        nutrient_warnings,
        recommendations,
        category_scores: payload.category_scores,
        confidence: payload.confidence,
    }
}

/// Shortest summary that counts as a real narrative.
pub const MIN_NARRATIVE_CHARS: usize = 40;

/// Completeness heuristic in `[0, 1]` used as the tier-2 quality of a stored payload.
///
/// Weights: narrative 0.3, category scores 0.2, rule matches 0.2, recommendations 0.1,
/// confidence up to 0.2 (0.5 assumed when absent).
pub fn payload_quality(payload: &AnalysisPayload) -> f64 {
    let mut quality = 0.0;
    if payload.summary.trim().chars().count() >= MIN_NARRATIVE_CHARS {
        quality += 0.3;
    }
    if !payload.category_scores.is_empty() {
        quality += 0.2;
    }
    if payload
        .interactions
        .iter()
        .any(|i| i.source == RULE_SOURCE_LABEL)
    {
        quality += 0.2;
    }
    if !payload.recommendations.is_empty() {
        quality += 0.1;
    }
    let confidence = payload
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);
    quality += 0.2 * confidence;
    quality.clamp(0.0, 1.0)
}

/// Tier-2 key from the normalized request identity.
///
/// Order of stack items, ingredients, conditions and medications does not matter; name
/// case and whitespace do not matter. Doses do.
pub fn analysis_key(
    product: &Product,
    stack: &[StackItem],
    profile: Option<&HealthProfile>,
) -> String {
    let mut parts = vec![
        normalize_name(&product.name),
        product
            .brand
            .as_deref()
            .map(normalize_name)
            .unwrap_or_default(),
        sorted_join(product.ingredients.iter().map(ingredient_part)),
    ];

    parts.push(sorted_join(stack.iter().map(|item| {
        let kind = match item.kind {
            StackItemKind::Supplement => "s",
            StackItemKind::Medication => "m",
        };
        let dose = item
            .primary_dosage()
            .map(|d| format!("{}{}", d.amount, d.unit.to_lowercase()))
            .unwrap_or_default();
        format!("{kind}:{}:{dose}", normalize_name(&item.name))
    })));

    match profile {
        Some(p) => {
            parts.push(p.age_group().map(|g| g.as_str()).unwrap_or("").to_string());
            parts.push(
                p.gender
                    .map(|g| format!("{g:?}").to_lowercase())
                    .unwrap_or_default(),
            );
            parts.push(p.pregnant.to_string());
            parts.push(sorted_join(p.conditions.iter().map(|c| normalize_name(c))));
            parts.push(sorted_join(p.medications.iter().map(|m| normalize_name(m))));
            parts.push(sorted_join(p.allergies.iter().map(|a| normalize_name(a))));
        }
        None => parts.push("-".to_string()),
    }

    format!("{ANALYSIS_KEY_PREFIX}{}", hash_parts_hex(&parts))
}

/// Tags attached to a stored payload so callers can invalidate by product, user or risk.
pub fn analysis_tags(
    product: &Product,
    user_id: Option<&str>,
    risk: RiskLevel,
) -> Vec<String> {
    let mut tags = vec![
        format!("product:{}", normalize_name(&product.name)),
        format!("risk:{}", risk.as_str().to_lowercase()),
    ];
    if let Some(user) = user_id.filter(|u| !u.trim().is_empty()) {
        tags.push(format!("user:{}", user.trim()));
    }
    tags
}

fn ingredient_part(ingredient: &Ingredient) -> String {
    format!(
        "{}:{}:{}",
        normalize_name(&ingredient.name),
        ingredient.amount.map(|a| a.to_string()).unwrap_or_default(),
        ingredient.unit.as_deref().unwrap_or("").to_lowercase()
    )
}

fn sorted_join<I: Iterator<Item = String>>(items: I) -> String {
    let mut items: Vec<String> = items.collect();
    items.sort();
    items.join(",")
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.trim().is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
