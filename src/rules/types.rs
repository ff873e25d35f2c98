//! Rule tables and tier-1 result shapes.

use serde::{Deserialize, Serialize};

use crate::domain::{
    AgeGroup, EvidenceQuality, Gender, Interaction, InteractionType, RiskLevel, Severity,
};

/// What kind of thing a rule item names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstanceKind {
    #[default]
    Supplement,
    Nutrient,
    Medication,
    Food,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosageThreshold {
    pub amount: f64,
    pub unit: String,
}

/// One critical-interaction rule. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: String,
    pub substance1: String,
    #[serde(default)]
    pub substance1_kind: SubstanceKind,
    pub substance2: String,
    #[serde(default)]
    pub substance2_kind: SubstanceKind,
    pub severity: Severity,
    pub mechanism: String,
    #[serde(default)]
    pub clinical_significance: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub contraindicated: bool,
    #[serde(default)]
    pub monitoring_required: bool,
    #[serde(default)]
    pub evidence_source: String,
    #[serde(default)]
    pub evidence_quality: EvidenceQuality,
    /// Minimum dose of the `substance1` side for the rule to fire.
    #[serde(default)]
    pub dosage_threshold: Option<DosageThreshold>,
}

impl RuleRecord {
    pub fn new(
        id: &str,
        substance1: (&str, SubstanceKind),
        substance2: (&str, SubstanceKind),
        severity: Severity,
        mechanism: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            substance1: substance1.0.to_string(),
            substance1_kind: substance1.1,
            substance2: substance2.0.to_string(),
            substance2_kind: substance2.1,
            severity,
            mechanism: mechanism.to_string(),
            clinical_significance: String::new(),
            recommendation: String::new(),
            contraindicated: false,
            monitoring_required: false,
            evidence_source: String::new(),
            evidence_quality: EvidenceQuality::default(),
            dosage_threshold: None,
        }
    }

    pub fn significance(mut self, text: &str) -> Self {
        self.clinical_significance = text.to_string();
        self
    }

    pub fn recommendation(mut self, text: &str) -> Self {
        self.recommendation = text.to_string();
        self
    }

    pub fn contraindicated(mut self) -> Self {
        self.contraindicated = true;
        self
    }

    pub fn monitoring(mut self) -> Self {
        self.monitoring_required = true;
        self
    }

    pub fn evidence(mut self, source: &str, quality: EvidenceQuality) -> Self {
        self.evidence_source = source.to_string();
        self.evidence_quality = quality;
        self
    }

    pub fn threshold(mut self, amount: f64, unit: &str) -> Self {
        self.dosage_threshold = Some(DosageThreshold {
            amount,
            unit: unit.to_string(),
        });
        self
    }

    pub fn interaction_type(&self) -> InteractionType {
        use SubstanceKind::*;
        match (self.substance1_kind, self.substance2_kind) {
            (Medication, Medication) => InteractionType::DrugDrug,
            (Food, Medication) | (Medication, Food) => InteractionType::FoodDrug,
            (Medication, _) | (_, Medication) => InteractionType::DrugSupplement,
            (Nutrient, Nutrient) => InteractionType::NutrientNutrient,
            _ => InteractionType::SupplementSupplement,
        }
    }
}

/// Tolerable upper intake for one nutrient and population group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientLimit {
    pub nutrient: String,
    pub upper_limit: f64,
    pub unit: String,
    /// `None` applies to adults and is the fallback for any group without its own row.
    #[serde(default)]
    pub age_group: Option<AgeGroup>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub health_risk: String,
}

impl NutrientLimit {
    pub fn adult(nutrient: &str, upper_limit: f64, unit: &str, health_risk: &str) -> Self {
        Self {
            nutrient: nutrient.to_string(),
            upper_limit,
            unit: unit.to_string(),
            age_group: None,
            gender: None,
            health_risk: health_risk.to_string(),
        }
    }
}

/// A rule that matched two substances of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInteraction {
    pub rule_id: String,
    /// Request-side names, in rule order.
    pub substance1: String,
    pub substance2: String,
    pub interaction_type: InteractionType,
    pub severity: Severity,
    pub mechanism: String,
    pub clinical_significance: String,
    pub recommendation: String,
    pub contraindicated: bool,
    pub monitoring_required: bool,
    pub evidence_source: String,
    pub evidence_quality: EvidenceQuality,
}

impl RuleInteraction {
    pub(crate) fn from_rule(rule: &RuleRecord, substance1: &str, substance2: &str) -> Self {
        Self {
            rule_id: rule.id.clone(),
            substance1: substance1.to_string(),
            substance2: substance2.to_string(),
            interaction_type: rule.interaction_type(),
            severity: rule.severity,
            mechanism: rule.mechanism.clone(),
            clinical_significance: rule.clinical_significance.clone(),
            recommendation: rule.recommendation.clone(),
            contraindicated: rule.contraindicated,
            monitoring_required: rule.monitoring_required,
            evidence_source: rule.evidence_source.clone(),
            evidence_quality: rule.evidence_quality,
        }
    }

    pub fn to_interaction(&self, source: &str) -> Interaction {
        let mut interaction = Interaction::new(
            &self.substance1,
            &self.substance2,
            self.interaction_type,
            self.severity,
            self.mechanism.clone(),
        )
        .with_evidence(self.evidence_quality)
        .with_source(source);
        if !self.recommendation.is_empty() {
            interaction = interaction.with_recommendation(self.recommendation.clone());
        }
        interaction
    }
}

/// Combined intake of one nutrient above its upper limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientWarning {
    pub nutrient: String,
    pub total_amount: f64,
    pub unit: String,
    pub upper_limit: f64,
    pub percent_of_limit: f64,
    pub severity: Severity,
    pub health_risk: String,
    /// Names of the products and stack items that contributed.
    pub sources: Vec<String>,
}

/// Tier-1 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCheckResult {
    pub has_interactions: bool,
    pub interactions: Vec<RuleInteraction>,
    pub nutrient_warnings: Vec<NutrientWarning>,
    pub overall_risk_level: RiskLevel,
    pub confidence: f64,
    pub response_time_ms: u64,
    pub cost_savings_estimate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuleCheckResult {
    /// Result reported when evaluation itself broke: no findings, zero confidence.
    pub fn failed(reason: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            has_interactions: false,
            interactions: Vec::new(),
            nutrient_warnings: Vec::new(),
            overall_risk_level: RiskLevel::None,
            confidence: 0.0,
            response_time_ms,
            cost_savings_estimate: 0.0,
            error: Some(reason.into()),
        }
    }
}
