//! Interaction records shared by the rule tier, the checker engine, and the router.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::severity::Severity;
use super::substance::normalize_name;

/// Order-independent identifier for a substance pair: `(A, B) == (B, A)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub first: String,
    pub second: String,
}

impl PairKey {
    /// Normalizes both names and sorts them.
    pub fn new(a: &str, b: &str) -> Self {
        let a = normalize_name(a);
        let b = normalize_name(b);
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.first.contains(needle) || self.second.contains(needle)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.first, self.second)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    DrugDrug,
    DrugSupplement,
    SupplementSupplement,
    NutrientNutrient,
    FoodDrug,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::DrugDrug => "drug_drug",
            InteractionType::DrugSupplement => "drug_supplement",
            InteractionType::SupplementSupplement => "supplement_supplement",
            InteractionType::NutrientNutrient => "nutrient_nutrient",
            InteractionType::FoodDrug => "food_drug",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceQuality {
    High,
    #[default]
    Moderate,
    Low,
    Theoretical,
}

/// An interaction reported by a checker, before personalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub pair: PairKey,
    pub interaction_type: InteractionType,
    pub severity: Severity,
    pub mechanism: String,
    #[serde(default)]
    pub evidence: EvidenceQuality,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Name of the checker (or rule set) that produced this record.
    pub source: String,
}

impl Interaction {
    pub fn new(
        a: &str,
        b: &str,
        interaction_type: InteractionType,
        severity: Severity,
        mechanism: impl Into<String>,
    ) -> Self {
        Self {
            pair: PairKey::new(a, b),
            interaction_type,
            severity,
            mechanism: mechanism.into(),
            evidence: EvidenceQuality::default(),
            recommendations: Vec::new(),
            source: String::new(),
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn with_evidence(mut self, evidence: EvidenceQuality) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Deduplication key: canonical pair plus interaction type.
    pub fn dedup_key(&self) -> (PairKey, InteractionType) {
        (self.pair.clone(), self.interaction_type)
    }
}

/// An [`Interaction`] annotated with the requesting user's risk context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedInteraction {
    #[serde(flatten)]
    pub interaction: Interaction,
    pub risk_factors_present: Vec<String>,
    pub personalized_severity: Severity,
    pub personalized_recommendations: Vec<String>,
}

impl DetectedInteraction {
    /// Wraps an interaction with no personal risk factors applied.
    pub fn unpersonalized(interaction: Interaction) -> Self {
        let severity = interaction.severity;
        Self {
            interaction,
            risk_factors_present: Vec::new(),
            personalized_severity: severity,
            personalized_recommendations: Vec::new(),
        }
    }
}
