//! Per-user health context used for personalization and nutrient-limit selection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Pediatric,
    Adult,
    Elderly,
}

impl AgeGroup {
    pub const ELDERLY_FROM: u32 = 65;
    pub const ADULT_FROM: u32 = 18;

    pub fn from_age(age: u32) -> Self {
        if age >= Self::ELDERLY_FROM {
            AgeGroup::Elderly
        } else if age >= Self::ADULT_FROM {
            AgeGroup::Adult
        } else {
            AgeGroup::Pediatric
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Pediatric => "pediatric",
            AgeGroup::Adult => "adult",
            AgeGroup::Elderly => "elderly",
        }
    }
}

/// Health profile supplied by the caller. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthProfile {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub pregnant: bool,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

/// The engine's name for the same data.
pub type UserContext = HealthProfile;

impl HealthProfile {
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn with_medication(mut self, medication: impl Into<String>) -> Self {
        self.medications.push(medication.into());
        self
    }

    pub fn age_group(&self) -> Option<AgeGroup> {
        self.age.map(AgeGroup::from_age)
    }

    /// Lowercased condition names.
    pub fn normalized_conditions(&self) -> Vec<String> {
        self.conditions
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(17), AgeGroup::Pediatric);
        assert_eq!(AgeGroup::from_age(18), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(64), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(65), AgeGroup::Elderly);
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let p: HealthProfile = serde_json::from_str(r#"{"age": 70}"#).unwrap();
        assert_eq!(p.age_group(), Some(AgeGroup::Elderly));
        assert!(p.conditions.is_empty());
        assert!(!p.pregnant);
    }
}
