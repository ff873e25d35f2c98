//! Dose unit normalization for nutrient totals and dosage thresholds.

use crate::domain::normalize_name;

/// Micrograms of vitamin D per international unit.
const VITAMIN_D_MCG_PER_IU: f64 = 1.0 / 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseUnit {
    Gram,
    Milligram,
    Microgram,
    InternationalUnit,
}

impl DoseUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim().to_lowercase().as_str() {
            "g" | "gram" | "grams" => Some(DoseUnit::Gram),
            "mg" | "milligram" | "milligrams" => Some(DoseUnit::Milligram),
            "mcg" | "µg" | "μg" | "ug" | "microgram" | "micrograms" => Some(DoseUnit::Microgram),
            "iu" | "ie" => Some(DoseUnit::InternationalUnit),
            _ => None,
        }
    }

    fn micrograms(self) -> Option<f64> {
        match self {
            DoseUnit::Gram => Some(1_000_000.0),
            DoseUnit::Milligram => Some(1_000.0),
            DoseUnit::Microgram => Some(1.0),
            DoseUnit::InternationalUnit => None,
        }
    }
}

/// Converts `amount` from one unit to another for `nutrient` (a canonical name).
///
/// Mass units convert freely. IU converts only for vitamin D. Returns `None` when the
/// units are unknown or incompatible.
pub fn convert(amount: f64, from: &str, to: &str, nutrient: &str) -> Option<f64> {
    let from = DoseUnit::parse(from)?;
    let to = DoseUnit::parse(to)?;
    if from == to {
        return Some(amount);
    }

    let is_vitamin_d = nutrient.starts_with("vitamin d");
    let in_mcg = match from.micrograms() {
        Some(factor) => amount * factor,
        None if is_vitamin_d => amount * VITAMIN_D_MCG_PER_IU,
        None => return None,
    };
    match to.micrograms() {
        Some(factor) => Some(in_mcg / factor),
        None if is_vitamin_d => Some(in_mcg / VITAMIN_D_MCG_PER_IU),
        None => None,
    }
}

/// Drops dose tokens from label text: `"Iron 65mg"` → `"iron"`.
pub fn strip_dose_tokens(name: &str) -> String {
    let mut kept = Vec::new();
    let mut skip_unit = false;
    for token in name.split_whitespace() {
        if skip_unit {
            skip_unit = false;
            if DoseUnit::parse(token).is_some() {
                continue;
            }
        }
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            skip_unit = token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',');
            continue;
        }
        kept.push(token);
    }
    normalize_name(&kept.join(" "))
}
