//! Escalation of interaction severity from a user's risk factors.
//!
//! Every triggered factor escalates the base severity by exactly one step; the final
//! severity is the maximum of those individual escalations, so any number of factors
//! still yields a single step.

use crate::domain::{AgeGroup, DetectedInteraction, Interaction, UserContext, normalize_name};

/// `(condition keyword, substances it sensitizes to, advice)`.
const CONDITION_SENSITIVITIES: &[(&str, &[&str], &str)] = &[
    (
        "kidney",
        &["potassium", "magnesium", "vitamin d", "calcium", "ace inhibitor"],
        "Reduced kidney function slows clearance; confirm dosing with your clinician",
    ),
    (
        "liver",
        &["vitamin a", "niacin", "iron", "kava"],
        "Liver disease increases susceptibility to hepatotoxic supplements",
    ),
    (
        "bleeding",
        &["warfarin", "fish oil", "ginkgo", "vitamin e", "vitamin k"],
        "A bleeding disorder amplifies anticoagulant interactions",
    ),
    (
        "hypertension",
        &["potassium", "ace inhibitor", "licorice"],
        "Blood pressure medication changes electrolyte handling",
    ),
    (
        "thyroid",
        &["levothyroxine", "iodine", "calcium", "iron"],
        "Thyroid conditions make absorption timing more important",
    ),
    (
        "depression",
        &["ssri", "st. john's wort", "5-htp"],
        "Serotonergic combinations need prescriber oversight",
    ),
];

const ELDERLY_ADVICE: &str =
    "Older adults are more sensitive to this interaction; review it with a clinician";
const PEDIATRIC_ADVICE: &str = "Children are more sensitive to this interaction; consult a pediatrician";
const PREGNANCY_ADVICE: &str = "Avoid this combination during pregnancy unless directed by a clinician";
const PREGNANCY_SENSITIVE: &[&str] = &["vitamin a", "isotretinoin", "warfarin", "iodine"];

/// Applies the user's risk factors to `interaction`.
pub fn personalize(interaction: Interaction, user: Option<&UserContext>) -> DetectedInteraction {
    let Some(user) = user else {
        return DetectedInteraction::unpersonalized(interaction);
    };

    let base = interaction.severity;
    let mut factors = Vec::new();
    let mut advice = Vec::new();

    match user.age_group() {
        Some(AgeGroup::Elderly) => {
            factors.push("age:elderly".to_string());
            advice.push(ELDERLY_ADVICE.to_string());
        }
        Some(AgeGroup::Pediatric) => {
            factors.push("age:pediatric".to_string());
            advice.push(PEDIATRIC_ADVICE.to_string());
        }
        _ => {}
    }

    if user.pregnant && PREGNANCY_SENSITIVE.iter().any(|s| interaction.pair.contains(s)) {
        factors.push("pregnancy".to_string());
        advice.push(PREGNANCY_ADVICE.to_string());
    }

    for condition in &user.conditions {
        let normalized = normalize_name(condition);
        for (keyword, substances, text) in CONDITION_SENSITIVITIES {
            if normalized.contains(keyword)
                && substances.iter().any(|s| interaction.pair.contains(s))
            {
                factors.push(format!("condition:{normalized}"));
                advice.push((*text).to_string());
            }
        }
    }

    factors.dedup();
    advice.dedup();

    let personalized_severity = factors
        .iter()
        .map(|_| base.escalate())
        .max()
        .unwrap_or(base);

    DetectedInteraction {
        interaction,
        risk_factors_present: factors,
        personalized_severity,
        personalized_recommendations: advice,
    }
}
