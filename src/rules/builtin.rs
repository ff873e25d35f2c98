//! Rule tables compiled into the binary. Always available, even offline.

use std::collections::HashMap;

use super::types::{NutrientLimit, RuleRecord, SubstanceKind};
use crate::domain::{EvidenceQuality, Severity};

use SubstanceKind::{Medication, Nutrient, Supplement};

pub fn critical_rules() -> Vec<RuleRecord> {
    vec![
        RuleRecord::new(
            "vitamin-k-warfarin",
            ("vitamin k", Nutrient),
            ("warfarin", Medication),
            Severity::Critical,
            "Vitamin K directly antagonizes the anticoagulant effect of warfarin",
        )
        .significance("Changes in vitamin K intake can shift INR out of the therapeutic range")
        .recommendation(
            "Keep vitamin K intake consistent day to day and have INR monitored after any change",
        )
        .monitoring()
        .evidence("FDA warfarin labeling", EvidenceQuality::High),
        RuleRecord::new(
            "iron-calcium",
            ("iron", Nutrient),
            ("calcium", Nutrient),
            Severity::Moderate,
            "Absorption competition: calcium inhibits non-heme and heme iron uptake",
        )
        .significance("Taken together, iron absorption can drop by up to 50%")
        .recommendation("Separate iron and calcium doses by at least 2 hours")
        .evidence("NIH Office of Dietary Supplements", EvidenceQuality::High),
        RuleRecord::new(
            "st-johns-wort-ssri",
            ("st. john's wort", Supplement),
            ("ssri", Medication),
            Severity::Critical,
            "Additive serotonergic activity",
        )
        .significance("Risk of serotonin syndrome")
        .recommendation("Do not combine; consult the prescriber before starting")
        .contraindicated()
        .evidence("Clinical case reports", EvidenceQuality::Moderate),
        RuleRecord::new(
            "5-htp-ssri",
            ("5-htp", Supplement),
            ("ssri", Medication),
            Severity::High,
            "5-HTP raises serotonin synthesis on top of reuptake inhibition",
        )
        .significance("Risk of serotonin syndrome")
        .recommendation("Avoid unless supervised by the prescriber")
        .monitoring()
        .evidence("Pharmacological mechanism", EvidenceQuality::Theoretical),
        RuleRecord::new(
            "vitamin-a-isotretinoin",
            ("vitamin a", Nutrient),
            ("isotretinoin", Medication),
            Severity::High,
            "Isotretinoin is a retinoid; supplemental vitamin A adds to its toxicity",
        )
        .significance("Hypervitaminosis A: headache, liver toxicity, intracranial pressure")
        .recommendation("Avoid vitamin A supplements during isotretinoin therapy")
        .contraindicated()
        .evidence("Isotretinoin labeling", EvidenceQuality::High),
        RuleRecord::new(
            "fish-oil-warfarin",
            ("fish oil", Supplement),
            ("warfarin", Medication),
            Severity::Moderate,
            "Omega-3 fatty acids inhibit platelet aggregation",
        )
        .significance("Increased bleeding risk at high doses")
        .recommendation("Monitor INR and watch for unusual bruising or bleeding")
        .monitoring()
        .threshold(3.0, "g")
        .evidence("Clinical trials", EvidenceQuality::Moderate),
        RuleRecord::new(
            "ginkgo-warfarin",
            ("ginkgo", Supplement),
            ("warfarin", Medication),
            Severity::High,
            "Ginkgolides inhibit platelet-activating factor",
        )
        .significance("Reported cases of serious bleeding")
        .recommendation("Avoid the combination")
        .monitoring()
        .evidence("Case reports", EvidenceQuality::Low),
        RuleRecord::new(
            "vitamin-e-warfarin",
            ("vitamin e", Nutrient),
            ("warfarin", Medication),
            Severity::Moderate,
            "High-dose vitamin E antagonizes vitamin K-dependent clotting factors",
        )
        .significance("Possible increase in bleeding risk")
        .recommendation("Keep vitamin E below 400 IU daily and monitor INR")
        .monitoring()
        .threshold(400.0, "iu")
        .evidence("Clinical trials", EvidenceQuality::Moderate),
        RuleRecord::new(
            "magnesium-antibiotic",
            ("magnesium", Nutrient),
            ("antibiotic", Medication),
            Severity::Moderate,
            "Magnesium chelates quinolone and tetracycline antibiotics in the gut",
        )
        .significance("Antibiotic absorption and efficacy are reduced")
        .recommendation("Take the antibiotic 2 hours before or 4 to 6 hours after magnesium")
        .evidence("Drug labeling", EvidenceQuality::High),
        RuleRecord::new(
            "calcium-levothyroxine",
            ("calcium", Nutrient),
            ("levothyroxine", Medication),
            Severity::Moderate,
            "Calcium binds levothyroxine and reduces its absorption",
        )
        .significance("Can raise TSH and blunt thyroid replacement")
        .recommendation("Separate calcium and levothyroxine by at least 4 hours")
        .evidence("Clinical studies", EvidenceQuality::High),
        RuleRecord::new(
            "iron-levothyroxine",
            ("iron", Nutrient),
            ("levothyroxine", Medication),
            Severity::Moderate,
            "Iron forms insoluble complexes with levothyroxine",
        )
        .significance("Reduced levothyroxine absorption")
        .recommendation("Separate iron and levothyroxine by at least 4 hours")
        .evidence("Clinical studies", EvidenceQuality::High),
        RuleRecord::new(
            "potassium-ace-inhibitor",
            ("potassium", Nutrient),
            ("ace inhibitor", Medication),
            Severity::High,
            "ACE inhibitors reduce potassium excretion",
        )
        .significance("Risk of hyperkalemia and arrhythmia")
        .recommendation("Avoid potassium supplements unless prescribed; monitor serum potassium")
        .monitoring()
        .evidence("Drug labeling", EvidenceQuality::High),
        RuleRecord::new(
            "zinc-copper",
            ("zinc", Nutrient),
            ("copper", Nutrient),
            Severity::Low,
            "High zinc intake induces metallothionein and blocks copper absorption",
        )
        .significance("Long-term use can cause copper deficiency")
        .recommendation("Keep zinc below 40 mg daily or pair with a copper source")
        .threshold(40.0, "mg")
        .evidence("NIH Office of Dietary Supplements", EvidenceQuality::Moderate),
    ]
}

pub fn nutrient_limits() -> Vec<NutrientLimit> {
    vec![
        NutrientLimit::adult("vitamin d", 100.0, "mcg", "Hypercalcemia, kidney damage"),
        NutrientLimit::adult("vitamin a", 3000.0, "mcg", "Liver toxicity, birth defects"),
        NutrientLimit::adult("vitamin c", 2000.0, "mg", "Gastrointestinal upset, kidney stones"),
        NutrientLimit::adult("vitamin e", 1000.0, "mg", "Bleeding risk"),
        NutrientLimit::adult("vitamin b6", 100.0, "mg", "Peripheral neuropathy"),
        NutrientLimit::adult("niacin", 35.0, "mg", "Flushing, liver toxicity"),
        NutrientLimit::adult("folate", 1000.0, "mcg", "Can mask vitamin B12 deficiency"),
        NutrientLimit::adult("calcium", 2500.0, "mg", "Kidney stones, hypercalcemia"),
        NutrientLimit::adult("iron", 45.0, "mg", "Gastrointestinal distress, organ damage"),
        NutrientLimit::adult("zinc", 40.0, "mg", "Copper deficiency, immune suppression"),
        NutrientLimit::adult("magnesium", 350.0, "mg", "Diarrhea, cramping"),
        NutrientLimit::adult("selenium", 400.0, "mcg", "Selenosis: hair and nail loss"),
        NutrientLimit::adult("iodine", 1100.0, "mcg", "Thyroid dysfunction"),
    ]
}

/// Canonical name → alternative names. Membership is symmetric.
pub fn aliases() -> HashMap<String, Vec<String>> {
    let groups: &[(&str, &[&str])] = &[
        ("warfarin", &["coumadin", "jantoven"]),
        ("fish oil", &["omega-3", "omega 3"]),
        (
            "st. john's wort",
            &["st john's wort", "st johns wort", "hypericum"],
        ),
        (
            "ssri",
            &[
                "sertraline",
                "fluoxetine",
                "paroxetine",
                "citalopram",
                "escitalopram",
                "zoloft",
                "prozac",
                "lexapro",
            ],
        ),
        (
            "antibiotic",
            &[
                "ciprofloxacin",
                "levofloxacin",
                "doxycycline",
                "tetracycline",
                "minocycline",
            ],
        ),
        (
            "ace inhibitor",
            &["lisinopril", "enalapril", "ramipril", "benazepril"],
        ),
        ("levothyroxine", &["synthroid"]),
        ("isotretinoin", &["accutane"]),
        ("5-htp", &["5-hydroxytryptophan"]),
        ("vitamin d", &["vitamin d3", "cholecalciferol"]),
        (
            "vitamin k",
            &["vitamin k1", "vitamin k2", "phylloquinone", "menaquinone"],
        ),
        ("vitamin a", &["retinol"]),
        ("folate", &["folic acid"]),
        ("vitamin b6", &["pyridoxine"]),
    ];

    groups
        .iter()
        .map(|(canonical, names)| {
            (
                canonical.to_string(),
                names.iter().map(|n| n.to_string()).collect(),
            )
        })
        .collect()
}
