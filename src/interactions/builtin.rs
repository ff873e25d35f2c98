//! Checkers registered by default.

use std::sync::Arc;

use futures_util::FutureExt;

use super::error::CheckerError;
use super::registry::InteractionChecker;
use crate::constants::RULE_SOURCE_LABEL;
use crate::domain::{Interaction, InteractionType, Severity};
use crate::rules::{RuleEvaluator, units::strip_dose_tokens};

pub const RULE_CHECKER: &str = "rule_checker";
pub const RULE_CHECKER_PRIORITY: i32 = 100;
pub const DUPLICATION_CHECKER: &str = "duplication_checker";
pub const DUPLICATION_CHECKER_PRIORITY: i32 = 10;

/// Pairwise matching against the critical rule tables.
pub fn rule_checker(evaluator: RuleEvaluator) -> InteractionChecker {
    let evaluator = Arc::new(evaluator);
    InteractionChecker::new(
        RULE_CHECKER,
        RULE_CHECKER_PRIORITY,
        |substances| substances.len() >= 2,
        move |substances, _config| {
            let evaluator = Arc::clone(&evaluator);
            async move {
                let hits = evaluator.match_substances(substances);
                Ok::<_, CheckerError>(hits
                    .iter()
                    .map(|hit| hit.to_interaction(RULE_SOURCE_LABEL))
                    .collect())
            }
            .boxed()
        },
    )
}

/// Flags two substances that resolve to the same active ingredient.
pub fn duplication_checker(evaluator: RuleEvaluator) -> InteractionChecker {
    let evaluator = Arc::new(evaluator);
    InteractionChecker::new(
        DUPLICATION_CHECKER,
        DUPLICATION_CHECKER_PRIORITY,
        |substances| substances.len() >= 2,
        move |substances, _config| {
            let evaluator = Arc::clone(&evaluator);
            async move {
                let tables = evaluator.repository().tables();
                let actives: Vec<String> = substances
                    .iter()
                    .map(|s| tables.canonical(&strip_dose_tokens(&s.name)))
                    .collect();

                let mut found = Vec::new();
                for (i, a) in substances.iter().enumerate() {
                    for (j, b) in substances.iter().enumerate().skip(i + 1) {
                        if actives[i].is_empty() || actives[i] != actives[j] {
                            continue;
                        }
                        let severity = if a.dosage.is_some() && b.dosage.is_some() {
                            Severity::Moderate
                        } else {
                            Severity::Low
                        };
                        found.push(
                            Interaction::new(
                                &a.name,
                                &b.name,
                                InteractionType::NutrientNutrient,
                                severity,
                                format!("Therapeutic duplication: both provide {}", actives[i]),
                            )
                            .with_recommendation(format!(
                                "Check the combined {} intake against its upper limit",
                                actives[i]
                            ))
                            .with_source(DUPLICATION_CHECKER),
                        );
                    }
                }
                Ok::<_, CheckerError>(found)
            }
            .boxed()
        },
    )
}
