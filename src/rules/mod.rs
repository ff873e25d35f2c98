//! Tier 1: critical interaction rules and nutrient upper limits.
//!
//! [`RuleRepository`] owns the tables (built-in, optionally extended once per process from
//! a [`RuleSource`]). [`RuleEvaluator`] matches a product against a stack with
//! alias-expanded, bidirectional substring matching and sums nutrient intake across the
//! stack.

pub mod builtin;
pub mod error;
pub mod evaluator;
pub mod repository;
pub mod source;
pub mod types;
pub mod units;


pub use error::{RuleError, RuleResult};
pub use evaluator::{RuleEvaluator, validate_context_doses, validate_doses};
pub use repository::{RefreshOutcome, RuleRepository, RuleTables};
#[cfg(any(test, feature = "mock"))]
pub use source::MockRuleSource;
pub use source::{HttpRuleSource, RuleSource};
pub use types::{
    DosageThreshold, NutrientLimit, NutrientWarning, RuleCheckResult, RuleInteraction,
    RuleRecord, SubstanceKind,
};
