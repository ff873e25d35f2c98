//! Shared domain types: substances, severities, interactions, health profiles.

pub mod interaction;
pub mod profile;
pub mod severity;
pub mod substance;

pub use interaction::{
    DetectedInteraction, EvidenceQuality, Interaction, InteractionType, PairKey,
};
pub use profile::{AgeGroup, Gender, HealthProfile, UserContext};
pub use severity::{RiskLevel, Severity};
pub use substance::{
    Dosage, Ingredient, Product, StackItem, StackItemKind, SubstanceContext, SubstanceSource,
    normalize_name,
};
