//! Products, stack items, and the flattened [`SubstanceContext`] used by checkers.

use serde::{Deserialize, Serialize};

/// A single labelled ingredient with an optional per-serving amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl Ingredient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount: None,
            unit: None,
        }
    }

    pub fn with_amount(name: impl Into<String>, amount: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount: Some(amount),
            unit: Some(unit.into()),
        }
    }
}

/// The candidate product being evaluated against a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
}

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            brand: None,
            ingredients: Vec::new(),
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_ingredient(mut self, ingredient: Ingredient) -> Self {
        self.ingredients.push(ingredient);
        self
    }

    /// Lowercased names that rule matching is run against.
    pub fn match_names(&self) -> Vec<String> {
        collect_match_names(&self.name, &self.ingredients)
    }

    /// Dose of the product's primary active, from ingredients or the label text.
    pub fn primary_dosage(&self) -> Option<Dosage> {
        primary_dosage(&self.name, &self.ingredients)
    }
}

/// Whether a stack entry is a supplement or a prescribed/OTC medication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackItemKind {
    #[default]
    Supplement,
    Medication,
}

/// An item the user already takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackItem {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub kind: StackItemKind,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub dosage: Option<Dosage>,
}

impl StackItem {
    pub fn supplement(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            brand: None,
            kind: StackItemKind::Supplement,
            ingredients: Vec::new(),
            dosage: None,
        }
    }

    pub fn medication(name: impl Into<String>) -> Self {
        Self {
            kind: StackItemKind::Medication,
            ..Self::supplement(name)
        }
    }

    pub fn with_ingredient(mut self, ingredient: Ingredient) -> Self {
        self.ingredients.push(ingredient);
        self
    }

    pub fn is_medication(&self) -> bool {
        self.kind == StackItemKind::Medication
    }

    pub fn match_names(&self) -> Vec<String> {
        collect_match_names(&self.name, &self.ingredients)
    }

    pub fn primary_dosage(&self) -> Option<Dosage> {
        self.dosage
            .clone()
            .or_else(|| primary_dosage(&self.name, &self.ingredients))
    }
}

/// Where a substance came from in a check request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstanceSource {
    Stack,
    NewProduct,
    Medication,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dosage {
    pub amount: f64,
    pub unit: String,
    #[serde(default)]
    pub frequency: Option<String>,
}

impl Dosage {
    pub fn new(amount: f64, unit: impl Into<String>) -> Self {
        Self {
            amount,
            unit: unit.into(),
            frequency: None,
        }
    }

    /// Extracts the first `<number><unit>` token from label text such as `"Iron 65mg"`
    /// or `"Vitamin D3 2000 IU"`.
    pub fn parse_inline(text: &str) -> Option<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        for (i, token) in tokens.iter().enumerate() {
            let split = token
                .char_indices()
                .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == ','))
                .map(|(idx, _)| idx)
                .unwrap_or(token.len());
            if split == 0 {
                continue;
            }
            let number = token[..split].replace(',', "");
            let Ok(amount) = number.parse::<f64>() else {
                continue;
            };
            let unit = if split < token.len() {
                token[split..].to_string()
            } else if let Some(next) = tokens.get(i + 1) {
                (*next).to_string()
            } else {
                continue;
            };
            if unit.chars().all(|c| c.is_alphabetic() || c == 'µ') && !unit.is_empty() {
                return Some(Self::new(amount, unit.to_lowercase()));
            }
        }
        None
    }
}

/// A substance as seen by the interaction engine: one name, one optional dose, one origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstanceContext {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<Dosage>,
    pub source: SubstanceSource,
}

impl SubstanceContext {
    pub fn new(name: impl Into<String>, source: SubstanceSource) -> Self {
        Self {
            name: name.into(),
            dosage: None,
            source,
        }
    }

    pub fn with_dosage(mut self, dosage: Dosage) -> Self {
        self.dosage = Some(dosage);
        self
    }

    /// Trimmed, lowercased name used for canonical keys and matching.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

impl From<&Product> for SubstanceContext {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            dosage: product.primary_dosage(),
            source: SubstanceSource::NewProduct,
        }
    }
}

impl From<&StackItem> for SubstanceContext {
    fn from(item: &StackItem) -> Self {
        let source = match item.kind {
            StackItemKind::Supplement => SubstanceSource::Stack,
            StackItemKind::Medication => SubstanceSource::Medication,
        };
        Self {
            name: item.name.clone(),
            dosage: item.primary_dosage(),
            source,
        }
    }
}

/// Lowercases and collapses internal whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn collect_match_names(name: &str, ingredients: &[Ingredient]) -> Vec<String> {
    let mut names = vec![normalize_name(name)];
    for ingredient in ingredients {
        let n = normalize_name(&ingredient.name);
        if !n.is_empty() && !names.contains(&n) {
            names.push(n);
        }
    }
    names
}

fn primary_dosage(name: &str, ingredients: &[Ingredient]) -> Option<Dosage> {
    ingredients
        .iter()
        .find_map(|i| match (i.amount, &i.unit) {
            (Some(amount), Some(unit)) => Some(Dosage::new(amount, unit.to_lowercase())),
            _ => None,
        })
        .or_else(|| Dosage::parse_inline(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline_attached_unit() {
        let d = Dosage::parse_inline("Iron 65mg").unwrap();
        assert_eq!(d.amount, 65.0);
        assert_eq!(d.unit, "mg");
    }

    #[test]
    fn test_parse_inline_detached_unit() {
        let d = Dosage::parse_inline("Vitamin D3 2,000 IU softgels").unwrap();
        assert_eq!(d.amount, 2000.0);
        assert_eq!(d.unit, "iu");
    }

    #[test]
    fn test_parse_inline_none() {
        assert!(Dosage::parse_inline("Vitamin K").is_none());
        assert!(Dosage::parse_inline("").is_none());
    }

    #[test]
    fn test_match_names_dedup_and_lowercase() {
        let product = Product::new("Bone  Support")
            .with_ingredient(Ingredient::new("Calcium"))
            .with_ingredient(Ingredient::new("calcium"));
        assert_eq!(product.match_names(), vec!["bone support", "calcium"]);
    }

    #[test]
    fn test_stack_item_source_mapping() {
        let med = StackItem::medication("Warfarin");
        let ctx = SubstanceContext::from(&med);
        assert_eq!(ctx.source, SubstanceSource::Medication);

        let sup = StackItem::supplement("Magnesium 200mg");
        let ctx = SubstanceContext::from(&sup);
        assert_eq!(ctx.source, SubstanceSource::Stack);
        assert_eq!(ctx.dosage.unwrap().amount, 200.0);
    }
}
