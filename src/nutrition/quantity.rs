//! Quantity resolution
//!
//! Two distinct paths produce an effective quantity:
//! - catalog path: a food's stored quantity, scaled by a detected component count
//! - custom path: a user-entered amount converted to grams, never scaled
//!
//! Malformed numbers coerce to 0 instead of failing the whole computation.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::units::grams_per_unit;

/// Clamp a raw amount to a usable value: NaN, infinities and negatives become 0
pub fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Coerce a loosely-typed JSON value (number, numeric string, null, ...) to an amount
pub fn coerce_amount(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    sanitize_amount(raw)
}

/// Serde helper for amount fields that may arrive as numbers, strings or null
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_amount(&value))
}

/// Ingredient name as used for multiplier matching
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Detected component counts keyed by normalized ingredient name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentMultipliers {
    counts: HashMap<String, f64>,
}

impl ComponentMultipliers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a count for a name; duplicate names (after normalization) are summed
    pub fn add(&mut self, name: &str, count: f64) {
        let key = normalize_name(name);
        if key.is_empty() {
            return;
        }
        *self.counts.entry(key).or_insert(0.0) += sanitize_amount(count);
    }

    /// Build from detection output: either an array of `{name: count}` objects
    /// (one per detection pass) or a single flat object. Anything else is empty.
    pub fn from_value(value: &Value) -> Self {
        let mut multipliers = Self::new();
        match value {
            Value::Array(passes) => {
                for pass in passes {
                    if let Value::Object(map) = pass {
                        for (name, count) in map {
                            multipliers.add(name, coerce_amount(count));
                        }
                    }
                }
            }
            Value::Object(map) => {
                for (name, count) in map {
                    multipliers.add(name, coerce_amount(count));
                }
            }
            _ => {}
        }
        multipliers
    }

    /// Summed count for a name, 0 when absent
    pub fn count(&self, name: &str) -> f64 {
        self.counts.get(&normalize_name(name)).copied().unwrap_or(0.0)
    }

    /// Scaling factor for a name. Never below 1, so a zero or absent count
    /// leaves the base quantity unchanged.
    pub fn factor(&self, name: &str) -> f64 {
        self.count(name).max(1.0)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }
}

impl<'de> Deserialize<'de> for ComponentMultipliers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Catalog path: stored quantity scaled by the detected component count.
/// Without a multiplier map the base quantity is returned unchanged.
pub fn effective_quantity(
    ingredient_name: &str,
    base_quantity: f64,
    multipliers: Option<&ComponentMultipliers>,
) -> f64 {
    let base = sanitize_amount(base_quantity);
    match multipliers {
        Some(m) => base * m.factor(ingredient_name),
        None => base,
    }
}

/// Custom path: a user-entered amount converted to grams
pub fn custom_quantity_in_grams(quantity: f64, unit: &str) -> f64 {
    sanitize_amount(quantity) * grams_per_unit(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_multiplier_map_returns_base() {
        assert_eq!(effective_quantity("Egg", 50.0, None), 50.0);
    }

    #[test]
    fn test_count_scales_base() {
        let m = ComponentMultipliers::from_value(&json!({"egg": 3}));
        assert_eq!(effective_quantity("Egg", 50.0, Some(&m)), 150.0);
    }

    #[test]
    fn test_zero_count_floors_at_one() {
        let m = ComponentMultipliers::from_value(&json!({"egg": 0}));
        assert_eq!(effective_quantity("egg", 50.0, Some(&m)), 50.0);
    }

    #[test]
    fn test_unmatched_name_uses_factor_one() {
        let m = ComponentMultipliers::from_value(&json!({"egg": 2}));
        assert_eq!(effective_quantity("Rice", 200.0, Some(&m)), 200.0);
    }

    #[test]
    fn test_name_matching_ignores_case_and_whitespace() {
        let m = ComponentMultipliers::from_value(&json!({"Egg ": 2}));
        assert_eq!(m.count("egg"), 2.0);
        assert_eq!(m.count("  EGG"), 2.0);
    }

    #[test]
    fn test_passes_are_merged_by_summing() {
        let m = ComponentMultipliers::from_value(&json!([
            {"egg": 1, "rice": 1},
            {"Egg": 2},
        ]));
        assert_eq!(m.count("egg"), 3.0);
        assert_eq!(m.count("rice"), 1.0);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_malformed_counts_coerce_to_zero() {
        let m = ComponentMultipliers::from_value(&json!({"egg": "two", "rice": null, "pork": -4}));
        assert_eq!(m.count("egg"), 0.0);
        assert_eq!(m.factor("rice"), 1.0);
        assert_eq!(m.factor("pork"), 1.0);
    }

    #[test]
    fn test_numeric_string_counts_are_accepted() {
        let m = ComponentMultipliers::from_value(&json!({"egg": "2"}));
        assert_eq!(m.factor("egg"), 2.0);
    }

    #[test]
    fn test_non_object_input_is_empty() {
        assert!(ComponentMultipliers::from_value(&json!("egg")).is_empty());
        assert!(ComponentMultipliers::from_value(&json!(null)).is_empty());
    }

    #[test]
    fn test_deserialize_accepts_both_shapes() {
        let flat: ComponentMultipliers = serde_json::from_value(json!({"egg": 2})).unwrap();
        let passes: ComponentMultipliers = serde_json::from_value(json!([{"egg": 2}])).unwrap();
        assert_eq!(flat, passes);
    }

    #[test]
    fn test_custom_quantity_in_grams() {
        assert_eq!(custom_quantity_in_grams(2.0, "tbsp"), 30.0);
        assert_eq!(custom_quantity_in_grams(100.0, "g"), 100.0);
        assert_eq!(custom_quantity_in_grams(3.0, "ฟอง"), 3.0);
        assert_eq!(custom_quantity_in_grams(f64::NAN, "g"), 0.0);
    }

    #[test]
    fn test_coerce_amount() {
        assert_eq!(coerce_amount(&json!(12.5)), 12.5);
        assert_eq!(coerce_amount(&json!(" 7 ")), 7.0);
        assert_eq!(coerce_amount(&json!("abc")), 0.0);
        assert_eq!(coerce_amount(&json!(null)), 0.0);
        assert_eq!(coerce_amount(&json!(-3)), 0.0);
        assert_eq!(coerce_amount(&json!([1])), 0.0);
    }
}
