//! Serving size derivation
//!
//! A food's serving size is the sum of its ingredient quantities. Records come
//! in two historical shapes: a top-level `quantity`, or one nested under the
//! food/ingredient association.

use serde_json::Value;

use super::aggregate::round_to;
use super::quantity::{coerce_amount, sanitize_amount};

/// A record that carries an ingredient quantity
pub trait QuantityRecord {
    /// Top-level quantity, `None` when absent
    fn quantity(&self) -> Option<f64>;

    /// Quantity nested under the association, consulted only when the primary is absent
    fn nested_quantity(&self) -> Option<f64> {
        None
    }
}

/// Quantity of a record: primary first, then nested. Missing or malformed values are 0.
pub fn quantity_of<T: QuantityRecord + ?Sized>(record: &T) -> f64 {
    record
        .quantity()
        .or_else(|| record.nested_quantity())
        .map(sanitize_amount)
        .unwrap_or(0.0)
}

/// Sum of quantities over the records accepted by `filter`,
/// rounded to `decimals` places when given
pub fn serving_size_where<'a, T, I, F>(items: I, filter: F, decimals: Option<u32>) -> f64
where
    T: QuantityRecord + 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> bool,
{
    let total: f64 = items
        .into_iter()
        .filter(|item| filter(item))
        .map(quantity_of)
        .sum();

    match decimals {
        Some(d) => round_to(total, d),
        None => total,
    }
}

/// Sum of quantities over all records
pub fn serving_size<'a, T, I>(items: I, decimals: Option<u32>) -> f64
where
    T: QuantityRecord + 'a,
    I: IntoIterator<Item = &'a T>,
{
    serving_size_where(items, |_| true, decimals)
}

const NESTED_KEYS: [&str; 2] = ["food_ingredient", "FoodIngredient"];

/// Raw JSON rows: `{"quantity": ..}` or `{"food_ingredient": {"quantity": ..}}`
impl QuantityRecord for Value {
    fn quantity(&self) -> Option<f64> {
        match self.get("quantity") {
            None | Some(Value::Null) => None,
            Some(v) => Some(coerce_amount(v)),
        }
    }

    fn nested_quantity(&self) -> Option<f64> {
        NESTED_KEYS
            .iter()
            .filter_map(|key| self.get(*key))
            .find_map(|nested| nested.get("quantity"))
            .filter(|v| !v.is_null())
            .map(coerce_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_is_zero() {
        let items: Vec<Value> = Vec::new();
        assert_eq!(serving_size(&items, None), 0.0);
        assert_eq!(serving_size(&items, Some(2)), 0.0);
    }

    #[test]
    fn test_sums_primary_quantity() {
        let items = vec![json!({"quantity": 200}), json!({"quantity": 50})];
        assert_eq!(serving_size(&items, None), 250.0);
    }

    #[test]
    fn test_falls_back_to_nested_quantity() {
        let items = vec![
            json!({"quantity": 200}),
            json!({"food_ingredient": {"quantity": 50}}),
            json!({"FoodIngredient": {"quantity": "25"}}),
        ];
        assert_eq!(serving_size(&items, None), 275.0);
    }

    #[test]
    fn test_primary_wins_over_nested() {
        let items = vec![json!({"quantity": 10, "food_ingredient": {"quantity": 99}})];
        assert_eq!(serving_size(&items, None), 10.0);
    }

    #[test]
    fn test_malformed_quantities_count_as_zero() {
        let items = vec![json!({"quantity": "lots"}), json!({}), json!({"quantity": 5})];
        assert_eq!(serving_size(&items, None), 5.0);
    }

    #[test]
    fn test_rounding_only_when_requested() {
        let items = vec![json!({"quantity": 0.1}), json!({"quantity": 0.2})];
        let raw = serving_size(&items, None);
        assert_eq!(raw, 0.1 + 0.2);
        assert_eq!(serving_size(&items, Some(2)), 0.3);

        let items = vec![json!({"quantity": 1.23456})];
        let rounded = serving_size(&items, Some(2));
        assert_eq!(rounded, 1.23);
    }

    #[test]
    fn test_filter_predicate() {
        let items = vec![
            json!({"quantity": 200, "unit": "g"}),
            json!({"quantity": 2, "unit": "tbsp"}),
        ];
        let grams_only = serving_size_where(
            &items,
            |item| item.get("unit").and_then(Value::as_str) == Some("g"),
            None,
        );
        assert_eq!(grams_only, 200.0);
    }
}
