//! Per-ingredient macro contributions
//!
//! Rates always carry the unit they are expressed per. An amount in any unit is
//! converted into that unit before multiplying, so the catalog path (amount in
//! the ingredient's own unit) and the custom path (amount in grams) share one
//! calculation.

use serde::{Deserialize, Serialize};

use super::quantity::sanitize_amount;
use super::units::{grams_per_unit, same_unit};
use crate::models::NutritionTotals;

/// Macro rates per one `unit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRates {
    pub unit: String,
    pub calories: f64,
    pub fat: f64,
    pub protein: f64,
    pub carbohydrates: f64,
}

impl MacroRates {
    /// Rates with malformed values coerced to 0
    fn sanitized(&self) -> NutritionTotals {
        NutritionTotals {
            calories: sanitize_amount(self.calories),
            fat: sanitize_amount(self.fat),
            protein: sanitize_amount(self.protein),
            carbohydrates: sanitize_amount(self.carbohydrates),
        }
    }
}

/// Convert an amount between two unit labels through the base unit
pub fn convert_amount(amount: f64, from_unit: &str, to_unit: &str) -> f64 {
    let amount = sanitize_amount(amount);
    if same_unit(from_unit, to_unit) {
        return amount;
    }
    amount * grams_per_unit(from_unit) / grams_per_unit(to_unit)
}

/// Contribution of `amount` (expressed in `amount_unit`) of an ingredient
pub fn contribution(rates: &MacroRates, amount: f64, amount_unit: &str) -> NutritionTotals {
    let quantity = convert_amount(amount, amount_unit, &rates.unit);
    rates.sanitized().scale(quantity)
}
