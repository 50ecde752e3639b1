//! Shared nutrition totals
//!
//! Used for ingredient contributions, food totals, meal logs and daily summaries.

use serde::{Deserialize, Serialize};

/// Macro totals: kilocalories plus grams of fat, protein and carbohydrates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionTotals {
    pub calories: f64,
    pub fat: f64,
    pub protein: f64,
    pub carbohydrates: f64,
}

impl NutritionTotals {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Scale every field by a multiplier
    pub fn scale(&self, multiplier: f64) -> Self {
        Self {
            calories: self.calories * multiplier,
            fat: self.fat * multiplier,
            protein: self.protein * multiplier,
            carbohydrates: self.carbohydrates * multiplier,
        }
    }

    pub fn add(&self, other: &NutritionTotals) -> Self {
        Self {
            calories: self.calories + other.calories,
            fat: self.fat + other.fat,
            protein: self.protein + other.protein,
            carbohydrates: self.carbohydrates + other.carbohydrates,
        }
    }

    /// Round every field to `decimals` places
    pub fn rounded(&self, decimals: u32) -> Self {
        use crate::nutrition::round_to;
        Self {
            calories: round_to(self.calories, decimals),
            fat: round_to(self.fat, decimals),
            protein: round_to(self.protein, decimals),
            carbohydrates: round_to(self.carbohydrates, decimals),
        }
    }

    /// True when every field is finite and non-negative
    pub fn is_valid(&self) -> bool {
        [self.calories, self.fat, self.protein, self.carbohydrates]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }

    /// Largest absolute per-field difference
    pub fn max_abs_diff(&self, other: &NutritionTotals) -> f64 {
        [
            self.calories - other.calories,
            self.fat - other.fat,
            self.protein - other.protein,
            self.carbohydrates - other.carbohydrates,
        ]
        .iter()
        .fold(0.0, |acc, d| acc.max(d.abs()))
    }
}

impl std::ops::Add for NutritionTotals {
    type Output = NutritionTotals;

    fn add(self, other: NutritionTotals) -> NutritionTotals {
        NutritionTotals::add(&self, &other)
    }
}

impl std::iter::Sum for NutritionTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(NutritionTotals::zero(), |acc, n| acc + n)
    }
}
