//! Unit labels and conversion factors
//!
//! One canonical table for every computation path. Factors are relative to a
//! base unit of one gram; one milliliter is treated as one gram.

use serde::Serialize;

/// Category of a unit label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitCategory {
    /// Weight/mass units (g, kg, oz, กรัม)
    Weight,
    /// Volume units (ml, tsp, tbsp, ช้อนโต๊ะ)
    Volume,
    /// Not in the table; resolves to a factor of 1
    Unknown,
}

// ============================================================================
// Conversion Constants (to the gram/milliliter base unit)
// ============================================================================

pub const G_PER_MG: f64 = 0.001;
pub const G_PER_KG: f64 = 1000.0;
pub const G_PER_OZ: f64 = 28.3495;
pub const G_PER_LB: f64 = 453.592;

pub const ML_PER_TSP: f64 = 5.0;
pub const ML_PER_TBSP: f64 = 15.0;
pub const ML_PER_CUP: f64 = 240.0;
pub const ML_PER_LITER: f64 = 1000.0;

/// Factor returned for unknown or empty labels
pub const DEFAULT_FACTOR: f64 = 1.0;

fn normalize_unit(unit: &str) -> String {
    unit.trim().to_lowercase()
}

fn weight_factor(unit: &str) -> Option<f64> {
    match unit {
        "g" | "gram" | "grams" | "gr" | "กรัม" | "ก." => Some(1.0),
        "mg" | "milligram" | "milligrams" | "มิลลิกรัม" => Some(G_PER_MG),
        "kg" | "kilogram" | "kilograms" | "กิโลกรัม" | "กก." => Some(G_PER_KG),
        "oz" | "ounce" | "ounces" => Some(G_PER_OZ),
        "lb" | "lbs" | "pound" | "pounds" => Some(G_PER_LB),
        _ => None,
    }
}

fn volume_factor(unit: &str) -> Option<f64> {
    match unit {
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" | "มิลลิลิตร"
        | "มล." => Some(1.0),
        "l" | "liter" | "liters" | "litre" | "litres" | "ลิตร" => Some(ML_PER_LITER),
        "tsp" | "teaspoon" | "teaspoons" | "ช้อนชา" => Some(ML_PER_TSP),
        "tbsp" | "tablespoon" | "tablespoons" | "ช้อนโต๊ะ" => Some(ML_PER_TBSP),
        "cup" | "cups" | "ถ้วย" => Some(ML_PER_CUP),
        _ => None,
    }
}

/// Conversion factor for a known unit label, `None` when the label is not in the table
pub fn unit_factor(unit: &str) -> Option<f64> {
    let normalized = normalize_unit(unit);
    weight_factor(&normalized).or_else(|| volume_factor(&normalized))
}

/// Conversion factor to the base unit. Unknown or empty labels resolve to 1,
/// so a mistyped catalog unit never breaks a computation.
pub fn grams_per_unit(unit: &str) -> f64 {
    unit_factor(unit).unwrap_or(DEFAULT_FACTOR)
}

/// Determine the category of a unit label
pub fn categorize_unit(unit: &str) -> UnitCategory {
    let normalized = normalize_unit(unit);
    if weight_factor(&normalized).is_some() {
        UnitCategory::Weight
    } else if volume_factor(&normalized).is_some() {
        UnitCategory::Volume
    } else {
        UnitCategory::Unknown
    }
}

/// Whether two labels name the same unit (after trimming and lowercasing)
pub fn same_unit(a: &str, b: &str) -> bool {
    normalize_unit(a) == normalize_unit(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_unit_resolves_to_one() {
        assert_eq!(grams_per_unit("xyz"), 1.0);
        assert_eq!(grams_per_unit(""), 1.0);
        assert_eq!(grams_per_unit("   "), 1.0);
        assert_eq!(unit_factor("xyz"), None);
    }

    #[test]
    fn test_base_units() {
        assert_eq!(grams_per_unit("g"), 1.0);
        assert_eq!(grams_per_unit("ml"), 1.0);
        assert_eq!(grams_per_unit("กรัม"), 1.0);
        assert_eq!(grams_per_unit("มิลลิลิตร"), 1.0);
    }

    #[test]
    fn test_spoons() {
        assert_eq!(grams_per_unit("tsp"), ML_PER_TSP);
        assert_eq!(grams_per_unit("Teaspoon"), ML_PER_TSP);
        assert_eq!(grams_per_unit("ช้อนชา"), ML_PER_TSP);
        assert_eq!(grams_per_unit("tbsp"), ML_PER_TBSP);
        assert_eq!(grams_per_unit("ช้อนโต๊ะ"), ML_PER_TBSP);
    }

    #[test]
    fn test_lookup_is_trim_and_case_insensitive() {
        assert_eq!(grams_per_unit("  KG "), G_PER_KG);
        assert_eq!(grams_per_unit("Cup"), ML_PER_CUP);
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize_unit("g"), UnitCategory::Weight);
        assert_eq!(categorize_unit("กิโลกรัม"), UnitCategory::Weight);
        assert_eq!(categorize_unit("tbsp"), UnitCategory::Volume);
        assert_eq!(categorize_unit("ฟอง"), UnitCategory::Unknown);
    }

    #[test]
    fn test_same_unit() {
        assert!(same_unit("G ", "g"));
        assert!(!same_unit("g", "ml"));
    }
}
