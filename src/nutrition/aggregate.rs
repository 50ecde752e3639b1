//! Aggregation of contributions into totals
//!
//! Rounding is applied once to the sum, never to individual terms.

use crate::models::NutritionTotals;

/// Decimal places of every stored or reported total
pub const TOTALS_DECIMALS: u32 = 2;

/// Largest per-field difference tolerated between a client preview and the
/// server-side result before it is reported
pub const RECONCILE_TOLERANCE: f64 = 0.01;

/// Round half-up to `decimals` places. Non-finite input rounds to 0.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Sum contributions and round each total to 2 decimals
pub fn aggregate<I>(contributions: I) -> NutritionTotals
where
    I: IntoIterator<Item = NutritionTotals>,
{
    let total: NutritionTotals = contributions.into_iter().sum();
    total.rounded(TOTALS_DECIMALS)
}

/// Compare client-submitted totals against the authoritative result.
/// Returns the largest per-field difference when it exceeds the tolerance.
pub fn totals_discrepancy(
    authoritative: &NutritionTotals,
    submitted: &NutritionTotals,
) -> Option<f64> {
    let diff = authoritative.max_abs_diff(submitted);
    if diff.is_nan() || diff > RECONCILE_TOLERANCE {
        Some(diff)
    } else {
        None
    }
}
