//! Nutrition aggregation engine
//!
//! Pure computations over ingredient data already fetched by the caller:
//! unit resolution, quantity resolution, per-ingredient contributions,
//! aggregation with a single final rounding, and serving size derivation.

pub mod aggregate;
pub mod calculator;
pub mod quantity;
pub mod serving;
pub mod units;

pub use aggregate::{aggregate, round_to, totals_discrepancy, TOTALS_DECIMALS};
pub use calculator::{contribution, convert_amount, MacroRates};
pub use quantity::{
    coerce_amount, custom_quantity_in_grams, deserialize_amount, effective_quantity,
    normalize_name, sanitize_amount, ComponentMultipliers,
};
pub use serving::{quantity_of, serving_size, serving_size_where, QuantityRecord};
pub use units::{categorize_unit, grams_per_unit, unit_factor, UnitCategory};
