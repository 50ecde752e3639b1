//! Data models
//!
//! Rust structs representing database entities.

mod food;
mod ingredient;
mod meal_log;
mod nutrition;

pub use food::{
    calculate_food_nutrition, Food, FoodCreate, FoodIngredient, FoodIngredientInput,
    FoodNutrition, FoodUpdate, ResolvedIngredient,
};
pub use ingredient::{Ingredient, IngredientCreate, IngredientUpdate};
pub use meal_log::{
    calculate_custom_nutrition, daily_totals, CustomIngredient, CustomNutrition, MealLog,
    MealLogCreate, MealLogUpdate,
};
pub use nutrition::NutritionTotals;
