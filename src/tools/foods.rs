//! Food MCP Tools
//!
//! Tools for managing catalog foods. Every response carries nutrition and
//! serving size derived from the current ingredient lines.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::db::{Database, DbResult};
use crate::detection::Detection;
use crate::models::{
    calculate_food_nutrition, Food, FoodCreate, FoodIngredientInput, FoodUpdate,
    NutritionTotals, ResolvedIngredient,
};
use crate::nutrition::{normalize_name, ComponentMultipliers};

/// Full food detail with derived nutrition
#[derive(Debug, Serialize)]
pub struct FoodDetail {
    pub id: i64,
    pub name: String,
    pub serving_suggestions: Option<String>,
    pub ingredients: Vec<ResolvedIngredient>,
    pub nutrition: NutritionTotals,
    pub serving_size: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// Response for lookup_food
#[derive(Debug, Serialize)]
pub struct FoodLookupResponse {
    #[serde(flatten)]
    pub food: FoodDetail,
    pub multipliers_applied: bool,
    /// Component names that matched none of the food's ingredients
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched_components: Vec<String>,
}

/// Summary of a food for listings
#[derive(Debug, Serialize)]
pub struct FoodSummary {
    pub id: i64,
    pub name: String,
    pub serving_suggestions: Option<String>,
    pub ingredient_count: usize,
    pub serving_size: f64,
    pub nutrition: NutritionTotals,
}

/// Response for list_foods
#[derive(Debug, Serialize)]
pub struct ListFoodsResponse {
    pub foods: Vec<FoodSummary>,
    pub total: usize,
}

/// Response for delete_food
#[derive(Debug, Serialize)]
pub struct DeleteFoodResponse {
    pub success: bool,
    pub deleted_id: i64,
    /// Meal logs that referenced the food; they keep their stored totals
    pub meal_logs_detached: i64,
}

/// Response for identify_food_photo
#[derive(Debug, Serialize)]
pub struct PhotoIdentificationResponse {
    pub detected_foods: Vec<String>,
    pub matches: Vec<FoodLookupResponse>,
    /// Detected names with no catalog food
    pub unknown_foods: Vec<String>,
}

fn validate_lines(lines: &[FoodIngredientInput]) -> Result<(), String> {
    for line in lines {
        if !line.quantity.is_finite() || line.quantity < 0.0 {
            return Err(format!(
                "Invalid quantity {} for ingredient {}: must be a non-negative number",
                line.quantity, line.ingredient_id
            ));
        }
    }
    Ok(())
}

/// Checks shared by every path that writes a new food
pub fn validate_food(data: &FoodCreate) -> Result<(), String> {
    if data.name.trim().is_empty() {
        return Err("Food name cannot be empty".to_string());
    }
    validate_lines(&data.ingredients)
}

fn food_detail(
    conn: &Connection,
    food: Food,
    multipliers: Option<&ComponentMultipliers>,
) -> DbResult<FoodDetail> {
    let lines = Food::get_ingredients(conn, food.id)?;
    let derived = calculate_food_nutrition(&lines, multipliers);

    Ok(FoodDetail {
        id: food.id,
        name: food.name,
        serving_suggestions: food.serving_suggestions,
        ingredients: derived.ingredients,
        nutrition: derived.totals,
        serving_size: derived.serving_size,
        created_at: food.created_at,
        updated_at: food.updated_at,
    })
}

/// Look up a food by name, scaling ingredient quantities by detected counts
fn lookup_with_multipliers(
    conn: &Connection,
    name: &str,
    multipliers: Option<&ComponentMultipliers>,
) -> DbResult<Option<FoodLookupResponse>> {
    let Some(food) = Food::get_by_name(conn, name)? else {
        return Ok(None);
    };

    let detail = food_detail(conn, food, multipliers)?;

    let mut unmatched_components: Vec<String> = match multipliers {
        Some(m) => m
            .names()
            .filter(|component| {
                !detail
                    .ingredients
                    .iter()
                    .any(|line| normalize_name(&line.name) == *component)
            })
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };
    unmatched_components.sort();

    for component in &unmatched_components {
        warn!(food = %detail.name, component = %component, "Ignoring component with no matching ingredient");
    }

    Ok(Some(FoodLookupResponse {
        multipliers_applied: multipliers.map_or(false, |m| !m.is_empty()),
        food: detail,
        unmatched_components,
    }))
}

/// Create a food with its ingredient lines in one transaction
pub fn create_food(db: &Database, data: FoodCreate) -> Result<FoodDetail, String> {
    validate_food(&data)?;

    let detail = db
        .with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let food = Food::create(&tx, &data)?;
            let detail = food_detail(&tx, food, None)?;
            tx.commit()?;
            Ok(detail)
        })
        .map_err(|e| format!("Failed to create food: {}", e))?;

    info!(
        id = detail.id,
        name = %detail.name,
        ingredients = detail.ingredients.len(),
        "Created food"
    );

    Ok(detail)
}

/// Get a food by ID with derived nutrition
pub fn get_food(db: &Database, id: i64) -> Result<Option<FoodDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let food = Food::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get food: {}", e))?;

    match food {
        Some(food) => food_detail(&conn, food, None)
            .map(Some)
            .map_err(|e| format!("Failed to load food ingredients: {}", e)),
        None => Ok(None),
    }
}

/// Look up a food by name (case-insensitive) with optional detected component counts
pub fn lookup_food(
    db: &Database,
    name: &str,
    components: Option<&Value>,
) -> Result<Option<FoodLookupResponse>, String> {
    let multipliers = components.map(ComponentMultipliers::from_value);
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    lookup_with_multipliers(&conn, name, multipliers.as_ref())
        .map_err(|e| format!("Failed to look up food: {}", e))
}

/// List all foods, each enriched with derived nutrition and serving size
pub fn list_foods(db: &Database) -> Result<ListFoodsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let foods = Food::list_all(&conn)
        .map_err(|e| format!("Failed to list foods: {}", e))?;

    let mut summaries = Vec::with_capacity(foods.len());
    for food in foods {
        let lines = Food::get_ingredients(&conn, food.id)
            .map_err(|e| format!("Failed to load ingredients for food {}: {}", food.id, e))?;
        let derived = calculate_food_nutrition(&lines, None);

        summaries.push(FoodSummary {
            id: food.id,
            name: food.name,
            serving_suggestions: food.serving_suggestions,
            ingredient_count: lines.len(),
            serving_size: derived.serving_size,
            nutrition: derived.totals,
        });
    }

    let total = summaries.len();
    Ok(ListFoodsResponse {
        foods: summaries,
        total,
    })
}

/// Update a food. A given ingredient list replaces the existing one.
pub fn update_food(db: &Database, id: i64, data: FoodUpdate) -> Result<FoodDetail, String> {
    if let Some(ref name) = data.name {
        if name.trim().is_empty() {
            return Err("Food name cannot be empty".to_string());
        }
    }
    if let Some(ref lines) = data.ingredients {
        validate_lines(lines)?;
    }

    let detail = db
        .with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let detail = match Food::update(&tx, id, &data)? {
                Some(food) => Some(food_detail(&tx, food, None)?),
                None => None,
            };
            tx.commit()?;
            Ok(detail)
        })
        .map_err(|e| format!("Failed to update food: {}", e))?;

    match detail {
        Some(detail) => {
            info!(id, "Updated food");
            Ok(detail)
        }
        None => Err(format!("Food not found with id: {}", id)),
    }
}

/// Delete a food. Meal logs referencing it are detached, not removed.
pub fn delete_food(db: &Database, id: i64) -> Result<DeleteFoodResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if Food::get_by_id(&conn, id)
        .map_err(|e| format!("Database error: {}", e))?
        .is_none()
    {
        return Err(format!("Food not found with id: {}", id));
    }

    let meal_logs_detached = Food::get_meal_usage_count(&conn, id)
        .map_err(|e| format!("Failed to check meal usage: {}", e))?;

    Food::delete(&conn, id)
        .map_err(|e| format!("Failed to delete food: {}", e))?;

    info!(id, meal_logs_detached, "Deleted food");

    Ok(DeleteFoodResponse {
        success: true,
        deleted_id: id,
        meal_logs_detached,
    })
}

/// Resolve every detected food name against the catalog with the detected component counts
pub fn identify_detected_foods(
    db: &Database,
    detection: &Detection,
) -> Result<PhotoIdentificationResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let mut matches = Vec::new();
    let mut unknown_foods = Vec::new();

    for name in &detection.food_names {
        let found = lookup_with_multipliers(&conn, name, Some(&detection.multipliers))
            .map_err(|e| format!("Failed to look up food '{}': {}", name, e))?;
        match found {
            Some(lookup) => matches.push(lookup),
            None => {
                warn!(food = %name, "Detected food is not in the catalog");
                unknown_foods.push(name.clone());
            }
        }
    }

    info!(
        detected = detection.food_names.len(),
        matched = matches.len(),
        "Identified foods from photo"
    );

    Ok(PhotoIdentificationResponse {
        detected_foods: detection.food_names.clone(),
        matches,
        unknown_foods,
    })
}
