//! Ingredient MCP Tools
//!
//! Tools for managing catalog ingredients.

use serde::Serialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::models::{Ingredient, IngredientCreate, IngredientUpdate};
use crate::nutrition::{categorize_unit, UnitCategory};

/// Response for add_ingredient
#[derive(Debug, Serialize)]
pub struct AddIngredientResponse {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub unit_category: UnitCategory,
    pub created_at: String,
    /// Set when the unit label is not in the conversion table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Response for search_ingredients and list_ingredients
#[derive(Debug, Serialize)]
pub struct ListIngredientsResponse {
    pub items: Vec<Ingredient>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Ingredient detail with the foods using it
#[derive(Debug, Serialize)]
pub struct IngredientDetail {
    #[serde(flatten)]
    pub ingredient: Ingredient,
    pub unit_category: UnitCategory,
    pub used_in_foods: Vec<String>,
}

/// Response for update_ingredient
#[derive(Debug, Serialize)]
pub struct UpdateIngredientResponse {
    pub success: bool,
    pub ingredient: Ingredient,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Response for delete_ingredient blocked
#[derive(Debug, Serialize)]
pub struct DeleteIngredientBlockedResponse {
    pub error: String,
    pub used_in_foods: Vec<String>,
}

/// Response for successful delete_ingredient
#[derive(Debug, Serialize)]
pub struct DeleteIngredientSuccessResponse {
    pub success: bool,
    pub deleted_id: i64,
}

fn validate_rate(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{} must be a finite number", field));
    }
    if value < 0.0 {
        return Err(format!("{} cannot be negative", field));
    }
    Ok(())
}

/// Checks shared by every path that writes a new ingredient
pub fn validate_ingredient(data: &IngredientCreate) -> Result<(), String> {
    if data.name.trim().is_empty() {
        return Err("Ingredient name cannot be empty".to_string());
    }
    if data.unit.trim().is_empty() {
        return Err("unit cannot be empty".to_string());
    }
    validate_rate("calories_per_unit", data.calories_per_unit)?;
    validate_rate("fat_per_unit", data.fat_per_unit)?;
    validate_rate("protein_per_unit", data.protein_per_unit)?;
    validate_rate("carbohydrates_per_unit", data.carbohydrates_per_unit)
}

/// Warning text for unit labels the converter does not know
fn unit_warning(unit: &str) -> Option<String> {
    if categorize_unit(unit) == UnitCategory::Unknown {
        warn!(unit = %unit, "Unknown unit label, conversions treat it as factor 1");
        Some(format!(
            "Unit '{}' is not recognized; amounts in other units will not be converted into it",
            unit
        ))
    } else {
        None
    }
}

/// Add a new ingredient
pub fn add_ingredient(db: &Database, data: IngredientCreate) -> Result<AddIngredientResponse, String> {
    validate_ingredient(&data)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if Ingredient::get_by_name(&conn, &data.name)
        .map_err(|e| format!("Database error: {}", e))?
        .is_some()
    {
        return Err(format!("Ingredient '{}' already exists", data.name.trim()));
    }

    let item = Ingredient::create(&conn, &data)
        .map_err(|e| format!("Failed to create ingredient: {}", e))?;

    info!(id = item.id, name = %item.name, unit = %item.unit, "Added ingredient");

    Ok(AddIngredientResponse {
        id: item.id,
        warning: unit_warning(&item.unit),
        unit_category: categorize_unit(&item.unit),
        name: item.name,
        unit: item.unit,
        created_at: item.created_at,
    })
}

/// Get an ingredient by ID with the foods that use it
pub fn get_ingredient(db: &Database, id: i64) -> Result<Option<IngredientDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let item = Ingredient::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get ingredient: {}", e))?;

    match item {
        Some(ingredient) => {
            let used_in_foods = Ingredient::get_used_in_foods(&conn, id)
                .map_err(|e| format!("Failed to get food usage: {}", e))?;
            Ok(Some(IngredientDetail {
                unit_category: categorize_unit(&ingredient.unit),
                ingredient,
                used_in_foods,
            }))
        }
        None => Ok(None),
    }
}

/// Search ingredients by name substring
pub fn search_ingredients(db: &Database, query: &str, limit: i64) -> Result<ListIngredientsResponse, String> {
    let limit = limit.min(100).max(1);
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let items = Ingredient::search(&conn, query, limit)
        .map_err(|e| format!("Search failed: {}", e))?;
    let total = items.len() as i64;

    Ok(ListIngredientsResponse {
        items,
        total,
        limit,
        offset: 0,
    })
}

/// List ingredients with sorting and pagination
pub fn list_ingredients(
    db: &Database,
    sort_by: &str,
    sort_order: &str,
    limit: i64,
    offset: i64,
) -> Result<ListIngredientsResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let items = Ingredient::list(&conn, sort_by, sort_order, limit, offset)
        .map_err(|e| format!("Failed to list ingredients: {}", e))?;
    let total = Ingredient::count(&conn)
        .map_err(|e| format!("Failed to count ingredients: {}", e))?;

    Ok(ListIngredientsResponse {
        items,
        total,
        limit,
        offset,
    })
}

/// Update an ingredient. Existing meal logs keep their frozen totals.
pub fn update_ingredient(
    db: &Database,
    id: i64,
    data: IngredientUpdate,
) -> Result<UpdateIngredientResponse, String> {
    if let Some(ref name) = data.name {
        if name.trim().is_empty() {
            return Err("Ingredient name cannot be empty".to_string());
        }
    }
    if let Some(ref unit) = data.unit {
        if unit.trim().is_empty() {
            return Err("unit cannot be empty".to_string());
        }
    }
    for (field, value) in [
        ("calories_per_unit", data.calories_per_unit),
        ("fat_per_unit", data.fat_per_unit),
        ("protein_per_unit", data.protein_per_unit),
        ("carbohydrates_per_unit", data.carbohydrates_per_unit),
    ] {
        if let Some(v) = value {
            validate_rate(field, v)?;
        }
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let updated = Ingredient::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update ingredient: {}", e))?;

    match updated {
        Some(ingredient) => {
            info!(id, "Updated ingredient");
            let warning = data.unit.as_deref().and_then(|_| unit_warning(&ingredient.unit));
            Ok(UpdateIngredientResponse {
                success: true,
                ingredient,
                warning,
            })
        }
        None => Err(format!("Ingredient not found with id: {}", id)),
    }
}

/// Delete an ingredient (blocked while any food uses it)
pub fn delete_ingredient(
    db: &Database,
    id: i64,
) -> Result<Result<DeleteIngredientSuccessResponse, DeleteIngredientBlockedResponse>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let item = Ingredient::get_by_id(&conn, id)
        .map_err(|e| format!("Database error: {}", e))?;
    if item.is_none() {
        return Err(format!("Ingredient not found with id: {}", id));
    }

    let used_in_foods = Ingredient::get_used_in_foods(&conn, id)
        .map_err(|e| format!("Failed to check usage: {}", e))?;

    if !used_in_foods.is_empty() {
        return Ok(Err(DeleteIngredientBlockedResponse {
            error: format!("Cannot delete ingredient: used in {} food(s)", used_in_foods.len()),
            used_in_foods,
        }));
    }

    Ingredient::delete(&conn, id)
        .map_err(|e| format!("Failed to delete ingredient: {}", e))?;

    info!(id, "Deleted ingredient");

    Ok(Ok(DeleteIngredientSuccessResponse {
        success: true,
        deleted_id: id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rice() -> IngredientCreate {
        IngredientCreate {
            name: "Rice".to_string(),
            unit: "g".to_string(),
            calories_per_unit: 1.3,
            fat_per_unit: 0.003,
            protein_per_unit: 0.027,
            carbohydrates_per_unit: 0.28,
        }
    }

    #[test]
    fn test_add_validates_input() {
        let db = Database::in_memory().unwrap();

        let mut bad = rice();
        bad.name = "  ".to_string();
        assert!(add_ingredient(&db, bad).is_err());

        let mut bad = rice();
        bad.fat_per_unit = -1.0;
        assert!(add_ingredient(&db, bad).unwrap_err().contains("fat_per_unit"));

        let mut bad = rice();
        bad.calories_per_unit = f64::INFINITY;
        assert!(add_ingredient(&db, bad).is_err());
    }

    #[test]
    fn test_add_rejects_duplicate_name() {
        let db = Database::in_memory().unwrap();
        add_ingredient(&db, rice()).unwrap();
        let mut dup = rice();
        dup.name = "rice".to_string();
        assert!(add_ingredient(&db, dup).unwrap_err().contains("already exists"));
    }

    #[test]
    fn test_unknown_unit_is_accepted_with_warning() {
        let db = Database::in_memory().unwrap();
        let known = add_ingredient(&db, rice()).unwrap();
        assert!(known.warning.is_none());
        assert_eq!(known.unit_category, UnitCategory::Weight);

        let mut pinch = rice();
        pinch.name = "Salt".to_string();
        pinch.unit = "pinch".to_string();
        let added = add_ingredient(&db, pinch).unwrap();
        assert!(added.warning.is_some());
        assert_eq!(added.unit_category, UnitCategory::Unknown);
    }

    #[test]
    fn test_update_and_missing_id() {
        let db = Database::in_memory().unwrap();
        let added = add_ingredient(&db, rice()).unwrap();

        let update = IngredientUpdate {
            protein_per_unit: Some(0.03),
            ..Default::default()
        };
        let response = update_ingredient(&db, added.id, update).unwrap();
        assert_eq!(response.ingredient.protein_per_unit, 0.03);

        assert!(update_ingredient(&db, 999, IngredientUpdate::default()).is_err());
        let bad = IngredientUpdate {
            calories_per_unit: Some(-5.0),
            ..Default::default()
        };
        assert!(update_ingredient(&db, added.id, bad).is_err());
    }

    #[test]
    fn test_delete_unused_ingredient() {
        let db = Database::in_memory().unwrap();
        let added = add_ingredient(&db, rice()).unwrap();
        let deleted = delete_ingredient(&db, added.id).unwrap();
        assert!(deleted.is_ok());
        assert!(get_ingredient(&db, added.id).unwrap().is_none());
        assert!(delete_ingredient(&db, added.id).is_err());
    }

    #[test]
    fn test_list_paginates() {
        let db = Database::in_memory().unwrap();
        for name in ["Rice", "Egg", "Garlic"] {
            let mut item = rice();
            item.name = name.to_string();
            add_ingredient(&db, item).unwrap();
        }
        let page = list_ingredients(&db, "name", "asc", 2, 1).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "Garlic");
    }
}
