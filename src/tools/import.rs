//! Catalog import
//!
//! Loads `{ "ingredients": [...], "foods": [...] }` exports. Food lines name
//! their ingredient (`"ingredient"` or `"name"`) or reference it by
//! `"ingredient_id"`; the quantity may be top-level or nested under the
//! association (`"food_ingredient": {"quantity": ..}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::db::{Database, DbError};
use crate::models::{Food, FoodCreate, FoodIngredientInput, Ingredient, IngredientCreate};
use crate::nutrition::{quantity_of, serving_size, TOTALS_DECIMALS};
use crate::tools::foods::validate_food;
use crate::tools::ingredients::validate_ingredient;

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub ingredients: Vec<IngredientCreate>,
    #[serde(default)]
    pub foods: Vec<CatalogFood>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogFood {
    pub name: String,
    pub serving_suggestions: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<Value>,
}

/// Outcome of an import run
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub ingredients_added: usize,
    pub ingredients_skipped: usize,
    pub foods_added: usize,
    pub foods_skipped: usize,
    pub errors: Vec<String>,
}

fn line_ingredient(conn: &rusqlite::Connection, line: &Value) -> Result<Option<Ingredient>, DbError> {
    if let Some(id) = line.get("ingredient_id").and_then(Value::as_i64) {
        return Ingredient::get_by_id(conn, id);
    }
    let name = line
        .get("ingredient")
        .or_else(|| line.get("name"))
        .and_then(Value::as_str);
    match name {
        Some(name) => Ingredient::get_by_name(conn, name),
        None => Ok(None),
    }
}

/// Import a parsed catalog. Existing names are skipped; a food whose lines
/// reference an unknown ingredient is rejected as a whole.
pub fn import_catalog(db: &Database, catalog: &CatalogFile) -> Result<ImportSummary, String> {
    let mut summary = ImportSummary::default();
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    for item in &catalog.ingredients {
        let exists = Ingredient::get_by_name(&conn, &item.name)
            .map_err(|e| format!("Database error: {}", e))?
            .is_some();
        if exists {
            summary.ingredients_skipped += 1;
            continue;
        }
        if let Err(e) = validate_ingredient(item) {
            summary.errors.push(format!("Ingredient '{}': {}", item.name, e));
            continue;
        }
        match Ingredient::create(&conn, item) {
            Ok(_) => summary.ingredients_added += 1,
            Err(e) => summary.errors.push(format!("Ingredient '{}': {}", item.name, e)),
        }
    }
    drop(conn);

    for food in &catalog.foods {
        let outcome = db.with_conn_mut(|conn| {
            if Food::get_by_name(conn, &food.name)?.is_some() {
                return Ok(Ok(None));
            }

            let mut inputs = Vec::with_capacity(food.ingredients.len());
            for line in &food.ingredients {
                let Some(ingredient) = line_ingredient(conn, line)? else {
                    return Ok(Err(format!("unknown ingredient in line {}", line)));
                };
                inputs.push(FoodIngredientInput {
                    ingredient_id: ingredient.id,
                    quantity: quantity_of(line),
                });
            }

            let data = FoodCreate {
                name: food.name.clone(),
                serving_suggestions: food.serving_suggestions.clone(),
                ingredients: inputs,
            };
            if let Err(e) = validate_food(&data) {
                return Ok(Err(e));
            }

            let tx = conn.transaction()?;
            let created = Food::create(&tx, &data)?;
            tx.commit()?;
            Ok(Ok(Some(created)))
        });

        let outcome = outcome
            .map_err(|e| e.to_string())
            .and_then(|result| result);

        match outcome {
            Ok(Some(created)) => {
                info!(
                    name = %created.name,
                    serving_size = serving_size(&food.ingredients, Some(TOTALS_DECIMALS)),
                    "Imported food"
                );
                summary.foods_added += 1;
            }
            Ok(None) => summary.foods_skipped += 1,
            Err(e) => {
                warn!(food = %food.name, error = %e, "Food not imported");
                summary.errors.push(format!("Food '{}': {}", food.name, e));
            }
        }
    }

    Ok(summary)
}
