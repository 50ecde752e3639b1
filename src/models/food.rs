//! Food model
//!
//! A catalog food is a named set of ingredient quantities. Its nutrition and
//! serving size are always derived from those quantities.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::nutrition::{
    aggregate, contribution, effective_quantity, serving_size, ComponentMultipliers,
    QuantityRecord, TOTALS_DECIMALS,
};
use super::{Ingredient, NutritionTotals};

/// A catalog food
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub serving_suggestions: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// An ingredient of a food with its quantity in the ingredient's own unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodIngredient {
    pub ingredient: Ingredient,
    pub quantity: f64,
}

/// Ingredient reference used when creating or replacing a food's ingredients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodIngredientInput {
    pub ingredient_id: i64,
    pub quantity: f64,
}

/// Data for creating a new food
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodCreate {
    pub name: String,
    pub serving_suggestions: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<FoodIngredientInput>,
}

/// Data for updating a food. `ingredients`, when present, replaces the full list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodUpdate {
    pub name: Option<String>,
    pub serving_suggestions: Option<String>,
    pub ingredients: Option<Vec<FoodIngredientInput>>,
}

/// One ingredient line after quantity resolution
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedIngredient {
    pub ingredient_id: i64,
    pub name: String,
    pub unit: String,
    pub base_quantity: f64,
    /// Base quantity scaled by the detected component count, if any
    pub quantity: f64,
    pub nutrition: NutritionTotals,
}

impl QuantityRecord for ResolvedIngredient {
    fn quantity(&self) -> Option<f64> {
        Some(self.quantity)
    }
}

/// Derived nutrition for a food
#[derive(Debug, Clone, Serialize)]
pub struct FoodNutrition {
    pub ingredients: Vec<ResolvedIngredient>,
    pub totals: NutritionTotals,
    pub serving_size: f64,
}

/// Compute a food's totals and serving size from its ingredient lines.
/// Detected component counts scale the stored quantities; without them the
/// stored quantities are used as-is.
pub fn calculate_food_nutrition(
    ingredients: &[FoodIngredient],
    multipliers: Option<&ComponentMultipliers>,
) -> FoodNutrition {
    let mut contributions = Vec::with_capacity(ingredients.len());
    let mut resolved = Vec::with_capacity(ingredients.len());

    for line in ingredients {
        let ingredient = &line.ingredient;
        let quantity = effective_quantity(&ingredient.name, line.quantity, multipliers);
        // Catalog quantities are already in the rate unit
        let nutrition = contribution(&ingredient.rates(), quantity, &ingredient.unit);

        contributions.push(nutrition);
        resolved.push(ResolvedIngredient {
            ingredient_id: ingredient.id,
            name: ingredient.name.clone(),
            unit: ingredient.unit.clone(),
            base_quantity: line.quantity,
            quantity,
            nutrition: nutrition.rounded(TOTALS_DECIMALS),
        });
    }

    let totals = aggregate(contributions);
    let serving = serving_size(&resolved, Some(TOTALS_DECIMALS));

    tracing::debug!(
        lines = resolved.len(),
        calories = totals.calories,
        serving_size = serving,
        "Calculated food nutrition"
    );

    FoodNutrition {
        ingredients: resolved,
        totals,
        serving_size: serving,
    }
}

/// Merge repeated ingredient ids by summing their quantities, keeping first-seen order
fn merge_inputs(inputs: &[FoodIngredientInput]) -> Vec<FoodIngredientInput> {
    let mut merged: Vec<FoodIngredientInput> = Vec::with_capacity(inputs.len());
    for input in inputs {
        match merged.iter_mut().find(|m| m.ingredient_id == input.ingredient_id) {
            Some(existing) => existing.quantity += input.quantity,
            None => merged.push(input.clone()),
        }
    }
    merged
}

impl Food {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            serving_suggestions: row.get("serving_suggestions")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a food and its ingredient lines.
    ///
    /// An unknown ingredient id fails with `DbError::MissingIngredient`; run this
    /// inside a transaction so the partial insert is rolled back.
    pub fn create(conn: &Connection, data: &FoodCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO foods (name, serving_suggestions) VALUES (?1, ?2)",
            params![data.name.trim(), data.serving_suggestions],
        )?;

        let id = conn.last_insert_rowid();
        Self::insert_ingredients(conn, id, &data.ingredients)?;

        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound { entity: "Food", id })
    }

    fn insert_ingredients(
        conn: &Connection,
        food_id: i64,
        inputs: &[FoodIngredientInput],
    ) -> DbResult<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO food_ingredients (food_id, ingredient_id, quantity) VALUES (?1, ?2, ?3)",
        )?;

        for input in merge_inputs(inputs) {
            if Ingredient::get_by_id(conn, input.ingredient_id)?.is_none() {
                return Err(DbError::MissingIngredient(input.ingredient_id));
            }
            stmt.execute(params![food_id, input.ingredient_id, input.quantity])?;
        }

        Ok(())
    }

    /// Get a food by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM foods WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(food) => Ok(Some(food)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a food by name (case-insensitive, surrounding whitespace ignored)
    pub fn get_by_name(conn: &Connection, name: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM foods WHERE name = ?1 COLLATE NOCASE")?;

        match stmt.query_row([name.trim()], Self::from_row) {
            Ok(food) => Ok(Some(food)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all foods ordered by name
    pub fn list_all(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM foods ORDER BY name ASC")?;

        let foods = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(foods)
    }

    /// Ingredient lines of a food, ingredient details included
    pub fn get_ingredients(conn: &Connection, food_id: i64) -> DbResult<Vec<FoodIngredient>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT i.*, fi.quantity AS line_quantity
            FROM food_ingredients fi
            INNER JOIN ingredients i ON fi.ingredient_id = i.id
            WHERE fi.food_id = ?1
            ORDER BY fi.id
            "#,
        )?;

        let lines = stmt
            .query_map([food_id], |row| {
                Ok(FoodIngredient {
                    ingredient: Ingredient {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        unit: row.get("unit")?,
                        calories_per_unit: row.get("calories_per_unit")?,
                        fat_per_unit: row.get("fat_per_unit")?,
                        protein_per_unit: row.get("protein_per_unit")?,
                        carbohydrates_per_unit: row.get("carbohydrates_per_unit")?,
                        created_at: row.get("created_at")?,
                        updated_at: row.get("updated_at")?,
                    },
                    quantity: row.get("line_quantity")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lines)
    }

    /// Update a food. Replacing ingredients has the same missing-id policy as `create`.
    pub fn update(conn: &Connection, id: i64, data: &FoodUpdate) -> DbResult<Option<Self>> {
        if Self::get_by_id(conn, id)?.is_none() {
            return Ok(None);
        }

        if let Some(ref name) = data.name {
            conn.execute(
                "UPDATE foods SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name.trim(), id],
            )?;
        }
        if let Some(ref suggestions) = data.serving_suggestions {
            conn.execute(
                "UPDATE foods SET serving_suggestions = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![suggestions, id],
            )?;
        }
        if let Some(ref inputs) = data.ingredients {
            conn.execute("DELETE FROM food_ingredients WHERE food_id = ?1", [id])?;
            Self::insert_ingredients(conn, id, inputs)?;
            conn.execute(
                "UPDATE foods SET updated_at = datetime('now') WHERE id = ?1",
                [id],
            )?;
        }

        Self::get_by_id(conn, id)
    }

    /// Number of meal logs referencing this food
    pub fn get_meal_usage_count(conn: &Connection, id: i64) -> DbResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM meal_logs WHERE food_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete a food and its ingredient lines. Meal logs keep their frozen totals.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM foods WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::IngredientCreate;
    use serde_json::json;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn add_ingredient(conn: &Connection, name: &str, calories: f64) -> Ingredient {
        Ingredient::create(
            conn,
            &IngredientCreate {
                name: name.to_string(),
                unit: "g".to_string(),
                calories_per_unit: calories,
                fat_per_unit: 0.0,
                protein_per_unit: 0.0,
                carbohydrates_per_unit: 0.0,
            },
        )
        .unwrap()
    }

    fn fried_rice(conn: &Connection) -> Food {
        let rice = add_ingredient(conn, "Rice", 1.3);
        let egg = add_ingredient(conn, "Egg", 1.5);
        Food::create(
            conn,
            &FoodCreate {
                name: "Fried Rice".to_string(),
                serving_suggestions: Some("Serve hot".to_string()),
                ingredients: vec![
                    FoodIngredientInput { ingredient_id: rice.id, quantity: 200.0 },
                    FoodIngredientInput { ingredient_id: egg.id, quantity: 50.0 },
                ],
            },
        )
        .unwrap()
    }

    #[test]
    fn test_fried_rice_without_multipliers() {
        let conn = setup();
        let food = fried_rice(&conn);
        let lines = Food::get_ingredients(&conn, food.id).unwrap();

        let nutrition = calculate_food_nutrition(&lines, None);
        assert_eq!(nutrition.totals.calories, 335.0);
        assert_eq!(nutrition.serving_size, 250.0);
    }

    #[test]
    fn test_fried_rice_with_detected_eggs() {
        let conn = setup();
        let food = fried_rice(&conn);
        let lines = Food::get_ingredients(&conn, food.id).unwrap();

        let multipliers = ComponentMultipliers::from_value(&json!({"egg": 2}));
        let nutrition = calculate_food_nutrition(&lines, Some(&multipliers));

        let egg = nutrition.ingredients.iter().find(|l| l.name == "Egg").unwrap();
        assert_eq!(egg.quantity, 100.0);
        assert_eq!(egg.base_quantity, 50.0);
        assert_eq!(egg.nutrition.calories, 150.0);
        assert_eq!(nutrition.totals.calories, 410.0);
    }

    #[test]
    fn test_food_without_ingredients_is_zero() {
        let nutrition = calculate_food_nutrition(&[], None);
        assert_eq!(nutrition.totals, NutritionTotals::zero());
        assert_eq!(nutrition.serving_size, 0.0);
    }

    #[test]
    fn test_missing_ingredient_fails_create() {
        let conn = setup();
        let result = Food::create(
            &conn,
            &FoodCreate {
                name: "Mystery".to_string(),
                serving_suggestions: None,
                ingredients: vec![FoodIngredientInput { ingredient_id: 999, quantity: 1.0 }],
            },
        );
        assert!(matches!(result, Err(DbError::MissingIngredient(999))));
    }

    #[test]
    fn test_repeated_ingredient_ids_are_summed() {
        let conn = setup();
        let rice = add_ingredient(&conn, "Rice", 1.3);
        let food = Food::create(
            &conn,
            &FoodCreate {
                name: "Plain Rice".to_string(),
                serving_suggestions: None,
                ingredients: vec![
                    FoodIngredientInput { ingredient_id: rice.id, quantity: 100.0 },
                    FoodIngredientInput { ingredient_id: rice.id, quantity: 50.0 },
                ],
            },
        )
        .unwrap();

        let lines = Food::get_ingredients(&conn, food.id).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 150.0);
    }

    #[test]
    fn test_update_replaces_ingredients() {
        let conn = setup();
        let food = fried_rice(&conn);
        let rice = Ingredient::get_by_name(&conn, "rice").unwrap().unwrap();

        let update = FoodUpdate {
            name: Some("Rice Only".to_string()),
            ingredients: Some(vec![FoodIngredientInput { ingredient_id: rice.id, quantity: 300.0 }]),
            ..Default::default()
        };
        let updated = Food::update(&conn, food.id, &update).unwrap().unwrap();
        assert_eq!(updated.name, "Rice Only");

        let lines = Food::get_ingredients(&conn, food.id).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(calculate_food_nutrition(&lines, None).totals.calories, 390.0);
    }

    #[test]
    fn test_ingredient_in_use_cannot_be_deleted() {
        let conn = setup();
        fried_rice(&conn);
        let egg = Ingredient::get_by_name(&conn, "Egg").unwrap().unwrap();
        assert!(Ingredient::delete(&conn, egg.id).is_err());
        assert_eq!(Ingredient::get_used_in_foods(&conn, egg.id).unwrap(), vec!["Fried Rice"]);
    }

    #[test]
    fn test_get_by_name_ignores_case() {
        let conn = setup();
        fried_rice(&conn);
        assert!(Food::get_by_name(&conn, "fried rice ").unwrap().is_some());
    }
}
