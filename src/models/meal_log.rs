//! Meal log model
//!
//! A logged meal freezes its calculated totals at log time. Later edits
//! replace stored fields with the submitted values and never recompute.

use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::{DbError, DbResult};
use crate::nutrition::{
    aggregate, contribution, custom_quantity_in_grams, deserialize_amount, round_to, TOTALS_DECIMALS,
};
use super::{FoodIngredient, Ingredient, NutritionTotals};

/// One user-entered ingredient line of a meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomIngredient {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub quantity: f64,
    /// Unit of `quantity`; empty means the ingredient's own unit
    #[serde(default)]
    pub unit: String,
}

impl From<&FoodIngredient> for CustomIngredient {
    fn from(line: &FoodIngredient) -> Self {
        Self {
            id: Some(line.ingredient.id),
            name: line.ingredient.name.clone(),
            quantity: line.quantity,
            unit: line.ingredient.unit.clone(),
        }
    }
}

/// A logged meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealLog {
    pub id: i64,
    pub user_id: i64,
    pub food_id: Option<i64>,
    /// UTC, `%Y-%m-%dT%H:%M:%SZ`
    pub consumed_at: String,
    pub custom_ingredients: Vec<CustomIngredient>,
    pub calculated: NutritionTotals,
    pub notes: Option<String>,
    pub custom_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for inserting a meal log. Totals are computed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealLogCreate {
    pub user_id: i64,
    pub food_id: Option<i64>,
    pub consumed_at: String,
    pub custom_ingredients: Vec<CustomIngredient>,
    pub calculated: NutritionTotals,
    pub notes: Option<String>,
    pub custom_name: Option<String>,
}

/// Direct field replacement for a meal log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealLogUpdate {
    pub consumed_at: Option<String>,
    pub custom_ingredients: Option<Vec<CustomIngredient>>,
    pub calculated: Option<NutritionTotals>,
    pub notes: Option<String>,
    pub custom_name: Option<String>,
}

/// Result of calculating a custom ingredient list
#[derive(Debug, Clone, Serialize)]
pub struct CustomNutrition {
    pub totals: NutritionTotals,
    /// Grams across the resolved lines
    pub weight_grams: f64,
    /// Lines whose ingredient could not be resolved
    pub skipped: Vec<CustomIngredient>,
}

fn resolve_ingredient(conn: &Connection, line: &CustomIngredient) -> DbResult<Option<Ingredient>> {
    if let Some(id) = line.id {
        if let Some(ingredient) = Ingredient::get_by_id(conn, id)? {
            return Ok(Some(ingredient));
        }
    }
    if line.name.trim().is_empty() {
        return Ok(None);
    }
    Ingredient::get_by_name(conn, &line.name)
}

/// Authoritative totals for a custom ingredient list.
///
/// Each line is resolved by id, then by name. Unresolvable lines are skipped
/// with a warning and reported back.
pub fn calculate_custom_nutrition(
    conn: &Connection,
    lines: &[CustomIngredient],
) -> DbResult<CustomNutrition> {
    let mut contributions = Vec::with_capacity(lines.len());
    let mut skipped = Vec::new();
    let mut weight_grams = 0.0;

    for line in lines {
        let Some(ingredient) = resolve_ingredient(conn, line)? else {
            warn!(id = ?line.id, name = %line.name, "Skipping unknown ingredient in meal");
            skipped.push(line.clone());
            continue;
        };

        let unit = if line.unit.trim().is_empty() {
            ingredient.unit.as_str()
        } else {
            line.unit.as_str()
        };
        weight_grams += custom_quantity_in_grams(line.quantity, unit);
        contributions.push(contribution(&ingredient.rates(), line.quantity, unit));
    }

    Ok(CustomNutrition {
        totals: aggregate(contributions),
        weight_grams: round_to(weight_grams, TOTALS_DECIMALS),
        skipped,
    })
}

fn json_column_error(idx: usize, e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

impl MealLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let raw: String = row.get("custom_ingredients")?;
        let idx = row.as_ref().column_index("custom_ingredients")?;
        let custom_ingredients =
            serde_json::from_str(&raw).map_err(|e| json_column_error(idx, e))?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            food_id: row.get("food_id")?,
            consumed_at: row.get("consumed_at")?,
            custom_ingredients,
            calculated: NutritionTotals {
                calories: row.get("calculated_calories")?,
                fat: row.get("calculated_fat")?,
                protein: row.get("calculated_protein")?,
                carbohydrates: row.get("calculated_carbohydrates")?,
            },
            notes: row.get("notes")?,
            custom_name: row.get("custom_name")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a meal log with precomputed totals
    pub fn create(conn: &Connection, data: &MealLogCreate) -> DbResult<Self> {
        let custom_json = serde_json::to_string(&data.custom_ingredients)?;

        conn.execute(
            r#"
            INSERT INTO meal_logs (
                user_id, food_id, consumed_at, custom_ingredients,
                calculated_calories, calculated_fat, calculated_protein, calculated_carbohydrates,
                notes, custom_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                data.user_id,
                data.food_id,
                data.consumed_at,
                custom_json,
                data.calculated.calories,
                data.calculated.fat,
                data.calculated.protein,
                data.calculated.carbohydrates,
                data.notes,
                data.custom_name,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound { entity: "Meal log", id })
    }

    /// Get a meal log by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM meal_logs WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Meal logs of a user, newest first, optionally limited to one UTC date (YYYY-MM-DD)
    pub fn list_for_user(
        conn: &Connection,
        user_id: i64,
        date: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM meal_logs
            WHERE user_id = ?1 AND (?2 IS NULL OR substr(consumed_at, 1, 10) = ?2)
            ORDER BY consumed_at DESC, id DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )?;

        let logs = stmt
            .query_map(params![user_id, date, limit, offset], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }

    /// Replace the given fields. Stored totals are taken as submitted.
    pub fn update(conn: &Connection, id: i64, data: &MealLogUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref consumed_at) = data.consumed_at {
            updates.push(format!("consumed_at = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(consumed_at.clone()));
        }
        if let Some(ref lines) = data.custom_ingredients {
            updates.push(format!("custom_ingredients = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(serde_json::to_string(lines)?));
        }
        if let Some(totals) = data.calculated {
            for (column, value) in [
                ("calculated_calories", totals.calories),
                ("calculated_fat", totals.fat),
                ("calculated_protein", totals.protein),
                ("calculated_carbohydrates", totals.carbohydrates),
            ] {
                updates.push(format!("{} = ?{}", column, params_vec.len() + 1));
                params_vec.push(Box::new(value));
            }
        }
        if let Some(ref notes) = data.notes {
            updates.push(format!("notes = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(notes.clone()));
        }
        if let Some(ref custom_name) = data.custom_name {
            updates.push(format!("custom_name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(custom_name.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE meal_logs SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );
        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a meal log
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM meal_logs WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

/// Sum of stored totals for one user and UTC date, with the number of meals
pub fn daily_totals(conn: &Connection, user_id: i64, date: &str) -> DbResult<(NutritionTotals, i64)> {
    let mut stmt = conn.prepare(
        r#"
        SELECT calculated_calories, calculated_fat, calculated_protein, calculated_carbohydrates
        FROM meal_logs
        WHERE user_id = ?1 AND substr(consumed_at, 1, 10) = ?2
        "#,
    )?;

    let rows = stmt
        .query_map(params![user_id, date], |row| {
            Ok(NutritionTotals {
                calories: row.get(0)?,
                fat: row.get(1)?,
                protein: row.get(2)?,
                carbohydrates: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let count = rows.len() as i64;
    Ok((aggregate(rows), count))
}
