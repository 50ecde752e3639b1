//! Ingredient model
//!
//! Catalog entry with macro rates per one unit of its own unit label.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::nutrition::MacroRates;

/// A catalog ingredient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub calories_per_unit: f64,
    pub fat_per_unit: f64,
    pub protein_per_unit: f64,
    pub carbohydrates_per_unit: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new ingredient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientCreate {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub calories_per_unit: f64,
    #[serde(default)]
    pub fat_per_unit: f64,
    #[serde(default)]
    pub protein_per_unit: f64,
    #[serde(default)]
    pub carbohydrates_per_unit: f64,
}

/// Data for updating an ingredient
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngredientUpdate {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub calories_per_unit: Option<f64>,
    pub fat_per_unit: Option<f64>,
    pub protein_per_unit: Option<f64>,
    pub carbohydrates_per_unit: Option<f64>,
}

impl Ingredient {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            unit: row.get("unit")?,
            calories_per_unit: row.get("calories_per_unit")?,
            fat_per_unit: row.get("fat_per_unit")?,
            protein_per_unit: row.get("protein_per_unit")?,
            carbohydrates_per_unit: row.get("carbohydrates_per_unit")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Macro rates tagged with this ingredient's unit
    pub fn rates(&self) -> MacroRates {
        MacroRates {
            unit: self.unit.clone(),
            calories: self.calories_per_unit,
            fat: self.fat_per_unit,
            protein: self.protein_per_unit,
            carbohydrates: self.carbohydrates_per_unit,
        }
    }

    /// Insert a new ingredient
    pub fn create(conn: &Connection, data: &IngredientCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO ingredients (
                name, unit, calories_per_unit, fat_per_unit, protein_per_unit, carbohydrates_per_unit
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                data.name.trim(),
                data.unit.trim(),
                data.calories_per_unit,
                data.fat_per_unit,
                data.protein_per_unit,
                data.carbohydrates_per_unit,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound { entity: "Ingredient", id })
    }

    /// Get an ingredient by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM ingredients WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get an ingredient by name (case-insensitive, surrounding whitespace ignored)
    pub fn get_by_name(conn: &Connection, name: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM ingredients WHERE name = ?1 COLLATE NOCASE")?;

        match stmt.query_row([name.trim()], Self::from_row) {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Search ingredients by name substring
    pub fn search(conn: &Connection, query: &str, limit: i64) -> DbResult<Vec<Self>> {
        let pattern = format!("%{}%", query.trim());
        let mut stmt = conn.prepare(
            "SELECT * FROM ingredients WHERE name LIKE ?1 ORDER BY name ASC LIMIT ?2",
        )?;

        let items = stmt
            .query_map(params![pattern, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// List ingredients with sorting and pagination
    pub fn list(
        conn: &Connection,
        sort_by: &str,
        sort_order: &str,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let order = if sort_order.eq_ignore_ascii_case("desc") { "DESC" } else { "ASC" };
        let sort_col = match sort_by.to_lowercase().as_str() {
            "created_at" => "created_at",
            "calories" => "calories_per_unit",
            _ => "name",
        };

        let sql = format!(
            "SELECT * FROM ingredients ORDER BY {} {} LIMIT ?1 OFFSET ?2",
            sort_col, order
        );
        let mut stmt = conn.prepare(&sql)?;

        let items = stmt
            .query_map(params![limit, offset], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub fn count(conn: &Connection) -> DbResult<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ingredients", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Update an ingredient
    pub fn update(conn: &Connection, id: i64, data: &IngredientUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        macro_rules! add_update {
            ($field:ident) => {
                if let Some(ref val) = data.$field {
                    updates.push(format!("{} = ?{}", stringify!($field), params_vec.len() + 1));
                    params_vec.push(Box::new(val.clone()));
                }
            };
        }

        if let Some(ref name) = data.name {
            updates.push(format!("name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(name.trim().to_string()));
        }
        if let Some(ref unit) = data.unit {
            updates.push(format!("unit = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(unit.trim().to_string()));
        }
        add_update!(calories_per_unit);
        add_update!(fat_per_unit);
        add_update!(protein_per_unit);
        add_update!(carbohydrates_per_unit);

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE ingredients SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );
        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Names of foods that use this ingredient
    pub fn get_used_in_foods(conn: &Connection, id: i64) -> DbResult<Vec<String>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT f.name FROM foods f
            INNER JOIN food_ingredients fi ON f.id = fi.food_id
            WHERE fi.ingredient_id = ?1
            ORDER BY f.name
            "#,
        )?;

        let names = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    /// Delete an ingredient. Fails with a foreign key error while a food uses it.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM ingredients WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn egg() -> IngredientCreate {
        IngredientCreate {
            name: "Egg".to_string(),
            unit: "g".to_string(),
            calories_per_unit: 1.5,
            fat_per_unit: 0.1,
            protein_per_unit: 0.13,
            carbohydrates_per_unit: 0.01,
        }
    }

    #[test]
    fn test_create_and_get() {
        let conn = setup();
        let created = Ingredient::create(&conn, &egg()).unwrap();
        let fetched = Ingredient::get_by_id(&conn, created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Egg");
        assert_eq!(fetched.rates().calories, 1.5);
        assert_eq!(fetched.rates().unit, "g");
    }

    #[test]
    fn test_get_by_name_is_case_insensitive() {
        let conn = setup();
        Ingredient::create(&conn, &egg()).unwrap();
        assert!(Ingredient::get_by_name(&conn, " egg ").unwrap().is_some());
        assert!(Ingredient::get_by_name(&conn, "rice").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let conn = setup();
        Ingredient::create(&conn, &egg()).unwrap();
        let mut dup = egg();
        dup.name = "EGG".to_string();
        assert!(Ingredient::create(&conn, &dup).is_err());
    }

    #[test]
    fn test_update_partial() {
        let conn = setup();
        let created = Ingredient::create(&conn, &egg()).unwrap();
        let update = IngredientUpdate {
            calories_per_unit: Some(1.55),
            ..Default::default()
        };
        let updated = Ingredient::update(&conn, created.id, &update).unwrap().unwrap();
        assert_eq!(updated.calories_per_unit, 1.55);
        assert_eq!(updated.fat_per_unit, 0.1);
    }

    #[test]
    fn test_search_and_list() {
        let conn = setup();
        Ingredient::create(&conn, &egg()).unwrap();
        let mut rice = egg();
        rice.name = "Jasmine Rice".to_string();
        rice.calories_per_unit = 1.3;
        Ingredient::create(&conn, &rice).unwrap();

        assert_eq!(Ingredient::search(&conn, "rice", 10).unwrap().len(), 1);
        let by_calories = Ingredient::list(&conn, "calories", "desc", 10, 0).unwrap();
        assert_eq!(by_calories[0].name, "Egg");
        assert_eq!(Ingredient::count(&conn).unwrap(), 2);
    }
}
