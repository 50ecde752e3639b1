//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
        tracing::info!("Applied schema migration v1");
    }

    if current_version < 2 {
        migrate_v2(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (2)", [])?;
        tracing::info!("Applied schema migration v2");
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- INGREDIENTS
        -- Per-unit macro rates, "per one `unit`"
        -- ============================================
        CREATE TABLE ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            unit TEXT NOT NULL,                  -- e.g. "g", "ml", "กรัม"
            calories_per_unit REAL NOT NULL DEFAULT 0,
            fat_per_unit REAL NOT NULL DEFAULT 0,
            protein_per_unit REAL NOT NULL DEFAULT 0,
            carbohydrates_per_unit REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- FOODS
        -- Nutrition is derived from food_ingredients, never stored
        -- ============================================
        CREATE TABLE foods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            serving_suggestions TEXT,
            serving_size REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- FOOD INGREDIENTS
        -- Quantity is expressed in the ingredient's own unit
        -- ============================================
        CREATE TABLE food_ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
            ingredient_id INTEGER NOT NULL REFERENCES ingredients(id) ON DELETE RESTRICT,
            quantity REAL NOT NULL CHECK(quantity >= 0),
            UNIQUE(food_id, ingredient_id)
        );

        CREATE INDEX idx_food_ingredients_food ON food_ingredients(food_id);
        CREATE INDEX idx_food_ingredients_ingredient ON food_ingredients(ingredient_id);

        -- ============================================
        -- MEAL LOGS
        -- Calculated totals are frozen at log time
        -- ============================================
        CREATE TABLE meal_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            food_id INTEGER REFERENCES foods(id) ON DELETE SET NULL,
            consumed_at TEXT NOT NULL,           -- UTC, "%Y-%m-%dT%H:%M:%SZ"
            custom_ingredients TEXT NOT NULL DEFAULT '[]',  -- JSON array
            calculated_calories REAL NOT NULL DEFAULT 0,
            calculated_fat REAL NOT NULL DEFAULT 0,
            calculated_protein REAL NOT NULL DEFAULT 0,
            calculated_carbohydrates REAL NOT NULL DEFAULT 0,
            notes TEXT,
            custom_name TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_meal_logs_user ON meal_logs(user_id);
        CREATE INDEX idx_meal_logs_consumed ON meal_logs(user_id, consumed_at);
        "#,
    )?;

    Ok(())
}

/// Migration v2: serving size is derived from ingredient quantities
fn migrate_v2(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("ALTER TABLE foods DROP COLUMN serving_size;")?;
    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}
