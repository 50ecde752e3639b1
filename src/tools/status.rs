//! Nutrilog Status Tool
//!
//! Provides runtime status information about the Nutrilog service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::db::migrations::get_schema_version;
use crate::db::Database;

/// Meal logging instructions for AI assistants
pub const MEAL_INSTRUCTIONS: &str = r#"
# Nutrilog Meal Logging Instructions

## Catalog

- **Ingredients** carry four rates per one of their own unit:
  `calories_per_unit`, `fat_per_unit`, `protein_per_unit`, `carbohydrates_per_unit`.
  Prefer `g` or `ml` as the unit. Thai labels (กรัม, มล., ช้อนโต๊ะ, ...) are understood.
- **Foods** are named lists of `{ingredient_id, quantity}` where the quantity is in the
  ingredient's own unit. Nutrition and serving size are always derived, never entered.

Use `search_ingredients` before `add_ingredient`; names are unique (case-insensitive).

## Logging a meal

1. Catalog food as eaten: `log_meal` with `food_id` only. The food's ingredient lines are
   copied into the meal so later catalog edits do not change it.
2. Custom portion: `log_meal` with `custom_ingredients`:
   `[{"id": 3, "name": "Rice", "quantity": 150, "unit": "g"}]`.
   Quantities may use any known unit (g, kg, ml, tsp, tbsp, cup, ...); they are converted
   to the ingredient's unit. Lines whose ingredient can't be found are skipped and listed
   under `skipped_ingredients`.
3. Call `preview_meal` first to show the user the totals. Pass those totals back as
   `client_totals`; any mismatch with the server calculation is reported.

The server always computes the stored totals (2 decimals). Timestamps accept RFC 3339 or
`YYYY-MM-DDTHH:MM:SS` (taken as UTC) and default to now.

## Photos

`identify_food_photo` sends an image to the detection service and looks up each detected
food. Detected component counts (e.g. two eggs) scale the matching ingredient quantities.

## Corrections

`update_meal` replaces fields exactly as given. Totals are NOT recalculated; send new
totals along with new ingredients if they should change.

## Daily progress

`daily_summary` sums the stored totals of a user's meals for one UTC date.
"#;

/// Status information for the Nutrilog service
#[derive(Debug, Serialize)]
pub struct NutrilogStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub schema_version: Option<i32>,
    pub ingredient_count: Option<i64>,
    pub food_count: Option<i64>,
    pub meal_count: Option<i64>,

    /// Photo detection service configured
    pub detection_enabled: bool,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
    detection_enabled: bool,
}

fn table_count(conn: &rusqlite::Connection, table: &str) -> Option<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .ok()
}

impl StatusTracker {
    /// Create a new status tracker
    pub fn new(database_path: PathBuf, detection_enabled: bool) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
            detection_enabled,
        }
    }

    /// Get the current status. Database figures are omitted when unavailable.
    pub fn get_status(&self, db: &Database) -> NutrilogStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let conn = db.get_conn().ok();
        let schema_version = conn.as_ref().and_then(|c| get_schema_version(c).ok());
        let ingredient_count = conn.as_ref().and_then(|c| table_count(c, "ingredients"));
        let food_count = conn.as_ref().and_then(|c| table_count(c, "foods"));
        let meal_count = conn.as_ref().and_then(|c| table_count(c, "meal_logs"));

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        NutrilogStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            schema_version,
            ingredient_count,
            food_count,
            meal_count,
            detection_enabled: self.detection_enabled,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::SCHEMA_VERSION;

    #[test]
    fn test_status_reports_database() {
        let db = Database::in_memory().unwrap();
        let tracker = StatusTracker::new(PathBuf::from("/nonexistent/nutrilog.db"), false);
        let status = tracker.get_status(&db);

        assert_eq!(status.schema_version, Some(SCHEMA_VERSION));
        assert_eq!(status.ingredient_count, Some(0));
        assert_eq!(status.meal_count, Some(0));
        assert!(status.database_size_bytes.is_none());
        assert!(!status.detection_enabled);
        assert_eq!(status.process_id, std::process::id());
    }

    #[test]
    fn test_instructions_name_the_tools() {
        for tool in ["log_meal", "preview_meal", "update_meal", "daily_summary", "identify_food_photo"] {
            assert!(MEAL_INSTRUCTIONS.contains(tool), "missing {}", tool);
        }
    }
}
