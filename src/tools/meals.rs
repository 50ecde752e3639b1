//! Meal Log MCP Tools
//!
//! Logging recomputes totals on the server; client totals are only compared.
//! Edits afterwards replace stored values as submitted.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::Database;
use crate::models::{
    calculate_custom_nutrition, daily_totals, CustomIngredient, Food, MealLog, MealLogCreate,
    MealLogUpdate, NutritionTotals,
};
use crate::nutrition::totals_discrepancy;

/// Stored timestamp format (UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Request for log_meal
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogMealRequest {
    pub user_id: i64,
    pub food_id: Option<i64>,
    pub consumed_at: Option<String>,
    #[serde(default)]
    pub custom_ingredients: Vec<CustomIngredient>,
    pub notes: Option<String>,
    pub custom_name: Option<String>,
    /// Totals the client previewed, compared against the server result
    pub client_totals: Option<NutritionTotals>,
}

/// Difference between client-previewed and server-computed totals
#[derive(Debug, Serialize)]
pub struct TotalsMismatch {
    pub client: NutritionTotals,
    pub server: NutritionTotals,
    pub max_difference: f64,
}

/// Response for log_meal
#[derive(Debug, Serialize)]
pub struct LogMealResponse {
    pub meal: MealLog,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_ingredients: Vec<CustomIngredient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals_mismatch: Option<TotalsMismatch>,
}

/// Response for preview_meal
#[derive(Debug, Serialize)]
pub struct PreviewMealResponse {
    pub nutrition: NutritionTotals,
    /// Sum of line quantities converted to grams (milliliters count as grams)
    pub total_weight_grams: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_ingredients: Vec<CustomIngredient>,
}

/// Response for list_meals
#[derive(Debug, Serialize)]
pub struct ListMealsResponse {
    pub meals: Vec<MealLog>,
    pub count: usize,
    pub limit: i64,
    pub offset: i64,
}

/// Response for delete_meal
#[derive(Debug, Serialize)]
pub struct DeleteMealResponse {
    pub success: bool,
    pub deleted_id: i64,
}

/// Response for daily_summary
#[derive(Debug, Serialize)]
pub struct DailySummaryResponse {
    pub user_id: i64,
    pub date: String,
    pub meal_count: i64,
    pub totals: NutritionTotals,
}

/// Normalize a timestamp to UTC `%Y-%m-%dT%H:%M:%SZ`.
///
/// Accepts RFC 3339 (any offset), naive ISO date-times (taken as UTC) and
/// bare dates (midnight UTC).
pub fn normalize_timestamp(raw: &str) -> Result<String, String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc().format(TIMESTAMP_FORMAT).to_string());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().format(TIMESTAMP_FORMAT).to_string());
        }
    }

    Err(format!(
        "Invalid timestamp '{}': expected RFC 3339 or YYYY-MM-DDTHH:MM:SS",
        raw
    ))
}

fn validate_date(date: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map(|d| d.format(DATE_FORMAT).to_string())
        .map_err(|_| format!("Invalid date format '{}': expected YYYY-MM-DD", date))
}

/// Compute totals for a custom ingredient list without saving anything
pub fn preview_meal(db: &Database, lines: &[CustomIngredient]) -> Result<PreviewMealResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let calc = calculate_custom_nutrition(&conn, lines)
        .map_err(|e| format!("Failed to calculate meal: {}", e))?;

    Ok(PreviewMealResponse {
        nutrition: calc.totals,
        total_weight_grams: calc.weight_grams,
        skipped_ingredients: calc.skipped,
    })
}

/// Log a meal. Totals are computed here and frozen.
pub fn log_meal(db: &Database, request: LogMealRequest) -> Result<LogMealResponse, String> {
    if request.user_id <= 0 {
        return Err("user_id must be a positive integer".to_string());
    }

    let consumed_at = match request.consumed_at.as_deref() {
        Some(raw) if !raw.trim().is_empty() => normalize_timestamp(raw)?,
        _ => Utc::now().format(TIMESTAMP_FORMAT).to_string(),
    };

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let mut lines = request.custom_ingredients;
    if let Some(food_id) = request.food_id {
        if Food::get_by_id(&conn, food_id)
            .map_err(|e| format!("Database error: {}", e))?
            .is_none()
        {
            return Err(format!("Food not found with id: {}", food_id));
        }

        // Snapshot the catalog lines so later catalog edits don't alter this meal
        if lines.is_empty() {
            lines = Food::get_ingredients(&conn, food_id)
                .map_err(|e| format!("Failed to load food ingredients: {}", e))?
                .iter()
                .map(CustomIngredient::from)
                .collect();
        }
    } else if lines.is_empty() {
        return Err("Either food_id or custom_ingredients must be provided".to_string());
    }

    let calc = calculate_custom_nutrition(&conn, &lines)
        .map_err(|e| format!("Failed to calculate meal: {}", e))?;

    let totals_mismatch = request.client_totals.and_then(|client| {
        totals_discrepancy(&calc.totals, &client).map(|max_difference| {
            warn!(
                user_id = request.user_id,
                client_calories = client.calories,
                server_calories = calc.totals.calories,
                max_difference,
                "Client meal totals differ from server calculation"
            );
            TotalsMismatch {
                client,
                server: calc.totals,
                max_difference,
            }
        })
    });

    let meal = MealLog::create(
        &conn,
        &MealLogCreate {
            user_id: request.user_id,
            food_id: request.food_id,
            consumed_at,
            custom_ingredients: lines,
            calculated: calc.totals,
            notes: request.notes,
            custom_name: request.custom_name,
        },
    )
    .map_err(|e| format!("Failed to log meal: {}", e))?;

    info!(
        id = meal.id,
        user_id = meal.user_id,
        calories = meal.calculated.calories,
        "Logged meal"
    );

    Ok(LogMealResponse {
        meal,
        skipped_ingredients: calc.skipped,
        totals_mismatch,
    })
}

/// Get a logged meal by ID
pub fn get_meal(db: &Database, id: i64) -> Result<Option<MealLog>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    MealLog::get_by_id(&conn, id).map_err(|e| format!("Failed to get meal: {}", e))
}

/// List a user's meals, optionally for one date
pub fn list_meals(
    db: &Database,
    user_id: i64,
    date: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<ListMealsResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);
    let date = date.map(validate_date).transpose()?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meals = MealLog::list_for_user(&conn, user_id, date.as_deref(), limit, offset)
        .map_err(|e| format!("Failed to list meals: {}", e))?;
    let count = meals.len();

    Ok(ListMealsResponse {
        meals,
        count,
        limit,
        offset,
    })
}

/// Replace meal fields with the submitted values. Nothing is recomputed.
pub fn update_meal(db: &Database, id: i64, mut data: MealLogUpdate) -> Result<MealLog, String> {
    if let Some(ref totals) = data.calculated {
        if !totals.is_valid() {
            return Err("Meal totals must be finite and non-negative".to_string());
        }
    }
    if let Some(raw) = data.consumed_at.take() {
        data.consumed_at = Some(normalize_timestamp(&raw)?);
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let updated = MealLog::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update meal: {}", e))?;

    match updated {
        Some(meal) => {
            info!(id, "Updated meal");
            Ok(meal)
        }
        None => Err(format!("Meal not found with id: {}", id)),
    }
}

/// Delete a logged meal
pub fn delete_meal(db: &Database, id: i64) -> Result<DeleteMealResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let deleted = MealLog::delete(&conn, id)
        .map_err(|e| format!("Failed to delete meal: {}", e))?;

    if !deleted {
        return Err(format!("Meal not found with id: {}", id));
    }

    info!(id, "Deleted meal");

    Ok(DeleteMealResponse {
        success: true,
        deleted_id: id,
    })
}

/// Sum of a user's stored meal totals for one UTC date (default today)
pub fn daily_summary(
    db: &Database,
    user_id: i64,
    date: Option<&str>,
) -> Result<DailySummaryResponse, String> {
    let date = match date {
        Some(d) => validate_date(d)?,
        None => Utc::now().format(DATE_FORMAT).to_string(),
    };

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let (totals, meal_count) = daily_totals(&conn, user_id, &date)
        .map_err(|e| format!("Failed to summarize day: {}", e))?;

    Ok(DailySummaryResponse {
        user_id,
        date,
        meal_count,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoodCreate, FoodIngredientInput, Ingredient, IngredientCreate};

    fn add_ingredient(db: &Database, name: &str, unit: &str, calories: f64) -> i64 {
        db.with_conn(|conn| {
            Ingredient::create(
                conn,
                &IngredientCreate {
                    name: name.to_string(),
                    unit: unit.to_string(),
                    calories_per_unit: calories,
                    fat_per_unit: 0.0,
                    protein_per_unit: 0.0,
                    carbohydrates_per_unit: 0.0,
                },
            )
        })
        .unwrap()
        .id
    }

    fn line(name: &str, quantity: f64, unit: &str) -> CustomIngredient {
        CustomIngredient {
            id: None,
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
        }
    }

    fn request(user_id: i64, lines: Vec<CustomIngredient>) -> LogMealRequest {
        LogMealRequest {
            user_id,
            consumed_at: Some("2026-03-01T12:30:00+07:00".to_string()),
            custom_ingredients: lines,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(
            normalize_timestamp("2026-03-01T12:30:00+07:00").unwrap(),
            "2026-03-01T05:30:00Z"
        );
        assert_eq!(
            normalize_timestamp("2026-03-01T12:30:00.250Z").unwrap(),
            "2026-03-01T12:30:00Z"
        );
        assert_eq!(
            normalize_timestamp("2026-03-01T12:30:00").unwrap(),
            "2026-03-01T12:30:00Z"
        );
        assert_eq!(normalize_timestamp("2026-03-01").unwrap(), "2026-03-01T00:00:00Z");
        assert!(normalize_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_log_meal_computes_totals() {
        let db = Database::in_memory().unwrap();
        add_ingredient(&db, "Rice", "g", 1.3);
        add_ingredient(&db, "Fish Sauce", "ml", 0.35);

        let response = log_meal(
            &db,
            request(1, vec![line("Rice", 150.0, "g"), line("fish sauce", 1.0, "tbsp")]),
        )
        .unwrap();

        // 150 * 1.3 + 15 * 0.35
        assert_eq!(response.meal.calculated.calories, 200.25);
        assert_eq!(response.meal.consumed_at, "2026-03-01T05:30:00Z");
        assert!(response.totals_mismatch.is_none());
    }

    #[test]
    fn test_log_meal_reports_client_mismatch() {
        let db = Database::in_memory().unwrap();
        add_ingredient(&db, "Rice", "g", 1.3);

        let mut req = request(1, vec![line("Rice", 100.0, "g")]);
        req.client_totals = Some(NutritionTotals {
            calories: 120.0,
            ..Default::default()
        });
        let response = log_meal(&db, req).unwrap();

        assert_eq!(response.meal.calculated.calories, 130.0);
        let mismatch = response.totals_mismatch.unwrap();
        assert_eq!(mismatch.max_difference, 10.0);
        assert_eq!(mismatch.client.calories, 120.0);
    }

    #[test]
    fn test_log_meal_snapshots_food_lines() {
        let db = Database::in_memory().unwrap();
        let rice = add_ingredient(&db, "Rice", "g", 1.3);
        let egg = add_ingredient(&db, "Egg", "g", 1.5);
        let food = crate::tools::foods::create_food(
            &db,
            FoodCreate {
                name: "Fried Rice".to_string(),
                serving_suggestions: None,
                ingredients: vec![
                    FoodIngredientInput { ingredient_id: rice, quantity: 200.0 },
                    FoodIngredientInput { ingredient_id: egg, quantity: 50.0 },
                ],
            },
        )
        .unwrap();

        let response = log_meal(
            &db,
            LogMealRequest {
                user_id: 1,
                food_id: Some(food.id),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(response.meal.calculated.calories, 335.0);
        assert_eq!(response.meal.custom_ingredients.len(), 2);
        assert_eq!(response.meal.custom_ingredients[0].id, Some(rice));
        assert_eq!(response.meal.custom_ingredients[0].unit, "g");
    }

    #[test]
    fn test_log_meal_requires_content() {
        let db = Database::in_memory().unwrap();
        assert!(log_meal(&db, request(1, Vec::new())).is_err());
        assert!(log_meal(&db, request(0, vec![line("Rice", 1.0, "g")])).is_err());

        let mut missing_food = request(1, Vec::new());
        missing_food.food_id = Some(77);
        assert!(log_meal(&db, missing_food).unwrap_err().contains("77"));
    }

    #[test]
    fn test_unknown_ingredient_is_skipped_not_fatal() {
        let db = Database::in_memory().unwrap();
        add_ingredient(&db, "Rice", "g", 1.3);

        let response = log_meal(
            &db,
            request(1, vec![line("Rice", 100.0, "g"), line("Unicorn", 50.0, "g")]),
        )
        .unwrap();
        assert_eq!(response.meal.calculated.calories, 130.0);
        assert_eq!(response.skipped_ingredients.len(), 1);
        // The line is still kept in the stored list
        assert_eq!(response.meal.custom_ingredients.len(), 2);
    }

    #[test]
    fn test_preview_does_not_persist() {
        let db = Database::in_memory().unwrap();
        add_ingredient(&db, "Oil", "ml", 8.0);

        let preview = preview_meal(&db, &[line("Oil", 2.0, "tsp")]).unwrap();
        assert_eq!(preview.nutrition.calories, 80.0);
        assert_eq!(preview.total_weight_grams, 10.0);

        let meals = list_meals(&db, 1, None, 50, 0).unwrap();
        assert_eq!(meals.count, 0);
    }

    #[test]
    fn test_preview_weight_uses_ingredient_unit_and_skips_unknown() {
        let db = Database::in_memory().unwrap();
        add_ingredient(&db, "Oil", "tbsp", 120.0);

        let preview = preview_meal(&db, &[line("Oil", 2.0, ""), line("Unicorn", 500.0, "g")]).unwrap();

        assert_eq!(preview.nutrition.calories, 240.0);
        assert_eq!(preview.total_weight_grams, 30.0);
        assert_eq!(preview.skipped_ingredients.len(), 1);
        assert_eq!(preview.skipped_ingredients[0].name, "Unicorn");
    }

    #[test]
    fn test_update_replaces_without_recompute() {
        let db = Database::in_memory().unwrap();
        add_ingredient(&db, "Rice", "g", 1.3);
        let logged = log_meal(&db, request(1, vec![line("Rice", 100.0, "g")])).unwrap();

        let update = MealLogUpdate {
            custom_ingredients: Some(vec![line("Rice", 300.0, "g")]),
            consumed_at: Some("2026-03-02T08:00:00Z".to_string()),
            ..Default::default()
        };
        let updated = update_meal(&db, logged.meal.id, update).unwrap();
        assert_eq!(updated.calculated.calories, 130.0);
        assert_eq!(updated.custom_ingredients[0].quantity, 300.0);
        assert_eq!(updated.consumed_at, "2026-03-02T08:00:00Z");

        let negative = MealLogUpdate {
            calculated: Some(NutritionTotals {
                calories: -1.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(update_meal(&db, logged.meal.id, negative).is_err());
        assert!(update_meal(&db, 999, MealLogUpdate::default()).is_err());
    }

    #[test]
    fn test_daily_summary_and_delete() {
        let db = Database::in_memory().unwrap();
        add_ingredient(&db, "Rice", "g", 1.3);
        let first = log_meal(&db, request(1, vec![line("Rice", 100.0, "g")])).unwrap();
        log_meal(&db, request(1, vec![line("Rice", 50.0, "g")])).unwrap();
        log_meal(&db, request(2, vec![line("Rice", 500.0, "g")])).unwrap();

        let summary = daily_summary(&db, 1, Some("2026-03-01")).unwrap();
        assert_eq!(summary.meal_count, 2);
        assert_eq!(summary.totals.calories, 195.0);

        delete_meal(&db, first.meal.id).unwrap();
        assert!(delete_meal(&db, first.meal.id).is_err());
        let summary = daily_summary(&db, 1, Some("2026-03-01")).unwrap();
        assert_eq!(summary.meal_count, 1);
        assert!(daily_summary(&db, 1, Some("03/01/2026")).is_err());
    }
}
