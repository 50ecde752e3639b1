//! Nutrilog MCP Server Implementation
//!
//! Implements the MCP server with all Nutrilog tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::Database;
use crate::detection::{DetectionClient, DetectionError};
use crate::models::{
    CustomIngredient, FoodCreate, FoodIngredientInput, FoodUpdate, IngredientCreate,
    IngredientUpdate, MealLogUpdate, NutritionTotals,
};
use crate::nutrition::deserialize_amount;
use crate::tools::foods;
use crate::tools::ingredients;
use crate::tools::meals::{self, LogMealRequest};
use crate::tools::status::StatusTracker;

/// Nutrilog MCP Service
#[derive(Clone)]
pub struct NutrilogService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    detection: Option<DetectionClient>,
    tool_router: ToolRouter<NutrilogService>,
}

impl NutrilogService {
    pub fn new(database_path: PathBuf, database: Database, detection: Option<DetectionClient>) -> Self {
        let detection_enabled = detection.is_some();
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path, detection_enabled))),
            database,
            detection,
            tool_router: Self::tool_router(),
        }
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn not_found(entity: &str, id: i64) -> Result<CallToolResult, McpError> {
    json_result(&serde_json::json!({ "error": format!("{} not found", entity), "id": id }))
}

// ============================================================================
// Shared Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IdParams {
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TotalsParams {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbohydrates: f64,
}

impl From<TotalsParams> for NutritionTotals {
    fn from(p: TotalsParams) -> Self {
        NutritionTotals {
            calories: p.calories,
            fat: p.fat,
            protein: p.protein,
            carbohydrates: p.carbohydrates,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CustomIngredientParams {
    /// Ingredient ID (preferred); falls back to name when missing or unknown
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    /// Amount in `unit`; numeric strings are accepted
    #[serde(default, deserialize_with = "deserialize_amount")]
    #[schemars(with = "f64")]
    pub quantity: f64,
    /// Unit of the amount (g, kg, ml, tsp, tbsp, cup, ...). Empty means the ingredient's unit.
    #[serde(default)]
    pub unit: String,
}

impl From<CustomIngredientParams> for CustomIngredient {
    fn from(p: CustomIngredientParams) -> Self {
        CustomIngredient {
            id: p.id,
            name: p.name,
            quantity: p.quantity,
            unit: p.unit,
        }
    }
}

// ============================================================================
// Ingredient Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddIngredientParams {
    pub name: String,
    /// Unit the rates are expressed per (e.g. "g", "ml", "กรัม")
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

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchIngredientsParams {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 { 20 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListIngredientsParams {
    /// name, created_at or calories
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_sort_by() -> String { "name".to_string() }
fn default_sort_order() -> String { "asc".to_string() }
fn default_list_limit() -> i64 { 50 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateIngredientParams {
    pub id: i64,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub calories_per_unit: Option<f64>,
    pub fat_per_unit: Option<f64>,
    pub protein_per_unit: Option<f64>,
    pub carbohydrates_per_unit: Option<f64>,
}

// ============================================================================
// Food Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FoodIngredientParams {
    pub ingredient_id: i64,
    /// Quantity in the ingredient's own unit
    pub quantity: f64,
}

impl From<FoodIngredientParams> for FoodIngredientInput {
    fn from(p: FoodIngredientParams) -> Self {
        FoodIngredientInput {
            ingredient_id: p.ingredient_id,
            quantity: p.quantity,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateFoodParams {
    pub name: String,
    pub serving_suggestions: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<FoodIngredientParams>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LookupFoodParams {
    /// Food name (case-insensitive)
    pub name: String,
    /// Detected component counts: `{"egg": 2}` or `[{"egg": 1}, {"egg": 1}]`
    pub components: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateFoodParams {
    pub id: i64,
    pub name: Option<String>,
    pub serving_suggestions: Option<String>,
    /// Replaces all ingredient lines when given
    pub ingredients: Option<Vec<FoodIngredientParams>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IdentifyFoodPhotoParams {
    /// Path to an image file readable by the server
    pub image_path: String,
}

// ============================================================================
// Meal Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PreviewMealParams {
    pub custom_ingredients: Vec<CustomIngredientParams>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LogMealParams {
    pub user_id: i64,
    /// Catalog food eaten; its lines are copied when no custom ingredients are given
    pub food_id: Option<i64>,
    /// RFC 3339 or YYYY-MM-DDTHH:MM:SS (UTC). Defaults to now.
    pub consumed_at: Option<String>,
    #[serde(default)]
    pub custom_ingredients: Vec<CustomIngredientParams>,
    pub notes: Option<String>,
    pub custom_name: Option<String>,
    /// Totals shown to the user, compared against the server calculation
    pub client_totals: Option<TotalsParams>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListMealsParams {
    pub user_id: i64,
    /// YYYY-MM-DD (UTC)
    pub date: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateMealParams {
    pub id: i64,
    pub consumed_at: Option<String>,
    pub custom_ingredients: Option<Vec<CustomIngredientParams>>,
    /// Stored as given; nothing is recalculated
    pub totals: Option<TotalsParams>,
    pub notes: Option<String>,
    pub custom_name: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DailySummaryParams {
    pub user_id: i64,
    /// YYYY-MM-DD (UTC), defaults to today
    pub date: Option<String>,
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router]
impl NutrilogService {
    // --- Status ---

    #[tool(description = "Get the current status of the Nutrilog service including build info, database status, and process information")]
    async fn nutrilog_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status(&self.database);
        json_result(&status)
    }

    #[tool(description = "Get step-by-step instructions for logging meals. Call this when starting a new food logging session or when unsure how to use the meal tracking tools.")]
    fn meal_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::MEAL_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(MEAL_INSTRUCTIONS)]))
    }

    // --- Ingredients ---

    #[tool(description = "Add a catalog ingredient with calories, fat, protein and carbohydrates per one unit")]
    fn add_ingredient(&self, Parameters(p): Parameters<AddIngredientParams>) -> Result<CallToolResult, McpError> {
        let data = IngredientCreate {
            name: p.name,
            unit: p.unit,
            calories_per_unit: p.calories_per_unit,
            fat_per_unit: p.fat_per_unit,
            protein_per_unit: p.protein_per_unit,
            carbohydrates_per_unit: p.carbohydrates_per_unit,
        };
        let result = ingredients::add_ingredient(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get an ingredient with the foods that use it")]
    fn get_ingredient(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        match ingredients::get_ingredient(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))? {
            Some(detail) => json_result(&detail),
            None => not_found("Ingredient", p.id),
        }
    }

    #[tool(description = "Search ingredients by name")]
    fn search_ingredients(&self, Parameters(p): Parameters<SearchIngredientsParams>) -> Result<CallToolResult, McpError> {
        let result = ingredients::search_ingredients(&self.database, &p.query, p.limit).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "List ingredients with sorting and pagination")]
    fn list_ingredients(&self, Parameters(p): Parameters<ListIngredientsParams>) -> Result<CallToolResult, McpError> {
        let result = ingredients::list_ingredients(&self.database, &p.sort_by, &p.sort_order, p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Update an ingredient. Foods reflect the change immediately; logged meals keep their stored totals.")]
    fn update_ingredient(&self, Parameters(p): Parameters<UpdateIngredientParams>) -> Result<CallToolResult, McpError> {
        let data = IngredientUpdate {
            name: p.name,
            unit: p.unit,
            calories_per_unit: p.calories_per_unit,
            fat_per_unit: p.fat_per_unit,
            protein_per_unit: p.protein_per_unit,
            carbohydrates_per_unit: p.carbohydrates_per_unit,
        };
        let result = ingredients::update_ingredient(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Delete an ingredient (only allowed if no food uses it)")]
    fn delete_ingredient(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        match ingredients::delete_ingredient(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))? {
            Ok(success) => json_result(&success),
            Err(blocked) => json_result(&blocked),
        }
    }

    // --- Foods ---

    #[tool(description = "Create a food from ingredient quantities. Fails without saving anything if an ingredient ID does not exist.")]
    fn create_food(&self, Parameters(p): Parameters<CreateFoodParams>) -> Result<CallToolResult, McpError> {
        let data = FoodCreate {
            name: p.name,
            serving_suggestions: p.serving_suggestions,
            ingredients: p.ingredients.into_iter().map(FoodIngredientInput::from).collect(),
        };
        let result = foods::create_food(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get a food with its ingredients, derived nutrition and serving size")]
    fn get_food(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        match foods::get_food(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))? {
            Some(detail) => json_result(&detail),
            None => not_found("Food", p.id),
        }
    }

    #[tool(description = "Look up a food by name. Optional component counts (e.g. {\"egg\": 2}) scale the matching ingredient quantities.")]
    fn lookup_food(&self, Parameters(p): Parameters<LookupFoodParams>) -> Result<CallToolResult, McpError> {
        let result = foods::lookup_food(&self.database, &p.name, p.components.as_ref())
            .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(lookup) => json_result(&lookup),
            None => json_result(&serde_json::json!({ "error": "Food not found", "name": p.name })),
        }
    }

    #[tool(description = "List all foods with derived nutrition and serving size")]
    fn list_foods(&self) -> Result<CallToolResult, McpError> {
        let result = foods::list_foods(&self.database).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Update a food. A given ingredient list replaces the current one in a single transaction.")]
    fn update_food(&self, Parameters(p): Parameters<UpdateFoodParams>) -> Result<CallToolResult, McpError> {
        let data = FoodUpdate {
            name: p.name,
            serving_suggestions: p.serving_suggestions,
            ingredients: p
                .ingredients
                .map(|lines| lines.into_iter().map(FoodIngredientInput::from).collect()),
        };
        let result = foods::update_food(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Delete a food. Logged meals keep their totals and lose the food reference.")]
    fn delete_food(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let result = foods::delete_food(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Identify foods in a photo via the detection service and look each one up with the detected component counts")]
    async fn identify_food_photo(&self, Parameters(p): Parameters<IdentifyFoodPhotoParams>) -> Result<CallToolResult, McpError> {
        let client = self.detection.as_ref().ok_or_else(|| {
            McpError::internal_error("Photo detection is not configured (set NUTRILOG_DETECTION_URL)", None)
        })?;

        let detection = client
            .detect(std::path::Path::new(&p.image_path))
            .await
            .map_err(|e| match e {
                DetectionError::Io(_) => McpError::invalid_params(e.to_string(), None),
                _ => McpError::internal_error(e.to_string(), None),
            })?;

        let database = self.database.clone();
        let result = tokio::task::spawn_blocking(move || foods::identify_detected_foods(&database, &detection))
            .await
            .map_err(|e| McpError::internal_error(format!("Lookup task failed: {}", e), None))?
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    // --- Meals ---

    #[tool(description = "Calculate totals for custom ingredients without logging anything")]
    fn preview_meal(&self, Parameters(p): Parameters<PreviewMealParams>) -> Result<CallToolResult, McpError> {
        let lines: Vec<CustomIngredient> = p.custom_ingredients.into_iter().map(CustomIngredient::from).collect();
        let result = meals::preview_meal(&self.database, &lines).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Log a meal from a catalog food and/or custom ingredients. Totals are computed by the server and frozen.")]
    fn log_meal(&self, Parameters(p): Parameters<LogMealParams>) -> Result<CallToolResult, McpError> {
        let request = LogMealRequest {
            user_id: p.user_id,
            food_id: p.food_id,
            consumed_at: p.consumed_at,
            custom_ingredients: p.custom_ingredients.into_iter().map(CustomIngredient::from).collect(),
            notes: p.notes,
            custom_name: p.custom_name,
            client_totals: p.client_totals.map(NutritionTotals::from),
        };
        let result = meals::log_meal(&self.database, request).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get a logged meal")]
    fn get_meal(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        match meals::get_meal(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))? {
            Some(meal) => json_result(&meal),
            None => not_found("Meal", p.id),
        }
    }

    #[tool(description = "List a user's logged meals, newest first, optionally for one date")]
    fn list_meals(&self, Parameters(p): Parameters<ListMealsParams>) -> Result<CallToolResult, McpError> {
        let result = meals::list_meals(&self.database, p.user_id, p.date.as_deref(), p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Edit a logged meal. Fields are replaced as given and totals are NOT recalculated.")]
    fn update_meal(&self, Parameters(p): Parameters<UpdateMealParams>) -> Result<CallToolResult, McpError> {
        let data = MealLogUpdate {
            consumed_at: p.consumed_at,
            custom_ingredients: p
                .custom_ingredients
                .map(|lines| lines.into_iter().map(CustomIngredient::from).collect()),
            calculated: p.totals.map(NutritionTotals::from),
            notes: p.notes,
            custom_name: p.custom_name,
        };
        let result = meals::update_meal(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Delete a logged meal")]
    fn delete_meal(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let result = meals::delete_meal(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Sum a user's logged meal totals for one day")]
    fn daily_summary(&self, Parameters(p): Parameters<DailySummaryParams>) -> Result<CallToolResult, McpError> {
        let result = meals::daily_summary(&self.database, p.user_id, p.date.as_deref())
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for NutrilogService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nutrilog".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Nutrilog".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Nutrilog - calorie tracking over an ingredient/food catalog. \
                 IMPORTANT: Call meal_instructions before logging food. \
                 Ingredients: add/get/search/list/update/delete_ingredient. \
                 Foods: create/get/list/update/delete_food, lookup_food (with component counts), identify_food_photo. \
                 Meals: preview_meal, log_meal, get/list/update/delete_meal, daily_summary. \
                 Status: nutrilog_status."
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_custom_ingredient_params_accept_loose_quantity() {
        let p: CustomIngredientParams =
            serde_json::from_value(json!({"name": "Rice", "quantity": "150", "unit": "g"})).unwrap();
        let line = CustomIngredient::from(p);
        assert_eq!(line.quantity, 150.0);
        assert_eq!(line.id, None);
    }

    #[test]
    fn test_lookup_params_take_either_component_shape() {
        let flat: LookupFoodParams =
            serde_json::from_value(json!({"name": "Fried Rice", "components": {"egg": 2}})).unwrap();
        assert!(flat.components.unwrap().is_object());

        let passes: LookupFoodParams =
            serde_json::from_value(json!({"name": "Fried Rice", "components": [{"egg": 1}]})).unwrap();
        assert!(passes.components.unwrap().is_array());
    }

    #[test]
    fn test_server_info() {
        let db = Database::in_memory().unwrap();
        let service = NutrilogService::new(PathBuf::from(":memory:"), db, None);
        let info = service.get_info();
        assert_eq!(info.server_info.name, "nutrilog");
        assert!(info.instructions.unwrap().contains("meal_instructions"));
    }
}
