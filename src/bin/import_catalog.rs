//! Utility to import an ingredient/food catalog into the database
//!
//! Usage: import_catalog <catalog.json>

use tracing_subscriber::EnvFilter;

use nutrilog::config::Config;
use nutrilog::tools::import::{import_catalog, CatalogFile};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(config.log_directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let catalog_path = std::env::args()
        .nth(1)
        .ok_or("usage: import_catalog <catalog.json>")?;

    let db_path = config.database_path;
    println!("Database path: {}", db_path.display());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let database = nutrilog::db::Database::new(&db_path)?;

    // Run migrations
    database.with_conn(|conn| {
        nutrilog::db::migrations::run_migrations(conn)?;
        Ok(())
    })?;

    let raw = std::fs::read_to_string(&catalog_path)?;
    let catalog: CatalogFile = serde_json::from_str(&raw)?;
    println!(
        "Importing {} ingredient(s) and {} food(s) from {}",
        catalog.ingredients.len(),
        catalog.foods.len(),
        catalog_path
    );

    let summary = import_catalog(&database, &catalog)?;

    println!("  Ingredients added:   {}", summary.ingredients_added);
    println!("  Ingredients skipped: {}", summary.ingredients_skipped);
    println!("  Foods added:         {}", summary.foods_added);
    println!("  Foods skipped:       {}", summary.foods_skipped);
    for error in &summary.errors {
        println!("  Error: {}", error);
    }

    Ok(())
}
