//! Nutrilog
//!
//! An MCP server for calorie tracking over an ingredient and food catalog.

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use nutrilog::build_info;
use nutrilog::config::Config;
use nutrilog::db::{self, Database};
use nutrilog::detection::DetectionClient;
use nutrilog::mcp::NutrilogService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(config.log_directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    // Print startup banner to stderr
    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let db_path = config.database_path.clone();
    eprintln!("Database path: {}", db_path.display());

    // Ensure data directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    eprintln!("Initializing database...");
    let database = Database::new(&db_path)?;

    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    let detection = match config.detection_url.as_deref() {
        Some(url) => {
            tracing::info!(url, "Photo detection enabled");
            Some(DetectionClient::new(url, config.detection_timeout)?)
        }
        None => {
            tracing::info!("Photo detection disabled (NUTRILOG_DETECTION_URL not set)");
            None
        }
    };

    let service = NutrilogService::new(db_path, database, detection);

    // Create stdio transport
    let transport = (stdin(), stdout());

    // Start the MCP server
    let server = service.serve(transport).await?;

    // Wait for the server to complete
    server.waiting().await?;

    Ok(())
}
