//! # CRM Server
//!
//! Multi-tenant CRM REST API.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool, migrations and seed data
//! - Redis client (optional)
//! - HTTP server

use anyhow::Result;
use tracing::info;

use crm_server::config::Settings;
use crm_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    crm_server::telemetry::init_tracing();

    info!("Starting CRM Server...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
