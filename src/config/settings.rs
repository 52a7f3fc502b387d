//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (optional backend for rate limiting)
    pub redis: RedisSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Outbound mail configuration
    pub smtp: SmtpSettings,

    /// Attachment upload configuration
    pub uploads: UploadSettings,

    /// Invoice numbering and rendering defaults
    pub invoice: InvoiceSettings,

    /// Startup seed data
    pub seed: SeedSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,

    /// Maximum accepted request body in bytes (uploads included)
    pub max_body_size: usize,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Apply pending migrations at startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL. Empty disables every Redis-backed feature.
    pub url: String,
}

impl RedisSettings {
    /// Whether a Redis URL was configured.
    pub fn is_enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Access token expiry in minutes
    pub access_token_expiry_minutes: i64,

    /// Refresh token expiry in days
    pub refresh_token_expiry_days: i64,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-31)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Turn rate limiting off entirely
    pub enabled: bool,

    /// Requests per minute allowed on authentication endpoints
    pub auth_requests_per_minute: u32,

    /// Requests per minute allowed on the rest of the API
    pub api_requests_per_minute: u32,

    /// Burst allowance on top of the per-minute limits
    pub burst_size: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// SMTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    /// When false, mail is logged instead of sent
    pub enabled: bool,

    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,

    /// Envelope sender, e.g. "crm@example.com"
    pub from_address: String,

    /// Display name used with `from_address`
    pub from_name: String,

    /// Use STARTTLS (port 587) instead of implicit TLS
    pub starttls: bool,
}

/// Attachment upload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    /// Directory where uploaded files are written
    pub dir: String,

    /// URL prefix the directory is served under
    pub public_path: String,

    /// Per-file size limit in bytes
    pub max_file_size: usize,

    /// Accepted MIME types
    pub allowed_content_types: Vec<String>,
}

/// Invoice defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceSettings {
    /// Tax rate in basis points applied when a request omits it (900 = 9%)
    pub default_tax_rate_bp: i32,

    /// Currency label printed on documents
    pub currency: String,
}

/// Seed data configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSettings {
    /// Seed permissions and roles at startup
    pub enabled: bool,

    /// Bootstrap tenant name (used only with `admin_email`)
    pub company_name: String,

    /// Bootstrap admin; empty skips user creation
    pub admin_email: String,
    pub admin_username: String,
    pub admin_password: String,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.max_body_size", 20 * 1024 * 1024_i64)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.url", "")?
            .set_default("jwt.access_token_expiry_minutes", 60)?
            .set_default("jwt.refresh_token_expiry_days", 7)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", 1704067200000_u64)? // 2024-01-01
            .set_default("rate_limit.enabled", true)?
            .set_default("rate_limit.auth_requests_per_minute", 10)?
            .set_default("rate_limit.api_requests_per_minute", 300)?
            .set_default("rate_limit.burst_size", 20)?
            .set_default("cors.allowed_origins", vec!["http://localhost:4200"])?
            .set_default("smtp.enabled", false)?
            .set_default("smtp.host", "localhost")?
            .set_default("smtp.port", 587)?
            .set_default("smtp.username", "")?
            .set_default("smtp.password", "")?
            .set_default("smtp.from_address", "crm@localhost")?
            .set_default("smtp.from_name", "CRM")?
            .set_default("smtp.starttls", true)?
            .set_default("uploads.dir", "./uploads")?
            .set_default("uploads.public_path", "/uploads")?
            .set_default("uploads.max_file_size", 10 * 1024 * 1024_i64)?
            .set_default(
                "uploads.allowed_content_types",
                vec![
                    "application/pdf",
                    "image/png",
                    "image/jpeg",
                    "text/plain",
                    "application/zip",
                ],
            )?
            .set_default("invoice.default_tax_rate_bp", 1000)?
            .set_default("invoice.currency", "Rials")?
            .set_default("seed.enabled", true)?
            .set_default("seed.company_name", "Main Company")?
            .set_default("seed.admin_email", "")?
            .set_default("seed.admin_username", "admin")?
            .set_default("seed.admin_password", "")?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("uploads.allowed_content_types")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("smtp.password", std::env::var("SMTP_PASSWORD").ok())?
            .set_override_option(
                "seed.admin_password",
                std::env::var("SEED_ADMIN_PASSWORD").ok(),
            )?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )
    }

    fn validate(settings: Self) -> Result<Self, ConfigError> {
        if settings.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                settings.jwt.secret.len()
            )));
        }
        if !settings.seed.admin_email.is_empty() && settings.seed.admin_password.len() < 8 {
            return Err(ConfigError::Message(
                "seed.admin_password must be at least 8 characters when seed.admin_email is set"
                    .into(),
            ));
        }
        Ok(settings)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
