//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::Seeder;
use crate::config::Settings;
use crate::infrastructure::email::{EmailSender, LogEmailSender, SmtpEmailSender};
use crate::infrastructure::repositories::{PgCompanyRepository, PgRoleRepository, PgUserRepository};
use crate::infrastructure::storage::AttachmentStorage;
use crate::infrastructure::{cache, database};
use crate::presentation::http::{handlers::health, routes};
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// `None` when Redis is not configured
    pub redis: Option<ConnectionManager>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub settings: Arc<Settings>,
    pub mailer: Arc<dyn EmailSender>,
    pub storage: Arc<AttachmentStorage>,
}

impl AppState {
    /// Wire the shared services that do not need a live connection.
    pub fn new(db: PgPool, redis: Option<ConnectionManager>, settings: Settings) -> Result<Self> {
        let snowflake = Arc::new(SnowflakeGenerator::with_epoch(
            settings.snowflake.epoch,
            settings.snowflake.machine_id as u64,
            0,
        ));

        let mailer: Arc<dyn EmailSender> = if settings.smtp.enabled {
            Arc::new(SmtpEmailSender::new(&settings.smtp).context("Invalid SMTP settings")?)
        } else {
            tracing::info!("SMTP disabled; outgoing mail is logged only");
            Arc::new(LogEmailSender)
        };

        let storage = Arc::new(AttachmentStorage::new(&settings.uploads));

        Ok(Self {
            db,
            redis,
            snowflake,
            settings: Arc::new(settings),
            mailer,
            storage,
        })
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let db = database::create_pool(&settings.database)
            .await
            .context("Failed to connect to the database")?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db).await.context("Migrations failed")?;
            tracing::info!("Database migrations applied");
        }

        let redis = cache::connect_optional(&settings.redis)
            .await
            .context("Failed to connect to Redis")?;

        let state = AppState::new(db, redis, settings)?;
        state.storage.ensure_dir().await?;

        let report = Seeder::new(
            Arc::new(PgRoleRepository::new(state.db.clone())),
            Arc::new(PgUserRepository::new(state.db.clone())),
            Arc::new(PgCompanyRepository::new(state.db.clone())),
            state.snowflake.clone(),
        )
        .run(&state.settings.seed)
        .await?;
        tracing::debug!(?report, "Seed finished");

        spawn_pool_metrics(state.db.clone(), state.settings.database.max_connections);

        let router = routes::create_router(state.clone());

        let addr: SocketAddr = format!("{}:{}", state.settings.server.host, state.settings.server.port)
            .parse()
            .context("Invalid server host/port")?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

fn spawn_pool_metrics(pool: PgPool, max_connections: u32) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15));
        loop {
            interval.tick().await;
            database::record_pool_stats(&pool, max_connections);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
