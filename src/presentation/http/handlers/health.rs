//! Health Check Handlers
//!
//! Liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe (is the server running?)
//! - `GET /health/ready` - Readiness probe (can the server accept traffic?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::infrastructure::cache;
use crate::startup::AppState;

static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Pin the uptime clock; call once during startup.
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    pub redis: ServiceHealth,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Optional dependency that is not configured
    Disabled,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// 503 when the database is unreachable; Redis problems only degrade.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let redis = check_redis(&state).await;
    let status = determine_overall_status(&database, &redis);

    let response = DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks { database, redis },
    };

    let status_code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (status_code, Json(response))
}

fn timed(start: Instant, degraded_after_ms: u64) -> ServiceHealth {
    let latency = start.elapsed().as_millis() as u64;
    ServiceHealth {
        status: if latency < degraded_after_ms {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        latency_ms: Some(latency),
        message: None,
    }
}

fn failed(message: String) -> ServiceHealth {
    ServiceHealth {
        status: HealthStatus::Unhealthy,
        latency_ms: None,
        message: Some(message),
    }
}

async fn check_database(state: &AppState) -> ServiceHealth {
    let start = Instant::now();
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => timed(start, 100),
        Err(e) => failed(format!("Database connection failed: {}", e)),
    }
}

async fn check_redis(state: &AppState) -> ServiceHealth {
    let Some(redis) = &state.redis else {
        return ServiceHealth {
            status: HealthStatus::Disabled,
            latency_ms: None,
            message: None,
        };
    };

    let start = Instant::now();
    let mut conn = redis.clone();
    match cache::ping(&mut conn).await {
        Ok(()) => timed(start, 50),
        Err(e) => failed(format!("Redis connection failed: {}", e)),
    }
}

fn determine_overall_status(db: &ServiceHealth, redis: &ServiceHealth) -> HealthStatus {
    if db.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }

    if db.status == HealthStatus::Degraded
        || matches!(redis.status, HealthStatus::Unhealthy | HealthStatus::Degraded)
    {
        return HealthStatus::Degraded;
    }

    HealthStatus::Healthy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_health(status: HealthStatus) -> ServiceHealth {
        ServiceHealth {
            status,
            latency_ms: None,
            message: None,
        }
    }

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(serde_json::to_string(&HealthStatus::Healthy).unwrap(), "\"healthy\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Disabled).unwrap(), "\"disabled\"");
    }

    #[test]
    fn test_determine_overall_status() {
        use HealthStatus::*;

        let cases = [
            (Healthy, Healthy, Healthy),
            (Healthy, Disabled, Healthy),
            (Degraded, Healthy, Degraded),
            (Healthy, Unhealthy, Degraded),
            (Unhealthy, Healthy, Unhealthy),
            (Unhealthy, Disabled, Unhealthy),
        ];
        for (db, redis, expected) in cases {
            assert_eq!(
                determine_overall_status(&create_test_health(db), &create_test_health(redis)),
                expected,
                "db={:?} redis={:?}",
                db,
                redis
            );
        }
    }
}
