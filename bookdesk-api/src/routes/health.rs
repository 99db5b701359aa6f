/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "latency_ms": 2,
///   "pool": { "active_connections": 1, "idle_connections": 1, "total_connections": 2 },
///   "migrations": { "applied_migrations": 3, "known_migrations": 3, "latest_version": 20250101000003, "is_up_to_date": true }
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use bookdesk_shared::db::{
    migrations::{get_migration_status, MigrationStatus},
    pool::{get_pool_stats, health_check as ping, PoolStats},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: &'static str,

    pub version: &'static str,

    /// `connected` or `disconnected`
    pub database: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u128>,

    pub pool: PoolStats,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<MigrationStatus>,
}

/// Reports service health; a database outage shows as `degraded`
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let (database, latency_ms, migrations) = match ping(&state.db).await {
        Ok(latency) => {
            let migrations = get_migration_status(&state.db)
                .await
                .map_err(|e| tracing::warn!(error = %e, "Could not read migration status"))
                .ok();
            ("connected", Some(latency.as_millis()), migrations)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            ("disconnected", None, None)
        }
    };

    Ok(Json(HealthResponse {
        status: if latency_ms.is_some() { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        latency_ms,
        pool: get_pool_stats(&state.db),
        migrations,
    }))
}
