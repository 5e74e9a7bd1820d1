use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;

use crate::database;

#[derive(Clone)]
pub struct HealthState {
    pub environment: String,
    pub konnect_base_url: String,
    pub pool: Option<PgPool>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub konnect_configured: bool,
    pub database: Option<String>,
}

pub async fn health_check(
    State(state): State<HealthState>,
) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION").to_string();
    let konnect_configured = !state.konnect_base_url.trim().is_empty();

    let database = match &state.pool {
        Some(pool) => match database::health_check(pool).await {
            Ok(()) => Some("up".to_string()),
            Err(e) => {
                warn!("Database health check failed: {}", e);
                Some("down".to_string())
            }
        },
        None => None,
    };

    let healthy = database.as_deref() != Some("down");
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version,
        environment: state.environment.clone(),
        konnect_configured,
        database,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
