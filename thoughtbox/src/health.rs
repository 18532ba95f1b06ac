use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    db,
    openapi::{
        aide::axum::{routing::get, ApiRouter, IntoApiResponse},
        Json,
    },
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Health {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started.
    pub uptime: f64,
    pub database: DatabaseStatus,
    pub version: String,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new().api_route("/api/health", get(health)).with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoApiResponse {
    let database = match db::ping(&state.conn).await {
        Ok(()) => DatabaseStatus::Connected,
        Err(error) => {
            tracing::error!("health check failed: {error}");
            DatabaseStatus::Disconnected
        }
    };

    let (status, code) = match database {
        DatabaseStatus::Connected => (HealthStatus::Healthy, StatusCode::OK),
        DatabaseStatus::Disconnected => (HealthStatus::Unhealthy, StatusCode::SERVICE_UNAVAILABLE),
    };

    (
        code,
        Json(Health {
            status,
            timestamp: Utc::now(),
            uptime: state.started_at.elapsed().as_secs_f64(),
            database,
            version: env!("CARGO_PKG_VERSION").into(),
        }),
    )
}
