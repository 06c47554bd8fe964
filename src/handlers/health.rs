use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::router::TimecapsuleState;

pub const HEALTHY_MESSAGE: &str = "TimeCapsule API is running!";
pub const UNHEALTHY_MESSAGE: &str = "API running but database connection failed";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/health -> probes the database; 500 with the probe's error when it fails.
pub async fn health(State(state): State<TimecapsuleState>) -> impl IntoResponse {
    match state.supabase.probe().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthReport {
                message: HEALTHY_MESSAGE.to_string(),
                database: Some("connected".to_string()),
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "health probe failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthReport {
                    message: UNHEALTHY_MESSAGE.to_string(),
                    database: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
