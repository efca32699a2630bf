//! Health check endpoint for monitoring and readiness checks

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ErrorBody};
use crate::api::routes::ApiState;
use crate::storage::check_connection;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "0.1.0")]
    pub version: String,
}

/// Returns 200 when the server can reach its database.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = ErrorBody)
    )
)]
pub async fn health_handler(State(state): State<ApiState>) -> Result<Json<HealthResponse>, ApiError> {
    check_connection(&state.pool).await.map_err(|e| {
        tracing::warn!(error = %e, "health check failed");
        ApiError::service_unavailable("Database unavailable")
    })?;

    Ok(Json(HealthResponse { status: "ok".to_string(), version: crate::VERSION.to_string() }))
}
