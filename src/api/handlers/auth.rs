use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};

use crate::api::error::{ApiError, ErrorBody};
use crate::api::routes::ApiState;
use crate::auth::{AdminContext, LoginRequest, LoginResponse};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Malformed credentials", body = ErrorBody),
        (status = 401, description = "Invalid email or password", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<ApiState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    Ok(Json(state.login.login(&request).await?))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Authenticated admin", body = AdminContext),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearerAuth" = []))
)]
pub async fn me_handler(Extension(admin): Extension<AdminContext>) -> Json<AdminContext> {
    Json(admin)
}

/// Invalidates every token issued to the caller, on all devices.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "All sessions invalidated"),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearerAuth" = []))
)]
pub async fn logout_handler(
    State(state): State<ApiState>,
    Extension(admin): Extension<AdminContext>,
) -> Result<StatusCode, ApiError> {
    state.login.logout(&admin).await?;
    Ok(StatusCode::NO_CONTENT)
}
