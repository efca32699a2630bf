//! Certificate endpoints: admin issuance and listing, public lookup.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{ApiError, ErrorBody};
use crate::api::routes::ApiState;
use crate::auth::AdminContext;
use crate::domain::{Certificate, CreateCertificateInput};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCertificateResponse {
    #[schema(example = "Certificate created")]
    pub message: String,
    pub certificate: Certificate,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NextSerialResponse {
    #[schema(example = "SN-2025-0007")]
    pub serial: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCertificatesQuery {
    /// Maximum number of records, clamped to 1..=200 (default 200)
    pub limit: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/admin/certificate",
    tag = "certificates",
    request_body = CreateCertificateInput,
    responses(
        (status = 201, description = "Certificate created", body = CreateCertificateResponse),
        (status = 400, description = "Missing or malformed fields, or a canonical serialNumber the allocator has not issued yet", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 409, description = "Serial number already exists", body = ErrorBody),
        (status = 500, description = "Server error", body = ErrorBody)
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_certificate_handler(
    State(state): State<ApiState>,
    Extension(admin): Extension<AdminContext>,
    payload: Result<Json<CreateCertificateInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateCertificateResponse>), ApiError> {
    let Json(input) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let certificate = state.certificates.create(input).await?;
    tracing::info!(
        admin_id = %admin.id,
        serial = %certificate.serial_number,
        "certificate issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateCertificateResponse { message: "Certificate created".to_string(), certificate }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/certificates",
    tag = "certificates",
    params(ListCertificatesQuery),
    responses(
        (status = 200, description = "Newest certificates first", body = [Certificate]),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 500, description = "Server error", body = ErrorBody)
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_certificates_handler(
    State(state): State<ApiState>,
    Query(query): Query<ListCertificatesQuery>,
) -> Result<Json<Vec<Certificate>>, ApiError> {
    Ok(Json(state.certificates.list(query.limit).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/next-serial",
    tag = "certificates",
    responses(
        (status = 200, description = "Serial the next automatic allocation would use", body = NextSerialResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 500, description = "Server error", body = ErrorBody)
    ),
    security(("bearerAuth" = []))
)]
pub async fn next_serial_handler(
    State(state): State<ApiState>,
) -> Result<(HeaderMap, Json<NextSerialResponse>), ApiError> {
    let serial = state.certificates.peek_next_serial().await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    Ok((headers, Json(NextSerialResponse { serial: serial.to_string() })))
}

#[utoipa::path(
    delete,
    path = "/api/admin/certificate/{serial}",
    tag = "certificates",
    params(("serial" = String, Path, description = "Certificate serial number")),
    responses(
        (status = 200, description = "Certificate soft-deleted", body = Certificate),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Certificate not found", body = ErrorBody)
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_certificate_handler(
    State(state): State<ApiState>,
    Extension(admin): Extension<AdminContext>,
    Path(serial): Path<String>,
) -> Result<Json<Certificate>, ApiError> {
    let deleted = state.certificates.soft_delete(&serial).await?;
    tracing::info!(admin_id = %admin.id, serial = %deleted.serial_number, "certificate withdrawn");
    Ok(Json(deleted))
}

#[utoipa::path(
    get,
    path = "/api/certificate/{serial}",
    tag = "certificates",
    params(("serial" = String, Path, description = "Certificate serial number")),
    responses(
        (status = 200, description = "Certificate, including withdrawn ones", body = Certificate),
        (status = 404, description = "Certificate not found", body = ErrorBody)
    )
)]
pub async fn get_certificate_handler(
    State(state): State<ApiState>,
    Path(serial): Path<String>,
) -> Result<Json<Certificate>, ApiError> {
    Ok(Json(state.certificates.get_by_serial(&serial).await?))
}
