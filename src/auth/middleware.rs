//! Axum middleware for admin authentication.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{field, warn, Instrument};

use crate::api::error::ApiError;
use crate::auth::login_service::LoginService;

pub type LoginServiceState = Arc<LoginService>;

/// Middleware entry point that authenticates requests using the [`LoginService`].
///
/// On success the [`AdminContext`](crate::auth::AdminContext) is inserted as a
/// request extension.
pub async fn authenticate(
    State(login_service): State<LoginServiceState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let span = crate::request_span!(request.method(), request.uri().path());

    let header =
        request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()).unwrap_or("");

    match login_service.authenticate(header).instrument(span.clone()).await {
        Ok(context) => {
            span.record("admin_id", field::display(&context.id));
            request.extensions_mut().insert(context);
            Ok(next.run(request).instrument(span).await)
        }
        Err(err) => {
            span.in_scope(|| warn!(error = %err, "authentication failed"));
            Err(err.into())
        }
    }
}
