use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::auth::{middleware::authenticate, LoginService};
use crate::config::{ServerConfig, StorageBackend, StorageConfig};
use crate::services::CertificateService;
use crate::storage::DbPool;

use super::{
    docs,
    handlers::{
        create_certificate_handler, delete_certificate_handler, get_certificate_handler,
        health_handler, list_certificates_handler, login_handler, logout_handler, me_handler,
        next_serial_handler,
    },
};

#[derive(Clone)]
pub struct ApiState {
    pub certificates: Arc<CertificateService>,
    pub login: Arc<LoginService>,
    pub pool: DbPool,
}

pub fn build_router(state: ApiState, server: &ServerConfig, storage: &StorageConfig) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.login.clone(), authenticate);

    let secured_api = Router::new()
        .route("/api/admin/certificate", post(create_certificate_handler))
        .route("/api/admin/certificates", get(list_certificates_handler))
        .route("/api/admin/next-serial", get(next_serial_handler))
        .route("/api/admin/certificate/{serial}", delete(delete_certificate_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route_layer(auth_layer);

    let public_api = Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/certificate/{serial}", get(get_certificate_handler));

    let mut router = secured_api.merge(public_api).with_state(state).merge(docs::docs_router());

    if storage.backend == StorageBackend::Local {
        router = router.nest_service("/qr", ServeDir::new(&storage.local_dir));
    }

    router
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(timeout_layer(server.timeout()))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
}
