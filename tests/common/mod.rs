#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use certificate_registry::{
    api::{build_router, ApiState},
    auth::NewAdmin,
    config::{AppConfig, DatabaseConfig, StorageBackend},
    domain::{FixedScopeClock, SerialScope},
    object_storage::LocalObjectStorage,
    startup::build_api_state_with,
    storage::{create_pool, DbPool},
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "registrar@example.org";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";
pub const TEST_YEAR: i32 = 2025;

pub struct TestApp {
    pub state: ApiState,
    pub config: AppConfig,
    pub pool: DbPool,
    pub qr_dir: TempDir,
    _db_dir: TempDir,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config.server, &self.config.storage)
    }

    /// Log in as the seeded admin and return the bearer token.
    pub async fn admin_token(&self) -> String {
        let response = send_request(
            self,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), 200, "admin login failed");

        let body: Value = read_json(response).await;
        body["token"].as_str().expect("token in login response").to_string()
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_for_year(TEST_YEAR).await
}

pub async fn setup_test_app_for_year(year: i32) -> TestApp {
    let db_dir = tempfile::tempdir().expect("create db dir");
    let qr_dir = tempfile::tempdir().expect("create qr dir");

    let mut config = AppConfig::default();
    config.database = DatabaseConfig {
        url: format!("sqlite://{}", db_dir.path().join("registry.db").display()),
        max_connections: 8,
        min_connections: 1,
        auto_migrate: true,
        ..Default::default()
    };
    config.storage.backend = StorageBackend::Local;
    config.storage.local_dir = qr_dir.path().display().to_string();
    config.storage.local_public_url = "http://localhost:5000/qr".to_string();

    let pool = create_pool(&config.database).await.expect("create sqlite pool");

    let storage =
        Arc::new(LocalObjectStorage::new(qr_dir.path(), &config.storage.local_public_url));
    let state = build_api_state_with(
        &config,
        pool.clone(),
        storage,
        Arc::new(FixedScopeClock(SerialScope::new(year))),
    );

    state
        .login
        .create_admin(&NewAdmin {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        })
        .await
        .expect("seed admin");

    TestApp { state, config, pool, qr_dir, _db_dir: db_dir }
}

pub async fn send_request(
    app: &TestApp,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = if let Some(json) = body {
        let bytes = serde_json::to_vec(&json).expect("serialize body");
        builder
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .expect("build request")
    } else {
        builder.body(Body::empty()).expect("build request")
    };

    app.router().oneshot(request).await.expect("request")
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

/// POST a certificate and return the response.
pub async fn create_certificate(app: &TestApp, token: &str, body: Value) -> Response<Body> {
    send_request(app, Method::POST, "/api/admin/certificate", Some(token), Some(body)).await
}
