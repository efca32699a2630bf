//! Wiring of repositories and services into the HTTP application state.

use std::sync::Arc;

use tracing::info;

use crate::api::{build_router, start_api_server, ApiState};
use crate::auth::{JwtService, LoginService};
use crate::config::AppConfig;
use crate::domain::{CalendarYearClock, ScopeClock};
use crate::errors::Result;
use crate::object_storage::{build_object_storage, ObjectStorage};
use crate::qr::{QrOptions, SvgQrRenderer};
use crate::services::{CertificateService, SerialAllocator};
use crate::storage::{
    create_pool, DbPool, SqlxCertificateRepository, SqlxSerialCounterRepository,
};

/// Build the serial allocator for the calendar-year scope.
pub fn serial_allocator(pool: &DbPool, clock: Arc<dyn ScopeClock>) -> Arc<SerialAllocator> {
    Arc::new(SerialAllocator::new(Arc::new(SqlxSerialCounterRepository::new(pool.clone())), clock))
}

/// Assemble the API state with an explicit storage backend and scope clock.
pub fn build_api_state_with(
    config: &AppConfig,
    pool: DbPool,
    storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn ScopeClock>,
) -> ApiState {
    let certificates = CertificateService::new(
        Arc::new(SqlxCertificateRepository::new(pool.clone())),
        serial_allocator(&pool, clock),
        Arc::new(SvgQrRenderer),
        storage,
        config.qr.verify_url(),
        QrOptions::from(&config.qr),
    );

    let jwt = Arc::new(JwtService::from_config(&config.auth));
    let login = LoginService::with_sqlx(pool.clone(), jwt);

    ApiState { certificates: Arc::new(certificates), login: Arc::new(login), pool }
}

/// Assemble the API state from configuration alone.
pub fn build_api_state(config: &AppConfig, pool: DbPool) -> Result<ApiState> {
    let storage = build_object_storage(&config.storage)?;
    Ok(build_api_state_with(config, pool, storage, Arc::new(CalendarYearClock)))
}

/// Open the database, build the router and serve until shutdown.
pub async fn run(config: AppConfig) -> Result<()> {
    let pool = create_pool(&config.database).await?;
    info!(
        backend = ?config.storage.backend,
        verify_url = %config.qr.verify_url(),
        "Database ready, building application"
    );

    let state = build_api_state(&config, pool.clone())?;
    let router = build_router(state, &config.server, &config.storage);

    let result = start_api_server(&config.server, router).await;
    pool.close().await;
    result
}
