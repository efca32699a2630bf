//! # Storage and Persistence
//!
//! Database connectivity and the repositories backing serial counters,
//! certificates and admin accounts.

pub mod migrations;
pub mod pool;
pub mod repositories;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use crate::config::DatabaseConfig;

pub use migrations::{list_applied_migrations, run_migrations, MigrationInfo};
pub use pool::{create_pool, DbPool};
pub use repositories::{
    AdminUserRepository, CertificateRepository, SerialCounterRepository,
    SqlxAdminUserRepository, SqlxCertificateRepository, SqlxSerialCounterRepository,
    MAX_LIST_LIMIT,
};

use crate::errors::{Error, Result};

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::database(e, "Database connectivity check failed"))?;

    Ok(())
}
