//! # Database Migration Management
//!
//! SQL migrations under `migrations/` are embedded in the binary and applied
//! on startup when `database.auto_migrate` is set, or via the `migrate`
//! command.

use crate::errors::Result;
use crate::storage::DbPool;
use serde::Serialize;
use sqlx::migrate::Migrator;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applied migration as recorded in `_sqlx_migrations`
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub installed_on: chrono::DateTime<chrono::Utc>,
    pub success: bool,
}

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!(available = MIGRATOR.iter().count(), "Starting database migration process");
    MIGRATOR.run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// List migrations already applied to the database
pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    let rows = sqlx::query_as::<_, MigrationInfo>(
        "SELECT version, description, installed_on, success FROM _sqlx_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
