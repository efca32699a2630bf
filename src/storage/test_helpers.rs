//! Test database utilities for in-library tests.
//!
//! Each `TestDatabase` owns a fresh SQLite file in a temporary directory with
//! all migrations applied. The file (not `:memory:`) lets several pooled
//! connections share one database, which the concurrency tests rely on.

use crate::config::DatabaseConfig;
use crate::storage::{create_pool, DbPool};
use tempfile::TempDir;

/// A temporary SQLite database, removed when dropped.
///
/// Keep this struct alive for the duration of your test.
pub struct TestDatabase {
    pub pool: DbPool,
    _dir: TempDir,
}

impl TestDatabase {
    /// Create a new test database with all migrations applied.
    ///
    /// The `prefix` names the database file, which helps when debugging.
    pub async fn new(prefix: &str) -> Self {
        Self::with_connections(prefix, 5).await
    }

    pub async fn with_connections(prefix: &str, max_connections: u32) -> Self {
        let dir = tempfile::tempdir()
            .unwrap_or_else(|e| panic!("Failed to create temp dir for {}: {}", prefix, e));

        let url = format!("sqlite://{}", dir.path().join(format!("{}.db", prefix)).display());
        let config = DatabaseConfig {
            url,
            auto_migrate: true,
            max_connections,
            min_connections: 1,
            ..Default::default()
        };

        let pool = create_pool(&config)
            .await
            .unwrap_or_else(|e| panic!("Failed to create test pool for {}: {}", prefix, e));

        Self { pool, _dir: dir }
    }
}
