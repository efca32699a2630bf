//! Serial counter repository
//!
//! One row per allocation scope. The row is created by the first reservation
//! and afterwards only incremented, in a single statement, so concurrent
//! reservations never observe the same value.

use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

#[async_trait]
pub trait SerialCounterRepository: Send + Sync {
    /// Atomically increments the counter for `scope` and returns the new value.
    /// A missing row is created with sequence 1.
    async fn increment(&self, scope: i32) -> Result<i64>;

    /// Last reserved value for `scope`, `None` when nothing was reserved yet.
    async fn current(&self, scope: i32) -> Result<Option<i64>>;
}

#[derive(Debug, Clone)]
pub struct SqlxSerialCounterRepository {
    pool: DbPool,
}

impl SqlxSerialCounterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SerialCounterRepository for SqlxSerialCounterRepository {
    #[instrument(skip(self), fields(scope = scope), name = "db_increment_serial_counter")]
    async fn increment(&self, scope: i32) -> Result<i64> {
        let (sequence,): (i64,) = sqlx::query_as(
            "INSERT INTO serial_counters (scope, sequence, updated_at) VALUES ($1, 1, $2) \
             ON CONFLICT(scope) DO UPDATE SET sequence = sequence + 1, updated_at = excluded.updated_at \
             RETURNING sequence",
        )
        .bind(scope)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::database(e, format!("Failed to increment serial counter for scope {}", scope))
        })?;

        Ok(sequence)
    }

    #[instrument(skip(self), fields(scope = scope), name = "db_read_serial_counter")]
    async fn current(&self, scope: i32) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT sequence FROM serial_counters WHERE scope = $1")
                .bind(scope)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::database(e, format!("Failed to read serial counter for scope {}", scope))
                })?;

        Ok(row.map(|(sequence,)| sequence))
    }
}
