//! Admin user repository

use crate::domain::AdminUser;
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
struct AdminUserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub session_version: i64,
    pub created_at: DateTime<Utc>,
}

impl From<AdminUserRow> for AdminUser {
    fn from(row: AdminUserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            session_version: row.session_version,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
pub trait AdminUserRepository: Send + Sync {
    async fn create(&self, email: &str, password_hash: &str) -> Result<AdminUser>;
    async fn find_by_email(&self, email: &str) -> Result<Option<AdminUser>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<AdminUser>>;
    /// Increments the session version, invalidating every outstanding token.
    async fn bump_session_version(&self, id: &str) -> Result<i64>;
}

#[derive(Debug, Clone)]
pub struct SqlxAdminUserRepository {
    pool: DbPool,
}

impl SqlxAdminUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminUserRepository for SqlxAdminUserRepository {
    #[instrument(skip(self, password_hash), name = "db_create_admin_user")]
    async fn create(&self, email: &str, password_hash: &str) -> Result<AdminUser> {
        let email = AdminUser::normalize_email(email);
        let row = sqlx::query_as::<_, AdminUserRow>(
            "INSERT INTO admin_users (id, email, password_hash, session_version, created_at) \
             VALUES ($1, $2, $3, 0, $4) \
             RETURNING id, email, password_hash, session_version, created_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return Error::validation_field(
                        format!("Admin '{}' already exists", email),
                        "email",
                    );
                }
            }
            Error::database(e, "Failed to create admin user")
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self), name = "db_find_admin_by_email")]
    async fn find_by_email(&self, email: &str) -> Result<Option<AdminUser>> {
        let row = sqlx::query_as::<_, AdminUserRow>(
            "SELECT id, email, password_hash, session_version, created_at \
             FROM admin_users WHERE email = $1",
        )
        .bind(AdminUser::normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e, "Failed to fetch admin user by email"))?;

        Ok(row.map(AdminUser::from))
    }

    #[instrument(skip(self), name = "db_find_admin_by_id")]
    async fn find_by_id(&self, id: &str) -> Result<Option<AdminUser>> {
        let row = sqlx::query_as::<_, AdminUserRow>(
            "SELECT id, email, password_hash, session_version, created_at \
             FROM admin_users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e, "Failed to fetch admin user"))?;

        Ok(row.map(AdminUser::from))
    }

    #[instrument(skip(self), name = "db_bump_session_version")]
    async fn bump_session_version(&self, id: &str) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE admin_users SET session_version = session_version + 1 \
             WHERE id = $1 RETURNING session_version",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e, "Failed to bump session version"))?;

        row.map(|(version,)| version).ok_or_else(|| Error::not_found("AdminUser", id))
    }
}
