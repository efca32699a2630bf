//! Certificate repository
//!
//! The unique index on `serial_number` is the authoritative uniqueness gate:
//! an insert that hits it surfaces as [`Error::DuplicateSerial`]. Rows are
//! never removed; deletion only flips `is_deleted`.

use crate::domain::{Certificate, NewCertificate};
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tracing::instrument;

/// Upper bound for a single listing.
pub const MAX_LIST_LIMIT: i64 = 200;

const CERTIFICATE_COLUMNS: &str = "id, serial_number, student_name, course, position, issue_date, \
     qr_url, qr_storage_id, is_deleted, deleted_at, created_at";

#[derive(Debug, Clone, FromRow)]
struct CertificateRow {
    pub id: i64,
    pub serial_number: String,
    pub student_name: String,
    pub course: Option<String>,
    pub position: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub qr_url: Option<String>,
    pub qr_storage_id: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CertificateRow> for Certificate {
    fn from(row: CertificateRow) -> Self {
        Self {
            id: row.id,
            serial_number: row.serial_number,
            student_name: row.student_name,
            course: row.course,
            position: row.position,
            issue_date: row.issue_date,
            qr_url: row.qr_url,
            qr_storage_id: row.qr_storage_id,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Looks up a certificate by serial, soft-deleted rows included.
    async fn find_by_serial(&self, serial: &str) -> Result<Option<Certificate>>;
    async fn insert(&self, certificate: NewCertificate) -> Result<Certificate>;
    /// Newest first, soft-deleted rows excluded. `limit` is clamped to `1..=200`.
    async fn list(&self, limit: i64) -> Result<Vec<Certificate>>;
    async fn soft_delete(&self, serial: &str) -> Result<Certificate>;
}

#[derive(Debug, Clone)]
pub struct SqlxCertificateRepository {
    pool: DbPool,
}

impl SqlxCertificateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn clamp_list_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_LIST_LIMIT)
}

#[async_trait]
impl CertificateRepository for SqlxCertificateRepository {
    #[instrument(skip(self), fields(serial = %serial), name = "db_find_certificate_by_serial")]
    async fn find_by_serial(&self, serial: &str) -> Result<Option<Certificate>> {
        let query =
            format!("SELECT {} FROM certificates WHERE serial_number = $1", CERTIFICATE_COLUMNS);
        let row = sqlx::query_as::<_, CertificateRow>(&query)
            .bind(serial)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::database(e, format!("Failed to fetch certificate '{}'", serial))
            })?;

        Ok(row.map(Certificate::from))
    }

    #[instrument(skip(self, certificate), fields(serial = %certificate.serial_number), name = "db_insert_certificate")]
    async fn insert(&self, certificate: NewCertificate) -> Result<Certificate> {
        let (qr_url, qr_storage_id) = match certificate.qr {
            Some(qr) => (Some(qr.url), Some(qr.storage_id)),
            None => (None, None),
        };

        let query = format!(
            "INSERT INTO certificates \
             (serial_number, student_name, course, position, issue_date, qr_url, qr_storage_id, is_deleted, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8) \
             RETURNING {}",
            CERTIFICATE_COLUMNS
        );

        let row = sqlx::query_as::<_, CertificateRow>(&query)
            .bind(&certificate.serial_number)
            .bind(&certificate.student_name)
            .bind(&certificate.course)
            .bind(&certificate.position)
            .bind(certificate.issue_date)
            .bind(qr_url)
            .bind(qr_storage_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return Error::duplicate_serial(&certificate.serial_number);
                    }
                }
                Error::database(
                    e,
                    format!("Failed to insert certificate '{}'", certificate.serial_number),
                )
            })?;

        Ok(row.into())
    }

    #[instrument(skip(self), name = "db_list_certificates")]
    async fn list(&self, limit: i64) -> Result<Vec<Certificate>> {
        let query = format!(
            "SELECT {} FROM certificates WHERE is_deleted = 0 \
             ORDER BY created_at DESC, id DESC LIMIT $1",
            CERTIFICATE_COLUMNS
        );
        let rows = sqlx::query_as::<_, CertificateRow>(&query)
            .bind(clamp_list_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e, "Failed to list certificates"))?;

        Ok(rows.into_iter().map(Certificate::from).collect())
    }

    #[instrument(skip(self), fields(serial = %serial), name = "db_soft_delete_certificate")]
    async fn soft_delete(&self, serial: &str) -> Result<Certificate> {
        // Already-deleted rows keep their original deleted_at.
        let query = format!(
            "UPDATE certificates \
             SET is_deleted = 1, deleted_at = COALESCE(deleted_at, $2) \
             WHERE serial_number = $1 \
             RETURNING {}",
            CERTIFICATE_COLUMNS
        );
        let row = sqlx::query_as::<_, CertificateRow>(&query)
            .bind(serial)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::database(e, format!("Failed to delete certificate '{}'", serial))
            })?;

        row.map(Certificate::from).ok_or_else(|| Error::not_found("Certificate", serial))
    }
}
