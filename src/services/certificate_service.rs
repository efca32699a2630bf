//! Certificate business logic service
//!
//! Creation walks a fixed sequence of stages. Whatever fails after the serial
//! was obtained leaves no certificate behind, and a reserved serial is never
//! returned to the pool: gaps are tolerated, reuse is not.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn, Span};

use crate::domain::{Certificate, CreateCertificateInput, NewCertificate, SerialNumber};
use crate::errors::{Error, Result};
use crate::object_storage::ObjectStorage;
use crate::observability::MetricsRecorder;
use crate::qr::{QrOptions, QrRenderer};
use crate::services::SerialAllocator;
use crate::storage::{CertificateRepository, MAX_LIST_LIMIT};

/// Stage of a single creation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationStage {
    Validating,
    AllocatingSerial,
    CheckingConflict,
    RenderingQr,
    UploadingImage,
    Persisting,
    Done,
    Failed(String),
}

impl CreationStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CreationStage::Done | CreationStage::Failed(_))
    }

    fn successor(&self) -> Option<CreationStage> {
        use CreationStage::*;
        match self {
            Validating => Some(AllocatingSerial),
            AllocatingSerial => Some(CheckingConflict),
            CheckingConflict => Some(RenderingQr),
            RenderingQr => Some(UploadingImage),
            UploadingImage => Some(Persisting),
            Persisting => Some(Done),
            Done | Failed(_) => None,
        }
    }
}

impl fmt::Display for CreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationStage::Validating => write!(f, "validating"),
            CreationStage::AllocatingSerial => write!(f, "allocating_serial"),
            CreationStage::CheckingConflict => write!(f, "checking_conflict"),
            CreationStage::RenderingQr => write!(f, "rendering_qr"),
            CreationStage::UploadingImage => write!(f, "uploading_image"),
            CreationStage::Persisting => write!(f, "persisting"),
            CreationStage::Done => write!(f, "done"),
            CreationStage::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Tracks the stages of one creation attempt.
#[derive(Debug, Clone)]
pub struct CreationProgress {
    stage: CreationStage,
    serial: Option<String>,
}

impl Default for CreationProgress {
    fn default() -> Self {
        Self { stage: CreationStage::Validating, serial: None }
    }
}

impl CreationProgress {
    pub fn stage(&self) -> &CreationStage {
        &self.stage
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Moves to the next stage. Returns `false` (and stays put) when `next`
    /// is not the successor of the current stage.
    pub fn advance(&mut self, next: CreationStage) -> bool {
        if self.stage.successor().as_ref() != Some(&next) {
            warn!(from = %self.stage, to = %next, "Ignoring out-of-order creation transition");
            return false;
        }
        debug!(from = %self.stage, to = %next, serial = ?self.serial, "Creation stage");
        self.stage = next;
        true
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.stage.is_terminal() {
            return;
        }
        let reason = reason.into();
        warn!(stage = %self.stage, serial = ?self.serial, %reason, "Certificate creation failed");
        self.stage = CreationStage::Failed(reason);
    }

    fn assign_serial(&mut self, serial: &str) {
        self.serial = Some(serial.to_string());
    }
}

/// Service for certificate issuance and lookup
pub struct CertificateService {
    certificates: Arc<dyn CertificateRepository>,
    allocator: Arc<SerialAllocator>,
    renderer: Arc<dyn QrRenderer>,
    storage: Arc<dyn ObjectStorage>,
    verify_url: String,
    qr_options: QrOptions,
    metrics: MetricsRecorder,
}

impl CertificateService {
    pub fn new(
        certificates: Arc<dyn CertificateRepository>,
        allocator: Arc<SerialAllocator>,
        renderer: Arc<dyn QrRenderer>,
        storage: Arc<dyn ObjectStorage>,
        verify_url: impl Into<String>,
        qr_options: QrOptions,
    ) -> Self {
        Self {
            certificates,
            allocator,
            renderer,
            storage,
            verify_url: verify_url.into(),
            qr_options,
            metrics: MetricsRecorder::new(),
        }
    }

    /// Create a certificate, allocating a serial unless one is supplied.
    #[instrument(skip_all, fields(serial = tracing::field::Empty))]
    pub async fn create(&self, input: CreateCertificateInput) -> Result<Certificate> {
        let started = Instant::now();
        let mut progress = CreationProgress::default();

        let result = self.run_creation(input, &mut progress).await;

        let outcome = match &result {
            Ok(certificate) => {
                progress.advance(CreationStage::Done);
                info!(
                    certificate_id = certificate.id,
                    serial = %certificate.serial_number,
                    "Certificate created"
                );
                "created"
            }
            Err(err) => {
                progress.fail(err.to_string());
                if let Some(serial) = progress.serial() {
                    debug!(%serial, "Serial not issued to any certificate");
                }
                match err {
                    Error::Validation { .. } => "invalid",
                    Error::SerialConflict { .. } => {
                        self.metrics.record_serial_conflict();
                        "conflict"
                    }
                    _ => "error",
                }
            }
        };
        self.metrics.record_certificate_created(outcome, started.elapsed().as_secs_f64());

        result
    }

    async fn run_creation(
        &self,
        input: CreateCertificateInput,
        progress: &mut CreationProgress,
    ) -> Result<Certificate> {
        let validated = input.validate()?;

        progress.advance(CreationStage::AllocatingSerial);
        let serial = match validated.explicit_serial.clone() {
            Some(explicit) => {
                self.ensure_not_ahead_of_allocator(&explicit).await?;
                explicit
            }
            None => self.allocator.reserve_current().await?.to_string(),
        };
        progress.assign_serial(&serial);
        Span::current().record("serial", serial.as_str());

        progress.advance(CreationStage::CheckingConflict);
        if self.certificates.find_by_serial(&serial).await?.is_some() {
            return Err(Error::serial_conflict(&serial));
        }

        progress.advance(CreationStage::RenderingQr);
        let image = self.renderer.render(&self.verify_url, &self.qr_options)?;

        progress.advance(CreationStage::UploadingImage);
        let stored = self.storage.upload(&image, &serial).await.inspect_err(|_| {
            self.metrics.record_upload_failure();
        })?;
        let storage_id = stored.storage_id.clone();

        progress.advance(CreationStage::Persisting);
        let new_certificate = NewCertificate::from_input(validated, serial.clone(), stored.into());
        match self.certificates.insert(new_certificate).await {
            Ok(certificate) => Ok(certificate),
            // The image id is shared with the record that won the race.
            Err(err) if err.is_duplicate_serial() => Err(Error::serial_conflict(&serial)),
            Err(err) => {
                if let Err(cleanup_err) = self.storage.delete(&storage_id).await {
                    warn!(
                        %storage_id,
                        error = %cleanup_err,
                        "Failed to remove orphaned QR image"
                    );
                }
                Err(err)
            }
        }
    }

    /// Canonical serials the allocator has not handed out yet stay reserved
    /// for it, otherwise a later automatic creation would collide.
    async fn ensure_not_ahead_of_allocator(&self, serial: &str) -> Result<()> {
        let Ok(canonical) = serial.parse::<SerialNumber>() else {
            return Ok(());
        };

        let next = self.allocator.peek_next(canonical.scope()).await?;
        if canonical.sequence() >= next.sequence() {
            return Err(Error::validation_field(
                format!(
                    "Serial number {} has not been allocated yet; omit serialNumber to use {}",
                    serial, next
                ),
                "serialNumber",
            ));
        }
        Ok(())
    }

    /// Newest certificates first, soft-deleted excluded.
    pub async fn list(&self, limit: Option<i64>) -> Result<Vec<Certificate>> {
        self.certificates.list(limit.unwrap_or(MAX_LIST_LIMIT)).await
    }

    /// Public lookup. Soft-deleted certificates are returned with `is_deleted` set.
    pub async fn get_by_serial(&self, serial: &str) -> Result<Certificate> {
        self.certificates
            .find_by_serial(serial.trim())
            .await?
            .ok_or_else(|| Error::not_found("Certificate", serial))
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, serial: &str) -> Result<Certificate> {
        let deleted = self.certificates.soft_delete(serial.trim()).await?;
        info!(serial = %deleted.serial_number, "Certificate soft-deleted");
        Ok(deleted)
    }

    /// Preview of the serial the next automatic allocation would use.
    pub async fn peek_next_serial(&self) -> Result<SerialNumber> {
        self.allocator.peek_current().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FixedScopeClock, SerialScope};
    use crate::object_storage::{LocalObjectStorage, StoredObject};
    use crate::qr::{QrImage, SvgQrRenderer};
    use crate::storage::test_helpers::TestDatabase;
    use crate::storage::{
        SerialCounterRepository, SqlxCertificateRepository, SqlxSerialCounterRepository,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStorage {
        uploads: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
        fail_uploads: AtomicBool,
        fail_deletes: AtomicBool,
    }

    #[async_trait]
    impl ObjectStorage for RecordingStorage {
        async fn upload(&self, _image: &QrImage, target_id: &str) -> Result<StoredObject> {
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(Error::upload("storage offline"));
            }
            self.uploads.lock().unwrap().push(target_id.to_string());
            Ok(StoredObject {
                url: format!("https://cdn.test/{}.svg", target_id),
                storage_id: format!("qr/{}", target_id),
            })
        }

        async fn delete(&self, storage_id: &str) -> Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(Error::upload("storage offline"));
            }
            self.deletes.lock().unwrap().push(storage_id.to_string());
            Ok(())
        }
    }

    /// Delegates to the real store but lets a test force insert failures.
    struct FlakyCertificates {
        inner: SqlxCertificateRepository,
        insert_error: Mutex<Option<fn(&str) -> Error>>,
    }

    #[async_trait]
    impl CertificateRepository for FlakyCertificates {
        async fn find_by_serial(&self, serial: &str) -> Result<Option<Certificate>> {
            self.inner.find_by_serial(serial).await
        }

        async fn insert(&self, certificate: NewCertificate) -> Result<Certificate> {
            let forced = *self.insert_error.lock().unwrap();
            match forced {
                Some(make_error) => Err(make_error(&certificate.serial_number)),
                None => self.inner.insert(certificate).await,
            }
        }

        async fn list(&self, limit: i64) -> Result<Vec<Certificate>> {
            self.inner.list(limit).await
        }

        async fn soft_delete(&self, serial: &str) -> Result<Certificate> {
            self.inner.soft_delete(serial).await
        }
    }

    struct Harness {
        _db: TestDatabase,
        service: CertificateService,
        counters: Arc<SqlxSerialCounterRepository>,
        certificates: Arc<FlakyCertificates>,
        storage: Arc<RecordingStorage>,
    }

    async fn harness(name: &str) -> Harness {
        let db = TestDatabase::new(name).await;
        let counters = Arc::new(SqlxSerialCounterRepository::new(db.pool.clone()));
        let certificates = Arc::new(FlakyCertificates {
            inner: SqlxCertificateRepository::new(db.pool.clone()),
            insert_error: Mutex::new(None),
        });
        let storage = Arc::new(RecordingStorage::default());
        let allocator = Arc::new(SerialAllocator::new(
            counters.clone(),
            Arc::new(FixedScopeClock(SerialScope::new(2025))),
        ));
        let service = CertificateService::new(
            certificates.clone(),
            allocator,
            Arc::new(SvgQrRenderer),
            storage.clone(),
            "https://certs.example.org/verify",
            QrOptions::default(),
        );
        Harness { _db: db, service, counters, certificates, storage }
    }

    fn duplicate_serial_error(serial: &str) -> Error {
        Error::duplicate_serial(serial)
    }

    fn database_down_error(_serial: &str) -> Error {
        Error::database(sqlx::Error::PoolTimedOut, "Failed to insert certificate")
    }

    fn input(name: &str) -> CreateCertificateInput {
        CreateCertificateInput { student_name: Some(name.to_string()), ..Default::default() }
    }

    fn explicit(serial: &str, name: &str) -> CreateCertificateInput {
        CreateCertificateInput { serial_number: Some(serial.to_string()), ..input(name) }
    }

    #[test]
    fn progress_follows_fixed_order() {
        let mut progress = CreationProgress::default();
        assert!(!progress.advance(CreationStage::RenderingQr));
        assert_eq!(progress.stage(), &CreationStage::Validating);

        for stage in [
            CreationStage::AllocatingSerial,
            CreationStage::CheckingConflict,
            CreationStage::RenderingQr,
            CreationStage::UploadingImage,
            CreationStage::Persisting,
            CreationStage::Done,
        ] {
            assert!(progress.advance(stage));
        }
        assert!(progress.stage().is_terminal());

        progress.fail("late");
        assert_eq!(progress.stage(), &CreationStage::Done);
    }

    #[test]
    fn progress_can_fail_from_any_open_stage() {
        let mut progress = CreationProgress::default();
        progress.advance(CreationStage::AllocatingSerial);
        progress.assign_serial("SN-2025-0001");
        progress.fail("storage offline");

        assert_eq!(progress.stage(), &CreationStage::Failed("storage offline".into()));
        assert_eq!(progress.serial(), Some("SN-2025-0001"));
        assert!(!progress.advance(CreationStage::CheckingConflict));
    }

    #[tokio::test]
    async fn creates_with_allocated_serial() {
        let h = harness("svc_create").await;

        let certificate = h.service.create(input("Ada Lovelace")).await.unwrap();
        assert_eq!(certificate.serial_number, "SN-2025-0001");
        assert_eq!(certificate.qr_url.as_deref(), Some("https://cdn.test/SN-2025-0001.svg"));
        assert_eq!(certificate.qr_storage_id.as_deref(), Some("qr/SN-2025-0001"));
        assert_eq!(*h.storage.uploads.lock().unwrap(), vec!["SN-2025-0001".to_string()]);

        let next = h.service.create(input("Grace Hopper")).await.unwrap();
        assert_eq!(next.serial_number, "SN-2025-0002");
    }

    #[tokio::test]
    async fn missing_student_name_fails_before_allocation() {
        let h = harness("svc_validation").await;

        let err = h.service.create(CreateCertificateInput::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(h.counters.current(2025).await.unwrap(), None);
        assert!(h.storage.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn explicit_serial_is_used_verbatim_without_touching_counter() {
        let h = harness("svc_explicit").await;

        let certificate = h.service.create(explicit("LEGACY-0042", "Ada")).await.unwrap();
        assert_eq!(certificate.serial_number, "LEGACY-0042");
        assert_eq!(h.counters.current(2025).await.unwrap(), None);
    }

    #[tokio::test]
    async fn explicit_conflict_with_soft_deleted_record() {
        let h = harness("svc_conflict_deleted").await;

        h.service.create(input("Ada")).await.unwrap();
        h.service.soft_delete("SN-2025-0001").await.unwrap();

        let err = h.service.create(explicit("SN-2025-0001", "Grace")).await.unwrap_err();
        assert!(matches!(err, Error::SerialConflict { .. }));
        assert_eq!(h.counters.current(2025).await.unwrap(), Some(1));
        assert_eq!(h.storage.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_failure_persists_nothing_and_burns_serial() {
        let h = harness("svc_upload_failure").await;
        h.storage.fail_uploads.store(true, Ordering::SeqCst);

        let err = h.service.create(input("Ada")).await.unwrap_err();
        assert!(matches!(err, Error::Upload { .. }));
        assert!(h.service.list(None).await.unwrap().is_empty());
        assert_eq!(h.counters.current(2025).await.unwrap(), Some(1));

        h.storage.fail_uploads.store(false, Ordering::SeqCst);
        let certificate = h.service.create(input("Ada")).await.unwrap();
        assert_eq!(certificate.serial_number, "SN-2025-0002");
    }

    #[tokio::test]
    async fn duplicate_at_insert_becomes_conflict_and_keeps_image() {
        let h = harness("svc_duplicate_race").await;
        *h.certificates.insert_error.lock().unwrap() = Some(duplicate_serial_error);

        let err = h.service.create(input("Ada")).await.unwrap_err();
        assert!(matches!(err, Error::SerialConflict { ref serial } if serial == "SN-2025-0001"));
        assert!(h.storage.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persist_failure_removes_uploaded_image() {
        let h = harness("svc_persist_failure").await;
        *h.certificates.insert_error.lock().unwrap() = Some(database_down_error);

        let err = h.service.create(input("Ada")).await.unwrap_err();
        assert!(matches!(err, Error::Database { .. }));
        assert_eq!(*h.storage.deletes.lock().unwrap(), vec!["qr/SN-2025-0001".to_string()]);
    }

    #[tokio::test]
    async fn lookup_and_delete() {
        let h = harness("svc_lookup").await;
        h.service.create(input("Ada")).await.unwrap();

        let found = h.service.get_by_serial("SN-2025-0001").await.unwrap();
        assert!(!found.is_deleted);

        h.service.soft_delete("SN-2025-0001").await.unwrap();
        let found = h.service.get_by_serial("SN-2025-0001").await.unwrap();
        assert!(found.is_deleted);
        assert!(h.service.list(None).await.unwrap().is_empty());

        assert!(matches!(
            h.service.get_by_serial("SN-2025-0999").await.unwrap_err(),
            Error::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn canonical_serial_ahead_of_counter_is_rejected() {
        let h = harness("svc_explicit_ahead").await;
        h.service.create(input("Ada")).await.unwrap();

        let err = h.service.create(explicit("SN-2025-0003", "Grace")).await.unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field.as_deref() == Some("serialNumber")));
        assert_eq!(h.counters.current(2025).await.unwrap(), Some(1));
        assert_eq!(h.storage.uploads.lock().unwrap().len(), 1);

        let err = h.service.create(explicit("SN-2031-0001", "Grace")).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let next = h.service.create(input("Linus")).await.unwrap();
        assert_eq!(next.serial_number, "SN-2025-0002");
    }

    #[tokio::test]
    async fn failed_persist_leaves_images_of_similar_serials_alone() {
        let db = TestDatabase::new("svc_similar_serials").await;
        let dir = tempfile::tempdir().unwrap();
        let certificates = Arc::new(FlakyCertificates {
            inner: SqlxCertificateRepository::new(db.pool.clone()),
            insert_error: Mutex::new(None),
        });
        let service = CertificateService::new(
            certificates.clone(),
            Arc::new(SerialAllocator::new(
                Arc::new(SqlxSerialCounterRepository::new(db.pool.clone())),
                Arc::new(FixedScopeClock(SerialScope::new(2025))),
            )),
            Arc::new(SvgQrRenderer),
            Arc::new(LocalObjectStorage::new(dir.path(), "http://localhost/qr")),
            "https://certs.example.org/verify",
            QrOptions::default(),
        );

        let kept = service.create(explicit("A_1", "Ada")).await.unwrap();
        let kept_file = dir.path().join(kept.qr_storage_id.as_deref().unwrap());
        assert!(kept_file.exists());

        *certificates.insert_error.lock().unwrap() = Some(database_down_error);
        let err = service.create(explicit("A/1", "Grace")).await.unwrap_err();
        assert!(matches!(err, Error::Database { .. }));

        assert!(kept_file.exists(), "image of A_1 must survive");
        let remaining: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn peek_matches_next_creation() {
        let h = harness("svc_peek").await;

        let peeked = h.service.peek_next_serial().await.unwrap();
        let created = h.service.create(input("Ada")).await.unwrap();
        assert_eq!(peeked.to_string(), created.serial_number);
    }
}
