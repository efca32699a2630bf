//! Repository implementations for the persisted entities.

pub mod admin_user;
pub mod certificate;
pub mod serial_counter;

pub use admin_user::{AdminUserRepository, SqlxAdminUserRepository};
pub use certificate::{CertificateRepository, SqlxCertificateRepository, MAX_LIST_LIMIT};
pub use serial_counter::{SerialCounterRepository, SqlxSerialCounterRepository};
