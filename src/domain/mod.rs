//! Domain types shared by storage, services and the HTTP layer.

pub mod admin;
pub mod certificate;
pub mod serial;

pub use admin::AdminUser;
pub use certificate::{
    Certificate, CreateCertificateInput, NewCertificate, QrReference, ValidatedCertificateInput,
};
pub use serial::{
    CalendarYearClock, FixedScopeClock, ScopeClock, SerialNumber, SerialParseError, SerialScope,
};
