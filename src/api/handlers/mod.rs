pub mod auth;
pub mod certificates;
pub mod health;

pub use auth::{login_handler, logout_handler, me_handler};
pub use certificates::{
    create_certificate_handler, delete_certificate_handler, get_certificate_handler,
    list_certificates_handler, next_serial_handler, CreateCertificateResponse,
    ListCertificatesQuery, NextSerialResponse,
};
pub use health::{health_handler, HealthResponse};
