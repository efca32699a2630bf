//! Business logic services
//!
//! This module contains service layer components that encapsulate
//! business logic, separated from HTTP concerns.

pub mod certificate_service;
pub mod serial_allocator;

pub use certificate_service::{CertificateService, CreationProgress, CreationStage};
pub use serial_allocator::SerialAllocator;
