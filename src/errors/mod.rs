//! # Error Handling
//!
//! Library-wide error type for the certificate registry. HTTP mapping lives in
//! [`crate::api::error`].

pub mod types;

pub use types::{AuthErrorKind, Error, Result};
