//! # Certificate Registry
//!
//! Issues course certificates identified by human-readable serial numbers of
//! the form `SN-<year>-<seq>`, publishes a verification QR image for each one
//! and answers public lookups by serial.
//!
//! ## Architecture
//!
//! ```text
//! REST API (axum) → CertificateService → SerialAllocator → serial_counters
//!       ↓                  ↓                                     ↓
//!  JWT admin auth    QR render + object storage           SQLite (sqlx)
//! ```
//!
//! Serial numbers are handed out by a single atomic upsert per reservation, so
//! concurrent creators never observe the same sequence. A unique index on
//! `certificates.serial_number` backs explicit serials supplied by admins.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod object_storage;
pub mod observability;
pub mod qr;
pub mod services;
pub mod startup;
pub mod storage;

pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
