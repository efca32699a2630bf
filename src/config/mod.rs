//! # Configuration Management
//!
//! Layered configuration for the certificate registry. See [`settings`] for the
//! individual sections.

pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, CloudinaryConfig, DatabaseConfig, ObservabilityConfig, QrConfig,
    ServerConfig, StorageBackend, StorageConfig, ENV_PREFIX,
};
