//! # Configuration Settings
//!
//! Defines the configuration structure for the certificate registry and how it
//! is layered from defaults, an optional file and `CERTREG__*` environment
//! variables.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Environment variable prefix, e.g. `CERTREG__SERVER__PORT=5000`
pub const ENV_PREFIX: &str = "CERTREG";

const DEFAULT_JWT_SECRET: &str = "certificate-registry-development-secret-change-me";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,

    #[validate(nested)]
    pub database: DatabaseConfig,

    #[validate(nested)]
    pub auth: AuthConfig,

    #[validate(nested)]
    pub qr: QrConfig,

    #[validate(nested)]
    pub storage: StorageConfig,

    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration: defaults, then `path` (if any), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.cors_origins"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if !self.database.is_sqlite() {
            return Err(Error::validation("Database URL must start with 'sqlite:'"));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(Error::validation("JWT secret must be at least 32 characters long"));
        }

        if url::Url::parse(&self.qr.public_base_url).is_err() {
            return Err(Error::validation_field(
                format!("Invalid public base URL '{}'", self.qr.public_base_url),
                "qr.public_base_url",
            ));
        }

        if self.server.port == self.observability.metrics_port && self.observability.enable_metrics
        {
            return Err(Error::validation("Server and metrics ports cannot be the same"));
        }

        if self.storage.backend == StorageBackend::Cloudinary {
            self.storage.cloudinary.ensure_complete()?;
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    #[validate(range(min = 1024, message = "Max body size must be at least 1KB"))]
    pub max_body_size: usize,

    /// CORS allowed origins (empty = allow any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            timeout_seconds: 30,
            max_body_size: 64 * 1024,
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    #[validate(range(max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/certificates.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }
}

/// Admin authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuthConfig {
    #[validate(length(min = 1, message = "JWT secret cannot be empty"))]
    pub jwt_secret: String,

    #[validate(range(
        min = 300,
        max = 604800,
        message = "Token expiry must be between 5 minutes and 7 days"
    ))]
    pub token_expiry_seconds: u64,

    #[validate(length(min = 1, message = "JWT issuer cannot be empty"))]
    pub jwt_issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_expiry_seconds: 12 * 3600,
            jwt_issuer: "certificate-registry".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_seconds)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Verification QR code settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QrConfig {
    /// Base URL of the public frontend hosting the verification page
    #[validate(length(min = 1, message = "Public base URL cannot be empty"))]
    pub public_base_url: String,

    #[validate(length(min = 1, message = "Verify path cannot be empty"))]
    pub verify_path: String,

    /// Quiet zone around the code, in modules (0 disables it)
    #[validate(range(max = 16, message = "QR margin must be at most 16"))]
    pub margin: u32,

    /// Pixels per module
    #[validate(range(min = 1, max = 64, message = "QR scale must be between 1 and 64"))]
    pub scale: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:5173".to_string(),
            verify_path: "/verify".to_string(),
            margin: 1,
            scale: 8,
        }
    }
}

impl QrConfig {
    /// The generic verification URL every QR code points at
    pub fn verify_url(&self) -> String {
        let base = self.public_base_url.trim_end_matches('/');
        let path = self.verify_path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}

/// Where rendered QR images are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Cloudinary,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Directory used by the local backend
    #[validate(length(min = 1, message = "Local storage directory cannot be empty"))]
    pub local_dir: String,

    /// URL prefix under which the local backend files are served
    #[validate(length(min = 1, message = "Local public URL cannot be empty"))]
    pub local_public_url: String,

    #[validate(nested)]
    pub cloudinary: CloudinaryConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_dir: "./uploads/qr".to_string(),
            local_public_url: "http://localhost:5000/qr".to_string(),
            cloudinary: CloudinaryConfig::default(),
        }
    }
}

/// Cloudinary upload credentials
#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,

    #[validate(length(min = 1, message = "Cloudinary folder cannot be empty"))]
    pub folder: String,

    /// API base, overridable for tests
    #[validate(length(min = 1, message = "Cloudinary API base cannot be empty"))]
    pub api_base: String,

    #[validate(range(min = 1, max = 120, message = "Upload timeout must be between 1 and 120 seconds"))]
    pub timeout_seconds: u64,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "certificates/qr".to_string(),
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
            timeout_seconds: 20,
        }
    }
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("folder", &self.folder)
            .field("api_base", &self.api_base)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl CloudinaryConfig {
    fn ensure_complete(&self) -> Result<()> {
        for (field, value) in [
            ("storage.cloudinary.cloud_name", &self.cloud_name),
            ("storage.cloudinary.api_key", &self.api_key),
            ("storage.cloudinary.api_secret", &self.api_secret),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation_field(
                    "Cloudinary backend selected but credentials are incomplete",
                    field,
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Logging and metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Default filter directive when `RUST_LOG` is not set
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    pub json_logging: bool,

    pub enable_metrics: bool,

    /// Prometheus exporter port (0 = disabled)
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "certificate-registry".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
            enable_metrics: false,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    /// Metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if !self.enable_metrics || self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_config_bind_address() {
        let config = ServerConfig { host: "0.0.0.0".to_string(), port: 8080, ..Default::default() };
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_database_config_timeouts() {
        let config = DatabaseConfig {
            connect_timeout_seconds: 15,
            idle_timeout_seconds: 300,
            ..Default::default()
        };
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(300)));

        let config_no_idle = DatabaseConfig { idle_timeout_seconds: 0, ..Default::default() };
        assert_eq!(config_no_idle.idle_timeout(), None);
    }

    #[test]
    fn test_verify_url_joins_cleanly() {
        let config = QrConfig {
            public_base_url: "https://certs.example.org/".to_string(),
            verify_path: "/verify".to_string(),
            ..Default::default()
        };
        assert_eq!(config.verify_url(), "https://certs.example.org/verify");
        assert_eq!(QrConfig::default().verify_url(), "http://localhost:5173/verify");
    }

    #[test]
    fn test_config_validation_errors() {
        let mut config = AppConfig::default();
        config.database.url = "postgresql://localhost/certs".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.qr.public_base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.qr.scale = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cloudinary_requires_credentials() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Cloudinary;
        assert!(config.validate().is_err());

        config.storage.cloudinary.cloud_name = "demo".to_string();
        config.storage.cloudinary.api_key = "key".to_string();
        config.storage.cloudinary.api_secret = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cloudinary_debug_hides_secret() {
        let config = CloudinaryConfig { api_secret: "top-secret".to_string(), ..Default::default() };
        assert!(!format!("{:?}", config).contains("top-secret"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 6100

[qr]
public_base_url = "https://verify.example.org"
scale = 4
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 6100);
        assert_eq!(config.qr.scale, 4);
        assert_eq!(config.qr.margin, 1);
        assert_eq!(config.qr.verify_url(), "https://verify.example.org/verify");
    }
}
