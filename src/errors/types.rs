//! # Error Types
//!
//! Error taxonomy for the certificate registry using `thiserror`.

use std::fmt;

/// Custom result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the certificate registry
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Missing or malformed user input
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Serial already used by another certificate (deleted or not)
    #[error("Serial number '{serial}' already exists")]
    SerialConflict { serial: String },

    /// Unique index on `certificates.serial_number` rejected a write
    #[error("Duplicate serial number '{serial}' rejected by storage")]
    DuplicateSerial { serial: String },

    /// Serial counter storage could not complete the reservation or read
    #[error("Serial allocation unavailable for scope {scope}: {message}")]
    AllocationUnavailable { scope: i32, message: String },

    /// QR image could not be rendered
    #[error("QR rendering failed: {message}")]
    QrRender { message: String },

    /// QR image could not be stored
    #[error("Object storage upload failed: {message}")]
    Upload {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Resource not found
    #[error("{resource_type} '{id}' not found")]
    NotFound { resource_type: String, id: String },

    /// Authentication failures
    #[error("Authentication error: {message}")]
    Auth { message: String, kind: AuthErrorKind },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Authentication error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingToken,
    InvalidToken,
    UnknownUser,
    SessionExpired,
    InvalidCredentials,
}

impl AuthErrorKind {
    /// Message surfaced to clients for this failure
    pub fn message(&self) -> &'static str {
        match self {
            AuthErrorKind::MissingToken => "No token provided",
            AuthErrorKind::InvalidToken => "Invalid or expired token",
            AuthErrorKind::UnknownUser => "Invalid token user",
            AuthErrorKind::SessionExpired => "Session expired. Please login again.",
            AuthErrorKind::InvalidCredentials => "Invalid email or password",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::MissingToken => write!(f, "missing_token"),
            AuthErrorKind::InvalidToken => write!(f, "invalid_token"),
            AuthErrorKind::UnknownUser => write!(f, "unknown_user"),
            AuthErrorKind::SessionExpired => write!(f, "session_expired"),
            AuthErrorKind::InvalidCredentials => write!(f, "invalid_credentials"),
        }
    }
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Wrap a sqlx error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    pub fn serial_conflict<S: Into<String>>(serial: S) -> Self {
        Self::SerialConflict { serial: serial.into() }
    }

    pub fn duplicate_serial<S: Into<String>>(serial: S) -> Self {
        Self::DuplicateSerial { serial: serial.into() }
    }

    pub fn allocation_unavailable<S: Into<String>>(scope: i32, message: S) -> Self {
        Self::AllocationUnavailable { scope, message: message.into() }
    }

    pub fn qr_render<S: Into<String>>(message: S) -> Self {
        Self::QrRender { message: message.into() }
    }

    /// Create an upload error
    pub fn upload<S: Into<String>>(message: S) -> Self {
        Self::Upload { message: message.into(), source: None }
    }

    /// Create an upload error with source
    pub fn upload_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Upload { message: message.into(), source: Some(source) }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create an authentication error with the client-facing message of its kind
    pub fn auth(kind: AuthErrorKind) -> Self {
        Self::Auth { message: kind.message().to_string(), kind }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::Auth { .. } => 401,
            Error::NotFound { .. } => 404,
            Error::SerialConflict { .. } | Error::DuplicateSerial { .. } => 409,
            Error::Config { .. }
            | Error::Database { .. }
            | Error::Io { .. }
            | Error::AllocationUnavailable { .. }
            | Error::QrRender { .. }
            | Error::Upload { .. }
            | Error::Internal { .. } => 500,
        }
    }

    /// Transient failures a caller may retry as a whole unit
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Database { .. }
                | Error::Io { .. }
                | Error::AllocationUnavailable { .. }
                | Error::Upload { .. }
        )
    }

    /// True when the error came from the unique index on certificate serials
    pub fn is_duplicate_serial(&self) -> bool {
        matches!(self, Error::DuplicateSerial { .. })
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::Database {
            source: sqlx::Error::Migrate(Box::new(error)),
            context: "Database migration failed".to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
