//! Login service for email/password authentication and bearer-token checks.

use std::sync::{Arc, LazyLock};

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::hashing;
use crate::auth::jwt::JwtService;
use crate::auth::models::{AdminContext, LoginRequest, LoginResponse, NewAdmin};
use crate::domain::AdminUser;
use crate::errors::{AuthErrorKind, Error, Result};
use crate::observability::MetricsRecorder;
use crate::storage::{AdminUserRepository, DbPool, SqlxAdminUserRepository};

/// Verified against when the email is unknown so that response time does not
/// reveal whether an account exists.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hashing::hash_password("dummy_startup_value")
        .unwrap_or_else(|_| "$argon2id$v=19$m=768,t=1,p=1$dW5rbm93bg$dW5rbm93bg".to_string())
});

/// Service for handling admin authentication.
#[derive(Clone)]
pub struct LoginService {
    admins: Arc<dyn AdminUserRepository>,
    jwt: Arc<JwtService>,
    metrics: MetricsRecorder,
}

impl LoginService {
    pub fn new(admins: Arc<dyn AdminUserRepository>, jwt: Arc<JwtService>) -> Self {
        Self { admins, jwt, metrics: MetricsRecorder::new() }
    }

    pub fn with_sqlx(pool: DbPool, jwt: Arc<JwtService>) -> Self {
        Self::new(Arc::new(SqlxAdminUserRepository::new(pool)), jwt)
    }

    /// Check credentials and issue a token.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        request.validate()?;
        let email = AdminUser::normalize_email(&request.email);

        let admin = match self.admins.find_by_email(&email).await? {
            Some(admin) => admin,
            None => {
                if let Err(e) = hashing::verify_password(&request.password, &DUMMY_HASH) {
                    warn!(error = %e, "dummy hash verification failed unexpectedly");
                }
                warn!(email = %email, "login attempt for unknown admin");
                self.metrics.record_authentication("invalid_credentials");
                return Err(Error::auth(AuthErrorKind::InvalidCredentials));
            }
        };

        if !hashing::verify_password(&request.password, &admin.password_hash)? {
            warn!(admin_id = %admin.id, "login attempt with incorrect password");
            self.metrics.record_authentication("invalid_credentials");
            return Err(Error::auth(AuthErrorKind::InvalidCredentials));
        }

        let token = self.jwt.issue(&admin)?;
        self.metrics.record_authentication("login");
        info!(admin_id = %admin.id, "admin logged in");

        Ok(LoginResponse { token, email: admin.email })
    }

    /// Resolve an `Authorization` header value to the admin it belongs to.
    pub async fn authenticate(&self, header: &str) -> Result<AdminContext> {
        let token = match header.trim().strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => token.trim(),
            _ => {
                self.metrics.record_authentication("missing_bearer");
                return Err(Error::auth(AuthErrorKind::MissingToken));
            }
        };

        let claims = self.jwt.verify(token).inspect_err(|_| {
            self.metrics.record_authentication("invalid_token");
        })?;

        let admin = match self.admins.find_by_id(&claims.sub).await? {
            Some(admin) => admin,
            None => {
                self.metrics.record_authentication("unknown_user");
                return Err(Error::auth(AuthErrorKind::UnknownUser));
            }
        };

        if admin.session_version != claims.sv {
            self.metrics.record_authentication("session_expired");
            return Err(Error::auth(AuthErrorKind::SessionExpired));
        }

        self.metrics.record_authentication("success");
        Ok(AdminContext {
            id: admin.id,
            email: admin.email,
            session_version: admin.session_version,
        })
    }

    /// Invalidate every token issued to this admin so far.
    #[instrument(skip(self, context), fields(admin_id = %context.id))]
    pub async fn logout(&self, context: &AdminContext) -> Result<()> {
        let version = self.admins.bump_session_version(&context.id).await?;
        info!(session_version = version, "admin sessions invalidated");
        Ok(())
    }

    /// Create an admin account.
    #[instrument(skip(self, admin), fields(email = %admin.email))]
    pub async fn create_admin(&self, admin: &NewAdmin) -> Result<AdminUser> {
        admin.validate()?;
        let password_hash = hashing::hash_password(&admin.password)?;
        let created = self.admins.create(&admin.email, &password_hash).await?;
        info!(admin_id = %created.id, "admin created");
        Ok(created)
    }
}
