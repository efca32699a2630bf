//! JWT issuing and verification for admin sessions.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AuthConfig;
use crate::domain::AdminUser;
use crate::errors::{AuthErrorKind, Error, Result};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Admin id
    pub sub: String,
    pub email: String,
    /// Session version at issuance
    pub sv: i64,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Signs and validates HS256 tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.jwt_issuer.clone(), config.token_expiry())
    }

    /// Issue a token bound to the admin's current session version
    pub fn issue(&self, admin: &AdminUser) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: admin.id.clone(),
            email: admin.email.clone(),
            sv: admin.session_version,
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("Failed to sign token: {}", e)))
    }

    /// Validate signature, issuer and expiry
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                Error::auth(AuthErrorKind::InvalidToken)
            })
    }
}
