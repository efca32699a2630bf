//! Admin accounts allowed to issue certificates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Bumped on logout; tokens carrying an older value are rejected.
    pub session_version: i64,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email() {
        assert_eq!(AdminUser::normalize_email("  Admin@Example.ORG "), "admin@example.org");
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = AdminUser {
            id: "u1".into(),
            email: "a@b.c".into(),
            password_hash: "$argon2id$secret".into(),
            session_version: 0,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
