//! Certificate records and the payloads used to create them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::errors::{Error, Result};

/// Stored certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: i64,
    pub serial_number: String,
    pub student_name: String,
    pub course: Option<String>,
    pub position: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub qr_url: Option<String>,
    pub qr_storage_id: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Durable handle to an uploaded QR image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrReference {
    pub url: String,
    pub storage_id: String,
}

/// Admin request body for certificate creation.
///
/// The admin form posts empty strings for untouched fields, so blank values
/// are read as absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCertificateInput {
    /// Used verbatim when present. A value in the `SN-<year>-<seq>` form
    /// must already have been issued for that year.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub student_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub course: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    #[schema(value_type = Option<String>, format = Date)]
    pub issue_date: Option<NaiveDate>,
}

/// Input that passed boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCertificateInput {
    pub explicit_serial: Option<String>,
    pub student_name: String,
    pub course: Option<String>,
    pub position: Option<String>,
    pub issue_date: Option<NaiveDate>,
}

impl CreateCertificateInput {
    pub fn validate(self) -> Result<ValidatedCertificateInput> {
        let student_name = self
            .student_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::validation_field("studentName required", "studentName"))?;

        Ok(ValidatedCertificateInput {
            explicit_serial: trimmed(self.serial_number),
            student_name,
            course: trimmed(self.course),
            position: trimmed(self.position),
            issue_date: self.issue_date,
        })
    }
}

/// Row payload handed to the certificate store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCertificate {
    pub serial_number: String,
    pub student_name: String,
    pub course: Option<String>,
    pub position: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub qr: Option<QrReference>,
}

impl NewCertificate {
    pub fn from_input(input: ValidatedCertificateInput, serial_number: String, qr: QrReference) -> Self {
        Self {
            serial_number,
            student_name: input.student_name,
            course: input.course,
            position: input.position,
            issue_date: input.issue_date,
            qr: Some(qr),
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

fn blank_date_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_issue_date(raw).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (date part is kept).
fn parse_issue_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| format!("invalid issueDate '{}', expected YYYY-MM-DD", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_form_fields_are_absent() {
        let input: CreateCertificateInput = serde_json::from_value(json!({
            "serialNumber": "",
            "studentName": "Ada Lovelace",
            "course": "  ",
            "position": "",
            "issueDate": ""
        }))
        .unwrap();

        assert_eq!(input.serial_number, None);
        assert_eq!(input.course, None);
        assert_eq!(input.issue_date, None);
        assert_eq!(input.student_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn issue_date_accepts_date_and_timestamp() {
        let input: CreateCertificateInput =
            serde_json::from_value(json!({"studentName": "A", "issueDate": "2025-03-14"})).unwrap();
        assert_eq!(input.issue_date, NaiveDate::from_ymd_opt(2025, 3, 14));

        let input: CreateCertificateInput = serde_json::from_value(
            json!({"studentName": "A", "issueDate": "2025-03-14T10:00:00Z"}),
        )
        .unwrap();
        assert_eq!(input.issue_date, NaiveDate::from_ymd_opt(2025, 3, 14));

        let bad = serde_json::from_value::<CreateCertificateInput>(
            json!({"studentName": "A", "issueDate": "14/03/2025"}),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn validate_requires_student_name() {
        let err = CreateCertificateInput::default().validate().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = CreateCertificateInput { student_name: Some("   ".into()), ..Default::default() }
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn validate_trims_values() {
        let validated = CreateCertificateInput {
            serial_number: Some(" LEGACY-7 ".into()),
            student_name: Some(" Grace Hopper ".into()),
            course: Some("Compilers".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(validated.explicit_serial.as_deref(), Some("LEGACY-7"));
        assert_eq!(validated.student_name, "Grace Hopper");
        assert_eq!(validated.course.as_deref(), Some("Compilers"));
        assert_eq!(validated.position, None);
    }

    #[test]
    fn certificate_serializes_camel_case() {
        let cert = Certificate {
            id: 1,
            serial_number: "SN-2025-0001".into(),
            student_name: "Ada".into(),
            course: None,
            position: None,
            issue_date: None,
            qr_url: Some("https://cdn/qr.svg".into()),
            qr_storage_id: Some("certificates/qr/SN-2025-0001".into()),
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&cert).unwrap();
        assert_eq!(value["serialNumber"], "SN-2025-0001");
        assert_eq!(value["qrStorageId"], "certificates/qr/SN-2025-0001");
        assert_eq!(value["isDeleted"], false);
    }
}
