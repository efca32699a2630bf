//! Cloudinary backend using signed upload and destroy calls.
//!
//! Signatures are the hex SHA-256 of the sorted `key=value` parameters joined
//! with `&`, followed by the API secret.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, instrument, warn};

use super::{sanitize_target_id, ObjectStorage, StoredObject};
use crate::config::CloudinaryConfig;
use crate::errors::{Error, Result};
use crate::qr::QrImage;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryStorage {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryStorage {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        if config.cloud_name.is_empty() || config.api_key.is_empty() || config.api_secret.is_empty()
        {
            return Err(Error::config("Cloudinary cloud_name, api_key and api_secret are required"));
        }

        let client = reqwest::Client::builder().timeout(config.timeout()).build().map_err(|e| {
            Error::config_with_source("Failed to build Cloudinary HTTP client", Box::new(e))
        })?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            action
        )
    }

    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        sign_params(params, &self.config.api_secret)
    }

    /// Adds `api_key`, `signature` and `signature_algorithm` to signed params.
    fn signed_form(&self, params: BTreeMap<&'static str, String>) -> Vec<(&'static str, String)> {
        let signature = self.sign(&params);
        let mut form: Vec<(&'static str, String)> = params.into_iter().collect();
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));
        form
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => format!("{} ({})", body.error.message, status),
            Err(_) => format!("unexpected status {}", status),
        }
    }
}

pub(crate) fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn unix_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

#[async_trait]
impl ObjectStorage for CloudinaryStorage {
    #[instrument(skip(self, image), fields(cloud = %self.config.cloud_name))]
    async fn upload(&self, image: &QrImage, target_id: &str) -> Result<StoredObject> {
        let mut params = BTreeMap::new();
        params.insert("folder", self.config.folder.clone());
        params.insert("overwrite", "true".to_string());
        params.insert("public_id", sanitize_target_id(target_id));
        params.insert("timestamp", unix_timestamp());

        let mut form = self.signed_form(params);
        form.push(("file", image.to_data_uri()));

        let response = self.client.post(self.endpoint("upload")).form(&form).send().await.map_err(
            |e| {
                error!(error = %e, "Cloudinary upload request failed");
                Error::upload_with_source("Cloudinary upload request failed", Box::new(e))
            },
        )?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            error!(%message, "Cloudinary rejected upload");
            return Err(Error::upload(format!("Cloudinary rejected upload: {}", message)));
        }

        let body: UploadResponse = response.json().await.map_err(|e| {
            Error::upload_with_source("Malformed Cloudinary upload response", Box::new(e))
        })?;

        debug!(public_id = %body.public_id, "QR image uploaded to Cloudinary");
        Ok(StoredObject { url: body.secure_url, storage_id: body.public_id })
    }

    #[instrument(skip(self), fields(cloud = %self.config.cloud_name))]
    async fn delete(&self, storage_id: &str) -> Result<()> {
        let mut params = BTreeMap::new();
        params.insert("public_id", storage_id.to_string());
        params.insert("timestamp", unix_timestamp());
        let form = self.signed_form(params);

        let response =
            self.client.post(self.endpoint("destroy")).form(&form).send().await.map_err(|e| {
                Error::upload_with_source("Cloudinary destroy request failed", Box::new(e))
            })?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            return Err(Error::upload(format!("Cloudinary rejected destroy: {}", message)));
        }

        let body: DestroyResponse = response.json().await.map_err(|e| {
            Error::upload_with_source("Malformed Cloudinary destroy response", Box::new(e))
        })?;

        match body.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                warn!(%storage_id, "QR image already absent from Cloudinary");
                Ok(())
            }
            other => Err(Error::upload(format!("Cloudinary destroy returned '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::SVG_CONTENT_TYPE;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_base: &str) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key-123".to_string(),
            api_secret: "secret-456".to_string(),
            folder: "certificates/qr".to_string(),
            api_base: api_base.to_string(),
            timeout_seconds: 5,
        }
    }

    fn image() -> QrImage {
        QrImage { bytes: b"<svg/>".to_vec(), content_type: SVG_CONTENT_TYPE }
    }

    #[test]
    fn signature_sorts_params_and_appends_secret() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1700000000".to_string());
        params.insert("public_id", "SN-2025-0001".to_string());

        let mut hasher = Sha256::new();
        hasher.update(b"public_id=SN-2025-0001&timestamp=1700000000secret");
        assert_eq!(sign_params(&params, "secret"), hex::encode(hasher.finalize()));
    }

    #[test]
    fn incomplete_config_is_rejected() {
        let mut cfg = config("http://localhost");
        cfg.api_secret.clear();
        assert!(CloudinaryStorage::new(cfg).is_err());
    }

    #[tokio::test]
    async fn upload_posts_signed_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .and(body_string_contains("public_id=SN-2025-0001"))
            .and(body_string_contains("api_key=key-123"))
            .and(body_string_contains("signature_algorithm=sha256"))
            .and(body_string_contains("overwrite=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "secure_url": "https://res.cloudinary.com/demo/image/upload/v1/certificates/qr/SN-2025-0001.svg",
                "public_id": "certificates/qr/SN-2025-0001"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = CloudinaryStorage::new(config(&server.uri())).unwrap();
        let stored = storage.upload(&image(), "SN-2025-0001").await.unwrap();

        assert_eq!(stored.storage_id, "certificates/qr/SN-2025-0001");
        assert!(stored.url.ends_with("SN-2025-0001.svg"));
    }

    #[tokio::test]
    async fn upload_error_surfaces_cloudinary_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Invalid Signature"}
            })))
            .mount(&server)
            .await;

        let storage = CloudinaryStorage::new(config(&server.uri())).unwrap();
        let err = storage.upload(&image(), "SN-2025-0001").await.unwrap_err();

        assert!(matches!(err, Error::Upload { .. }));
        assert!(err.to_string().contains("Invalid Signature"));
    }

    #[tokio::test]
    async fn destroy_accepts_ok_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .and(body_string_contains("public_id=gone"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "not found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "ok"})),
            )
            .mount(&server)
            .await;

        let storage = CloudinaryStorage::new(config(&server.uri())).unwrap();
        storage.delete("certificates/qr/SN-2025-0001").await.unwrap();
        storage.delete("gone").await.unwrap();
    }
}
