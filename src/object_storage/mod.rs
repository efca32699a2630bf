//! Object storage for rendered QR images.

pub mod cloudinary;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::{StorageBackend, StorageConfig};
use crate::domain::QrReference;
use crate::errors::Result;
use crate::qr::QrImage;

pub use cloudinary::CloudinaryStorage;
pub use local::LocalObjectStorage;

/// Durable reference returned by an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub storage_id: String,
}

impl From<StoredObject> for QrReference {
    fn from(object: StoredObject) -> Self {
        Self { url: object.url, storage_id: object.storage_id }
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `image` under `target_id`, replacing an existing object with
    /// the same id.
    async fn upload(&self, image: &QrImage, target_id: &str) -> Result<StoredObject>;

    /// Removes the object. Deleting a missing object is not an error.
    async fn delete(&self, storage_id: &str) -> Result<()>;
}

/// Build the backend selected by `storage.backend`.
pub fn build_object_storage(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>> {
    Ok(match config.backend {
        StorageBackend::Local => Arc::new(LocalObjectStorage::new(
            &config.local_dir,
            &config.local_public_url,
        )),
        StorageBackend::Cloudinary => Arc::new(CloudinaryStorage::new(config.cloudinary.clone())?),
    })
}

/// Hex digits of the digest suffix appended to rewritten ids.
const TARGET_DIGEST_LEN: usize = 16;

/// Maps a target id to a name that is safe in file names and URLs.
///
/// Ids made only of `[A-Za-z0-9._-]` pass through unchanged. Any other id is
/// sanitized and suffixed with `-<digest>` of the raw id, so two distinct
/// targets never share a stored object. Safe ids that already end in a
/// digest-shaped suffix are hashed as well to keep both sets disjoint.
pub(crate) fn sanitize_target_id(target_id: &str) -> String {
    let mapped: String = target_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let trimmed = mapped.trim_start_matches('.');

    if !trimmed.is_empty() && trimmed == target_id && !has_digest_suffix(trimmed) {
        return trimmed.to_string();
    }

    let digest = hex::encode(Sha256::digest(target_id.as_bytes()));
    let base = if trimmed.is_empty() { "_" } else { trimmed };
    format!("{}-{}", base, &digest[..TARGET_DIGEST_LEN])
}

fn has_digest_suffix(id: &str) -> bool {
    match id.rsplit_once('-') {
        Some((_, tail)) => {
            tail.len() == TARGET_DIGEST_LEN
                && tail.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        }
        None => false,
    }
}
