//! Filesystem backend. Files are served by the HTTP server under `/qr`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::{sanitize_target_id, ObjectStorage, StoredObject};
use crate::errors::{Error, Result};
use crate::qr::{QrImage, SVG_CONTENT_TYPE};

#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl AsRef<Path>, public_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn extension(content_type: &str) -> &'static str {
        match content_type {
            SVG_CONTENT_TYPE => "svg",
            "image/png" => "png",
            _ => "bin",
        }
    }

    /// Storage ids are plain file names; anything with a path component is refused.
    fn path_for(&self, storage_id: &str) -> Result<PathBuf> {
        if storage_id.is_empty()
            || storage_id.contains(['/', '\\'])
            || storage_id.starts_with('.')
        {
            return Err(Error::upload(format!("Invalid storage id '{}'", storage_id)));
        }
        Ok(self.root.join(storage_id))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    #[instrument(skip(self, image), fields(root = %self.root.display()))]
    async fn upload(&self, image: &QrImage, target_id: &str) -> Result<StoredObject> {
        let file_name =
            format!("{}.{}", sanitize_target_id(target_id), Self::extension(image.content_type));
        let path = self.path_for(&file_name)?;

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::upload_with_source(
                format!("Failed to create storage directory {}", self.root.display()),
                Box::new(e),
            )
        })?;
        tokio::fs::write(&path, &image.bytes).await.map_err(|e| {
            Error::upload_with_source(format!("Failed to write {}", path.display()), Box::new(e))
        })?;

        debug!(path = %path.display(), bytes = image.bytes.len(), "QR image stored");
        Ok(StoredObject { url: format!("{}/{}", self.public_url, file_name), storage_id: file_name })
    }

    #[instrument(skip(self))]
    async fn delete(&self, storage_id: &str) -> Result<()> {
        let path = self.path_for(storage_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "QR image already absent");
                Ok(())
            }
            Err(e) => Err(Error::upload_with_source(
                format!("Failed to delete {}", path.display()),
                Box::new(e),
            )),
        }
    }
}
