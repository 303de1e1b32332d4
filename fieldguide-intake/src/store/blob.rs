//! [`BlobStorage`] on the local filesystem
//!
//! Objects live at `<root>/<bucket>/<path>` and are published under
//! `<base_url>/blobs/<bucket>/<path>`.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{BlobStorage, StoreError};

#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStorage {
    pub fn new(root: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let safe = !bucket.is_empty()
            && !bucket.contains(['/', '\\'])
            && bucket != ".."
            && !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::Rejected(format!(
                "Invalid object path: {}/{}",
                bucket, path
            )));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Uploads never overwrite an existing object
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::Rejected("The resource already exists".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;

        tracing::debug!(bucket, path, bytes = bytes.len(), "Blob uploaded");
        Ok(())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StoreError> {
        let target = self.object_path(bucket, path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                tracing::debug!(bucket, path, "Blob removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/blobs/{}/{}", self.base_url, bucket, path)
    }
}
