//! Filesystem blob store.
//!
//! Writes blobs under a root directory and serves them from a public base URL
//! (a static file host, a bucket mount, or `file://` for local runs).

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::traits::store::BlobStore;

pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Serve blobs as `file://` URLs under the root.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let base = format!("file://{}", root.display());
        Self::new(root, base)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a blob path under the root, refusing anything that escapes it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(MigrationError::blob(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid blob path: {}", path),
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(MigrationError::blob)?;
        }

        debug!(path, bytes = bytes.len(), content_type, "Writing blob");
        tokio::fs::write(&target, bytes)
            .await
            .map_err(MigrationError::blob)
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        let target = self.resolve(path)?;
        let exists = tokio::fs::try_exists(&target)
            .await
            .map_err(MigrationError::blob)?;
        if !exists {
            return Err(MigrationError::blob(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no blob at {}", path),
            )));
        }
        Ok(format!("{}/{}", self.public_base_url, path))
    }
}
