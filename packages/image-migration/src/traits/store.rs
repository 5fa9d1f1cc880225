//! Storage traits for inspection documents and image blobs.
//!
//! The engine needs very little from its backends:
//! - `DocumentStore`: key-ordered pages, point reads, partial updates
//! - `BlobStore`: upload bytes under a path, resolve a download URL

use async_trait::async_trait;

use crate::error::Result;
use crate::types::record::{DocumentPatch, InspectionRecord};

/// Document database holding inspection records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch up to `limit` records ordered by id, strictly after `after`.
    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InspectionRecord>>;

    /// Point read by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<InspectionRecord>>;

    /// Whether a record still exists.
    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Merge `patch` into the stored document (top-level fields replaced).
    async fn update(&self, collection: &str, id: &str, patch: &DocumentPatch) -> Result<()>;

    /// Exact number of records, if the backend can count cheaply.
    async fn count(&self, collection: &str) -> Result<Option<u64>> {
        let _ = collection;
        Ok(None)
    }
}

/// Object storage for image bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path`, overwriting any existing blob.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Durable URL for a previously uploaded blob.
    async fn download_url(&self, path: &str) -> Result<String>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InspectionRecord>> {
        (**self).fetch_page(collection, after, limit).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<InspectionRecord>> {
        (**self).get(collection, id).await
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        (**self).exists(collection, id).await
    }

    async fn update(&self, collection: &str, id: &str, patch: &DocumentPatch) -> Result<()> {
        (**self).update(collection, id, patch).await
    }

    async fn count(&self, collection: &str) -> Result<Option<u64>> {
        (**self).count(collection).await
    }
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for std::sync::Arc<T> {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        (**self).upload(path, bytes, content_type).await
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        (**self).download_url(path).await
    }
}
