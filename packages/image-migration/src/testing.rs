//! Testing utilities including fault-injecting store wrappers.
//!
//! These are useful for exercising the migration engine without a real
//! database or object store.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::{MigrationError, Result};
use crate::traits::store::{BlobStore, DocumentStore};
use crate::types::record::{DocumentPatch, InspectionRecord};

// =============================================================================
// Record builders
// =============================================================================

/// A PNG-flavoured data URI wrapping `bytes`.
pub fn inline_image(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// An overhead line inspection with one `images` field.
pub fn line_record(id: &str, images: &[&str]) -> InspectionRecord {
    InspectionRecord::from_json(
        id,
        json!({
            "feeder": "F-12",
            "images": images,
        }),
    )
}

/// A substation inspection with before/after fields.
pub fn substation_record(id: &str, before: &[&str], after: &[&str]) -> InspectionRecord {
    InspectionRecord::from_json(
        id,
        json!({
            "substationNumber": "SS-204",
            "beforeImages": before,
            "afterImages": after,
        }),
    )
}

/// String entries of a field, for assertions.
pub fn field_strings(record: &InspectionRecord, field: &str) -> Vec<String> {
    record
        .image_values(field)
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Blob store faults
// =============================================================================

/// Blob store wrapper that fails uploads on demand.
pub struct FlakyBlobStore<B> {
    inner: B,
    fail_paths_containing: RwLock<Vec<String>>,
    fail_all: bool,
    uploads: AtomicUsize,
}

impl<B: BlobStore> FlakyBlobStore<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            fail_paths_containing: RwLock::new(Vec::new()),
            fail_all: false,
            uploads: AtomicUsize::new(0),
        }
    }

    /// Fail every upload.
    pub fn failing(inner: B) -> Self {
        Self {
            fail_all: true,
            ..Self::new(inner)
        }
    }

    /// Fail uploads whose path contains `needle`.
    pub fn fail_when_path_contains(self, needle: impl Into<String>) -> Self {
        self.fail_paths_containing.write().unwrap().push(needle.into());
        self
    }

    /// Number of upload attempts, including failed ones.
    pub fn upload_attempts(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: BlobStore> BlobStore for FlakyBlobStore<B> {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let fails = self.fail_all
            || self
                .fail_paths_containing
                .read()
                .unwrap()
                .iter()
                .any(|needle| path.contains(needle.as_str()));
        if fails {
            return Err(MigrationError::blob(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("injected upload failure for {}", path),
            )));
        }
        self.inner.upload(path, bytes, content_type).await
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        self.inner.download_url(path).await
    }
}

// =============================================================================
// Document store faults
// =============================================================================

/// Document store wrapper whose first `slow_calls` page fetches sleep for `delay`.
pub struct SlowDocumentStore<S> {
    inner: S,
    delay: Duration,
    remaining_slow: AtomicUsize,
}

impl<S: DocumentStore> SlowDocumentStore<S> {
    pub fn new(inner: S, delay: Duration, slow_calls: usize) -> Self {
        Self {
            inner,
            delay,
            remaining_slow: AtomicUsize::new(slow_calls),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for SlowDocumentStore<S> {
    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InspectionRecord>> {
        let slow = self
            .remaining_slow
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if slow {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.fetch_page(collection, after, limit).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<InspectionRecord>> {
        self.inner.get(collection, id).await
    }

    async fn update(&self, collection: &str, id: &str, patch: &DocumentPatch) -> Result<()> {
        self.inner.update(collection, id, patch).await
    }

    async fn count(&self, collection: &str) -> Result<Option<u64>> {
        self.inner.count(collection).await
    }
}

/// Document store whose page fetches always fail with a non-timeout error.
#[derive(Default)]
pub struct BrokenDocumentStore {
    attempts: AtomicUsize,
}

impl BrokenDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for BrokenDocumentStore {
    async fn fetch_page(
        &self,
        _collection: &str,
        _after: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<InspectionRecord>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MigrationError::store(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "document store unavailable",
        )))
    }

    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<InspectionRecord>> {
        Ok(None)
    }

    async fn update(&self, _collection: &str, id: &str, _patch: &DocumentPatch) -> Result<()> {
        Err(MigrationError::InvalidRecord {
            record_id: id.to_string(),
            reason: "document store unavailable".to_string(),
        })
    }
}

/// Document store wrapper that reports chosen records as deleted at
/// write-back time, simulating a concurrent delete after the page was read.
pub struct VanishingDocumentStore<S> {
    inner: S,
    vanished: RwLock<HashSet<String>>,
}

impl<S: DocumentStore> VanishingDocumentStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            vanished: RwLock::new(HashSet::new()),
        }
    }

    pub fn vanish(self, id: impl Into<String>) -> Self {
        self.vanished.write().unwrap().insert(id.into());
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for VanishingDocumentStore<S> {
    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InspectionRecord>> {
        self.inner.fetch_page(collection, after, limit).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<InspectionRecord>> {
        if self.vanished.read().unwrap().contains(id) {
            return Ok(None);
        }
        self.inner.get(collection, id).await
    }

    async fn update(&self, collection: &str, id: &str, patch: &DocumentPatch) -> Result<()> {
        self.inner.update(collection, id, patch).await
    }
}
