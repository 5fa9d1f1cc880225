//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde_json::{Map, Value};

use crate::error::{MigrationError, Result};
use crate::traits::store::{BlobStore, DocumentStore};
use crate::types::record::{DocumentPatch, InspectionRecord};

type Collection = BTreeMap<String, Map<String, Value>>;

/// In-memory document store.
///
/// Collections are `BTreeMap`s so pages come back in id order, like a
/// `ORDER BY id` query would. Not suitable for production as data is lost on
/// restart.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    page_fetches: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryDocumentStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, collection: &str, record: InspectionRecord) {
        self.collections
            .write()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(record.id, record.data);
    }

    /// Remove a record, returning whether it existed.
    pub fn remove(&self, collection: &str, id: &str) -> bool {
        self.collections
            .write()
            .unwrap()
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false)
    }

    /// Read a record without going through the async trait.
    pub fn record(&self, collection: &str, id: &str) -> Option<InspectionRecord> {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|data| InspectionRecord::new(id, data.clone()))
    }

    /// All records of a collection in id order.
    pub fn records(&self, collection: &str) -> Vec<InspectionRecord> {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map(|c| {
                c.iter()
                    .map(|(id, data)| InspectionRecord::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of `fetch_page` calls served.
    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }

    /// Number of `update` calls served.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InspectionRecord>> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);

        let collections = self.collections.read().unwrap();
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let lower = match after {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Unbounded,
        };

        Ok(records
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(id, data)| InspectionRecord::new(id.clone(), data.clone()))
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<InspectionRecord>> {
        Ok(self.record(collection, id))
    }

    async fn update(&self, collection: &str, id: &str, patch: &DocumentPatch) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        let data = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| MigrationError::InvalidRecord {
                record_id: id.to_string(),
                reason: format!("not found in {}", collection),
            })?;

        patch.apply_to(data);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<Option<u64>> {
        Ok(Some(
            self.collections
                .read()
                .unwrap()
                .get(collection)
                .map(|c| c.len() as u64)
                .unwrap_or(0),
        ))
    }
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory blob store. URLs are `{base_url}/{path}`.
pub struct MemoryBlobStore {
    base_url: String,
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://blobs")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn blob(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.read().unwrap().get(path).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    /// Paths of all stored blobs, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.blobs.read().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.blobs.write().unwrap().insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        if !self.blobs.read().unwrap().contains_key(path) {
            return Err(MigrationError::blob(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no blob at {}", path),
            )));
        }
        Ok(format!("{}/{}", self.base_url, path))
    }
}
