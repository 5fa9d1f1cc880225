//! Key-ordered pagination over a document collection.
//!
//! The walker keeps an opaque cursor (the id of the last record seen) and
//! treats an empty or short page as the end of the collection. A short page is
//! a heuristic: concurrent deletes can shorten a page that is not the last.

use std::time::Duration;

use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::traits::store::DocumentStore;
use crate::types::record::InspectionRecord;

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Walks one collection page by page.
pub struct CursorWalker<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: &'a str,
    page_size: usize,
    cursor: Option<String>,
    page_timeout: Duration,
    exhausted: bool,
    fetches: usize,
}

impl<'a, S: DocumentStore + ?Sized> CursorWalker<'a, S> {
    pub fn new(store: &'a S, collection: &'a str, page_size: usize, page_timeout: Duration) -> Self {
        Self {
            store,
            collection,
            page_size: page_size.max(1),
            cursor: None,
            page_timeout,
            exhausted: false,
            fetches: 0,
        }
    }

    /// Fetch the next page.
    ///
    /// Returns `Ok(None)` once the collection is exhausted. A timed-out fetch
    /// returns `MigrationError::PageTimeout` and leaves the cursor in place so
    /// the same page can be retried.
    pub async fn next_page(&mut self) -> Result<Option<Vec<InspectionRecord>>> {
        if self.exhausted {
            return Ok(None);
        }

        let requested = self.page_size;
        self.fetches += 1;
        let fetch = self
            .store
            .fetch_page(self.collection, self.cursor.as_deref(), requested);

        let page = tokio::time::timeout(self.page_timeout, fetch)
            .await
            .map_err(|_| MigrationError::PageTimeout(self.page_timeout))??;

        if page.len() < requested {
            self.exhausted = true;
        }

        if page.is_empty() {
            debug!(collection = self.collection, "Walker reached end of collection");
            return Ok(None);
        }

        if let Some(last) = page.last() {
            self.cursor = Some(last.id.clone());
        }

        debug!(
            collection = self.collection,
            records = page.len(),
            cursor = ?self.cursor,
            "Fetched page"
        );
        Ok(Some(page))
    }

    /// Halve the page size (floor 1) and return the new size.
    pub fn halve_page_size(&mut self) -> usize {
        self.page_size = (self.page_size / 2).max(1);
        self.page_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of page fetches issued so far (including timed-out ones).
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}
