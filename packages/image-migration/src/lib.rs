//! Batch migration of inline inspection images into blob storage.
//!
//! Inspection documents (overhead line and substation inspections) used to
//! carry their photos inline as base64 data URIs. This library walks a
//! collection page by page, uploads every inline image to a blob store,
//! replaces it with a download URL and marks the record as migrated.
//!
//! # Usage
//!
//! ```rust,ignore
//! use image_migration::{MigrationPlan, MigrationRunner, MemoryBlobStore, MemoryDocumentStore};
//!
//! let runner = MigrationRunner::new(
//!     MemoryDocumentStore::new(),
//!     MemoryBlobStore::new(),
//!     MigrationPlan::overhead_line_inspections(),
//! );
//!
//! let summary = runner
//!     .start(10, |p| println!("{}/{}", p.migrated, p.total), |_| {})
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Document and blob store contracts
//! - [`types`] - Records, plans, image classification, progress
//! - [`pipeline`] - Walker, rewriter and runner
//! - [`stores`] - Memory, filesystem and Postgres backends
//! - [`config`] - Environment configuration
//! - [`testing`] - Fault-injecting wrappers for tests

pub mod config;
pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use config::Config;
pub use error::{MigrationError, Result};
pub use pipeline::{CursorWalker, MigrationRunner, RecordRewriter, RunnerConfig, RunnerState};
pub use stores::{FsBlobStore, MemoryBlobStore, MemoryDocumentStore};
pub use traits::store::{BlobStore, DocumentStore};
pub use types::{
    image::{is_inline, ImageValue},
    plan::{all_plans, find_plan, ImageField, MigrationPlan},
    progress::{
        MigrationProgress, MigrationResult, RecordOutcome, RecordStatus, RunOutcome, RunSummary,
        VerifyResult,
    },
    record::{DocumentPatch, InspectionRecord},
};

#[cfg(feature = "postgres")]
pub use stores::PostgresDocumentStore;
