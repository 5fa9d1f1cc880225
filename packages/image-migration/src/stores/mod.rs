//! Storage implementations for the migration engine.
//!
//! Available backends:
//! - `MemoryDocumentStore` / `MemoryBlobStore` - In-memory (always available)
//! - `FsBlobStore` - Blobs on a local or mounted filesystem
//! - `PostgresDocumentStore` - JSONB documents (requires `postgres` feature)

pub mod filesystem;
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use filesystem::FsBlobStore;
pub use memory::{MemoryBlobStore, MemoryDocumentStore, StoredBlob};

#[cfg(feature = "postgres")]
pub use postgres::PostgresDocumentStore;
