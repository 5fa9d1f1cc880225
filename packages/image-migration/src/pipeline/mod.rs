//! Migration pipeline.
//!
//! The pipeline is three layers:
//! - Walker: key-ordered pages with a per-fetch timeout
//! - Rewriter: one record at a time, inline images out to blob storage
//! - Runner: batches, callbacks, stop, error ceiling and estimates

pub mod rewriter;
pub mod runner;
pub mod walker;

pub use rewriter::{RecordRewriter, DEFAULT_MAX_CONCURRENT_UPLOADS};
pub use runner::{MigrationRunner, RunnerConfig, RunnerState};
pub use walker::{CursorWalker, DEFAULT_PAGE_SIZE};
