//! Progress snapshots and per-batch / per-run outcomes.

use serde::Serialize;
use uuid::Uuid;

/// Snapshot handed to the progress callback.
///
/// Recreated for every callback; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    pub total: u64,
    pub migrated: u64,
    pub remaining: u64,
    pub current_batch: u64,
    pub total_batches: u64,
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// True when `total` comes from a sample rather than a count
    pub total_is_estimate: bool,
}

impl MigrationProgress {
    pub fn new(total: u64, migrated: u64, total_is_estimate: bool) -> Self {
        Self {
            total,
            migrated,
            remaining: total.saturating_sub(migrated),
            current_batch: 0,
            total_batches: 0,
            is_running: false,
            last_error: None,
            total_is_estimate,
        }
    }

    /// Percentage complete, capped at 100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.migrated as f64 / self.total as f64 * 100.0).min(100.0)
    }
}

/// Outcome of one batch, handed to the batch-complete callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    pub message: String,
    pub migrated_count: u64,
    pub error_count: u64,
    pub errors: Vec<String>,
}

impl MigrationResult {
    pub fn from_counts(batch: u64, records: usize, migrated: u64, errors: Vec<String>) -> Self {
        let error_count = errors.len() as u64;
        let message = if error_count == 0 {
            format!(
                "Batch {}: migrated {} of {} records",
                batch, migrated, records
            )
        } else {
            format!(
                "Batch {}: migrated {} of {} records with {} errors",
                batch, migrated, records, error_count
            )
        };
        Self {
            success: error_count == 0,
            message,
            migrated_count: migrated,
            error_count,
            errors,
        }
    }
}

/// What the rewriter did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Fields rewritten and completion markers written
    Migrated,
    /// `migrationCompleted` was already set
    AlreadyMigrated,
    /// No inline images in any field
    NothingToMigrate,
    /// Inline images present but every upload failed; nothing written
    Unchanged,
    /// Record deleted before write-back
    Vanished,
    /// Dry run: record would have been rewritten
    WouldMigrate,
}

/// Per-record outcome. Errors are captured here instead of propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub status: RecordStatus,
    pub migrated_images: usize,
    pub errors: Vec<String>,
}

impl RecordOutcome {
    pub fn status(status: RecordStatus) -> Self {
        Self {
            status,
            migrated_images: 0,
            errors: Vec::new(),
        }
    }

    /// Whether this record counts toward the migrated counter.
    pub fn counts_as_migrated(&self) -> bool {
        matches!(
            self.status,
            RecordStatus::Migrated | RecordStatus::WouldMigrate
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Walker ran out of pages
    Completed,
    /// Stop was requested and honoured between batches
    Stopped,
}

/// Totals of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub batches: u64,
    pub migrated: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Result of a verification walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// No record still carries inline images
    Passed,
    /// Some records remain to be migrated
    Incomplete { remaining: u64 },
}
