//! Batch orchestration for image migrations.
//!
//! The `MigrationRunner` drives one plan end to end:
//!
//! ```text
//! MigrationRunner
//!     │
//!     ├─► CursorWalker.next_page()      (timeout → halve page size, retry)
//!     ├─► RecordRewriter.rewrite(record) (sequential per record)
//!     ├─► on_progress / on_batch_complete
//!     ├─► sleep(batch_delay)
//!     └─► check stop token, loop
//! ```
//!
//! A runner is an ordinary value: construct as many as needed. Each one
//! allows a single run at a time; stop is cooperative and only takes effect
//! between batches.

use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::rewriter::{RecordRewriter, DEFAULT_MAX_CONCURRENT_UPLOADS};
use super::walker::{CursorWalker, DEFAULT_PAGE_SIZE};
use crate::error::{MigrationError, Result};
use crate::traits::store::{BlobStore, DocumentStore};
use crate::types::plan::MigrationPlan;
use crate::types::progress::{
    MigrationProgress, MigrationResult, RecordStatus, RunOutcome, RunSummary, VerifyResult,
};
use crate::types::record::InspectionRecord;

/// Configuration for a migration runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Records per page when the caller does not choose one
    pub batch_size: usize,
    /// Pause between batches so the backend is not saturated
    pub batch_delay: Duration,
    /// Upper bound on a single page fetch
    pub page_timeout: Duration,
    /// Errors tolerated across a run before it is aborted
    pub max_errors: usize,
    /// Uploads in flight for one image field
    pub max_concurrent_uploads: usize,
    /// Records read by the cheap progress estimate
    pub sample_size: usize,
    /// Lower bound on the sampled total
    pub estimate_floor: u64,
    /// Count inline images without uploading or writing
    pub dry_run: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_PAGE_SIZE,
            batch_delay: Duration::from_millis(100),
            page_timeout: Duration::from_secs(30),
            max_errors: 10,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            sample_size: 5,
            estimate_floor: 100,
            dry_run: false,
        }
    }
}

/// Lifecycle of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    /// Last run ended because stop was requested
    Stopped,
}

/// Marks the runner as running for the lifetime of one run.
struct RunGuard<'a> {
    state: &'a Mutex<RunnerState>,
    final_state: RunnerState,
}

impl<'a> RunGuard<'a> {
    /// Enter the running state with `token` installed as the stop token.
    ///
    /// The token is swapped under the state lock so a `stop()` that observes
    /// `Running` always reaches the token of this run.
    fn acquire(
        state: &'a Mutex<RunnerState>,
        stop_token: &Mutex<CancellationToken>,
        token: CancellationToken,
    ) -> Result<Self> {
        let mut current = state.lock().unwrap();
        if *current == RunnerState::Running {
            return Err(MigrationError::AlreadyRunning);
        }
        *stop_token.lock().unwrap() = token;
        *current = RunnerState::Running;
        Ok(Self {
            state,
            final_state: RunnerState::Idle,
        })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut current) = self.state.lock() {
            *current = self.final_state;
        }
    }
}

/// Running totals of one run.
#[derive(Default)]
struct RunTotals {
    batches: u64,
    migrated: u64,
    /// Records needing no work: already migrated, no inline images, or deleted
    settled: u64,
    /// Records seen but left with inline images (failed uploads or errors)
    pending: u64,
    errors: usize,
    last_error: Option<String>,
}

impl RunTotals {
    fn record_error(&mut self, message: String) {
        self.errors += 1;
        self.last_error = Some(message);
    }

    /// Records this run has finished with, migrated or not.
    fn processed(&self) -> u64 {
        self.migrated + self.settled
    }
}

/// Per-batch tallies beyond what `MigrationResult` reports.
struct BatchTally {
    result: MigrationResult,
    settled: u64,
    pending: u64,
}

/// Drives a migration plan over a document store and a blob store.
pub struct MigrationRunner<D, B> {
    documents: D,
    blobs: B,
    plan: MigrationPlan,
    config: RunnerConfig,
    state: Mutex<RunnerState>,
    stop_token: Mutex<CancellationToken>,
}

impl<D: DocumentStore, B: BlobStore> MigrationRunner<D, B> {
    pub fn new(documents: D, blobs: B, plan: MigrationPlan) -> Self {
        Self::with_config(documents, blobs, plan, RunnerConfig::default())
    }

    pub fn with_config(documents: D, blobs: B, plan: MigrationPlan, config: RunnerConfig) -> Self {
        Self {
            documents,
            blobs,
            plan,
            config,
            state: Mutex::new(RunnerState::Idle),
            stop_token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn plan(&self) -> &MigrationPlan {
        &self.plan
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn state(&self) -> RunnerState {
        *self.state.lock().unwrap()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunnerState::Running
    }

    /// Request the current run to halt before its next batch.
    ///
    /// In-flight uploads and writes are not cancelled. Poll `is_running` to
    /// observe the actual halt. Does nothing when idle.
    pub fn stop(&self) {
        let token = self.stop_token.lock().unwrap();
        if !token.is_cancelled() {
            info!(plan = %self.plan.name, "Stop requested");
            token.cancel();
        }
    }

    /// Run the migration with a fresh stop token.
    ///
    /// `batch_size` of 0 uses the configured default.
    pub async fn start<P, C>(
        &self,
        batch_size: usize,
        on_progress: P,
        on_batch_complete: C,
    ) -> Result<RunSummary>
    where
        P: FnMut(&MigrationProgress) + Send,
        C: FnMut(&MigrationResult) + Send,
    {
        self.start_with_token(batch_size, CancellationToken::new(), on_progress, on_batch_complete)
            .await
    }

    /// Run the migration, halting between batches once `token` is cancelled.
    ///
    /// `stop()` cancels the same token.
    pub async fn start_with_token<P, C>(
        &self,
        batch_size: usize,
        token: CancellationToken,
        mut on_progress: P,
        mut on_batch_complete: C,
    ) -> Result<RunSummary>
    where
        P: FnMut(&MigrationProgress) + Send,
        C: FnMut(&MigrationResult) + Send,
    {
        self.plan.validate()?;
        let mut guard = RunGuard::acquire(&self.state, &self.stop_token, token.clone())?;

        let run_id = Uuid::new_v4();
        let batch_size = if batch_size == 0 {
            self.config.batch_size
        } else {
            batch_size
        };
        info!(
            run_id = %run_id,
            plan = %self.plan.name,
            collection = %self.plan.collection,
            batch_size,
            dry_run = self.config.dry_run,
            "Starting image migration"
        );

        let estimate = match self.sample_estimate(batch_size).await {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Progress estimate failed, starting without one");
                MigrationProgress::new(0, 0, true)
            }
        };

        let mut progress = MigrationProgress {
            migrated: 0,
            remaining: estimate.total,
            current_batch: 0,
            is_running: true,
            last_error: None,
            ..estimate
        };
        on_progress(&progress);

        let mut walker = CursorWalker::new(
            &self.documents,
            &self.plan.collection,
            batch_size,
            self.config.page_timeout,
        );
        let rewriter = RecordRewriter::new(&self.documents, &self.blobs, &self.plan)
            .with_max_concurrent_uploads(self.config.max_concurrent_uploads)
            .with_dry_run(self.config.dry_run);

        let mut totals = RunTotals::default();
        let outcome = loop {
            if token.is_cancelled() {
                break RunOutcome::Stopped;
            }

            let page = match walker.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break RunOutcome::Completed,
                Err(e) => {
                    if e.is_timeout() {
                        let page_size = walker.halve_page_size();
                        warn!(run_id = %run_id, page_size, error = %e, "Page fetch timed out, shrinking pages");
                    } else {
                        warn!(run_id = %run_id, error = %e, "Page fetch failed, retrying");
                    }
                    totals.record_error(e.to_string());
                    if totals.errors > self.config.max_errors {
                        return Err(self.abort(run_id, &mut progress, &totals, &mut on_progress));
                    }
                    tokio::time::sleep(self.config.batch_delay).await;
                    continue;
                }
            };

            totals.batches += 1;
            let batch = totals.batches;
            let BatchTally {
                result,
                settled,
                pending,
            } = self.process_batch(&rewriter, &page, batch).await;

            totals.migrated += result.migrated_count;
            totals.settled += settled;
            totals.pending += pending;
            for error in &result.errors {
                totals.record_error(error.clone());
            }

            progress.migrated = totals.migrated;
            progress.remaining = progress.total.saturating_sub(totals.processed());
            progress.current_batch = batch;
            progress.total_batches = progress.total_batches.max(batch);
            progress.last_error = totals.last_error.clone();
            on_progress(&progress);

            info!(
                run_id = %run_id,
                batch,
                records = page.len(),
                migrated = result.migrated_count,
                errors = result.error_count,
                "Batch complete"
            );
            on_batch_complete(&result);

            if totals.errors > self.config.max_errors {
                return Err(self.abort(run_id, &mut progress, &totals, &mut on_progress));
            }

            tokio::time::sleep(self.config.batch_delay).await;
        };

        match outcome {
            RunOutcome::Stopped => guard.final_state = RunnerState::Stopped,
            RunOutcome::Completed => {
                // The whole collection was walked, so the tallies are exact
                progress.total = totals.processed() + totals.pending;
                progress.remaining = totals.pending;
                progress.total_is_estimate = false;
            }
        }

        progress.is_running = false;
        on_progress(&progress);

        info!(
            run_id = %run_id,
            outcome = ?outcome,
            batches = totals.batches,
            migrated = totals.migrated,
            errors = totals.errors,
            "Image migration finished"
        );

        Ok(RunSummary {
            run_id,
            outcome,
            batches: totals.batches,
            migrated: totals.migrated,
            errors: totals.errors as u64,
            last_error: totals.last_error,
        })
    }

    async fn process_batch(
        &self,
        rewriter: &RecordRewriter<'_, D, B>,
        page: &[InspectionRecord],
        batch: u64,
    ) -> BatchTally {
        let mut migrated = 0;
        let mut settled = 0;
        let mut pending = 0;
        let mut errors = Vec::new();

        for record in page {
            match rewriter.rewrite(record, batch).await {
                Ok(outcome) => {
                    debug!(record_id = %record.id, status = ?outcome.status, "Record processed");
                    match outcome.status {
                        RecordStatus::Migrated | RecordStatus::WouldMigrate => migrated += 1,
                        RecordStatus::AlreadyMigrated
                        | RecordStatus::NothingToMigrate
                        | RecordStatus::Vanished => settled += 1,
                        RecordStatus::Unchanged => pending += 1,
                    }
                    errors.extend(outcome.errors);
                }
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "Record migration failed");
                    pending += 1;
                    errors.push(format!("{}: {}", record.id, e));
                }
            }
        }

        BatchTally {
            result: MigrationResult::from_counts(batch, page.len(), migrated, errors),
            settled,
            pending,
        }
    }

    fn abort<P>(
        &self,
        run_id: Uuid,
        progress: &mut MigrationProgress,
        totals: &RunTotals,
        on_progress: &mut P,
    ) -> MigrationError
    where
        P: FnMut(&MigrationProgress),
    {
        let last_error = totals.last_error.clone().unwrap_or_default();
        warn!(
            run_id = %run_id,
            errors = totals.errors,
            last_error = %last_error,
            "Error ceiling exceeded, aborting migration"
        );

        progress.is_running = false;
        progress.last_error = Some(last_error.clone());
        on_progress(&*progress);

        MigrationError::ErrorCeilingExceeded {
            errors: totals.errors,
            last_error,
        }
    }

    /// Cheap, approximate progress for display.
    ///
    /// Exact when the store can count; otherwise extrapolated from a small
    /// sample with a fixed floor, and flagged via `total_is_estimate`.
    pub async fn estimate_progress(&self) -> Result<MigrationProgress> {
        let mut progress = self.sample_estimate(self.config.batch_size).await?;
        progress.is_running = self.is_running();
        Ok(progress)
    }

    async fn sample_estimate(&self, batch_size: usize) -> Result<MigrationProgress> {
        let mut sampler = CursorWalker::new(
            &self.documents,
            &self.plan.collection,
            self.config.sample_size,
            self.config.page_timeout,
        );
        let sample = sampler.next_page().await?.unwrap_or_default();

        let with_images: Vec<_> = sample
            .iter()
            .filter(|r| self.plan.fields.iter().any(|f| r.has_images(&f.name)))
            .collect();
        let sampled_migrated = with_images
            .iter()
            .filter(|r| r.migration_completed())
            .count() as u64;

        let mut progress = match self.documents.count(&self.plan.collection).await? {
            Some(total) => {
                let migrated = if sample.is_empty() {
                    0
                } else {
                    total * sampled_migrated / sample.len() as u64
                };
                MigrationProgress::new(total, migrated, false)
            }
            None => {
                let total = (with_images.len() as u64).max(self.config.estimate_floor);
                MigrationProgress::new(total, sampled_migrated, true)
            }
        };

        progress.total_batches = progress.total.div_ceil(batch_size.max(1) as u64);
        debug!(
            plan = %self.plan.name,
            sampled = sample.len(),
            with_images = with_images.len(),
            total = progress.total,
            exact = !progress.total_is_estimate,
            "Estimated migration progress"
        );
        Ok(progress)
    }

    /// Walk the whole collection and count records that still hold inline images.
    pub async fn verify(&self) -> Result<VerifyResult> {
        let mut walker = CursorWalker::new(
            &self.documents,
            &self.plan.collection,
            self.config.batch_size,
            self.config.page_timeout,
        );

        let mut remaining = 0u64;
        while let Some(page) = walker.next_page().await? {
            remaining += page
                .iter()
                .filter(|r| !r.migration_completed())
                .filter(|r| self.plan.fields.iter().any(|f| r.inline_count(&f.name) > 0))
                .count() as u64;
        }

        info!(plan = %self.plan.name, remaining, "Verification finished");
        if remaining == 0 {
            Ok(VerifyResult::Passed)
        } else {
            Ok(VerifyResult::Incomplete { remaining })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{MemoryBlobStore, MemoryDocumentStore};
    use crate::testing::{
        inline_image, line_record, BrokenDocumentStore, FlakyBlobStore, SlowDocumentStore,
    };
    use crate::types::record::DocumentPatch;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn fast_config() -> RunnerConfig {
        RunnerConfig {
            batch_delay: Duration::ZERO,
            ..RunnerConfig::default()
        }
    }

    fn line_store(count: usize, with_inline: usize) -> MemoryDocumentStore {
        let plan = MigrationPlan::overhead_line_inspections();
        let store = MemoryDocumentStore::new();
        let img = inline_image(b"pole");
        for i in 0..count {
            let id = format!("line-{:03}", i);
            let record = if i < with_inline {
                line_record(&id, &[&img])
            } else {
                line_record(&id, &[])
            };
            store.insert(&plan.collection, record);
        }
        store
    }

    /// Count-less wrapper so the sampled estimate path is exercised.
    struct Uncounted(MemoryDocumentStore);

    #[async_trait]
    impl DocumentStore for Uncounted {
        async fn fetch_page(
            &self,
            collection: &str,
            after: Option<&str>,
            limit: usize,
        ) -> Result<Vec<InspectionRecord>> {
            self.0.fetch_page(collection, after, limit).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<InspectionRecord>> {
            self.0.get(collection, id).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            patch: &DocumentPatch,
        ) -> Result<()> {
            self.0.update(collection, id, patch).await
        }
    }

    #[tokio::test]
    async fn test_progress_reported_at_start_each_batch_and_end() {
        let runner = MigrationRunner::with_config(
            line_store(12, 12),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        let mut snapshots = Vec::new();
        let mut results = Vec::new();
        let summary = runner
            .start(5, |p| snapshots.push(p.clone()), |r| results.push(r.clone()))
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.migrated, 12);
        assert_eq!(results.len(), 3);
        assert_eq!(snapshots.len(), 5);

        assert!(snapshots[0].is_running);
        assert_eq!(snapshots[0].current_batch, 0);
        assert_eq!(snapshots[0].total, 12);
        assert_eq!(snapshots[0].total_batches, 3);
        assert_eq!(snapshots[3].migrated, 12);
        assert_eq!(snapshots[3].remaining, 0);
        assert!(!snapshots[4].is_running);
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[tokio::test]
    async fn test_remaining_counts_records_without_images() {
        let runner = MigrationRunner::with_config(
            line_store(12, 4),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        let mut snapshots = Vec::new();
        runner
            .start(5, |p| snapshots.push(p.clone()), |_| {})
            .await
            .unwrap();

        // Batch 1: four migrated plus one record with nothing to migrate
        assert_eq!(snapshots[1].migrated, 4);
        assert_eq!(snapshots[1].remaining, 7);
        assert_eq!(snapshots[2].remaining, 2);

        let last = snapshots.last().unwrap();
        assert_eq!(last.total, 12);
        assert_eq!(last.remaining, 0);
        assert!(!last.total_is_estimate);
    }

    #[tokio::test]
    async fn test_completed_run_replaces_sampled_total() {
        let runner = MigrationRunner::with_config(
            Uncounted(line_store(12, 4)),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        let mut snapshots = Vec::new();
        runner
            .start(5, |p| snapshots.push(p.clone()), |_| {})
            .await
            .unwrap();

        assert_eq!(snapshots[0].total, 100);
        assert!(snapshots[0].total_is_estimate);

        let last = snapshots.last().unwrap();
        assert_eq!(last.total, 12);
        assert_eq!(last.migrated, 4);
        assert_eq!(last.remaining, 0);
        assert!(!last.total_is_estimate);
    }

    #[tokio::test]
    async fn test_failed_records_stay_remaining() {
        let runner = MigrationRunner::with_config(
            line_store(6, 6),
            FlakyBlobStore::new(MemoryBlobStore::new()).fail_when_path_contains("/line-002/"),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        let mut last = None;
        let summary = runner
            .start(10, |p| last = Some(p.clone()), |_| {})
            .await
            .unwrap();

        assert_eq!(summary.migrated, 5);
        let last = last.unwrap();
        assert_eq!(last.total, 6);
        assert_eq!(last.remaining, 1);
    }

    #[tokio::test]
    async fn test_stop_from_first_progress_callback_is_honoured() {
        let runner = MigrationRunner::with_config(
            line_store(4, 4),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        let summary = runner
            .start(2, |_| runner.stop(), |_| {})
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Stopped);
        assert_eq!(summary.batches, 0);
        assert_eq!(runner.documents().update_count(), 0);
        assert_eq!(runner.state(), RunnerState::Stopped);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let runner = Arc::new(MigrationRunner::with_config(
            SlowDocumentStore::new(line_store(3, 3), Duration::from_millis(150), 1),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        ));

        let background = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.start(10, |_| {}, |_| {}).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(runner.is_running());
        let err = runner.start(10, |_| {}, |_| {}).await.unwrap_err();
        assert!(matches!(err, MigrationError::AlreadyRunning));

        let summary = background.await.unwrap().unwrap();
        assert_eq!(summary.migrated, 3);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_independent_runners_run_concurrently() {
        let a = MigrationRunner::with_config(
            line_store(4, 4),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );
        let b = MigrationRunner::with_config(
            line_store(6, 2),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        let (ra, rb) = tokio::join!(a.start(2, |_| {}, |_| {}), b.start(2, |_| {}, |_| {}));
        assert_eq!(ra.unwrap().migrated, 4);
        assert_eq!(rb.unwrap().migrated, 2);
    }

    #[tokio::test]
    async fn test_timeout_halves_page_size_and_completes() {
        let config = RunnerConfig {
            page_timeout: Duration::from_millis(20),
            ..fast_config()
        };
        // First fetch belongs to the estimate sample, second to batch 1
        let documents = SlowDocumentStore::new(line_store(7, 7), Duration::from_millis(200), 2);
        let runner = MigrationRunner::with_config(
            documents,
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            config,
        );

        let summary = runner.start(4, |_| {}, |_| {}).await.unwrap();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.migrated, 7);
        assert_eq!(summary.errors, 1);
        assert!(summary.last_error.unwrap().contains("timed out"));
        // Halved from 4 to 2: batches of 2, 2, 2, 1
        assert_eq!(summary.batches, 4);
    }

    #[tokio::test]
    async fn test_error_ceiling_aborts_run() {
        let config = RunnerConfig {
            max_errors: 3,
            ..fast_config()
        };
        let runner = MigrationRunner::with_config(
            BrokenDocumentStore::new(),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            config,
        );

        let mut last = None;
        let err = runner
            .start(10, |p| last = Some(p.clone()), |_| {})
            .await
            .unwrap_err();

        match err {
            MigrationError::ErrorCeilingExceeded { errors, last_error } => {
                assert_eq!(errors, 4);
                assert!(last_error.contains("document store unavailable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // One sampling attempt plus four batch attempts
        assert_eq!(runner.documents().attempts(), 5);

        let last = last.unwrap();
        assert!(!last.is_running);
        assert!(last.last_error.is_some());
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_upload_failures_count_toward_ceiling() {
        let config = RunnerConfig {
            max_errors: 2,
            ..fast_config()
        };
        let runner = MigrationRunner::with_config(
            line_store(10, 10),
            FlakyBlobStore::failing(MemoryBlobStore::new()),
            MigrationPlan::overhead_line_inspections(),
            config,
        );

        let mut batches = 0;
        let err = runner.start(2, |_| {}, |_| batches += 1).await.unwrap_err();

        assert!(matches!(err, MigrationError::ErrorCeilingExceeded { errors: 4, .. }));
        assert_eq!(batches, 2);
    }

    #[tokio::test]
    async fn test_sampled_estimate_uses_floor() {
        let runner = MigrationRunner::with_config(
            Uncounted(line_store(30, 3)),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        let estimate = runner.estimate_progress().await.unwrap();
        assert!(estimate.total_is_estimate);
        assert_eq!(estimate.total, 100);
        assert_eq!(estimate.migrated, 0);
        assert_eq!(estimate.total_batches, 10);
        assert!(!estimate.is_running);
    }

    #[tokio::test]
    async fn test_exact_estimate_when_store_counts() {
        let runner = MigrationRunner::with_config(
            line_store(30, 3),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        let estimate = runner.estimate_progress().await.unwrap();
        assert!(!estimate.total_is_estimate);
        assert_eq!(estimate.total, 30);
        assert_eq!(estimate.total_batches, 3);
    }

    #[tokio::test]
    async fn test_verify_reports_remaining() {
        let runner = MigrationRunner::with_config(
            line_store(6, 4),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        assert_eq!(
            runner.verify().await.unwrap(),
            VerifyResult::Incomplete { remaining: 4 }
        );
        runner.start(0, |_| {}, |_| {}).await.unwrap();
        assert_eq!(runner.verify().await.unwrap(), VerifyResult::Passed);
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_writing() {
        let config = RunnerConfig {
            dry_run: true,
            ..fast_config()
        };
        let runner = MigrationRunner::with_config(
            line_store(5, 3),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            config,
        );

        let summary = runner.start(10, |_| {}, |_| {}).await.unwrap();
        assert_eq!(summary.migrated, 3);
        assert_eq!(runner.documents().update_count(), 0);
        assert_eq!(runner.blobs().blob_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_harmless() {
        let runner = MigrationRunner::with_config(
            line_store(2, 2),
            MemoryBlobStore::new(),
            MigrationPlan::overhead_line_inspections(),
            fast_config(),
        );

        runner.stop();
        let summary = runner.start(10, |_| {}, |_| {}).await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.migrated, 2);
    }
}
