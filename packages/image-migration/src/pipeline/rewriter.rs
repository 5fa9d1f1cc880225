//! Per-record image rewriting.
//!
//! For one record: find inline images in every plan field, upload them, swap
//! in the download URLs and write the changed fields back together with the
//! completion markers. Upload failures keep the original inline value in place
//! and are reported, never raised.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{MigrationError, Result};
use crate::traits::store::{BlobStore, DocumentStore};
use crate::types::image::{extension_for, ImageValue};
use crate::types::plan::{ImageField, MigrationPlan};
use crate::types::progress::{RecordOutcome, RecordStatus};
use crate::types::record::{DocumentPatch, InspectionRecord};

/// Default number of uploads in flight for one field.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;

/// An inline image waiting for upload.
struct PendingUpload {
    index: usize,
    bytes: Vec<u8>,
    mime_type: String,
}

/// Outcome of rewriting one field.
struct FieldRewrite {
    value: Option<Value>,
    inline: usize,
    migrated: usize,
    errors: Vec<String>,
}

/// Rewrites records of one plan against a document store and a blob store.
pub struct RecordRewriter<'a, D: DocumentStore + ?Sized, B: BlobStore + ?Sized> {
    documents: &'a D,
    blobs: &'a B,
    plan: &'a MigrationPlan,
    max_concurrent_uploads: usize,
    dry_run: bool,
}

impl<'a, D: DocumentStore + ?Sized, B: BlobStore + ?Sized> RecordRewriter<'a, D, B> {
    pub fn new(documents: &'a D, blobs: &'a B, plan: &'a MigrationPlan) -> Self {
        Self {
            documents,
            blobs,
            plan,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            dry_run: false,
        }
    }

    pub fn with_max_concurrent_uploads(mut self, limit: usize) -> Self {
        self.max_concurrent_uploads = limit.max(1);
        self
    }

    /// Count inline images without uploading or writing anything.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Migrate one record.
    ///
    /// Returns `Err` only for conditions the record cannot recover from: an
    /// inline payload that is not base64 at all, or a failed write-back.
    pub async fn rewrite(&self, record: &InspectionRecord, batch_number: u64) -> Result<RecordOutcome> {
        if record.migration_completed() {
            return Ok(RecordOutcome::status(RecordStatus::AlreadyMigrated));
        }

        let mut patch = DocumentPatch::new();
        let mut inline_total = 0;
        let mut migrated_images = 0;
        let mut errors = Vec::new();

        for field in &self.plan.fields {
            let rewrite = self.rewrite_field(record, field).await?;
            inline_total += rewrite.inline;
            migrated_images += rewrite.migrated;
            errors.extend(rewrite.errors);
            if let Some(value) = rewrite.value {
                patch.set(field.name.clone(), value);
            }
        }

        if inline_total == 0 {
            return Ok(RecordOutcome::status(RecordStatus::NothingToMigrate));
        }

        if self.dry_run {
            return Ok(RecordOutcome {
                status: RecordStatus::WouldMigrate,
                migrated_images: inline_total,
                errors,
            });
        }

        if patch.is_empty() {
            warn!(
                record_id = %record.id,
                failures = errors.len(),
                "No image of record could be uploaded, leaving it untouched"
            );
            return Ok(RecordOutcome {
                status: RecordStatus::Unchanged,
                migrated_images: 0,
                errors,
            });
        }

        if !self.documents.exists(&self.plan.collection, &record.id).await? {
            debug!(record_id = %record.id, "Record deleted before write-back, skipping");
            return Ok(RecordOutcome {
                status: RecordStatus::Vanished,
                migrated_images: 0,
                errors,
            });
        }

        patch.mark_migrated(Utc::now(), batch_number);
        self.documents
            .update(&self.plan.collection, &record.id, &patch)
            .await?;

        info!(
            record_id = %record.id,
            images = migrated_images,
            failures = errors.len(),
            batch = batch_number,
            "Migrated record images"
        );

        Ok(RecordOutcome {
            status: RecordStatus::Migrated,
            migrated_images,
            errors,
        })
    }

    async fn rewrite_field(&self, record: &InspectionRecord, field: &ImageField) -> Result<FieldRewrite> {
        let scalar = matches!(record.data.get(&field.name), Some(Value::String(_)));
        let mut entries = record.image_values(&field.name);

        let mut pending = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let Value::String(raw) = entry else { continue };
            let value = ImageValue::classify(raw);
            let ImageValue::Inline { mime_type, .. } = &value else { continue };

            let bytes = match value.decode() {
                Some(Ok(bytes)) => bytes,
                Some(Err(source)) => {
                    return Err(MigrationError::Decode {
                        record_id: record.id.clone(),
                        field: field.name.clone(),
                        index,
                        source,
                    })
                }
                None => continue,
            };

            pending.push(PendingUpload {
                index,
                bytes,
                mime_type: mime_type.clone(),
            });
        }

        let inline = pending.len();
        if inline == 0 || self.dry_run {
            return Ok(FieldRewrite {
                value: None,
                inline,
                migrated: 0,
                errors: Vec::new(),
            });
        }

        let blobs = self.blobs;
        let uploads = pending.into_iter().map(|upload| {
            let file_name = format!(
                "{}_{}_{}.{}",
                field.tag,
                upload.index,
                Utc::now().timestamp_millis(),
                extension_for(&upload.mime_type)
            );
            let path = self.plan.blob_path(&record.id, &file_name);
            async move {
                let PendingUpload {
                    index,
                    bytes,
                    mime_type,
                } = upload;
                let stored = match blobs.upload(&path, bytes, &mime_type).await {
                    Ok(()) => blobs.download_url(&path).await,
                    Err(e) => Err(e),
                };
                (index, path, stored)
            }
        });

        let results: Vec<_> = stream::iter(uploads)
            .buffered(self.max_concurrent_uploads)
            .collect()
            .await;

        let mut migrated = 0;
        let mut errors = Vec::new();
        for (index, path, stored) in results {
            match stored {
                Ok(url) => {
                    entries[index] = Value::String(url);
                    migrated += 1;
                }
                Err(e) => {
                    warn!(
                        record_id = %record.id,
                        field = %field.name,
                        index,
                        path = %path,
                        error = %e,
                        "Image upload failed, keeping inline value"
                    );
                    errors.push(format!("{}.{}[{}]: {}", record.id, field.name, index, e));
                }
            }
        }

        let value = if migrated == 0 {
            None
        } else if scalar {
            entries.into_iter().next()
        } else {
            Some(Value::Array(entries))
        };

        Ok(FieldRewrite {
            value,
            inline,
            migrated,
            errors,
        })
    }
}
