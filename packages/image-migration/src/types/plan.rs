//! Migration plans: which collection to walk and which fields hold images.
//!
//! One generic engine serves every record family. A plan names the collection,
//! the image fields (each with a short tag used in blob file names) and the
//! storage prefix blobs are namespaced under.

use serde::Serialize;

use crate::error::{MigrationError, Result};

/// An image-bearing field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageField {
    /// Document field name
    pub name: String,
    /// Short tag used in blob file names (e.g. "before", "after")
    pub tag: String,
}

impl ImageField {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

/// Strategy object describing one migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    /// Registry key (used by the CLI)
    pub name: String,
    pub description: String,
    /// Document collection to walk
    pub collection: String,
    pub fields: Vec<ImageField>,
    /// Blob path prefix; records land under `{storage_prefix}/{record_id}/`
    pub storage_prefix: String,
}

impl MigrationPlan {
    pub fn new(
        name: impl Into<String>,
        collection: impl Into<String>,
        storage_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            collection: collection.into(),
            fields: Vec::new(),
            storage_prefix: storage_prefix.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, tag: impl Into<String>) -> Self {
        self.fields.push(ImageField::new(name, tag));
        self
    }

    /// Overhead line inspections carry a single image list.
    pub fn overhead_line_inspections() -> Self {
        Self::new(
            "overhead_line_images",
            "overheadLineInspections",
            "overhead-line-inspections",
        )
        .with_description("Move inline overhead line inspection images to blob storage")
        .with_field("images", "image")
    }

    /// Substation inspections carry separate before/after image lists.
    pub fn substation_inspections() -> Self {
        Self::new(
            "substation_images",
            "substationInspections",
            "substation-inspections",
        )
        .with_description("Move inline substation before/after images to blob storage")
        .with_field("beforeImages", "before")
        .with_field("afterImages", "after")
    }

    /// Reject plans the engine cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.collection.is_empty() {
            return Err(MigrationError::Config(format!(
                "plan '{}' has no collection",
                self.name
            )));
        }
        if self.fields.is_empty() {
            return Err(MigrationError::Config(format!(
                "plan '{}' has no image fields",
                self.name
            )));
        }
        Ok(())
    }

    /// Blob path for one image of a record.
    pub fn blob_path(&self, record_id: &str, file_name: &str) -> String {
        let prefix = self.storage_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", record_id, file_name)
        } else {
            format!("{}/{}/{}", prefix, record_id, file_name)
        }
    }
}

/// Get all registered plans.
///
/// Add new record families to this function.
pub fn all_plans() -> Vec<MigrationPlan> {
    vec![
        MigrationPlan::overhead_line_inspections(),
        MigrationPlan::substation_inspections(),
    ]
}

/// Find a plan by name.
pub fn find_plan(name: &str) -> Result<MigrationPlan> {
    all_plans()
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| MigrationError::UnknownPlan(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_plans_are_valid() {
        for plan in all_plans() {
            plan.validate().unwrap();
        }
    }

    #[test]
    fn test_find_plan() {
        let plan = find_plan("substation_images").unwrap();
        assert_eq!(plan.fields.len(), 2);
        assert_eq!(plan.fields[0].tag, "before");
        assert!(matches!(
            find_plan("nope"),
            Err(MigrationError::UnknownPlan(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_blob_path_is_namespaced_by_record() {
        let plan = MigrationPlan::overhead_line_inspections();
        assert_eq!(
            plan.blob_path("rec-1", "image_0_17.jpg"),
            "overhead-line-inspections/rec-1/image_0_17.jpg"
        );

        let bare = MigrationPlan::new("bare", "things", "");
        assert_eq!(bare.blob_path("rec-1", "a.jpg"), "rec-1/a.jpg");
    }

    #[test]
    fn test_plan_without_fields_is_rejected() {
        let plan = MigrationPlan::new("empty", "things", "things");
        assert!(matches!(plan.validate(), Err(MigrationError::Config(_))));
    }
}
