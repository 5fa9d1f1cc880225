//! Inspection records as seen by the migration engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::image::is_inline;

/// Document field set once a record's images have been processed.
pub const MIGRATION_COMPLETED_FIELD: &str = "migrationCompleted";

/// Document field holding the RFC 3339 time of the last rewrite.
pub const MIGRATION_DATE_FIELD: &str = "migrationDate";

/// Document field holding the batch index that last touched the record.
pub const BATCH_NUMBER_FIELD: &str = "batchNumber";

/// An opaque inspection document keyed by id.
///
/// The engine only reads image fields and the migration markers; every other
/// attribute is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub id: String,
    pub data: Map<String, Value>,
}

impl InspectionRecord {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Build a record from a JSON object literal. Non-objects yield an empty record.
    pub fn from_json(id: impl Into<String>, value: Value) -> Self {
        let data = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, data)
    }

    pub fn migration_completed(&self) -> bool {
        self.data
            .get(MIGRATION_COMPLETED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn migration_date(&self) -> Option<DateTime<Utc>> {
        self.data
            .get(MIGRATION_DATE_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
    }

    pub fn batch_number(&self) -> Option<u64> {
        self.data.get(BATCH_NUMBER_FIELD).and_then(Value::as_u64)
    }

    /// Raw entries of an image field. Missing or `null` fields are empty.
    ///
    /// A bare string is tolerated as a single-entry field.
    pub fn image_values(&self, field: &str) -> Vec<Value> {
        match self.data.get(field) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::String(s)) => vec![Value::String(s.clone())],
            _ => Vec::new(),
        }
    }

    /// Whether the field holds at least one image of any kind.
    pub fn has_images(&self, field: &str) -> bool {
        !self.image_values(field).is_empty()
    }

    /// Number of inline entries in the field.
    pub fn inline_count(&self, field: &str) -> usize {
        self.image_values(field)
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| is_inline(s))
            .count()
    }
}

/// Partial update merged into a stored document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentPatch {
    pub fields: Map<String, Value>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Add the completion markers written together with rewritten fields.
    pub fn mark_migrated(&mut self, at: DateTime<Utc>, batch_number: u64) {
        self.set(MIGRATION_COMPLETED_FIELD, Value::Bool(true));
        self.set(MIGRATION_DATE_FIELD, Value::String(at.to_rfc3339()));
        self.set(BATCH_NUMBER_FIELD, Value::from(batch_number));
    }

    /// Merge this patch into a document map (top-level fields replaced).
    pub fn apply_to(&self, data: &mut Map<String, Value>) {
        for (key, value) in &self.fields {
            data.insert(key.clone(), value.clone());
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}
