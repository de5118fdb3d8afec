//! Field transformer between the source and target schemas.
//!
//! Forward: camelCase names become snake_case target names, timestamps become
//! RFC 3339 UTC strings (date-only fields `YYYY-MM-DD`), the source id is
//! dropped and replaced by the `source_ref` foreign reference. Reverse applies
//! the same tables the other way. Fields unknown to the entity schema are
//! dropped in both directions; fields absent on one side stay absent.

use serde_json::Value;
use tracing::debug;

use crate::compare::{diff_source_documents, FieldDifference};
use crate::entity::{EntityType, FieldKind, FieldSpec, SOURCE_REF_FIELD};
use crate::error::{Error, Result};
use crate::record::{Document, SourceRecord};
use crate::timestamp;

/// Converts records of one entity type between the two schemas.
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    entity: EntityType,
}

impl Transformer {
    /// Creates a transformer for the given entity type.
    #[must_use]
    pub const fn new(entity: EntityType) -> Self {
        Self { entity }
    }

    /// Entity type handled by this transformer.
    #[must_use]
    pub const fn entity(&self) -> EntityType {
        self.entity
    }

    /// Converts a source record into the body accepted by the target store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`] if the record has no id or a timestamp
    /// field cannot be parsed.
    pub fn to_target(&self, record: &SourceRecord) -> Result<Document> {
        if record.id.is_empty() {
            return Err(Error::Transform("source record has an empty id".to_string()));
        }

        let schema = self.entity.schema();
        let mut out = Document::new();

        for (key, value) in &record.data {
            let Some(spec) = schema.by_source(key) else {
                debug!("{} {}: dropping unmapped field '{}'", self.entity, record.id, key);
                continue;
            };
            out.insert(spec.target.to_string(), self.forward_value(spec, value)?);
        }

        out.insert(SOURCE_REF_FIELD.to_string(), Value::String(record.id.clone()));
        Ok(out)
    }

    /// Converts a target document back into source form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`] if a timestamp field cannot be parsed.
    pub fn to_source(&self, data: &Document) -> Result<Document> {
        let schema = self.entity.schema();
        let mut out = Document::new();

        for (key, value) in data {
            let Some(spec) = schema.by_target(key) else {
                continue;
            };
            out.insert(spec.source.to_string(), self.reverse_value(spec, value)?);
        }

        Ok(out)
    }

    /// Runs both directions and reports the schema fields that do not survive.
    ///
    /// An empty list means the record round-trips.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`] if either direction fails.
    pub fn verify_round_trip(&self, record: &SourceRecord) -> Result<Vec<FieldDifference>> {
        let forward = self.to_target(record)?;
        let restored = self.to_source(&forward)?;
        Ok(diff_source_documents(self.entity, &record.data, &restored))
    }

    fn forward_value(&self, spec: &FieldSpec, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match spec.kind {
            FieldKind::Timestamp => {
                let dt = self.parse_timestamp(spec.source, value)?;
                Ok(Value::String(timestamp::to_iso(&dt)))
            }
            FieldKind::Date => {
                let dt = self.parse_timestamp(spec.source, value)?;
                Ok(Value::String(timestamp::to_iso_date(&dt)))
            }
            _ => Ok(value.clone()),
        }
    }

    fn reverse_value(&self, spec: &FieldSpec, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match spec.kind {
            FieldKind::Timestamp => {
                let dt = self.parse_timestamp(spec.target, value)?;
                Ok(timestamp::to_wrapper(&dt))
            }
            FieldKind::Date => {
                let dt = self.parse_timestamp(spec.target, value)?;
                Ok(Value::String(timestamp::to_iso_date(&dt)))
            }
            _ => Ok(value.clone()),
        }
    }

    fn parse_timestamp(&self, field: &str, value: &Value) -> Result<chrono::DateTime<chrono::Utc>> {
        timestamp::parse(value).ok_or_else(|| {
            Error::Transform(format!(
                "{} field '{}' is not a timestamp: {}",
                self.entity, field, value
            ))
        })
    }
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
