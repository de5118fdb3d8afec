//! Records as they live in the two stores.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityType, SOURCE_REF_FIELD};

/// Field map of a single record.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A record in the source (document) store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Document id.
    pub id: String,
    /// Entity kind.
    pub entity: EntityType,
    /// Fields in source naming and timestamp form.
    pub data: Document,
}

impl SourceRecord {
    /// Creates a source record.
    pub fn new(entity: EntityType, id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            entity,
            data,
        }
    }
}

/// A record in the target (REST) store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Target primary key.
    pub id: String,
    /// Entity kind.
    pub entity: EntityType,
    /// Id of the originating source record, if the record carries one.
    pub source_ref: Option<String>,
    /// Fields in target naming and timestamp form.
    pub data: Document,
}

impl TargetRecord {
    /// Builds a target record from a stored row, lifting the foreign
    /// reference out of the data.
    pub fn from_row(entity: EntityType, id: impl Into<String>, data: Document) -> Self {
        let source_ref = data
            .get(SOURCE_REF_FIELD)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from);
        Self {
            id: id.into(),
            entity,
            source_ref,
            data,
        }
    }
}

/// Parameters for listing records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only records owned by this user.
    pub owner_id: Option<String>,
    /// Source field to order by, newest first.
    pub order_by: Option<&'static str>,
    /// Maximum number of records.
    pub limit: Option<usize>,
}

impl ListQuery {
    /// A query for the given owner.
    #[must_use]
    pub fn for_owner(owner_id: Option<&str>) -> Self {
        Self {
            owner_id: owner_id.map(String::from),
            ..Default::default()
        }
    }

    /// Sets the newest-first ordering field.
    #[must_use]
    pub fn newest_first(mut self, field: &'static str) -> Self {
        self.order_by = Some(field);
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
