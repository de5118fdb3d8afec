//! In-process stores.
//!
//! Used for dry runs against a JSON export and as the store doubles in tests.
//! The seed file maps source collection names to arrays of documents, each
//! carrying its id in an `id` field:
//!
//! ```json
//! { "trades": [ { "id": "t1", "symbol": "AAPL", "userId": "u1" } ] }
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::common::extract_id;
use super::{SourceStore, TargetStore};
use crate::entity::{EntityType, SOURCE_OWNER_FIELD, TARGET_OWNER_FIELD};
use crate::error::{Error, Result};
use crate::record::{Document, ListQuery, SourceRecord, TargetRecord};
use crate::timestamp;

/// In-memory source store.
#[derive(Debug, Default)]
pub struct MemorySourceStore {
    records: RwLock<HashMap<EntityType, BTreeMap<String, Document>>>,
}

impl MemorySourceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from an optional JSON seed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a seed document.
    pub fn from_seed_file(path: Option<&Path>) -> Result<Self> {
        let store = Self::new();
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)?;
            let seed: Value = serde_json::from_str(&content)?;
            store.load_seed(&seed)?;
        }
        Ok(store)
    }

    /// Loads documents keyed by source collection name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a collection is not an array or a document
    /// has no id.
    pub fn load_seed(&self, seed: &Value) -> Result<()> {
        for entity in EntityType::ALL {
            let Some(docs) = seed.get(entity.source_collection()) else {
                continue;
            };
            let docs = docs.as_array().ok_or_else(|| {
                Error::Config(format!("seed '{}' is not an array", entity.source_collection()))
            })?;
            for doc in docs {
                let mut data = doc.as_object().cloned().ok_or_else(|| {
                    Error::Config(format!("seed '{}' entry is not an object", entity.source_collection()))
                })?;
                let id = data
                    .remove("id")
                    .as_ref()
                    .and_then(extract_id)
                    .ok_or_else(|| {
                        Error::Config(format!("seed '{}' entry has no id", entity.source_collection()))
                    })?;
                self.insert(entity, id, data);
            }
        }
        Ok(())
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, entity: EntityType, id: impl Into<String>, data: Document) {
        self.records
            .write()
            .entry(entity)
            .or_default()
            .insert(id.into(), data);
    }

    /// Number of records of an entity type.
    #[must_use]
    pub fn len(&self, entity: EntityType) -> usize {
        self.records.read().get(&entity).map_or(0, BTreeMap::len)
    }

    /// Whether the store holds no record of this entity type.
    #[must_use]
    pub fn is_empty(&self, entity: EntityType) -> bool {
        self.len(entity) == 0
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    fn store_type(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, entity: EntityType, query: &ListQuery) -> Result<Vec<SourceRecord>> {
        let records = self.records.read();
        let mut out: Vec<SourceRecord> = records
            .get(&entity)
            .into_iter()
            .flatten()
            .filter(|(_, data)| owned_by(data, SOURCE_OWNER_FIELD, query.owner_id.as_deref()))
            .map(|(id, data)| SourceRecord::new(entity, id.clone(), data.clone()))
            .collect();

        if let Some(field) = query.order_by {
            out.sort_by(|a, b| newest_first(a.data.get(field), b.data.get(field)));
        }
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn get(&self, entity: EntityType, id: &str) -> Result<Option<SourceRecord>> {
        Ok(self
            .records
            .read()
            .get(&entity)
            .and_then(|m| m.get(id))
            .map(|data| SourceRecord::new(entity, id, data.clone())))
    }

    async fn create(&self, entity: EntityType, id: Option<&str>, data: Document) -> Result<String> {
        let id = id.map_or_else(|| uuid::Uuid::new_v4().simple().to_string(), String::from);
        self.insert(entity, id.clone(), data);
        Ok(id)
    }

    async fn update(&self, entity: EntityType, id: &str, data: Document) -> Result<()> {
        let mut records = self.records.write();
        let existing = records
            .get_mut(&entity)
            .and_then(|m| m.get_mut(id))
            .ok_or_else(|| Error::NotFound(format!("{} {}", entity, id)))?;
        existing.extend(data);
        Ok(())
    }
}

/// In-memory target store with sequential numeric ids.
#[derive(Debug)]
pub struct MemoryTargetStore {
    records: RwLock<HashMap<EntityType, BTreeMap<u64, Document>>>,
    next_id: AtomicU64,
}

impl Default for MemoryTargetStore {
    fn default() -> Self {
        Self {
            records: RwLock::default(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryTargetStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row directly and returns its id.
    pub fn insert(&self, entity: EntityType, data: Document) -> String {
        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        self.records
            .write()
            .entry(entity)
            .or_default()
            .insert(id, data);
        id.to_string()
    }

    /// Number of rows of an entity type.
    #[must_use]
    pub fn len(&self, entity: EntityType) -> usize {
        self.records.read().get(&entity).map_or(0, BTreeMap::len)
    }

    /// Whether the store holds no row of this entity type.
    #[must_use]
    pub fn is_empty(&self, entity: EntityType) -> bool {
        self.len(entity) == 0
    }

    fn parse_id(id: &str) -> Option<u64> {
        id.parse().ok()
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    fn store_type(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, entity: EntityType, query: &ListQuery) -> Result<Vec<TargetRecord>> {
        let records = self.records.read();
        let mut out: Vec<TargetRecord> = records
            .get(&entity)
            .into_iter()
            .flatten()
            .filter(|(_, data)| owned_by(data, TARGET_OWNER_FIELD, query.owner_id.as_deref()))
            .map(|(id, data)| TargetRecord::from_row(entity, id.to_string(), data.clone()))
            .collect();
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn get(&self, entity: EntityType, id: &str) -> Result<Option<TargetRecord>> {
        let Some(key) = Self::parse_id(id) else {
            return Ok(None);
        };
        Ok(self
            .records
            .read()
            .get(&entity)
            .and_then(|m| m.get(&key))
            .map(|data| TargetRecord::from_row(entity, id, data.clone())))
    }

    async fn create(&self, entity: EntityType, data: Document) -> Result<String> {
        Ok(self.insert(entity, data))
    }

    async fn update(&self, entity: EntityType, id: &str, data: Document) -> Result<()> {
        let mut records = self.records.write();
        let existing = Self::parse_id(id)
            .and_then(|key| records.get_mut(&entity).and_then(|m| m.get_mut(&key)))
            .ok_or_else(|| Error::NotFound(format!("{} {}", entity, id)))?;
        existing.extend(data);
        Ok(())
    }

    async fn delete(&self, entity: EntityType, id: &str) -> Result<()> {
        let removed = Self::parse_id(id)
            .and_then(|key| self.records.write().get_mut(&entity).and_then(|m| m.remove(&key)));
        removed
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("{} {}", entity, id)))
    }
}

fn owned_by(data: &Document, field: &str, owner: Option<&str>) -> bool {
    owner.is_none_or(|owner| data.get(field).and_then(Value::as_str) == Some(owner))
}

/// Orders by a recency field, newest first; records without it sort last.
fn newest_first(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.and_then(timestamp::parse);
    let b = b.and_then(timestamp::parse);
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
