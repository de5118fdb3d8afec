//! Store adapters for the two sides of the pipeline.
//!
//! The engines only see the [`SourceStore`] and [`TargetStore`] traits.
//! Implementations:
//!
//! | Adapter | Side | Transport |
//! |---------|------|-----------|
//! | [`MemorySourceStore`] | source | in-process |
//! | [`MemoryTargetStore`] | target | in-process |
//! | [`DocumentApiStore`] | source | document Data API over HTTP |
//! | [`RestTargetStore`] | target | REST resources over HTTP |

pub mod common;
pub mod document_api;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{SourceStoreConfig, TargetStoreConfig};
use crate::entity::EntityType;
use crate::error::Result;
use crate::record::{Document, ListQuery, SourceRecord, TargetRecord};

pub use document_api::{DocumentApiConfig, DocumentApiStore};
pub use memory::{MemorySourceStore, MemoryTargetStore};
pub use rest::{RestTargetConfig, RestTargetStore};

/// The document store records are migrated from.
///
/// Implement this trait to read from another document database.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Store type name used in logs.
    fn store_type(&self) -> &'static str;

    /// Lists records, optionally filtered by owner and ordered newest first.
    async fn list(&self, entity: EntityType, query: &ListQuery) -> Result<Vec<SourceRecord>>;

    /// Fetches one record.
    async fn get(&self, entity: EntityType, id: &str) -> Result<Option<SourceRecord>>;

    /// Inserts a record and returns its id. With `id` set, the record is
    /// stored under that id instead of a generated one.
    async fn create(&self, entity: EntityType, id: Option<&str>, data: Document) -> Result<String>;

    /// Overwrites the fields of an existing record.
    async fn update(&self, entity: EntityType, id: &str, data: Document) -> Result<()>;
}

/// The REST-backed store records are migrated to.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Store type name used in logs.
    fn store_type(&self) -> &'static str;

    /// Lists records, optionally filtered by owner.
    async fn list(&self, entity: EntityType, query: &ListQuery) -> Result<Vec<TargetRecord>>;

    /// Fetches one record.
    async fn get(&self, entity: EntityType, id: &str) -> Result<Option<TargetRecord>>;

    /// Inserts a record and returns the id assigned by the store.
    async fn create(&self, entity: EntityType, data: Document) -> Result<String>;

    /// Overwrites the fields of an existing record.
    async fn update(&self, entity: EntityType, id: &str, data: Document) -> Result<()>;

    /// Deletes a record.
    async fn delete(&self, entity: EntityType, id: &str) -> Result<()>;
}

/// Creates a source store from configuration.
pub fn create_source_store(config: &SourceStoreConfig) -> Result<Arc<dyn SourceStore>> {
    match config {
        SourceStoreConfig::DocumentApi(cfg) => Ok(Arc::new(DocumentApiStore::new(cfg.clone())?)),
        SourceStoreConfig::Memory(cfg) => Ok(Arc::new(MemorySourceStore::from_seed_file(
            cfg.seed_file.as_deref(),
        )?)),
    }
}

/// Creates a target store from configuration.
pub fn create_target_store(config: &TargetStoreConfig) -> Result<Arc<dyn TargetStore>> {
    match config {
        TargetStoreConfig::Rest(cfg) => Ok(Arc::new(RestTargetStore::new(cfg.clone())?)),
        TargetStoreConfig::Memory(_) => Ok(Arc::new(MemoryTargetStore::new())),
    }
}
