// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # journal-migrate
//!
//! `journal-migrate` is a CLI tool and library for moving trading-journal
//! records (trades, daily plans, journal entries) from a document store to a
//! REST API, validating the copies and rolling them back.
//!
//! ## Stores
//!
//! | Store | Side | Notes |
//! |-------|------|-------|
//! | Document Data API | source | `find` / `insertOne` / `updateOne` actions |
//! | REST API | target | one resource per entity type |
//! | Memory | both | dry runs and tests, seeded from JSON |
//!
//! ## Quick Start
//!
//! ```bash
//! journal-migrate init --output journal-migrate.yaml
//! journal-migrate migrate --results results.json --report migration.md
//! journal-migrate validate --results results.json --report validation.md
//! journal-migrate rollback --results results.json --delete-from-target
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   type: document_api
//!   data_api_url: https://data.mongodb-api.com/app/<app-id>/endpoint/data/v1
//!   api_key: key
//!   database: trading_journal
//!
//! target:
//!   type: rest
//!   base_url: https://api.example.com/v1
//!
//! options:
//!   batch_size: 50
//!   sample_size: 20
//! ```

#![warn(missing_docs)]

pub mod batch;
pub mod compare;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod migrate;
pub mod outcome;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod report;
pub mod retry;
pub mod rollback;
pub mod stores;
pub mod timestamp;
pub mod transform;
pub mod validate;

pub use config::{PipelineConfig, PipelineOptions, SourceStoreConfig, TargetStoreConfig};
pub use context::RunContext;
pub use entity::EntityType;
pub use error::{Error, Result};
pub use migrate::{BatchProgress, MigrateOptions, MigrationEngine};
pub use outcome::{
    MigrationResult, MigrationSummary, RollbackResult, RollbackSummary, ValidationResult,
    ValidationSummary,
};
pub use pipeline::{Pipeline, Scope};
pub use progress::{ProgressTracker, RunStatus, Snapshot};
pub use record::{Document, SourceRecord, TargetRecord};
pub use rollback::{RollbackEngine, RollbackOptions};
pub use stores::{SourceStore, TargetStore};
pub use transform::Transformer;
pub use validate::{ValidateOptions, ValidationEngine};
