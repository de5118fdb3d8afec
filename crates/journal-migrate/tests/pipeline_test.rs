//! End-to-end tests: migrate, validate and roll back through the pipeline
//! facade with in-process stores.

#![allow(clippy::pedantic)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use journal_migrate::outcome::RollbackAction;
use journal_migrate::record::ListQuery;
use journal_migrate::report::create_validation_report;
use journal_migrate::stores::{MemorySourceStore, MemoryTargetStore};
use journal_migrate::{
    Document, EntityType, MigrationSummary, Pipeline, PipelineConfig, Result, RunStatus, Scope,
    SourceStore, TargetRecord, TargetStore,
};

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn trades() -> MemorySourceStore {
    let source = MemorySourceStore::new();
    for (id, symbol, price, secs) in [
        ("t-aapl", "AAPL", 187.5, 1_709_303_400),
        ("t-msft", "MSFT", 402.25, 1_709_389_800),
        ("t-tsla", "TSLA", 201.0, 1_709_476_200),
    ] {
        source.insert(
            EntityType::Trade,
            id,
            doc(json!({
                "userId": "trader-1",
                "symbol": symbol,
                "direction": "long",
                "entryPrice": price,
                "quantity": 10,
                "tags": ["swing", "earnings"],
                "entryTime": {"seconds": secs, "nanoseconds": 0},
                "isPaperTrade": false
            })),
        );
    }
    source
}

/// Target store that corrupts the entry price of one record on write.
struct MangledTarget {
    inner: MemoryTargetStore,
    mangle: &'static str,
}

#[async_trait]
impl TargetStore for MangledTarget {
    fn store_type(&self) -> &'static str {
        "mangled"
    }

    async fn list(&self, entity: EntityType, query: &ListQuery) -> Result<Vec<TargetRecord>> {
        self.inner.list(entity, query).await
    }

    async fn get(&self, entity: EntityType, id: &str) -> Result<Option<TargetRecord>> {
        self.inner.get(entity, id).await
    }

    async fn create(&self, entity: EntityType, mut data: Document) -> Result<String> {
        if data.get("source_ref").and_then(Value::as_str) == Some(self.mangle) {
            data.insert("entry_price".to_string(), json!(1.0));
        }
        self.inner.create(entity, data).await
    }

    async fn update(&self, entity: EntityType, id: &str, data: Document) -> Result<()> {
        self.inner.update(entity, id, data).await
    }

    async fn delete(&self, entity: EntityType, id: &str) -> Result<()> {
        self.inner.delete(entity, id).await
    }
}

#[tokio::test]
async fn test_end_to_end_detects_mangled_price() {
    let target = Arc::new(MangledTarget {
        inner: MemoryTargetStore::new(),
        mangle: "t-msft",
    });
    let pipeline = Pipeline::with_stores(
        PipelineConfig::in_memory(None),
        Arc::new(trades()),
        target,
    );
    let scope = Scope::Entity(EntityType::Trade);

    let migration = pipeline
        .migrate(scope, &pipeline.migrate_options())
        .await
        .unwrap();
    let migrated = migration.get(EntityType::Trade).unwrap();
    assert_eq!((migrated.total, migrated.success, migrated.failed), (3, 3, 0));

    // Hand the results over the way the CLI does, through JSON.
    let json = serde_json::to_string(&migration).unwrap();
    let migration: MigrationSummary = serde_json::from_str(&json).unwrap();

    let validation = pipeline
        .validate(scope, &pipeline.validate_options(), Some(&migration))
        .await
        .unwrap();
    let validated = validation.get(EntityType::Trade).unwrap();
    assert_eq!((validated.total, validated.validated, validated.failed), (3, 2, 1));

    let failed = validated.details.iter().find(|d| d.reason.is_some()).unwrap();
    assert_eq!(failed.source_id, "t-msft");
    assert_eq!(failed.differences.len(), 1);
    assert_eq!(failed.differences[0].field, "entry_price");
    assert_eq!(pipeline.tracker().status(), RunStatus::Completed);

    let report = create_validation_report(&validation);
    let section = report.split("### Failed Trade Validations").nth(1).unwrap();
    assert!(section.contains("`t-msft`"));
    assert!(!section.contains("`t-aapl`"));
    assert!(!section.contains("`t-tsla`"));
}

#[tokio::test]
async fn test_migrate_then_rollback_restores_source() {
    let source = Arc::new(trades());
    let target = Arc::new(MemoryTargetStore::new());
    let pipeline = Pipeline::with_stores(
        PipelineConfig::in_memory(None),
        source.clone(),
        target.clone(),
    );

    let migration = pipeline
        .migrate(Scope::All, &pipeline.migrate_options())
        .await
        .unwrap();
    assert_eq!(migration.succeeded(), 3);

    let before = source.get(EntityType::Trade, "t-aapl").await.unwrap().unwrap();

    let mut options = pipeline.rollback_options();
    options.delete_from_target = true;
    let rollback = pipeline
        .rollback(Scope::All, &options, Some(&migration))
        .await
        .unwrap();

    let result = rollback.get(EntityType::Trade).unwrap();
    assert_eq!(result.success, 3);
    assert!(result
        .details
        .iter()
        .all(|d| d.action == Some(RollbackAction::Updated)));
    assert!(target.is_empty(EntityType::Trade));

    let after = source.get(EntityType::Trade, "t-aapl").await.unwrap().unwrap();
    for field in ["symbol", "direction", "entryPrice", "quantity", "tags", "entryTime", "isPaperTrade"] {
        assert_eq!(before.data[field], after.data[field], "field {field}");
    }
}

#[tokio::test]
async fn test_rollback_into_empty_source_recreates_ids() {
    let target = Arc::new(MemoryTargetStore::new());
    let first = Pipeline::with_stores(
        PipelineConfig::in_memory(None),
        Arc::new(trades()),
        target.clone(),
    );
    first
        .migrate(Scope::All, &first.migrate_options())
        .await
        .unwrap();

    let fresh = Arc::new(MemorySourceStore::new());
    let second = Pipeline::with_stores(PipelineConfig::in_memory(None), fresh.clone(), target);

    let first_run = second
        .rollback(Scope::All, &second.rollback_options(), None)
        .await
        .unwrap();
    let second_run = second
        .rollback(Scope::All, &second.rollback_options(), None)
        .await
        .unwrap();

    let created = first_run.get(EntityType::Trade).unwrap();
    assert!(created
        .details
        .iter()
        .all(|d| d.action == Some(RollbackAction::Created)));
    let updated = second_run.get(EntityType::Trade).unwrap();
    assert!(updated
        .details
        .iter()
        .all(|d| d.action == Some(RollbackAction::Updated)));
    assert!(fresh.get(EntityType::Trade, "t-tsla").await.unwrap().is_some());
    assert_eq!(fresh.len(EntityType::Trade), 3);
}

#[tokio::test]
async fn test_pipeline_from_seed_file_config() {
    let mut seed = NamedTempFile::new().unwrap();
    write!(
        seed,
        "{}",
        json!({
            "trades": [{"id": "t1", "userId": "u1", "symbol": "NVDA", "entryTime": "2024-03-01T14:30:00Z"}],
            "dailyPlans": [{"id": "p1", "userId": "u1", "date": "2024-03-01", "goals": ["patience"]}],
            "journalEntries": [
                {"id": "j1", "userId": "u1", "date": "2024-03-01", "title": "Day 1"},
                {"id": "j2", "userId": "u2", "date": "2024-03-02", "title": "Other"}
            ]
        })
    )
    .unwrap();

    let mut config_file = NamedTempFile::new().unwrap();
    writeln!(
        config_file,
        "source:\n  type: memory\n  seed_file: {}\ntarget:\n  type: memory\noptions:\n  owner_id: u1\n  batch_size: 2\n",
        seed.path().display()
    )
    .unwrap();

    let config = PipelineConfig::from_file(config_file.path()).unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let summary = pipeline
        .migrate(Scope::All, &pipeline.migrate_options())
        .await
        .unwrap();

    assert_eq!(summary.total(), 3);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.get(EntityType::JournalEntry).unwrap().total, 1);
}

#[tokio::test]
async fn test_second_run_rejected_while_first_in_progress() {
    let pipeline = Pipeline::with_stores(
        PipelineConfig::in_memory(None),
        Arc::new(trades()),
        Arc::new(MemoryTargetStore::new()),
    );
    pipeline.tracker().begin_run("external run").unwrap();

    let err = pipeline
        .validate(Scope::All, &pipeline.validate_options(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, journal_migrate::Error::RunInProgress));
    assert_eq!(pipeline.tracker().status(), RunStatus::InProgress);
}
