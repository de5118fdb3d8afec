//! Tests for the rollback engine.

use super::*;
use crate::error::Error;
use crate::migrate::{MigrateOptions, MigrationEngine};
use crate::progress::{ProgressTracker, RunStatus};
use crate::record::Document;
use crate::retry::RetryConfig;
use crate::stores::{MemorySourceStore, MemoryTargetStore, SourceStore, TargetStore};
use serde_json::{json, Value};
use std::sync::Arc;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn context(source: Arc<MemorySourceStore>, target: Arc<MemoryTargetStore>) -> RunContext {
    RunContext::new(source, target, ProgressTracker::new()).with_retry(RetryConfig::no_retry())
}

fn outcome_for<'a>(result: &'a RollbackResult, source_id: &str) -> &'a crate::outcome::RollbackOutcome {
    result
        .details
        .iter()
        .find(|d| d.source_id.as_deref() == Some(source_id))
        .unwrap()
}

#[tokio::test]
async fn test_rollback_creates_missing_and_updates_existing() {
    let source = Arc::new(MemorySourceStore::new());
    source.insert(EntityType::Trade, "kept", doc(json!({"symbol": "OLD"})));
    let target = Arc::new(MemoryTargetStore::new());
    target.insert(
        EntityType::Trade,
        doc(json!({"source_ref": "kept", "symbol": "NEW", "entry_time": "2024-03-01T14:30:00.000Z"})),
    );
    target.insert(
        EntityType::Trade,
        doc(json!({"source_ref": "gone", "symbol": "MSFT", "user_id": "u1"})),
    );
    let engine = RollbackEngine::new(context(source.clone(), target.clone()));

    let result = engine
        .rollback(EntityType::Trade, &RollbackOptions::default(), None)
        .await
        .unwrap();

    assert_eq!((result.total, result.success, result.failed), (2, 2, 0));
    assert_eq!(outcome_for(&result, "kept").action, Some(RollbackAction::Updated));
    assert_eq!(outcome_for(&result, "gone").action, Some(RollbackAction::Created));

    let kept = source.get(EntityType::Trade, "kept").await.unwrap().unwrap();
    assert_eq!(kept.data["symbol"], json!("NEW"));
    assert_eq!(
        kept.data["entryTime"],
        json!({"seconds": 1_709_303_400, "nanoseconds": 0})
    );
    assert!(kept.data[SOURCE_UPDATED_AT_FIELD].get("seconds").is_some());

    let gone = source.get(EntityType::Trade, "gone").await.unwrap().unwrap();
    assert_eq!(gone.data["userId"], json!("u1"));
    assert!(gone.data.get("source_ref").is_none());

    assert_eq!(target.len(EntityType::Trade), 2);
}

#[tokio::test]
async fn test_rollback_twice_updates_every_record() {
    let source = Arc::new(MemorySourceStore::new());
    let target = Arc::new(MemoryTargetStore::new());
    for i in 0..3 {
        target.insert(
            EntityType::JournalEntry,
            doc(json!({"source_ref": format!("j{i}"), "title": "Day"})),
        );
    }
    let engine = RollbackEngine::new(context(source, target));
    let options = RollbackOptions::default();

    let first = engine
        .rollback(EntityType::JournalEntry, &options, None)
        .await
        .unwrap();
    let second = engine
        .rollback(EntityType::JournalEntry, &options, None)
        .await
        .unwrap();

    assert!(first
        .details
        .iter()
        .all(|d| d.action == Some(RollbackAction::Created)));
    assert_eq!(second.success, 3);
    assert!(second
        .details
        .iter()
        .all(|d| d.action == Some(RollbackAction::Updated)));
}

#[tokio::test]
async fn test_rollback_missing_source_ref_fails_record() {
    let source = Arc::new(MemorySourceStore::new());
    let target = Arc::new(MemoryTargetStore::new());
    let orphan = target.insert(EntityType::DailyPlan, doc(json!({"date": "2024-03-01"})));
    target.insert(
        EntityType::DailyPlan,
        doc(json!({"source_ref": "p1", "date": "2024-03-02"})),
    );
    let ctx = context(source.clone(), target);
    let tracker = Arc::clone(&ctx.tracker);
    let engine = RollbackEngine::new(ctx);

    let result = engine
        .rollback(EntityType::DailyPlan, &RollbackOptions::default(), None)
        .await
        .unwrap();

    assert_eq!((result.success, result.failed), (1, 1));
    let failed = result.details.iter().find(|d| d.error.is_some()).unwrap();
    assert_eq!(failed.target_id, orphan);
    assert_eq!(failed.error.as_deref(), Some(REASON_MISSING_SOURCE_REF));
    assert_eq!(source.len(EntityType::DailyPlan), 1);
    assert_eq!(tracker.status(), RunStatus::Failed);
}

#[tokio::test]
async fn test_rollback_from_migration_result_with_delete() {
    let source = Arc::new(MemorySourceStore::new());
    source.insert(EntityType::Trade, "t1", doc(json!({"symbol": "AAPL"})));
    source.insert(EntityType::Trade, "t2", doc(json!({"symbol": "MSFT"})));
    let target = Arc::new(MemoryTargetStore::new());
    let unrelated = target.insert(EntityType::Trade, doc(json!({"source_ref": "x"})));

    let migration = MigrationEngine::new(context(source.clone(), target.clone()))
        .migrate(EntityType::Trade, &MigrateOptions::default())
        .await
        .unwrap();
    assert_eq!(target.len(EntityType::Trade), 3);

    let options = RollbackOptions {
        delete_from_target: true,
        ..Default::default()
    };
    let result = RollbackEngine::new(context(source.clone(), target.clone()))
        .rollback(EntityType::Trade, &options, Some(&migration))
        .await
        .unwrap();

    assert_eq!(result.success, 2);
    assert!(result.details.iter().all(|d| d.deleted_from_target));
    assert_eq!(target.len(EntityType::Trade), 1);
    assert!(target.get(EntityType::Trade, &unrelated).await.unwrap().is_some());
    assert!(source.get(EntityType::Trade, "x").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rollback_by_id_missing_target_fails_record() {
    let source = Arc::new(MemorySourceStore::new());
    let target = Arc::new(MemoryTargetStore::new());
    let migration = MigrationResult::from_results(
        EntityType::Trade,
        vec![Ok(("t1".to_string(), "404".to_string()))],
    );
    let engine = RollbackEngine::new(context(source, target));

    let result = engine
        .rollback(EntityType::Trade, &RollbackOptions::default(), Some(&migration))
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    assert_eq!(result.details[0].target_id, "404");
    assert_eq!(result.details[0].error.as_deref(), Some(REASON_NOT_FOUND));
    assert_eq!(result.details[0].source_id.as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_rollback_rejects_zero_batch_size() {
    let engine = RollbackEngine::new(context(
        Arc::new(MemorySourceStore::new()),
        Arc::new(MemoryTargetStore::new()),
    ));
    let options = RollbackOptions {
        batch_size: 0,
        ..Default::default()
    };

    let err = engine.rollback_all(&options, None).await.unwrap_err();

    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_rollback_all_sequences_entities() {
    let source = Arc::new(MemorySourceStore::new());
    let target = Arc::new(MemoryTargetStore::new());
    for entity in EntityType::ALL {
        target.insert(entity, doc(json!({"source_ref": format!("{entity}-1")})));
    }
    let engine = RollbackEngine::new(context(source.clone(), target));

    let summary = engine
        .rollback_all(&RollbackOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 3);
    for entity in EntityType::ALL {
        assert_eq!(source.len(entity), 1);
    }
}
