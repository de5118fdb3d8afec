//! Rollback engine: target store -> reverse transformer -> source store.
//!
//! Each target record is written back under the source id it references.
//! An existing source record is overwritten in place, a missing one is
//! re-created, so running rollback twice is safe.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::batch::{BatchPolicy, DEFAULT_BATCH_SIZE};
use crate::context::RunContext;
use crate::entity::{EntityType, SOURCE_UPDATED_AT_FIELD};
use crate::error::Result;
use crate::outcome::{
    MigrationResult, MigrationSummary, RecordFailure, RecordResult, Restored, RollbackAction,
    RollbackResult, RollbackSummary,
};
use crate::record::{ListQuery, TargetRecord};
use crate::timestamp;
use crate::transform::Transformer;
use crate::validate::REASON_NOT_FOUND;

/// Upper bound on target records listed when no migration result is given.
pub const ROLLBACK_LIST_LIMIT: usize = 10_000;

/// Reason recorded when a target record has no source reference.
pub const REASON_MISSING_SOURCE_REF: &str = "missing source reference";

/// Options for a rollback run.
#[derive(Debug, Clone)]
pub struct RollbackOptions {
    /// Only roll back records of this owner.
    pub owner_id: Option<String>,
    /// Delete each target record after it was written back.
    pub delete_from_target: bool,
    /// Records per batch.
    pub batch_size: usize,
}

impl Default for RollbackOptions {
    fn default() -> Self {
        Self {
            owner_id: None,
            delete_from_target: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// A record to roll back: either already fetched or known only by the
/// `(source_id, target_id)` pair of a migration result.
enum WorkItem {
    Fetched(TargetRecord),
    ById { source_id: String, target_id: String },
}

/// Writes target records back into the source store.
#[derive(Debug, Clone)]
pub struct RollbackEngine {
    ctx: RunContext,
}

impl RollbackEngine {
    /// Creates an engine over a run context.
    #[must_use]
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Rolls back one entity type.
    ///
    /// With a migration result, exactly the target records it created are
    /// rolled back; otherwise the target store is listed by owner.
    ///
    /// # Errors
    ///
    /// Fails if the options are invalid, another run is active, or the
    /// target listing fails.
    pub async fn rollback(
        &self,
        entity: EntityType,
        options: &RollbackOptions,
        migration: Option<&MigrationResult>,
    ) -> Result<RollbackResult> {
        let policy = BatchPolicy::new(options.batch_size)?;
        self.ctx
            .tracker
            .begin_run(format!("Rolling back {}", entity.label()))?;

        let result = self
            .rollback_entity(entity, options, migration, policy)
            .await
            .map_err(|e| self.ctx.abort_run(e))?;

        self.ctx.finish_run(
            result.failed,
            format!(
                "Rolled back {}: {} succeeded, {} failed",
                entity.label(),
                result.success,
                result.failed
            ),
        );
        Ok(result)
    }

    /// Rolls back Trade, DailyPlan and JournalEntry in sequence as one run.
    ///
    /// # Errors
    ///
    /// Same as [`RollbackEngine::rollback`].
    pub async fn rollback_all(
        &self,
        options: &RollbackOptions,
        migration: Option<&MigrationSummary>,
    ) -> Result<RollbackSummary> {
        let policy = BatchPolicy::new(options.batch_size)?;
        self.ctx.tracker.begin_run("Rolling back all entities")?;

        let mut summary = RollbackSummary::default();
        for entity in EntityType::ALL {
            let previous = migration.and_then(|m| m.get(entity));
            let result = self
                .rollback_entity(entity, options, previous, policy)
                .await
                .map_err(|e| self.ctx.abort_run(e))?;
            summary.insert(entity, result);
        }

        self.ctx.finish_run(
            summary.failed(),
            format!(
                "Rollback finished: {} succeeded, {} failed",
                summary.succeeded(),
                summary.failed()
            ),
        );
        Ok(summary)
    }

    async fn rollback_entity(
        &self,
        entity: EntityType,
        options: &RollbackOptions,
        migration: Option<&MigrationResult>,
        policy: BatchPolicy,
    ) -> Result<RollbackResult> {
        let items: Vec<WorkItem> = match migration {
            Some(result) => result
                .migrated()
                .map(|(source_id, target_id)| WorkItem::ById {
                    source_id: source_id.to_string(),
                    target_id: target_id.to_string(),
                })
                .collect(),
            None => {
                let query =
                    ListQuery::for_owner(options.owner_id.as_deref()).limit(ROLLBACK_LIST_LIMIT);
                let operation = format!("list {}", entity.target_resource());
                self.ctx
                    .read(&operation, || self.ctx.target.list(entity, &query))
                    .await?
                    .into_iter()
                    .map(WorkItem::Fetched)
                    .collect()
            }
        };

        let total = items.len();
        info!(
            "Rolling back {} {} records (delete from target: {})",
            total,
            entity.label(),
            options.delete_from_target
        );
        self.ctx.tracker.start_entity(total, entity.label());

        let transformer = Transformer::new(entity);
        let results = policy
            .run(
                items,
                |item| self.rollback_item(transformer, item, options.delete_from_target),
                |step, so_far| {
                    self.ctx.tracker.advance(step.size);
                    debug!(
                        "{} rollback batch {}: {}/{} processed, {} failed",
                        entity.label(),
                        step.index + 1,
                        step.processed,
                        total,
                        so_far.iter().filter(|r| r.is_err()).count()
                    );
                },
            )
            .await;

        let result = RollbackResult::from_results(entity, results);
        info!(
            "{} rollback complete: {} succeeded, {} failed",
            entity.label(),
            result.success,
            result.failed
        );
        Ok(result)
    }

    async fn rollback_item(
        &self,
        transformer: Transformer,
        item: WorkItem,
        delete_from_target: bool,
    ) -> RecordResult<Restored> {
        let entity = transformer.entity();
        let outcome = match item {
            WorkItem::Fetched(record) => self.restore(transformer, record, delete_from_target).await,
            WorkItem::ById {
                source_id,
                target_id,
            } => match self.fetch_target(entity, &target_id).await {
                Ok(record) => self.restore(transformer, record, delete_from_target).await,
                Err(failure) => Err(RecordFailure {
                    source_id: Some(source_id),
                    ..failure
                }),
            },
        };
        if let Err(failure) = &outcome {
            warn!(
                "{} {} failed to roll back: {}",
                entity.label(),
                failure.target_id.as_deref().unwrap_or_default(),
                failure.error
            );
        }
        outcome
    }

    async fn fetch_target(&self, entity: EntityType, target_id: &str) -> RecordResult<TargetRecord> {
        let operation = format!("get {} {}", entity.target_resource(), target_id);
        match self
            .ctx
            .read(&operation, || self.ctx.target.get(entity, target_id))
            .await
        {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(RecordFailure::target(target_id, REASON_NOT_FOUND)),
            Err(e) => Err(RecordFailure::target(target_id, e)),
        }
    }

    async fn restore(
        &self,
        transformer: Transformer,
        record: TargetRecord,
        delete_from_target: bool,
    ) -> RecordResult<Restored> {
        let entity = transformer.entity();
        let target_id = record.id.as_str();
        let fail = |e: &dyn std::fmt::Display| {
            let mut failure = RecordFailure::target(target_id, e);
            failure.source_id = record.source_ref.clone();
            failure
        };

        let Some(source_id) = record.source_ref.as_deref() else {
            return Err(RecordFailure::target(target_id, REASON_MISSING_SOURCE_REF));
        };
        let data = transformer.to_source(&record.data).map_err(|e| fail(&e))?;

        let lookup = format!("get {} {}", entity.source_collection(), source_id);
        let existing = self
            .ctx
            .read(&lookup, || self.ctx.source.get(entity, source_id))
            .await
            .map_err(|e| fail(&e))?;

        let action = if existing.is_some() {
            let mut data = data;
            data.insert(
                SOURCE_UPDATED_AT_FIELD.to_string(),
                timestamp::to_wrapper(&Utc::now()),
            );
            let operation = format!("update {} {}", entity.source_collection(), source_id);
            self.ctx
                .timed(&operation, self.ctx.source.update(entity, source_id, data))
                .await
                .map_err(|e| fail(&e))?;
            RollbackAction::Updated
        } else {
            let operation = format!("create {} {}", entity.source_collection(), source_id);
            self.ctx
                .timed(&operation, self.ctx.source.create(entity, Some(source_id), data))
                .await
                .map_err(|e| fail(&e))?;
            RollbackAction::Created
        };

        if delete_from_target {
            let operation = format!("delete {} {}", entity.target_resource(), target_id);
            self.ctx
                .timed(&operation, self.ctx.target.delete(entity, target_id))
                .await
                .map_err(|e| fail(&format!("source written but target delete failed: {}", e)))?;
        }

        Ok(Restored {
            target_id: record.id.clone(),
            source_id: source_id.to_string(),
            action,
            deleted_from_target: delete_from_target,
        })
    }
}

#[cfg(test)]
#[path = "rollback_tests.rs"]
mod tests;
