//! Migration engine: source store -> transformer -> target store.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::{BatchPolicy, DEFAULT_BATCH_SIZE};
use crate::context::RunContext;
use crate::entity::EntityType;
use crate::error::Result;
use crate::outcome::{MigrationResult, MigrationSummary, RecordFailure, RecordResult};
use crate::record::{ListQuery, SourceRecord};
use crate::transform::Transformer;

/// Counters handed to the progress callback after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// Records of the entity type.
    pub total: usize,
    /// Records processed so far.
    pub current: usize,
    /// Records written so far.
    pub success: usize,
    /// Records failed so far.
    pub failed: usize,
}

/// Callback invoked after every completed batch.
pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;

/// Options for a migration run.
#[derive(Clone)]
pub struct MigrateOptions {
    /// Only migrate records of this owner.
    pub owner_id: Option<String>,
    /// Records per batch.
    pub batch_size: usize,
    /// Check every record survives the forward and reverse transform before
    /// writing it.
    pub verify_round_trip: bool,
    /// Called after each batch.
    pub on_progress: Option<ProgressCallback>,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            owner_id: None,
            batch_size: DEFAULT_BATCH_SIZE,
            verify_round_trip: true,
            on_progress: None,
        }
    }
}

impl std::fmt::Debug for MigrateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrateOptions")
            .field("owner_id", &self.owner_id)
            .field("batch_size", &self.batch_size)
            .field("verify_round_trip", &self.verify_round_trip)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Copies records from the source store into the target store.
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    ctx: RunContext,
}

impl MigrationEngine {
    /// Creates an engine over a run context.
    #[must_use]
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Migrates every record of one entity type.
    ///
    /// Per-record failures are recorded in the result and leave the run
    /// going; the run then ends `Failed` on the tracker.
    ///
    /// # Errors
    ///
    /// Fails without touching the tracker if the options are invalid or
    /// another run is active. Fails and marks the run failed if the source
    /// listing fails.
    pub async fn migrate(&self, entity: EntityType, options: &MigrateOptions) -> Result<MigrationResult> {
        let policy = BatchPolicy::new(options.batch_size)?;
        self.ctx
            .tracker
            .begin_run(format!("Migrating {}", entity.label()))?;

        let result = self
            .migrate_entity(entity, options, policy)
            .await
            .map_err(|e| self.ctx.abort_run(e))?;

        self.ctx.finish_run(
            result.failed,
            format!(
                "Migrated {}: {} succeeded, {} failed",
                entity.label(),
                result.success,
                result.failed
            ),
        );
        Ok(result)
    }

    /// Migrates Trade, DailyPlan and JournalEntry in sequence as one run.
    ///
    /// # Errors
    ///
    /// Same as [`MigrationEngine::migrate`]; a run-level error on any entity
    /// type aborts the remaining ones.
    pub async fn migrate_all(&self, options: &MigrateOptions) -> Result<MigrationSummary> {
        let policy = BatchPolicy::new(options.batch_size)?;
        self.ctx.tracker.begin_run("Migrating all entities")?;

        let mut summary = MigrationSummary::default();
        for entity in EntityType::ALL {
            let result = self
                .migrate_entity(entity, options, policy)
                .await
                .map_err(|e| self.ctx.abort_run(e))?;
            summary.insert(entity, result);
        }

        self.ctx.finish_run(
            summary.failed(),
            format!(
                "Migration finished: {} succeeded, {} failed",
                summary.succeeded(),
                summary.failed()
            ),
        );
        Ok(summary)
    }

    async fn migrate_entity(
        &self,
        entity: EntityType,
        options: &MigrateOptions,
        policy: BatchPolicy,
    ) -> Result<MigrationResult> {
        let query = ListQuery::for_owner(options.owner_id.as_deref())
            .newest_first(entity.schema().recency_field);
        let operation = format!("list {}", entity.source_collection());
        let records = self
            .ctx
            .read(&operation, || self.ctx.source.list(entity, &query))
            .await?;

        let total = records.len();
        info!(
            "Migrating {} {} records in {} batches of {}",
            total,
            entity.label(),
            policy.batch_count(total),
            policy.batch_size()
        );
        self.ctx.tracker.start_entity(total, entity.label());

        let transformer = Transformer::new(entity);
        let results = policy
            .run(
                records,
                |record| self.migrate_record(transformer, record, options.verify_round_trip),
                |step, so_far| {
                    self.ctx.tracker.advance(step.size);
                    let failed = so_far.iter().filter(|r| r.is_err()).count();
                    debug!(
                        "{} batch {}: {}/{} processed, {} failed",
                        entity.label(),
                        step.index + 1,
                        step.processed,
                        total,
                        failed
                    );
                    if let Some(callback) = &options.on_progress {
                        callback(BatchProgress {
                            total,
                            current: step.processed,
                            success: step.processed - failed,
                            failed,
                        });
                    }
                },
            )
            .await;

        let result = MigrationResult::from_results(entity, results);
        info!(
            "{} migration complete: {} succeeded, {} failed",
            entity.label(),
            result.success,
            result.failed
        );
        Ok(result)
    }

    async fn migrate_record(
        &self,
        transformer: Transformer,
        record: SourceRecord,
        verify_round_trip: bool,
    ) -> RecordResult<(String, String)> {
        let entity = transformer.entity();
        let outcome = self.write_record(transformer, &record, verify_round_trip).await;
        if let Err(failure) = &outcome {
            warn!("{} {} failed to migrate: {}", entity.label(), record.id, failure.error);
        }
        outcome.map(|target_id| (record.id, target_id))
    }

    async fn write_record(
        &self,
        transformer: Transformer,
        record: &SourceRecord,
        verify_round_trip: bool,
    ) -> RecordResult<String> {
        let fail = |e: &dyn std::fmt::Display| RecordFailure::source(record.id.as_str(), e);
        let entity = transformer.entity();

        if verify_round_trip {
            let differences = transformer.verify_round_trip(record).map_err(|e| fail(&e))?;
            if !differences.is_empty() {
                let fields: Vec<&str> = differences.iter().map(|d| d.field.as_str()).collect();
                return Err(fail(&format!(
                    "transform is not invertible: {}",
                    fields.join(", ")
                )));
            }
        }

        let data = transformer.to_target(record).map_err(|e| fail(&e))?;
        let operation = format!("create {} {}", entity.target_resource(), record.id);
        self.ctx
            .timed(&operation, self.ctx.target.create(entity, data))
            .await
            .map_err(|e| fail(&e))
    }
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
