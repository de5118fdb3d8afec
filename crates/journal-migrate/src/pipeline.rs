//! Pipeline orchestration: builds stores from configuration and drives the
//! three engines over one shared tracker.

use indicatif::{ProgressBar, ProgressStyle};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::PipelineConfig;
use crate::context::RunContext;
use crate::entity::EntityType;
use crate::error::{Error, Result};
use crate::migrate::{MigrateOptions, MigrationEngine};
use crate::outcome::{MigrationSummary, RollbackSummary, RunSummary, Tally, ValidationSummary};
use crate::progress::{ListenerHandle, ProgressTracker, RunStatus};
use crate::rollback::{RollbackEngine, RollbackOptions};
use crate::stores::{create_source_store, create_target_store, SourceStore, TargetStore};
use crate::validate::{ValidateOptions, ValidationEngine};

/// Which entity types a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Trade, DailyPlan and JournalEntry, in that order.
    #[default]
    All,
    /// A single entity type.
    Entity(EntityType),
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Entity)
        }
    }
}

/// Wall-clock statistics of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    /// Records processed.
    pub processed: usize,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl RunStats {
    fn measure(start: Instant, processed: usize) -> Self {
        Self {
            processed,
            duration_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Records per second.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.processed as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Migration pipeline.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    ctx: RunContext,
}

impl Pipeline {
    /// Create a pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a store cannot be
    /// created.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let source = create_source_store(&config.source)?;
        let target = create_target_store(&config.target)?;
        Ok(Self::with_stores(config, source, target))
    }

    /// Create a pipeline over existing stores.
    #[must_use]
    pub fn with_stores(
        config: PipelineConfig,
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
    ) -> Self {
        let ctx = RunContext::new(source, target, ProgressTracker::new())
            .with_store_timeout(config.options.store_timeout())
            .with_retry(config.options.retry.clone());
        Self { config, ctx }
    }

    /// Configuration the pipeline was built from.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Tracker shared by every run of this pipeline.
    #[must_use]
    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.ctx.tracker
    }

    /// Migration options derived from configuration.
    #[must_use]
    pub fn migrate_options(&self) -> MigrateOptions {
        let options = &self.config.options;
        MigrateOptions {
            owner_id: options.owner_id.clone(),
            batch_size: options.batch_size,
            verify_round_trip: options.verify_round_trip,
            on_progress: None,
        }
    }

    /// Validation options derived from configuration.
    #[must_use]
    pub fn validate_options(&self) -> ValidateOptions {
        let options = &self.config.options;
        ValidateOptions {
            owner_id: options.owner_id.clone(),
            item_limit: options.item_limit,
            sample_size: options.sample_size,
            seed: None,
        }
    }

    /// Rollback options derived from configuration.
    #[must_use]
    pub fn rollback_options(&self) -> RollbackOptions {
        let options = &self.config.options;
        RollbackOptions {
            owner_id: options.owner_id.clone(),
            delete_from_target: options.delete_from_target,
            batch_size: options.batch_size,
        }
    }

    /// Migrates the entity types in `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if the run could not start or aborted.
    pub async fn migrate(&self, scope: Scope, options: &MigrateOptions) -> Result<MigrationSummary> {
        let start = Instant::now();
        let engine = MigrationEngine::new(self.ctx.clone());
        let summary = match scope {
            Scope::All => engine.migrate_all(options).await?,
            Scope::Entity(entity) => engine.migrate(entity, options).await?.into(),
        };
        self.log_stats("Migration", start, &summary);
        Ok(summary)
    }

    /// Validates the entity types in `scope`, optionally against the target
    /// ids of an earlier migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the run could not start or aborted.
    pub async fn validate(
        &self,
        scope: Scope,
        options: &ValidateOptions,
        migration: Option<&MigrationSummary>,
    ) -> Result<ValidationSummary> {
        let start = Instant::now();
        let engine = ValidationEngine::new(self.ctx.clone());
        let summary = match scope {
            Scope::All => engine.validate_all(options, migration).await?,
            Scope::Entity(entity) => {
                let previous = migration.and_then(|m| m.get(entity));
                engine.validate(entity, options, previous).await?.into()
            }
        };
        self.log_stats("Validation", start, &summary);
        Ok(summary)
    }

    /// Rolls back the entity types in `scope`, optionally limited to the
    /// records of an earlier migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the run could not start or aborted.
    pub async fn rollback(
        &self,
        scope: Scope,
        options: &RollbackOptions,
        migration: Option<&MigrationSummary>,
    ) -> Result<RollbackSummary> {
        let start = Instant::now();
        let engine = RollbackEngine::new(self.ctx.clone());
        let summary = match scope {
            Scope::All => engine.rollback_all(options, migration).await?,
            Scope::Entity(entity) => {
                let previous = migration.and_then(|m| m.get(entity));
                engine.rollback(entity, options, previous).await?.into()
            }
        };
        self.log_stats("Rollback", start, &summary);
        Ok(summary)
    }

    fn log_stats<R: Tally>(&self, what: &str, start: Instant, summary: &RunSummary<R>) {
        let stats = RunStats::measure(start, summary.total());
        info!(
            "{} complete: {} processed, {} succeeded, {} failed in {:.2}s ({:.0} records/sec)",
            what,
            stats.processed,
            summary.succeeded(),
            summary.failed(),
            stats.duration_secs,
            stats.throughput()
        );
    }
}

/// Renders tracker updates on a progress bar until the returned handle is
/// unsubscribed.
pub fn attach_progress_bar(tracker: &Arc<ProgressTracker>) -> (ProgressBar, ListenerHandle) {
    let bar = create_progress_bar();
    let target = bar.clone();
    let handle = tracker.add_listener(move |snapshot| {
        let progress = &snapshot.progress;
        if target.length() != Some(progress.total as u64) {
            target.set_length(progress.total as u64);
        }
        target.set_position(progress.current as u64);
        target.set_message(format!("{}: {}", progress.entity, progress.detail));
        match snapshot.status {
            RunStatus::Completed | RunStatus::Failed => {
                target.finish_with_message(progress.detail.clone());
            }
            RunStatus::Idle | RunStatus::InProgress => {}
        }
    });
    (bar, handle)
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{MemorySourceStore, MemoryTargetStore};
    use serde_json::json;

    #[test]
    fn test_scope_parse() {
        assert_eq!("all".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!(
            "daily-plan".parse::<Scope>().unwrap(),
            Scope::Entity(EntityType::DailyPlan)
        );
        assert!("positions".parse::<Scope>().is_err());
    }

    #[test]
    fn test_run_stats_throughput() {
        let stats = RunStats {
            processed: 1000,
            duration_secs: 2.0,
        };
        assert!((stats.throughput() - 500.0).abs() < 0.001);
        assert_eq!(RunStats::default().throughput(), 0.0);
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = PipelineConfig::in_memory(None);
        config.options.owner_id = Some("u1".to_string());
        config.options.batch_size = 10;
        config.options.delete_from_target = true;
        let pipeline = Pipeline::new(config).unwrap();

        assert_eq!(pipeline.migrate_options().batch_size, 10);
        assert_eq!(pipeline.validate_options().owner_id.as_deref(), Some("u1"));
        assert!(pipeline.rollback_options().delete_from_target);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = PipelineConfig::in_memory(None);
        config.options.sample_size = 0;
        assert!(Pipeline::new(config).is_err());
    }

    #[tokio::test]
    async fn test_single_entity_scope_returns_one_result() {
        let source = Arc::new(MemorySourceStore::new());
        source.insert(
            EntityType::DailyPlan,
            "p1",
            json!({"date": "2024-03-01"}).as_object().cloned().unwrap(),
        );
        let pipeline = Pipeline::with_stores(
            PipelineConfig::in_memory(None),
            source,
            Arc::new(MemoryTargetStore::new()),
        );

        let summary = pipeline
            .migrate(
                Scope::Entity(EntityType::DailyPlan),
                &pipeline.migrate_options(),
            )
            .await
            .unwrap();

        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.get(EntityType::DailyPlan).unwrap().success, 1);
        assert_eq!(pipeline.tracker().status(), RunStatus::Completed);
    }
}
