//! Validation engine: samples source records and compares them with their
//! target copies.
//!
//! Validation reads only. A sampled record fails when its target copy is
//! missing or when a compared field differs; neither ends the run early, and
//! the run status ends `Completed` either way.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::compare::diff_records;
use crate::context::RunContext;
use crate::entity::EntityType;
use crate::error::Result;
use crate::outcome::{
    MigrationResult, MigrationSummary, ValidationOutcome, ValidationResult, ValidationStatus,
    ValidationSummary,
};
use crate::record::{ListQuery, SourceRecord, TargetRecord};
use crate::rollback::ROLLBACK_LIST_LIMIT;

/// Reason recorded when no target copy exists.
pub const REASON_NOT_FOUND: &str = "record not found in target";
/// Reason recorded when compared fields differ.
pub const REASON_DIFFERENCES: &str = "field differences detected";

/// Options for a validation run.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Only validate records of this owner.
    pub owner_id: Option<String>,
    /// Source records fetched per entity type.
    pub item_limit: usize,
    /// Records compared per entity type.
    pub sample_size: usize,
    /// Seed for a reproducible sample.
    pub seed: Option<u64>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            owner_id: None,
            item_limit: 100,
            sample_size: 20,
            seed: None,
        }
    }
}

impl ValidateOptions {
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Picks `min(sample_size, len)` distinct indices uniformly at random.
///
/// Indices are drawn one at a time and redrawn on collision, so the order of
/// the returned indices is the draw order.
pub fn sample_indices<R: Rng>(len: usize, sample_size: usize, rng: &mut R) -> Vec<usize> {
    let wanted = sample_size.min(len);
    let mut seen = HashSet::with_capacity(wanted);
    let mut picked = Vec::with_capacity(wanted);
    while picked.len() < wanted {
        let index = rng.gen_range(0..len);
        if seen.insert(index) {
            picked.push(index);
        }
    }
    picked
}

/// Target copies keyed by the source id they reference.
type TargetIndex = HashMap<String, std::result::Result<TargetRecord, String>>;

/// Compares sampled source records with their migrated copies.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    ctx: RunContext,
}

impl ValidationEngine {
    /// Creates an engine over a run context.
    #[must_use]
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Validates one entity type.
    ///
    /// With a migration result, target copies are fetched by the target ids
    /// it recorded; otherwise the target store is listed by owner.
    ///
    /// # Errors
    ///
    /// Fails if another run is active or a store listing fails.
    pub async fn validate(
        &self,
        entity: EntityType,
        options: &ValidateOptions,
        migration: Option<&MigrationResult>,
    ) -> Result<ValidationResult> {
        self.ctx
            .tracker
            .begin_run(format!("Validating {}", entity.label()))?;

        let mut rng = options.rng();
        let result = self
            .validate_entity(entity, options, migration, &mut rng)
            .await
            .map_err(|e| self.ctx.abort_run(e))?;

        self.ctx.finish_run(
            0,
            format!(
                "Validated {}: {} matched, {} failed",
                entity.label(),
                result.validated,
                result.failed
            ),
        );
        Ok(result)
    }

    /// Validates Trade, DailyPlan and JournalEntry in sequence as one run.
    ///
    /// # Errors
    ///
    /// Same as [`ValidationEngine::validate`].
    pub async fn validate_all(
        &self,
        options: &ValidateOptions,
        migration: Option<&MigrationSummary>,
    ) -> Result<ValidationSummary> {
        self.ctx.tracker.begin_run("Validating all entities")?;

        let mut rng = options.rng();
        let mut summary = ValidationSummary::default();
        for entity in EntityType::ALL {
            let previous = migration.and_then(|m| m.get(entity));
            let result = self
                .validate_entity(entity, options, previous, &mut rng)
                .await
                .map_err(|e| self.ctx.abort_run(e))?;
            summary.insert(entity, result);
        }

        self.ctx.finish_run(
            0,
            format!(
                "Validation finished: {} matched, {} failed",
                summary.succeeded(),
                summary.failed()
            ),
        );
        Ok(summary)
    }

    async fn validate_entity(
        &self,
        entity: EntityType,
        options: &ValidateOptions,
        migration: Option<&MigrationResult>,
        rng: &mut StdRng,
    ) -> Result<ValidationResult> {
        let query = ListQuery::for_owner(options.owner_id.as_deref())
            .newest_first(entity.schema().recency_field)
            .limit(options.item_limit);
        let operation = format!("list {}", entity.source_collection());
        let sources = self
            .ctx
            .read(&operation, || self.ctx.source.list(entity, &query))
            .await?;

        let sample = sample_indices(sources.len(), options.sample_size, rng);
        let targets = match migration {
            Some(result) => {
                let sampled: HashSet<&str> =
                    sample.iter().map(|&i| sources[i].id.as_str()).collect();
                self.fetch_migrated(entity, result, &sampled).await
            }
            None => self.list_targets(entity, options.owner_id.as_deref()).await?,
        };
        info!(
            "Validating {} of {} {} records against {} target records",
            sample.len(),
            sources.len(),
            entity.label(),
            targets.len()
        );
        self.ctx.tracker.start_entity(sample.len(), entity.label());

        let mut details = Vec::with_capacity(sample.len());
        for index in sample {
            let outcome = Self::check(entity, &sources[index], &targets);
            if outcome.status == ValidationStatus::Failed {
                debug!(
                    "{} {} failed validation: {}",
                    entity.label(),
                    outcome.source_id,
                    outcome.reason.as_deref().unwrap_or_default()
                );
            }
            details.push(outcome);
            self.ctx.tracker.advance(1);
        }

        let result = ValidationResult::from_outcomes(entity, details);
        info!(
            "{} validation complete: {} matched, {} failed",
            entity.label(),
            result.validated,
            result.failed
        );
        Ok(result)
    }

    /// Fetches the target copies of the sampled source records only.
    async fn fetch_migrated(
        &self,
        entity: EntityType,
        migration: &MigrationResult,
        sampled: &HashSet<&str>,
    ) -> TargetIndex {
        let mut index = TargetIndex::new();
        let wanted = migration
            .migrated()
            .filter(|(source_id, _)| sampled.contains(source_id));
        for (source_id, target_id) in wanted {
            let operation = format!("get {} {}", entity.target_resource(), target_id);
            let fetched = self
                .ctx
                .read(&operation, || self.ctx.target.get(entity, target_id))
                .await;
            match fetched {
                Ok(Some(record)) => {
                    let key = record.source_ref.clone().unwrap_or_else(|| source_id.to_string());
                    index.insert(key, Ok(record));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("{} {}: target fetch failed: {}", entity.label(), target_id, e);
                    index.insert(source_id.to_string(), Err(e.to_string()));
                }
            }
        }
        index
    }

    async fn list_targets(&self, entity: EntityType, owner_id: Option<&str>) -> Result<TargetIndex> {
        let query = ListQuery::for_owner(owner_id).limit(ROLLBACK_LIST_LIMIT);
        let operation = format!("list {}", entity.target_resource());
        let records = self
            .ctx
            .read(&operation, || self.ctx.target.list(entity, &query))
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let key = record.source_ref.clone()?;
                Some((key, Ok(record)))
            })
            .collect())
    }

    fn check(entity: EntityType, source: &SourceRecord, targets: &TargetIndex) -> ValidationOutcome {
        let failed = |target_id: Option<String>, reason: String| ValidationOutcome {
            source_id: source.id.clone(),
            target_id,
            status: ValidationStatus::Failed,
            reason: Some(reason),
            differences: Vec::new(),
        };

        let target = match targets.get(&source.id) {
            None => return failed(None, REASON_NOT_FOUND.to_string()),
            Some(Err(e)) => return failed(None, format!("{}: {}", REASON_NOT_FOUND, e)),
            Some(Ok(target)) => target,
        };

        let differences = diff_records(entity, &source.data, &target.data);
        if differences.is_empty() {
            ValidationOutcome {
                source_id: source.id.clone(),
                target_id: Some(target.id.clone()),
                status: ValidationStatus::Validated,
                reason: None,
                differences,
            }
        } else {
            ValidationOutcome {
                differences,
                ..failed(Some(target.id.clone()), REASON_DIFFERENCES.to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
