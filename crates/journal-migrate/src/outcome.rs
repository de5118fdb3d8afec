//! Per-record outcomes and aggregated results of the three engines.
//!
//! Engines produce one `Result<_, RecordFailure>` per record; aggregation is a
//! partition over that list that keeps input order in `details`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::compare::FieldDifference;
use crate::entity::EntityType;

/// Why a single record failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Source id, when known.
    pub source_id: Option<String>,
    /// Target id, when known.
    pub target_id: Option<String>,
    /// Error message.
    pub error: String,
}

impl RecordFailure {
    /// Failure of a record identified by its source id.
    pub fn source(id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            source_id: Some(id.into()),
            target_id: None,
            error: error.to_string(),
        }
    }

    /// Failure of a record identified by its target id.
    pub fn target(id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            source_id: None,
            target_id: Some(id.into()),
            error: error.to_string(),
        }
    }
}

/// Per-record result of a migration or rollback step.
pub type RecordResult<T> = std::result::Result<T, RecordFailure>;

/// Outcome status of a migration or rollback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The record was written.
    Success,
    /// The record failed.
    Failed,
}

/// Outcome of migrating one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    /// Source record id.
    pub source_id: String,
    /// New target id on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Status.
    pub status: OutcomeStatus,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<RecordResult<(String, String)>> for MigrationOutcome {
    fn from(result: RecordResult<(String, String)>) -> Self {
        match result {
            Ok((source_id, target_id)) => Self {
                source_id,
                target_id: Some(target_id),
                status: OutcomeStatus::Success,
                error: None,
            },
            Err(failure) => Self {
                source_id: failure.source_id.unwrap_or_default(),
                target_id: failure.target_id,
                status: OutcomeStatus::Failed,
                error: Some(failure.error),
            },
        }
    }
}

/// Aggregated migration result for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Entity type.
    pub entity: EntityType,
    /// Records attempted.
    pub total: usize,
    /// Records written to the target.
    pub success: usize,
    /// Records that failed.
    pub failed: usize,
    /// Per-record outcomes in source order.
    pub details: Vec<MigrationOutcome>,
}

impl MigrationResult {
    /// Aggregates per-record results.
    pub fn from_results(entity: EntityType, results: Vec<RecordResult<(String, String)>>) -> Self {
        let details: Vec<MigrationOutcome> = results.into_iter().map(Into::into).collect();
        let success = details
            .iter()
            .filter(|d| d.status == OutcomeStatus::Success)
            .count();
        Self {
            entity,
            total: details.len(),
            success,
            failed: details.len() - success,
            details,
        }
    }

    /// `(source_id, target_id)` pairs of successfully migrated records.
    pub fn migrated(&self) -> impl Iterator<Item = (&str, &str)> {
        self.details.iter().filter_map(|d| match (&d.status, &d.target_id) {
            (OutcomeStatus::Success, Some(target)) => Some((d.source_id.as_str(), target.as_str())),
            _ => None,
        })
    }
}

/// Validation status of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Both sides agree.
    Validated,
    /// Missing target or differing fields.
    Failed,
}

/// Outcome of validating one sampled record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Source record id.
    pub source_id: String,
    /// Matching target id, if found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Status.
    pub status: ValidationStatus,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Differing fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub differences: Vec<FieldDifference>,
}

/// Aggregated validation result for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Entity type.
    pub entity: EntityType,
    /// Records sampled.
    pub total: usize,
    /// Records that matched.
    pub validated: usize,
    /// Records that did not.
    pub failed: usize,
    /// Per-record outcomes in sample order.
    pub details: Vec<ValidationOutcome>,
}

impl ValidationResult {
    /// Aggregates per-record outcomes.
    #[must_use]
    pub fn from_outcomes(entity: EntityType, details: Vec<ValidationOutcome>) -> Self {
        let validated = details
            .iter()
            .filter(|d| d.status == ValidationStatus::Validated)
            .count();
        Self {
            entity,
            total: details.len(),
            validated,
            failed: details.len() - validated,
            details,
        }
    }
}

/// What rollback did in the source store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    /// The source record was re-inserted under its original id.
    Created,
    /// The existing source record was overwritten.
    Updated,
}

/// A successful rollback of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    /// Target id.
    pub target_id: String,
    /// Source id written.
    pub source_id: String,
    /// Write performed.
    pub action: RollbackAction,
    /// Whether the target copy was deleted.
    pub deleted_from_target: bool,
}

/// Outcome of rolling back one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// Target record id.
    pub target_id: String,
    /// Source id the record was written back to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Status.
    pub status: OutcomeStatus,
    /// Write performed on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RollbackAction>,
    /// Whether the target copy was deleted.
    #[serde(default)]
    pub deleted_from_target: bool,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<RecordResult<Restored>> for RollbackOutcome {
    fn from(result: RecordResult<Restored>) -> Self {
        match result {
            Ok(restored) => Self {
                target_id: restored.target_id,
                source_id: Some(restored.source_id),
                status: OutcomeStatus::Success,
                action: Some(restored.action),
                deleted_from_target: restored.deleted_from_target,
                error: None,
            },
            Err(failure) => Self {
                target_id: failure.target_id.unwrap_or_default(),
                source_id: failure.source_id,
                status: OutcomeStatus::Failed,
                action: None,
                deleted_from_target: false,
                error: Some(failure.error),
            },
        }
    }
}

/// Aggregated rollback result for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackResult {
    /// Entity type.
    pub entity: EntityType,
    /// Records attempted.
    pub total: usize,
    /// Records written back to the source.
    pub success: usize,
    /// Records that failed.
    pub failed: usize,
    /// Per-record outcomes in working-set order.
    pub details: Vec<RollbackOutcome>,
}

impl RollbackResult {
    /// Aggregates per-record results.
    pub fn from_results(entity: EntityType, results: Vec<RecordResult<Restored>>) -> Self {
        let details: Vec<RollbackOutcome> = results.into_iter().map(Into::into).collect();
        let success = details
            .iter()
            .filter(|d| d.status == OutcomeStatus::Success)
            .count();
        Self {
            entity,
            total: details.len(),
            success,
            failed: details.len() - success,
            details,
        }
    }
}

/// Counters every aggregated result exposes.
pub trait Tally {
    /// Records attempted.
    fn total(&self) -> usize;
    /// Records that succeeded (or validated).
    fn succeeded(&self) -> usize;
    /// Records that failed.
    fn failed(&self) -> usize;
}

impl Tally for MigrationResult {
    fn total(&self) -> usize {
        self.total
    }
    fn succeeded(&self) -> usize {
        self.success
    }
    fn failed(&self) -> usize {
        self.failed
    }
}

impl Tally for ValidationResult {
    fn total(&self) -> usize {
        self.total
    }
    fn succeeded(&self) -> usize {
        self.validated
    }
    fn failed(&self) -> usize {
        self.failed
    }
}

impl Tally for RollbackResult {
    fn total(&self) -> usize {
        self.total
    }
    fn succeeded(&self) -> usize {
        self.success
    }
    fn failed(&self) -> usize {
        self.failed
    }
}

/// Results of one run across entity types, in pipeline order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunSummary<R> {
    /// Result per entity type.
    pub results: BTreeMap<EntityType, R>,
}

impl<R> Default for RunSummary<R> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
        }
    }
}

impl<R: Tally> RunSummary<R> {
    /// Adds or replaces the result of one entity type.
    pub fn insert(&mut self, entity: EntityType, result: R) {
        self.results.insert(entity, result);
    }

    /// Result of one entity type.
    #[must_use]
    pub fn get(&self, entity: EntityType) -> Option<&R> {
        self.results.get(&entity)
    }

    /// Records attempted across all entity types.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.values().map(Tally::total).sum()
    }

    /// Records that succeeded across all entity types.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.values().map(Tally::succeeded).sum()
    }

    /// Records that failed across all entity types.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.values().map(Tally::failed).sum()
    }
}

impl<R: Tally> From<R> for RunSummary<R>
where
    R: HasEntity,
{
    fn from(result: R) -> Self {
        let mut summary = Self::default();
        summary.insert(result.entity(), result);
        summary
    }
}

/// Results that know their entity type.
pub trait HasEntity {
    /// Entity type of the result.
    fn entity(&self) -> EntityType;
}

impl HasEntity for MigrationResult {
    fn entity(&self) -> EntityType {
        self.entity
    }
}

impl HasEntity for ValidationResult {
    fn entity(&self) -> EntityType {
        self.entity
    }
}

impl HasEntity for RollbackResult {
    fn entity(&self) -> EntityType {
        self.entity
    }
}

/// Migration results across entity types.
pub type MigrationSummary = RunSummary<MigrationResult>;
/// Validation results across entity types.
pub type ValidationSummary = RunSummary<ValidationResult>;
/// Rollback results across entity types.
pub type RollbackSummary = RunSummary<RollbackResult>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_result_partitions_in_order() {
        let results = vec![
            Ok(("a".to_string(), "1".to_string())),
            Err(RecordFailure::source("b", "HTTP 500")),
            Ok(("c".to_string(), "3".to_string())),
        ];

        let result = MigrationResult::from_results(EntityType::Trade, results);

        assert_eq!((result.total, result.success, result.failed), (3, 2, 1));
        let ids: Vec<&str> = result.details.iter().map(|d| d.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(result.details[1].error.as_deref(), Some("HTTP 500"));
        assert_eq!(result.migrated().collect::<Vec<_>>(), vec![("a", "1"), ("c", "3")]);
    }

    #[test]
    fn test_summary_sums_across_entities() {
        let mut summary = MigrationSummary::default();
        summary.insert(
            EntityType::Trade,
            MigrationResult::from_results(EntityType::Trade, vec![Ok(("a".into(), "1".into()))]),
        );
        summary.insert(
            EntityType::DailyPlan,
            MigrationResult::from_results(
                EntityType::DailyPlan,
                vec![Err(RecordFailure::source("p", "bad"))],
            ),
        );

        assert_eq!(summary.total(), 2);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
    }

    #[test]
    fn test_summary_serializes_as_map() {
        let summary: MigrationSummary =
            MigrationResult::from_results(EntityType::Trade, vec![]).into();
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("trade").is_some());

        let back: MigrationSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn test_rollback_outcome_from_failure() {
        let outcome: RollbackOutcome =
            Err::<Restored, _>(RecordFailure::target("t9", "missing source reference")).into();
        assert_eq!(outcome.target_id, "t9");
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.action.is_none());
    }
}
