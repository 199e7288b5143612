//! Import run orchestration
//!
//! A run maps and validates every row up front, loads the existing records of
//! the run scope once, then writes the valid rows batch by batch. Rows that
//! fail validation are reported as skipped and never reach the store.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    IdentityKey, OperationResult, Outcome, PreparedRecord, RawRow, RowNumber, join_reasons, value_text,
};
use crate::error::SyncError;
use crate::executor::{RetryConfig, UpsertExecutor};
use crate::index::IdentityIndex;
use crate::profile::ImportPlan;
use crate::progress::ProgressSink;
use crate::repository::Repository;
use crate::scheduler::{BatchConfig, BatchScheduler, DuplicateKeyPolicy};
use crate::scope::ScopeFilter;
use crate::summary::{ResultAggregator, RunSummary};

/// Per-run inputs that are not part of the profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Value of the profile's scope field for this run (e.g. a month-end date)
    pub scope_value: Option<String>,
    /// Scope the caller is restricted to (e.g. a branch manager's branch id)
    pub caller_scope: Option<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, value: impl Into<String>) -> Self {
        self.scope_value = Some(value.into());
        self
    }

    pub fn with_caller_scope(mut self, scope: impl Into<String>) -> Self {
        self.caller_scope = Some(scope.into());
        self
    }
}

/// Rows split into writable records and rows rejected before submission
#[derive(Debug, Clone)]
pub struct Preparation {
    pub total: usize,
    pub scope: Option<ScopeFilter>,
    /// Valid records in input order
    pub valid: Vec<PreparedRecord>,
    /// `Skipped` results for rows that failed validation, in row order
    pub rejected: Vec<OperationResult>,
}

/// Runs one import profile against one repository
pub struct SyncEngine {
    repository: Arc<dyn Repository>,
    plan: ImportPlan,
    batch: BatchConfig,
    retry: RetryConfig,
}

impl SyncEngine {
    /// The profile's batch overrides are applied on top of `batch`
    pub fn new(
        repository: Arc<dyn Repository>,
        plan: ImportPlan,
        batch: BatchConfig,
        retry: RetryConfig,
    ) -> Result<Self, SyncError> {
        debug!(profile = %plan.name, "SyncEngine::new: called");
        let batch = batch.with_override(&plan.batch);
        batch.validate()?;
        Ok(Self {
            repository,
            plan,
            batch,
            retry,
        })
    }

    pub fn plan(&self) -> &ImportPlan {
        &self.plan
    }

    /// Effective batch configuration after profile overrides
    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    /// Scope filter for the run, normalised the way the scope field's values
    /// are stored
    pub fn scope(&self, ctx: &RunContext) -> Result<Option<ScopeFilter>, SyncError> {
        let value = ctx.scope_value.as_deref().map(str::trim).filter(|v| !v.is_empty());
        match (&self.plan.scope_field, value) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(SyncError::InvalidConfig(format!(
                "profile '{}' has no scope field, but a scope value was given",
                self.plan.name
            ))),
            (Some(field), None) => Err(SyncError::MissingScope {
                profile: self.plan.name.clone(),
                field: field.clone(),
            }),
            (Some(field), Some(value)) => {
                let normalized = match self.plan.builder.field(field) {
                    Some(spec) => spec
                        .convert(value)
                        .and_then(|v| value_text(&v))
                        .ok_or_else(|| invalid_scope(value, field))?,
                    None => value.to_string(),
                };
                Ok(Some(ScopeFilter::new(field, normalized)))
            }
        }
    }

    /// Map, validate and key every row without touching the store
    pub fn prepare(&self, rows: &[RawRow], ctx: &RunContext) -> Result<Preparation, SyncError> {
        debug!(rows = rows.len(), profile = %self.plan.name, "SyncEngine::prepare: called");
        let Some(first) = rows.first() else {
            return Err(SyncError::EmptyInput);
        };
        let scope = self.scope(ctx)?;

        let missing = self.plan.aliases.missing_columns(first.headers(), &self.plan.required_columns());
        if !missing.is_empty() {
            return Err(SyncError::MissingColumns { fields: missing });
        }

        let label = self.plan.key.label();
        let mut valid = Vec::with_capacity(rows.len());
        let mut rejected = Vec::new();
        let mut first_seen: HashMap<IdentityKey, RowNumber> = HashMap::new();

        for raw in rows {
            let row = raw.row();
            let mut record = self.plan.aliases.map_row(raw);
            if let Some(scope) = &scope {
                record.insert(&scope.field, &scope.value);
            }
            let known_key = self.plan.key.key_for_record(&record, scope.as_ref());

            let outcome = self.plan.validator.validate(record, ctx.caller_scope.as_deref());
            if !outcome.valid() {
                rejected.push(OperationResult::new(row, known_key, Outcome::Skipped(outcome.reason())));
                continue;
            }

            let payload = match self.plan.builder.build(&outcome.record, scope.as_ref()) {
                Ok(payload) => payload,
                Err(errors) => {
                    rejected.push(OperationResult::new(row, known_key, Outcome::Skipped(join_reasons(&errors))));
                    continue;
                }
            };

            let Some(key) = self.plan.key.key_for_payload(&payload) else {
                rejected.push(OperationResult::new(
                    row,
                    None,
                    Outcome::Skipped(format!("Missing identity key ({})", label)),
                ));
                continue;
            };

            if self.batch.duplicate_keys == DuplicateKeyPolicy::Reject {
                match first_seen.entry(key.clone()) {
                    Entry::Occupied(entry) => {
                        let reason = format!("Duplicate {} '{}' (first seen on row {})", label, key, entry.get());
                        rejected.push(OperationResult::new(row, Some(key), Outcome::Skipped(reason)));
                        continue;
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(row);
                    }
                }
            }

            valid.push(PreparedRecord { row, key, payload });
        }

        debug!(valid = valid.len(), rejected = rejected.len(), "SyncEngine::prepare: complete");
        Ok(Preparation {
            total: rows.len(),
            scope,
            valid,
            rejected,
        })
    }

    /// Run an import to completion
    ///
    /// Returns an error only for run-level failures, all of which happen
    /// before the first write. Per-row failures are part of the summary.
    pub async fn run(
        &self,
        rows: &[RawRow],
        ctx: &RunContext,
        progress: &dyn ProgressSink,
    ) -> Result<RunSummary, SyncError> {
        let run_id = Uuid::now_v7();
        info!(%run_id, profile = %self.plan.name, rows = rows.len(), "Starting import run");
        let preparation = self.prepare(rows, ctx)?;
        self.execute(run_id, preparation, progress).await
    }

    /// Write a prepared run
    pub async fn execute(
        &self,
        run_id: Uuid,
        preparation: Preparation,
        progress: &dyn ProgressSink,
    ) -> Result<RunSummary, SyncError> {
        let Preparation {
            total,
            scope,
            valid,
            rejected,
        } = preparation;
        debug!(%run_id, total, valid = valid.len(), "SyncEngine::execute: called");

        let mut aggregator = ResultAggregator::new(run_id, total, self.batch.max_errors);
        aggregator.record_all(rejected);

        if valid.is_empty() {
            warn!(%run_id, total, "No valid rows to write");
            progress.report(&aggregator.snapshot(0, 0));
            return Ok(aggregator.finish());
        }

        let existing = self
            .repository
            .list(scope.as_ref())
            .await
            .map_err(|source| SyncError::IndexFetch {
                scope: scope
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "all records".to_string()),
                source,
            })?;
        let index = IdentityIndex::build(existing, &self.plan.key);
        info!(%run_id, existing = index.len(), "Loaded existing records");

        let executor = UpsertExecutor::new(
            self.repository.as_ref(),
            &index,
            &self.plan.write,
            &self.plan.builder,
        )
        .with_retry(self.retry.clone())
        .with_max_error_len(self.batch.max_error_message_len)
        .track_written(self.batch.duplicate_keys == DuplicateKeyPolicy::Sequential);

        BatchScheduler::new(&self.batch)
            .drive(valid, &executor, |report| {
                aggregator.record_all(report.results);
                aggregator.batch_settled();
                progress.report(&aggregator.snapshot(report.index + 1, report.count));
            })
            .await;

        let summary = aggregator.finish();
        info!(
            %run_id,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            "Import run complete"
        );
        Ok(summary)
    }
}

fn invalid_scope(value: &str, field: &str) -> SyncError {
    SyncError::InvalidConfig(format!("scope value '{}' is not valid for '{}'", value, field))
}
