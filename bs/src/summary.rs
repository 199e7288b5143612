//! Run result aggregation

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{IdentityKey, OperationResult, Outcome, RowNumber};
use crate::progress::{OutcomeCounters, ProgressSnapshot};

/// Whether a reported row was skipped or failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    Skipped,
    Failed,
}

/// A row that did not end in a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: RowNumber,
    pub key: Option<IdentityKey>,
    pub kind: RowErrorKind,
    pub reason: String,
}

/// Values generated while creating one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedValues {
    pub row: RowNumber,
    pub key: Option<IdentityKey>,
    pub values: BTreeMap<String, String>,
}

/// Final result of a run. A run in which every row failed is still a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Skipped and failed rows, ordered by row number
    pub errors: Vec<RowError>,
    /// Rows left out of `errors` because the cap was reached
    pub errors_dropped: usize,
    pub batches: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generated: Vec<GeneratedValues>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.created + self.updated
    }

    /// Whether the counts add up to the row total
    pub fn is_consistent(&self) -> bool {
        self.total == self.created + self.updated + self.skipped + self.failed
    }
}

/// Single accumulation point for a run's outcomes
#[derive(Debug)]
pub struct ResultAggregator {
    run_id: Uuid,
    started: Instant,
    total: usize,
    counters: OutcomeCounters,
    errors: Vec<RowError>,
    errors_dropped: usize,
    max_errors: usize,
    batches: usize,
    generated: Vec<GeneratedValues>,
}

impl ResultAggregator {
    pub fn new(run_id: Uuid, total: usize, max_errors: usize) -> Self {
        debug!(%run_id, total, max_errors, "ResultAggregator::new: called");
        Self {
            run_id,
            started: Instant::now(),
            total,
            counters: OutcomeCounters::default(),
            errors: Vec::new(),
            errors_dropped: 0,
            max_errors,
            batches: 0,
            generated: Vec::new(),
        }
    }

    pub fn record(&mut self, result: OperationResult) {
        self.counters.record(&result.outcome);
        let OperationResult {
            row,
            key,
            outcome,
            generated,
        } = result;

        if !generated.is_empty() {
            self.generated.push(GeneratedValues {
                row,
                key: key.clone(),
                values: generated,
            });
        }

        let (kind, reason) = match outcome {
            Outcome::Created(_) | Outcome::Updated(_) => return,
            Outcome::Skipped(reason) => (RowErrorKind::Skipped, reason),
            Outcome::Failed(reason) => (RowErrorKind::Failed, reason),
        };
        if self.errors.len() < self.max_errors {
            self.errors.push(RowError { row, key, kind, reason });
        } else {
            self.errors_dropped += 1;
        }
    }

    pub fn record_all(&mut self, results: impl IntoIterator<Item = OperationResult>) {
        for result in results {
            self.record(result);
        }
    }

    /// Count one settled batch
    pub fn batch_settled(&mut self) {
        self.batches += 1;
    }

    pub fn processed(&self) -> usize {
        self.counters.total()
    }

    pub fn snapshot(&self, batch_index: usize, batch_count: usize) -> ProgressSnapshot {
        ProgressSnapshot::new(self.counters, self.total, batch_index, batch_count)
    }

    pub fn finish(mut self) -> RunSummary {
        self.errors.sort_by_key(|e| e.row);
        self.generated.sort_by_key(|g| g.row);
        let duration_ms = self.started.elapsed().as_millis() as u64;
        debug!(run_id = %self.run_id, duration_ms, "ResultAggregator::finish: called");
        RunSummary {
            run_id: self.run_id,
            total: self.total,
            created: self.counters.created,
            updated: self.counters.updated,
            skipped: self.counters.skipped,
            failed: self.counters.failed,
            errors: self.errors,
            errors_dropped: self.errors_dropped,
            batches: self.batches,
            generated: self.generated,
            duration_ms,
        }
    }
}
