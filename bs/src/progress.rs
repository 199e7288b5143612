//! Per-batch progress reporting

use serde::Serialize;

use crate::domain::Outcome;

/// Running totals per outcome class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounters {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounters {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created(_) => self.created += 1,
            Outcome::Updated(_) => self.updated += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

/// Immutable view of run progress, emitted after each batch settles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub processed_count: usize,
    pub total_count: usize,
    /// Whole percent, rounded down; 100 only once everything is processed
    pub percentage: u8,
    pub outcome_counters: OutcomeCounters,
    /// 1-based index of the batch that just settled; 0 when no batch ran
    pub batch_index: usize,
    pub batch_count: usize,
}

impl ProgressSnapshot {
    pub fn new(counters: OutcomeCounters, total: usize, batch_index: usize, batch_count: usize) -> Self {
        let processed = counters.total();
        let percentage = if total == 0 {
            100
        } else {
            (processed.min(total) * 100 / total) as u8
        };
        Self {
            processed_count: processed,
            total_count: total,
            percentage,
            outcome_counters: counters,
            batch_index,
            batch_count,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed_count == self.total_count
    }
}

/// Receives progress snapshots, synchronously, from the engine
pub trait ProgressSink {
    fn report(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressSnapshot),
{
    fn report(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Sink that discards every snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _snapshot: &ProgressSnapshot) {}
}
