//! Sequential batch driver with bounded in-batch concurrency

use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tracing::{debug, info};

use super::config::{BatchConfig, DuplicateKeyPolicy};
use crate::domain::{IdentityKey, OperationResult, PreparedRecord};
use crate::executor::UpsertExecutor;

/// An ordered slice of valid records
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Zero-based position in the run
    pub index: usize,
    pub records: Vec<PreparedRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcomes of one fully settled batch
#[derive(Debug)]
pub struct BatchReport {
    pub index: usize,
    pub count: usize,
    pub results: Vec<OperationResult>,
}

/// Splits valid records into batches and runs them one after another
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    max_concurrent: usize,
    delay: Duration,
    policy: DuplicateKeyPolicy,
}

impl BatchScheduler {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_concurrent: config.max_concurrent.max(1),
            delay: config.inter_batch_delay(),
            policy: config.duplicate_keys,
        }
    }

    /// In-flight record limit within a batch
    pub fn concurrency(&self) -> usize {
        self.max_concurrent.min(self.batch_size).max(1)
    }

    /// Fixed-size batches in input order; only the last may be smaller
    pub fn partition(&self, records: Vec<PreparedRecord>) -> Vec<Batch> {
        debug!(count = records.len(), batch_size = self.batch_size, "BatchScheduler::partition: called");
        let mut batches = Vec::with_capacity(records.len().div_ceil(self.batch_size));
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            let chunk: Vec<PreparedRecord> = records.by_ref().take(self.batch_size).collect();
            batches.push(Batch {
                index: batches.len(),
                records: chunk,
            });
        }
        batches
    }

    /// Units of concurrent work within a batch. Each lane runs its records
    /// in order; under the sequential policy records sharing a key share a lane.
    pub fn lanes(&self, records: Vec<PreparedRecord>) -> Vec<Vec<PreparedRecord>> {
        match self.policy {
            DuplicateKeyPolicy::Reject => records.into_iter().map(|r| vec![r]).collect(),
            DuplicateKeyPolicy::Sequential => {
                let mut lanes: Vec<Vec<PreparedRecord>> = Vec::new();
                let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
                for record in records {
                    match positions.get(&record.key) {
                        Some(&pos) => lanes[pos].push(record),
                        None => {
                            positions.insert(record.key.clone(), lanes.len());
                            lanes.push(vec![record]);
                        }
                    }
                }
                lanes
            }
        }
    }

    /// Run every batch to completion, strictly one after another
    ///
    /// `on_settled` is called once per batch, after all of its records have
    /// reached a terminal outcome and before the inter-batch pause.
    pub async fn drive<F>(&self, records: Vec<PreparedRecord>, executor: &UpsertExecutor<'_>, mut on_settled: F)
    where
        F: FnMut(BatchReport),
    {
        let batches = self.partition(records);
        let count = batches.len();
        let concurrency = self.concurrency();
        info!(batches = count, concurrency, "BatchScheduler::drive: starting");

        for batch in batches {
            if batch.index > 0 && !self.delay.is_zero() {
                debug!(delay_ms = self.delay.as_millis() as u64, "BatchScheduler::drive: pausing between batches");
                tokio::time::sleep(self.delay).await;
            }

            let index = batch.index;
            debug!(index, size = batch.len(), "BatchScheduler::drive: batch started");
            let results: Vec<OperationResult> = stream::iter(self.lanes(batch.records))
                .map(|lane| executor.run_lane(lane))
                .buffer_unordered(concurrency)
                .collect::<Vec<Vec<OperationResult>>>()
                .await
                .into_iter()
                .flatten()
                .collect();

            debug!(index, settled = results.len(), "BatchScheduler::drive: batch settled");
            on_settled(BatchReport { index, count, results });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Payload;

    fn prepared(row: usize, key: &str) -> PreparedRecord {
        PreparedRecord {
            row,
            key: IdentityKey::new([key]),
            payload: Payload::new(),
        }
    }

    fn scheduler(batch_size: usize, max_concurrent: usize, policy: DuplicateKeyPolicy) -> BatchScheduler {
        BatchScheduler::new(&BatchConfig {
            batch_size,
            max_concurrent,
            duplicate_keys: policy,
            ..Default::default()
        })
    }

    #[test]
    fn test_partition_120_by_50() {
        let records: Vec<_> = (0..120).map(|i| prepared(i + 2, &format!("K{i}"))).collect();
        let batches = scheduler(50, 10, DuplicateKeyPolicy::Reject).partition(records);
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        assert_eq!(batches.iter().map(|b| b.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(batches[1].records[0].row, 52);
    }

    #[test]
    fn test_partition_empty() {
        assert!(scheduler(50, 10, DuplicateKeyPolicy::Reject).partition(vec![]).is_empty());
    }

    #[test]
    fn test_concurrency_bounded_by_batch_size() {
        assert_eq!(scheduler(5, 10, DuplicateKeyPolicy::Reject).concurrency(), 5);
        assert_eq!(scheduler(50, 10, DuplicateKeyPolicy::Reject).concurrency(), 10);
    }

    #[test]
    fn test_lanes_reject_one_per_record() {
        let lanes = scheduler(10, 10, DuplicateKeyPolicy::Reject).lanes(vec![prepared(2, "A"), prepared(3, "B")]);
        assert_eq!(lanes.len(), 2);
    }

    #[test]
    fn test_lanes_sequential_groups_by_key_in_order() {
        let lanes = scheduler(10, 10, DuplicateKeyPolicy::Sequential).lanes(vec![
            prepared(2, "A"),
            prepared(3, "B"),
            prepared(4, "A"),
            prepared(5, "A"),
        ]);
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].iter().map(|r| r.row).collect::<Vec<_>>(), vec![2, 4, 5]);
        assert_eq!(lanes[1][0].row, 3);
    }
}
