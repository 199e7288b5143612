//! Create-or-update of prepared records

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::invalidation::{InvalidationRule, apply_invalidation};
use super::retry::{RetryConfig, with_retry};
use crate::domain::{IdentityKey, OperationResult, Outcome, Payload, PreparedRecord, RemoteRecord, RowNumber, value_text};
use crate::index::IdentityIndex;
use crate::payload::PayloadBuilder;
use crate::repository::{Repository, RepositoryError};

pub const SKIP_ALREADY_EXISTS: &str = "already exists";
pub const SKIP_NO_EXISTING: &str = "no existing record";
pub const SKIP_UNCHANGED: &str = "unchanged";

/// Which writes a run may perform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Create when the key is unknown, update when it exists
    #[default]
    Upsert,
    /// Existing keys are skipped
    CreateOnly,
    /// Unknown keys are skipped
    UpdateOnly,
}

/// Per-profile write behaviour
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritePolicy {
    pub mode: WriteMode,
    /// Skip updates whose payload already matches the stored record
    pub skip_unchanged: bool,
    pub invalidation: Vec<InvalidationRule>,
}

/// Decides create vs update for each record and performs the write
///
/// Holds the identity index by shared reference; it is never modified.
/// Remote errors are turned into `Failed` outcomes, never propagated.
pub struct UpsertExecutor<'a> {
    repository: &'a dyn Repository,
    index: &'a IdentityIndex,
    policy: &'a WritePolicy,
    builder: &'a PayloadBuilder,
    retry: RetryConfig,
    max_error_len: usize,
    /// Records written earlier in this run, consulted before the index
    written: Option<Mutex<HashMap<IdentityKey, RemoteRecord>>>,
}

impl<'a> UpsertExecutor<'a> {
    pub fn new(
        repository: &'a dyn Repository,
        index: &'a IdentityIndex,
        policy: &'a WritePolicy,
        builder: &'a PayloadBuilder,
    ) -> Self {
        Self {
            repository,
            index,
            policy,
            builder,
            retry: RetryConfig::default(),
            max_error_len: 500,
            written: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_error_len(mut self, max_error_len: usize) -> Self {
        self.max_error_len = max_error_len;
        self
    }

    /// Remember this run's writes so a repeated key updates the record an
    /// earlier row created
    pub fn track_written(mut self, track: bool) -> Self {
        self.written = track.then(|| Mutex::new(HashMap::new()));
        self
    }

    /// Execute records one after another, in order
    pub async fn run_lane(&self, lane: Vec<PreparedRecord>) -> Vec<OperationResult> {
        let mut results = Vec::with_capacity(lane.len());
        for record in lane {
            results.push(self.execute(record).await);
        }
        results
    }

    /// Execute one record to a terminal outcome
    pub async fn execute(&self, record: PreparedRecord) -> OperationResult {
        let PreparedRecord { row, key, payload } = record;
        debug!(row, %key, "UpsertExecutor::execute: called");

        match (self.policy.mode, self.lookup(&key).await) {
            (WriteMode::UpdateOnly, None) => {
                OperationResult::new(row, Some(key), Outcome::Skipped(SKIP_NO_EXISTING.to_string()))
            }
            (WriteMode::CreateOnly, Some(_)) => {
                OperationResult::new(row, Some(key), Outcome::Skipped(SKIP_ALREADY_EXISTS.to_string()))
            }
            (_, None) => self.create(row, key, payload).await,
            (_, Some(existing)) => self.update(row, key, payload, existing).await,
        }
    }

    async fn lookup(&self, key: &IdentityKey) -> Option<RemoteRecord> {
        if let Some(written) = &self.written
            && let Some(record) = written.lock().await.get(key)
        {
            return Some(record.clone());
        }
        self.index.get(key).cloned()
    }

    async fn remember(&self, key: &IdentityKey, record: &RemoteRecord) {
        if let Some(written) = &self.written {
            written.lock().await.insert(key.clone(), record.clone());
        }
    }

    async fn create(&self, row: RowNumber, key: IdentityKey, mut payload: Payload) -> OperationResult {
        let generated = self.builder.apply_create_extras(&mut payload);
        let result = with_retry(&self.retry, "create", || self.repository.create(payload.clone())).await;
        match result {
            Ok(created) => {
                debug!(row, %key, id = %created.id, "UpsertExecutor::create: created");
                self.remember(&key, &created).await;
                OperationResult::new(row, Some(key), Outcome::Created(created.id)).with_generated(generated)
            }
            Err(e) => self.failed(row, key, "create", e),
        }
    }

    async fn update(
        &self,
        row: RowNumber,
        key: IdentityKey,
        mut payload: Payload,
        existing: RemoteRecord,
    ) -> OperationResult {
        if self.policy.skip_unchanged && is_unchanged(&payload, &existing) {
            debug!(row, %key, "UpsertExecutor::update: unchanged, skipping");
            return OperationResult::new(row, Some(key), Outcome::Skipped(SKIP_UNCHANGED.to_string()));
        }

        apply_invalidation(&self.policy.invalidation, &mut payload, &existing);
        let result = with_retry(&self.retry, "update", || self.repository.update(&existing.id, payload.clone())).await;
        match result {
            Ok(updated) => {
                debug!(row, %key, id = %updated.id, "UpsertExecutor::update: updated");
                self.remember(&key, &updated).await;
                OperationResult::new(row, Some(key), Outcome::Updated(existing.id))
            }
            Err(e) => self.failed(row, key, "update", e),
        }
    }

    fn failed(&self, row: RowNumber, key: IdentityKey, op: &str, error: RepositoryError) -> OperationResult {
        let reason = truncate_message(&error.remote_message(), self.max_error_len);
        warn!(row, %key, op, error = %reason, "UpsertExecutor: write failed");
        OperationResult::new(row, Some(key), Outcome::Failed(reason))
    }
}

/// Whether every payload value already matches the stored record
pub fn is_unchanged(payload: &Payload, existing: &RemoteRecord) -> bool {
    payload
        .iter()
        .all(|(name, value)| value_text(value) == existing.field(name).and_then(value_text))
}

/// Cut a message to at most `max` characters, marking the cut with `...`
pub fn truncate_message(message: &str, max: usize) -> String {
    let message = message.trim();
    if message.chars().count() <= max {
        return message.to_string();
    }
    if max <= 3 {
        return message.chars().take(max).collect();
    }
    let mut cut: String = message.chars().take(max - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KeySpec, RecordId};
    use crate::payload::GeneratedField;
    use crate::repository::MemoryRepository;
    use serde_json::json;

    fn obj(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn prepared(row: usize, email: &str, extra: serde_json::Value) -> PreparedRecord {
        let mut payload = obj(json!({"email": email}));
        payload.extend(obj(extra));
        PreparedRecord {
            row,
            key: IdentityKey::new([email]),
            payload,
        }
    }

    fn spec() -> KeySpec {
        KeySpec::new(["email"], true)
    }

    #[tokio::test]
    async fn test_create_when_absent_update_when_present() {
        let repo = MemoryRepository::with_records(vec![RemoteRecord::new(3u64, obj(json!({"email": "old@x.io"})))]);
        let index = IdentityIndex::build(repo.records().await, &spec());
        let policy = WritePolicy::default();
        let builder = PayloadBuilder::default();
        let executor = UpsertExecutor::new(&repo, &index, &policy, &builder);

        let created = executor.execute(prepared(2, "new@x.io", json!({}))).await;
        assert!(matches!(created.outcome, Outcome::Created(_)));

        let updated = executor.execute(prepared(3, "old@x.io", json!({"name": "Old"}))).await;
        assert_eq!(updated.outcome, Outcome::Updated(RecordId::from("3")));
        assert_eq!(repo.create_count().await, 1);
        assert_eq!(repo.update_count().await, 1);
    }

    #[tokio::test]
    async fn test_write_modes() {
        let repo = MemoryRepository::with_records(vec![RemoteRecord::new(3u64, obj(json!({"email": "old@x.io"})))]);
        let index = IdentityIndex::build(repo.records().await, &spec());
        let builder = PayloadBuilder::default();

        let create_only = WritePolicy {
            mode: WriteMode::CreateOnly,
            ..Default::default()
        };
        let executor = UpsertExecutor::new(&repo, &index, &create_only, &builder);
        let result = executor.execute(prepared(2, "old@x.io", json!({}))).await;
        assert_eq!(result.outcome, Outcome::Skipped(SKIP_ALREADY_EXISTS.to_string()));

        let update_only = WritePolicy {
            mode: WriteMode::UpdateOnly,
            ..Default::default()
        };
        let executor = UpsertExecutor::new(&repo, &index, &update_only, &builder);
        let result = executor.execute(prepared(3, "new@x.io", json!({}))).await;
        assert_eq!(result.outcome, Outcome::Skipped(SKIP_NO_EXISTING.to_string()));

        assert_eq!(repo.create_count().await + repo.update_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_applies_invalidation_in_same_call() {
        let repo = MemoryRepository::with_records(vec![RemoteRecord::new(
            3u64,
            obj(json!({"email": "a@x.io", "mobile": "5711", "assigned_agent": 4})),
        )]);
        let index = IdentityIndex::build(repo.records().await, &spec());
        let policy = WritePolicy {
            invalidation: vec![InvalidationRule {
                when_changed: vec!["mobile".into()],
                reset: obj(json!({"assigned_agent": null})),
            }],
            ..Default::default()
        };
        let builder = PayloadBuilder::default();
        let executor = UpsertExecutor::new(&repo, &index, &policy, &builder);

        executor.execute(prepared(2, "a@x.io", json!({"mobile": "5799"}))).await;
        let stored = repo.get(&RecordId::from("3")).await.unwrap();
        assert_eq!(stored.field("assigned_agent"), Some(&json!(null)));
        assert_eq!(repo.update_count().await, 1);
    }

    #[tokio::test]
    async fn test_skip_unchanged() {
        let repo = MemoryRepository::with_records(vec![RemoteRecord::new(
            3u64,
            obj(json!({"email": "a@x.io", "amount": 2000.0})),
        )]);
        let index = IdentityIndex::build(repo.records().await, &spec());
        let policy = WritePolicy {
            skip_unchanged: true,
            ..Default::default()
        };
        let builder = PayloadBuilder::default();
        let executor = UpsertExecutor::new(&repo, &index, &policy, &builder);

        let result = executor.execute(prepared(2, "a@x.io", json!({"amount": 2000}))).await;
        assert_eq!(result.outcome, Outcome::Skipped(SKIP_UNCHANGED.to_string()));
        let result = executor.execute(prepared(3, "a@x.io", json!({"amount": 2500}))).await;
        assert!(matches!(result.outcome, Outcome::Updated(_)));
    }

    #[tokio::test]
    async fn test_tracked_writes_turn_repeat_into_update() {
        let repo = MemoryRepository::new();
        let index = IdentityIndex::default();
        let policy = WritePolicy::default();
        let builder = PayloadBuilder::default();
        let executor = UpsertExecutor::new(&repo, &index, &policy, &builder).track_written(true);

        let lane = vec![
            prepared(2, "a@x.io", json!({"name": "First"})),
            prepared(3, "a@x.io", json!({"name": "Second"})),
        ];
        let results = executor.run_lane(lane).await;
        assert!(matches!(results[0].outcome, Outcome::Created(_)));
        assert!(matches!(results[1].outcome, Outcome::Updated(_)));
        assert_eq!(repo.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_generated_values_reported_on_create() {
        let repo = MemoryRepository::new();
        let index = IdentityIndex::default();
        let policy = WritePolicy::default();
        let builder = PayloadBuilder::default().with_generated(vec![GeneratedField {
            field: "password_hash".into(),
            length: 10,
        }]);
        let executor = UpsertExecutor::new(&repo, &index, &policy, &builder);

        let result = executor.execute(prepared(2, "a@x.io", json!({}))).await;
        let password = result.generated.get("password_hash").unwrap();
        assert_eq!(password.len(), 10);
        let stored = &repo.records().await[0];
        assert_eq!(stored.field("password_hash"), Some(&json!(password)));
    }

    #[tokio::test]
    async fn test_remote_failure_is_failed_outcome() {
        let repo = MemoryRepository::new();
        let index = IdentityIndex::build(vec![RemoteRecord::new(99u64, obj(json!({"email": "ghost@x.io"})))], &spec());
        let policy = WritePolicy::default();
        let builder = PayloadBuilder::default();
        let executor = UpsertExecutor::new(&repo, &index, &policy, &builder).with_max_error_len(12);

        let result = executor.execute(prepared(7, "ghost@x.io", json!({}))).await;
        assert_eq!(result.outcome, Outcome::Failed("record 99...".to_string()));
        assert_eq!(result.row, 7);
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(truncate_message("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate_message("abcdef", 2), "ab");
    }
}
