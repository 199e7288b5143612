//! In-memory record store

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Repository, RepositoryError, in_scope};
use crate::domain::{Payload, RecordId, RemoteRecord};
use crate::scope::ScopeFilter;

#[derive(Debug, Default)]
struct State {
    records: Vec<RemoteRecord>,
    next_id: u64,
    lists: usize,
    creates: usize,
    updates: usize,
}

/// Record store held in memory
///
/// Assigns sequential numeric ids and applies updates as partial merges,
/// the way the REST store does. Counts calls so callers can assert on them.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store; ids continue after the highest numeric seed id
    pub fn with_records(records: Vec<RemoteRecord>) -> Self {
        let next_id = records
            .iter()
            .filter_map(|r| r.id.as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            state: Mutex::new(State {
                records,
                next_id,
                ..State::default()
            }),
        }
    }

    /// Snapshot of all stored records
    pub async fn records(&self) -> Vec<RemoteRecord> {
        self.state.lock().await.records.clone()
    }

    pub async fn get(&self, id: &RecordId) -> Option<RemoteRecord> {
        self.state.lock().await.records.iter().find(|r| &r.id == id).cloned()
    }

    pub async fn list_count(&self) -> usize {
        self.state.lock().await.lists
    }

    pub async fn create_count(&self) -> usize {
        self.state.lock().await.creates
    }

    pub async fn update_count(&self) -> usize {
        self.state.lock().await.updates
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list(&self, scope: Option<&ScopeFilter>) -> Result<Vec<RemoteRecord>, RepositoryError> {
        debug!(?scope, "MemoryRepository::list: called");
        let mut state = self.state.lock().await;
        state.lists += 1;
        Ok(state.records.iter().filter(|r| in_scope(r, scope)).cloned().collect())
    }

    async fn create(&self, payload: Payload) -> Result<RemoteRecord, RepositoryError> {
        debug!("MemoryRepository::create: called");
        let mut state = self.state.lock().await;
        state.creates += 1;
        state.next_id += 1;
        let record = RemoteRecord::new(state.next_id, payload).with_created_at(Utc::now());
        state.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &RecordId, payload: Payload) -> Result<RemoteRecord, RepositoryError> {
        debug!(%id, "MemoryRepository::update: called");
        let mut state = self.state.lock().await;
        state.updates += 1;
        let Some(record) = state.records.iter_mut().find(|r| &r.id == id) else {
            return Err(RepositoryError::api(
                404,
                Some(json!({"code": "ERROR_CODE_NOT_FOUND", "message": format!("record {} not found", id)})),
            ));
        };
        record.fields.extend(payload);
        Ok(record.clone())
    }
}
