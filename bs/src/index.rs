//! Identity index: existing records keyed by business identity

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::{IdentityKey, KeySpec, RemoteRecord};

/// Snapshot of existing remote records for one run scope
///
/// Built once before any write and never refreshed. Lookups are O(1).
#[derive(Debug, Default)]
pub struct IdentityIndex {
    records: HashMap<IdentityKey, RemoteRecord>,
    collisions: usize,
    unkeyed: usize,
}

impl IdentityIndex {
    /// Index records by key. When two records share a key the most recently
    /// created one wins (the later one in listing order if timestamps tie or
    /// are missing). Records lacking a key field are left out.
    pub fn build(records: Vec<RemoteRecord>, spec: &KeySpec) -> Self {
        debug!(count = records.len(), key = %spec.label(), "IdentityIndex::build: called");
        let mut index = Self::default();

        for record in records {
            let Some(key) = spec.key_for_remote(&record) else {
                index.unkeyed += 1;
                continue;
            };
            let replace = match index.records.get(&key) {
                Some(existing) => {
                    index.collisions += 1;
                    let replace = supersedes(&record, existing);
                    let kept = if replace { &record.id } else { &existing.id };
                    warn!(%key, %kept, "IdentityIndex::build: duplicate key in store");
                    replace
                }
                None => true,
            };
            if replace {
                index.records.insert(key, record);
            }
        }

        if index.unkeyed > 0 {
            warn!(unkeyed = index.unkeyed, "IdentityIndex::build: records without a complete key were skipped");
        }
        debug!(size = index.records.len(), collisions = index.collisions, "IdentityIndex::build: done");
        index
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&RemoteRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store records that shared a key with another record
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Store records skipped because a key field was missing
    pub fn unkeyed(&self) -> usize {
        self.unkeyed
    }
}

/// Whether a later-listed record replaces the indexed one
fn supersedes(candidate: &RemoteRecord, existing: &RemoteRecord) -> bool {
    match (existing.created_at, candidate.created_at) {
        (Some(a), Some(b)) => b >= a,
        (Some(_), None) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn record(id: u64, value: serde_json::Value) -> RemoteRecord {
        RemoteRecord::new(id, value.as_object().cloned().unwrap())
    }

    fn spec() -> KeySpec {
        KeySpec::new(["policy_number", "data_as_of_date"], false)
    }

    #[test]
    fn test_build_and_lookup() {
        let index = IdentityIndex::build(
            vec![
                record(1, json!({"policy_number": "P-1", "data_as_of_date": "2025-01-31"})),
                record(2, json!({"policy_number": "P-2", "data_as_of_date": "2025-01-31"})),
            ],
            &spec(),
        );
        assert_eq!(index.len(), 2);
        let key = IdentityKey::new(["P-2", "2025-01-31"]);
        assert!(index.contains(&key));
        assert_eq!(index.get(&key).unwrap().id.as_str(), "2");
        assert!(!index.contains(&IdentityKey::new(["P-3", "2025-01-31"])));
    }

    #[test]
    fn test_collision_keeps_most_recent() {
        let older = record(1, json!({"policy_number": "P-1", "data_as_of_date": "d"}))
            .with_created_at(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());
        let newer = record(2, json!({"policy_number": "P-1", "data_as_of_date": "d"}))
            .with_created_at(Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap());

        let index = IdentityIndex::build(vec![newer.clone(), older.clone()], &spec());
        assert_eq!(index.len(), 1);
        assert_eq!(index.collisions(), 1);
        assert_eq!(index.get(&IdentityKey::new(["P-1", "d"])).unwrap().id.as_str(), "2");

        let index = IdentityIndex::build(vec![older, newer], &spec());
        assert_eq!(index.get(&IdentityKey::new(["P-1", "d"])).unwrap().id.as_str(), "2");
    }

    #[test]
    fn test_collision_without_timestamps_keeps_later() {
        let index = IdentityIndex::build(
            vec![
                record(1, json!({"policy_number": "P-1", "data_as_of_date": "d"})),
                record(2, json!({"policy_number": "P-1", "data_as_of_date": "d"})),
            ],
            &spec(),
        );
        assert_eq!(index.get(&IdentityKey::new(["P-1", "d"])).unwrap().id.as_str(), "2");
    }

    #[test]
    fn test_unkeyed_records_skipped() {
        let index = IdentityIndex::build(vec![record(1, json!({"policy_number": "P-1"}))], &spec());
        assert!(index.is_empty());
        assert_eq!(index.unkeyed(), 1);
    }
}
