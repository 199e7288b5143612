//! Composite business identity keys

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::remote::{Payload, RemoteRecord, value_text};
use super::row::MappedRecord;
use crate::scope::ScopeFilter;

/// Composite business key: identifier parts plus an optional scope discriminator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(Vec<String>);

impl IdentityKey {
    pub fn new<S: Into<String>>(parts: impl IntoIterator<Item = S>) -> Self {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Which fields make up the identity key, and how they are normalised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    fields: Vec<String>,
    case_insensitive: bool,
}

impl KeySpec {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>, case_insensitive: bool) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            case_insensitive,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Key of an outgoing payload; `None` if any key field is missing or empty
    pub fn key_for_payload(&self, payload: &Payload) -> Option<IdentityKey> {
        self.build(|field| payload.get(field).and_then(value_text))
    }

    /// Key of an existing remote record; `None` if any key field is missing or empty
    pub fn key_for_remote(&self, record: &RemoteRecord) -> Option<IdentityKey> {
        self.build(|field| record.field(field).and_then(value_text))
    }

    /// Best-effort key of a mapped record, used to label rows rejected before
    /// a payload could be built. The scope field is taken from the run scope.
    pub fn key_for_record(&self, record: &MappedRecord, scope: Option<&ScopeFilter>) -> Option<IdentityKey> {
        self.build(|field| match scope {
            Some(scope) if scope.field == field => Some(scope.value.clone()),
            _ => record.get(field).map(str::to_string),
        })
    }

    /// Label used when reporting key problems, e.g. `policy_number+data_as_of_date`
    pub fn label(&self) -> String {
        self.fields.join("+")
    }

    fn build(&self, mut lookup: impl FnMut(&str) -> Option<String>) -> Option<IdentityKey> {
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let Some(part) = lookup(field) else {
                debug!(%field, "KeySpec::build: key field missing");
                return None;
            };
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            parts.push(if self.case_insensitive {
                part.to_lowercase()
            } else {
                part.to_string()
            });
        }
        Some(IdentityKey(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_key_for_payload_composite() {
        let spec = KeySpec::new(["policy_number", "data_as_of_date"], false);
        let key = spec
            .key_for_payload(&payload(json!({"policy_number": "P-1", "data_as_of_date": "2025-01-31"})))
            .unwrap();
        assert_eq!(key.to_string(), "P-1/2025-01-31");
    }

    #[test]
    fn test_key_missing_part_is_none() {
        let spec = KeySpec::new(["policy_number", "data_as_of_date"], false);
        assert!(spec.key_for_payload(&payload(json!({"policy_number": "P-1"}))).is_none());
        assert!(
            spec.key_for_payload(&payload(json!({"policy_number": "", "data_as_of_date": "x"})))
                .is_none()
        );
    }

    #[test]
    fn test_case_insensitive_key_matches_remote() {
        let spec = KeySpec::new(["email"], true);
        let remote = RemoteRecord::new("9", payload(json!({"email": "Jane@Example.com"})));
        let incoming = spec.key_for_payload(&payload(json!({"email": "jane@example.com"})));
        assert_eq!(spec.key_for_remote(&remote), incoming);
    }

    #[test]
    fn test_numeric_and_string_parts_compare_equal() {
        let spec = KeySpec::new(["agent_id"], false);
        let remote = RemoteRecord::new("1", payload(json!({"agent_id": 12})));
        let incoming = spec.key_for_payload(&payload(json!({"agent_id": "12"})));
        assert_eq!(spec.key_for_remote(&remote), incoming);
    }

    #[test]
    fn test_key_for_record_uses_scope_value() {
        let spec = KeySpec::new(["policy_number", "data_as_of_date"], false);
        let scope = ScopeFilter::new("data_as_of_date", "2025-01-31");
        let record = MappedRecord::new(3).with("policy_number", "P-7");
        let key = spec.key_for_record(&record, Some(&scope)).unwrap();
        assert_eq!(key, IdentityKey::new(["P-7", "2025-01-31"]));
        assert_eq!(spec.label(), "policy_number+data_as_of_date");
    }
}
