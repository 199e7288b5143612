//! Derived-state invalidation on update

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Payload, RemoteRecord, value_text};

/// When any watched field changes, reset dependent fields in the same update
///
/// For example a changed mobile number or email clears the record's
/// assignment so it is picked up again with the new contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidationRule {
    #[serde(rename = "when-changed")]
    pub when_changed: Vec<String>,
    pub reset: Payload,
}

impl InvalidationRule {
    /// Watched fields whose incoming value differs from the stored one.
    /// Fields absent from the payload are not being changed.
    pub fn changed_fields<'a>(&'a self, payload: &Payload, existing: &RemoteRecord) -> Vec<&'a str> {
        self.when_changed
            .iter()
            .filter(|field| match payload.get(field.as_str()) {
                Some(incoming) => value_text(incoming) != existing.field(field).and_then(value_text),
                None => false,
            })
            .map(String::as_str)
            .collect()
    }
}

/// Merge the reset values of every triggered rule into the payload.
/// Returns the number of rules that fired.
pub fn apply_invalidation(rules: &[InvalidationRule], payload: &mut Payload, existing: &RemoteRecord) -> usize {
    let mut fired = 0;
    for rule in rules {
        let changed = rule.changed_fields(payload, existing);
        if changed.is_empty() {
            continue;
        }
        debug!(id = %existing.id, ?changed, "apply_invalidation: resetting dependent fields");
        fired += 1;
        for (name, value) in &rule.reset {
            payload.insert(name.clone(), value.clone());
        }
    }
    fired
}
