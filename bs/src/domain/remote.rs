//! The remote store's view of a record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON object sent to the store on create/update
pub type Payload = serde_json::Map<String, Value>;

/// Store-assigned record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// An existing record as returned by the store. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RecordId,
    pub fields: Payload,
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteRecord {
    pub fn new(id: impl Into<RecordId>, fields: Payload) -> Self {
        Self {
            id: id.into(),
            fields,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Text form of a scalar JSON value, used for key building and change detection
///
/// Integral floats render without a fractional part so `2000` and `2000.0`
/// compare equal. Null, empty strings, arrays and objects have no text form.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_text_scalars() {
        assert_eq!(value_text(&json!(" P-100 ")), Some("P-100".to_string()));
        assert_eq!(value_text(&json!(42)), Some("42".to_string()));
        assert_eq!(value_text(&json!(2000.0)), Some("2000".to_string()));
        assert_eq!(value_text(&json!(12.5)), Some("12.5".to_string()));
        assert_eq!(value_text(&json!(true)), Some("true".to_string()));
    }

    #[test]
    fn test_value_text_empty_values() {
        assert_eq!(value_text(&json!(null)), None);
        assert_eq!(value_text(&json!("   ")), None);
        assert_eq!(value_text(&json!([1, 2])), None);
    }

    #[test]
    fn test_record_id_from() {
        assert_eq!(RecordId::from(17u64).as_str(), "17");
        assert_eq!(RecordId::from("abc").to_string(), "abc");
    }
}
