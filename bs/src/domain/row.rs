//! Raw input rows and header-mapped records

use std::collections::BTreeMap;

use serde::Serialize;

use super::key::IdentityKey;
use super::remote::Payload;

/// 1-based row number in the source file
pub type RowNumber = usize;

/// A parsed input row: ordered column name → value pairs
///
/// Immutable once built; the field mapper consumes it and it is discarded
/// after mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    row: RowNumber,
    columns: Vec<(String, String)>,
}

impl RawRow {
    /// Create a row from its source row number and column/value pairs
    pub fn new<K, V>(row: RowNumber, columns: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            row,
            columns: columns.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Source row number
    pub fn row(&self) -> RowNumber {
        self.row
    }

    /// Value of the first column with this exact name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Column names in source order
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Column/value pairs in source order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A row after header mapping: canonical field name → trimmed value
///
/// Fields with no matching header, or only empty matches, are absent rather
/// than present with an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedRecord {
    pub row: RowNumber,
    fields: BTreeMap<String, String>,
}

impl MappedRecord {
    pub fn new(row: RowNumber) -> Self {
        Self {
            row,
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Builder-style insert, mostly for tests and callers that skip the mapper
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A valid record ready for submission: its identity key and typed payload
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub row: RowNumber,
    pub key: IdentityKey,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_get_first_match() {
        let row = RawRow::new(2, [("name", "Alice"), ("email", "a@x.io"), ("name", "Shadow")]);
        assert_eq!(row.row(), 2);
        assert_eq!(row.get("name"), Some("Alice"));
        assert_eq!(row.get("mobile"), None);
        assert_eq!(row.headers().collect::<Vec<_>>(), vec!["name", "email", "name"]);
    }

    #[test]
    fn test_mapped_record_absent_vs_present() {
        let record = MappedRecord::new(7).with("policy_number", "P-1");
        assert!(record.contains("policy_number"));
        assert!(!record.contains("name"));
        assert_eq!(record.get("policy_number"), Some("P-1"));
        assert_eq!(record.len(), 1);
    }
}
