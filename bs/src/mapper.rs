//! Field mapper: raw column names to canonical field names
//!
//! Input files arrive with machine-style headers (`policy_number`) or
//! human-readable ones (`Policy No`). The alias table lists, per canonical
//! field, every accepted spelling; adding a new header variant is a data
//! change in the import profile.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::{MappedRecord, RawRow};

/// Canonical field → accepted header spellings
///
/// The canonical name itself is always the first accepted spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(String, Vec<String>)>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a canonical field with its extra header spellings
    pub fn insert<S: Into<String>>(&mut self, canonical: impl Into<String>, aliases: impl IntoIterator<Item = S>) {
        let canonical = canonical.into();
        let mut spellings = vec![canonical.clone()];
        for alias in aliases {
            let alias = alias.into().trim().to_string();
            if !alias.is_empty() && !spellings.contains(&alias) {
                spellings.push(alias);
            }
        }
        match self.entries.iter_mut().find(|(name, _)| *name == canonical) {
            Some(entry) => entry.1 = spellings,
            None => self.entries.push((canonical, spellings)),
        }
    }

    pub fn with_field<S: Into<String>>(
        mut self,
        canonical: impl Into<String>,
        aliases: impl IntoIterator<Item = S>,
    ) -> Self {
        self.insert(canonical, aliases);
        self
    }

    /// Accepted spellings for a canonical field, canonical name first
    pub fn spellings(&self, canonical: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == canonical)
            .map(|(_, spellings)| spellings.as_slice())
    }

    /// Canonical field names in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map one raw row. Each canonical field takes the first non-empty value
    /// among its spellings; values are trimmed and never coerced.
    pub fn map_row(&self, row: &RawRow) -> MappedRecord {
        let mut record = MappedRecord::new(row.row());
        for (canonical, spellings) in &self.entries {
            let value = spellings
                .iter()
                .filter_map(|spelling| row.get(spelling))
                .map(str::trim)
                .find(|value| !value.is_empty());
            if let Some(value) = value {
                record.insert(canonical.clone(), value);
            }
        }
        record
    }

    /// Required canonical fields for which none of the spellings appear in
    /// the input headers. A non-empty result makes the run unmappable.
    pub fn missing_columns<'a>(&self, headers: impl IntoIterator<Item = &'a str>, required: &[String]) -> Vec<String> {
        let headers: HashSet<&str> = headers.into_iter().map(str::trim).collect();
        let missing: Vec<String> = required
            .iter()
            .filter(|field| {
                let found = self
                    .spellings(field)
                    .map(|spellings| spellings.iter().any(|s| headers.contains(s.as_str())))
                    .unwrap_or_else(|| headers.contains(field.as_str()));
                !found
            })
            .cloned()
            .collect();
        debug!(?missing, "AliasTable::missing_columns: done");
        missing
    }
}
