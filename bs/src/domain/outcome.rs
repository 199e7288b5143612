//! Validation and per-row operation outcomes

use std::collections::BTreeMap;

use serde::Serialize;

use super::key::IdentityKey;
use super::remote::RecordId;
use super::row::{MappedRecord, RowNumber};

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Result of validating one mapped record. The record itself is untouched.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub record: MappedRecord,
    pub errors: Vec<FieldError>,
}

impl ValidationOutcome {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All error messages joined for the run summary
    pub fn reason(&self) -> String {
        join_reasons(&self.errors)
    }
}

pub(crate) fn join_reasons(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Terminal classification of a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Created(RecordId),
    Updated(RecordId),
    Skipped(String),
    Failed(String),
}

impl Outcome {
    /// Skip and failure reasons; successes have none
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Created(_) | Self::Updated(_) => None,
            Self::Skipped(reason) | Self::Failed(reason) => Some(reason),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created(id) => write!(f, "created {}", id),
            Self::Updated(id) => write!(f, "updated {}", id),
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome of one row, tied to its row number and identity key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub row: RowNumber,
    /// Absent only when the row was rejected before a key could be formed
    pub key: Option<IdentityKey>,
    pub outcome: Outcome,
    /// Values generated at create time (e.g. initial passwords)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub generated: BTreeMap<String, String>,
}

impl OperationResult {
    pub fn new(row: RowNumber, key: Option<IdentityKey>, outcome: Outcome) -> Self {
        Self {
            row,
            key,
            outcome,
            generated: BTreeMap::new(),
        }
    }

    pub fn with_generated(mut self, generated: BTreeMap<String, String>) -> Self {
        self.generated = generated;
        self
    }
}
