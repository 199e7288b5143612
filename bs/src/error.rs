//! Run-level error types

use thiserror::Error;

use crate::repository::RepositoryError;

/// Errors that abort a run before any record is written
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Input contains no data rows")]
    EmptyInput,

    #[error("Missing required columns: {}", .fields.join(", "))]
    MissingColumns { fields: Vec<String> },

    #[error("Profile '{profile}' needs a scope value for '{field}'")]
    MissingScope { profile: String, field: String },

    #[error("Failed to load existing records for scope {scope}: {source}")]
    IndexFetch {
        scope: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
