//! Record store access
//!
//! The engine talks to the remote store only through the [`Repository`]
//! trait. Implementations are responsible for returning the complete scoped
//! set from `list`, following pagination where the store uses it.

mod error;
mod http;
mod memory;

use async_trait::async_trait;

pub use error::{RepositoryError, is_retryable_status};
pub use http::HttpRepository;
pub use memory::MemoryRepository;

use crate::domain::{Payload, RecordId, RemoteRecord};
use crate::scope::ScopeFilter;

/// List/create/update access to one resource of a record store
#[async_trait]
pub trait Repository: Send + Sync {
    /// All records in the scope (or all records when unscoped)
    async fn list(&self, scope: Option<&ScopeFilter>) -> Result<Vec<RemoteRecord>, RepositoryError>;

    /// Create a record from a payload
    async fn create(&self, payload: Payload) -> Result<RemoteRecord, RepositoryError>;

    /// Partially update an existing record; fields absent from the payload are kept
    async fn update(&self, id: &RecordId, payload: Payload) -> Result<RemoteRecord, RepositoryError>;
}

/// Whether a record belongs to the scope, comparing text forms
pub(crate) fn in_scope(record: &RemoteRecord, scope: Option<&ScopeFilter>) -> bool {
    match scope {
        None => true,
        Some(scope) => record
            .field(&scope.field)
            .and_then(crate::domain::value_text)
            .is_some_and(|v| v == scope.value.trim()),
    }
}
