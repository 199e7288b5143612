//! Domain types for batchsync
//!
//! Rows as they arrive from a delimited file, records after header mapping,
//! identity keys, the remote store's view of a record, and per-row outcomes.

mod key;
mod outcome;
mod remote;
mod row;

pub use key::{IdentityKey, KeySpec};
pub(crate) use outcome::join_reasons;
pub use outcome::{FieldError, OperationResult, Outcome, ValidationOutcome};
pub use remote::{Payload, RecordId, RemoteRecord, value_text};
pub use row::{MappedRecord, PreparedRecord, RawRow, RowNumber};
