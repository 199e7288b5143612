//! Upsert execution: create-vs-update, invalidation, retry

mod invalidation;
mod retry;
mod upsert;

pub use invalidation::{InvalidationRule, apply_invalidation};
pub use retry::{RetryConfig, with_retry};
pub use upsert::{
    SKIP_ALREADY_EXISTS, SKIP_NO_EXISTING, SKIP_UNCHANGED, UpsertExecutor, WriteMode, WritePolicy, is_unchanged,
    truncate_message,
};
