//! Batch scheduling configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SyncError;

/// How repeated identity keys within one input are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateKeyPolicy {
    /// Later occurrences are validation errors naming the first row
    #[default]
    Reject,
    /// Later occurrences run after earlier ones, create-then-update
    Sequential,
}

/// Batch scheduling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Records per batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Pause between consecutive batches in milliseconds
    #[serde(rename = "inter-batch-delay-ms")]
    pub inter_batch_delay_ms: u64,

    /// Max in-flight records within a batch
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,

    /// Max errors kept in the run summary
    #[serde(rename = "max-errors")]
    pub max_errors: usize,

    /// Remote error messages are cut to this many characters
    #[serde(rename = "max-error-message-len")]
    pub max_error_message_len: usize,

    #[serde(rename = "duplicate-keys")]
    pub duplicate_keys: DuplicateKeyPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            inter_batch_delay_ms: 100,
            max_concurrent: 10,
            max_errors: 1000,
            max_error_message_len: 500,
            duplicate_keys: DuplicateKeyPolicy::Reject,
        }
    }
}

impl BatchConfig {
    /// Get the inter-batch delay as a Duration
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.batch_size == 0 {
            return Err(SyncError::InvalidConfig("batch-size must be at least 1".to_string()));
        }
        if self.max_concurrent == 0 {
            return Err(SyncError::InvalidConfig("max-concurrent must be at least 1".to_string()));
        }
        if self.max_error_message_len == 0 {
            return Err(SyncError::InvalidConfig(
                "max-error-message-len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply per-profile overrides on top of this configuration
    pub fn with_override(&self, over: &BatchOverride) -> Self {
        Self {
            batch_size: over.batch_size.unwrap_or(self.batch_size),
            inter_batch_delay_ms: over.inter_batch_delay_ms.unwrap_or(self.inter_batch_delay_ms),
            max_concurrent: over.max_concurrent.unwrap_or(self.max_concurrent),
            max_errors: self.max_errors,
            max_error_message_len: self.max_error_message_len,
            duplicate_keys: over.duplicate_keys.unwrap_or(self.duplicate_keys),
        }
    }
}

/// Profile-level batch settings; unset fields keep the configured value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOverride {
    #[serde(rename = "batch-size", skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    #[serde(rename = "inter-batch-delay-ms", skip_serializing_if = "Option::is_none")]
    pub inter_batch_delay_ms: Option<u64>,

    #[serde(rename = "max-concurrent", skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,

    #[serde(rename = "duplicate-keys", skip_serializing_if = "Option::is_none")]
    pub duplicate_keys: Option<DuplicateKeyPolicy>,
}
