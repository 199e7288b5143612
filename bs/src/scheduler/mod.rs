//! Batch scheduling
//!
//! Valid records are split into fixed-size batches that run strictly
//! sequentially with a pause between them. Inside a batch, records run
//! concurrently up to `min(max_concurrent, batch_size)`.

mod batch;
mod config;

pub use batch::{Batch, BatchReport, BatchScheduler};
pub use config::{BatchConfig, BatchOverride, DuplicateKeyPolicy};
