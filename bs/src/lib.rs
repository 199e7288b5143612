//! batchsync - batch synchronization and upsert engine
//!
//! Imports externally sourced rows (customers, agents, monthly policy
//! snapshots, payments) into a remote record store. Each row is mapped to
//! canonical fields, validated, matched against the existing records of the
//! run scope by a business identity key, and then created or updated. Writes
//! are throttled into sequential batches and every row ends with exactly one
//! outcome.
//!
//! # Pipeline
//!
//! ```text
//! RawRow -> AliasTable -> Validator -> PayloadBuilder + KeySpec
//!        -> IdentityIndex lookup -> UpsertExecutor (per batch)
//!        -> ProgressSink (per batch) -> RunSummary
//! ```
//!
//! # Example
//!
//! ```ignore
//! use batchsync::{MemoryRepository, ProfileLoader, RunContext, SyncEngine};
//!
//! let loader = ProfileLoader::new(&config.profiles)?;
//! let engine = SyncEngine::new(Arc::new(repo), loader.plan("customers")?, config.batch, config.retry)?;
//! let summary = engine.run(&rows, &RunContext::new(), &NoProgress).await?;
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod executor;
pub mod index;
pub mod input;
pub mod mapper;
pub mod payload;
pub mod profile;
pub mod progress;
pub mod report;
pub mod repository;
pub mod scheduler;
pub mod scope;
pub mod summary;
pub mod validation;
pub mod values;

pub use config::Config;
pub use domain::{
    FieldError, IdentityKey, KeySpec, MappedRecord, OperationResult, Outcome, Payload, PreparedRecord, RawRow,
    RecordId, RemoteRecord, ValidationOutcome,
};
pub use engine::{Preparation, RunContext, SyncEngine};
pub use error::SyncError;
pub use executor::{RetryConfig, UpsertExecutor, WriteMode, WritePolicy};
pub use index::IdentityIndex;
pub use mapper::AliasTable;
pub use payload::PayloadBuilder;
pub use profile::{ImportPlan, ImportProfile, ProfileLoader};
pub use progress::{NoProgress, ProgressSink, ProgressSnapshot};
pub use repository::{HttpRepository, MemoryRepository, Repository, RepositoryError};
pub use scheduler::{BatchConfig, BatchScheduler, DuplicateKeyPolicy};
pub use scope::ScopeFilter;
pub use summary::{ResultAggregator, RunSummary};
pub use validation::Validator;
