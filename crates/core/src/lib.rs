//! Core domain types for the inlet ingestion platform.
//!
//! Everything here is plain data: document rows, run aggregates, scope
//! descriptors, and the configuration tree. The orchestration logic that
//! mutates these types lives in the `ingest` crate; durable persistence
//! lives in `store`.

pub mod config;
pub mod document;
pub mod error;
pub mod run;
pub mod scope;

pub use config::{
  Config, CoordinatorConfig, DaemonConfig, IngestionConfig, ReindexConfig, SchedulerConfig, ScopeConfig, StorageConfig,
  default_config_path, default_data_dir,
};
pub use document::{DocumentId, IngestedDocument, IngestionState, MAX_ERROR_LEN};
pub use error::{Error, Result};
pub use run::{MAX_RECENT_ERRORS, OrchestrationRun, RunId, RunStatus};
pub use scope::{ScopeDescriptor, ScopeId, ScopeKind};
