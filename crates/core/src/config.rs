//! Configuration for the inlet platform.
//!
//! Config priority: explicit path > user config (~/.config/inlet/config.toml)
//! > built-in defaults. Every section has serde defaults so a partial file
//! only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::scope::{ScopeDescriptor, ScopeKind};

// ============================================================================
// Storage
// ============================================================================

/// Object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Root directory for the local storage backend; each container is a
  /// subdirectory.
  pub root: PathBuf,
  /// Container new files land in before ingestion copies them out.
  pub staging_container: String,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      root: default_data_dir().join("containers"),
      staging_container: "auto-import".to_string(),
    }
  }
}

// ============================================================================
// Ingestion
// ============================================================================

/// Ingestion orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
  /// Per-orchestration local worker slots (the in-process semaphore, not the
  /// cluster-wide lease).
  pub worker_count: usize,

  /// Fixed delay between per-file dispatches to spread load on shared
  /// dependencies (default: 50ms).
  pub stagger_delay_ms: u64,

  /// How long a processor's durable claim on a document stays live without
  /// renewal (default: 300s).
  pub claim_ttl_secs: u64,
}

impl Default for IngestionConfig {
  fn default() -> Self {
    Self {
      worker_count: 4,
      stagger_delay_ms: 50,
      claim_ttl_secs: 300,
    }
  }
}

// ============================================================================
// Reindex
// ============================================================================

/// Reindex orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexConfig {
  /// Cluster-wide lease category reindex work draws from.
  pub lease_category: String,

  /// Capacity units one document consumes.
  pub lease_weight: u32,

  /// Lease TTL; an unreleased lease frees itself after this (default: 300s).
  pub lease_ttl_secs: u64,

  /// How long one acquisition attempt may wait before it is reported as a
  /// retryable timeout (default: 30s).
  pub lease_wait_timeout_secs: u64,

  /// Backoff between acquisition attempts (default: 500ms).
  pub retry_backoff_ms: u64,

  /// Acquisition attempts per document before the document is marked failed
  /// (default: 5).
  pub max_lease_attempts: u32,

  /// Per-orchestration local worker slots for reindex fan-out.
  pub worker_count: usize,
}

impl Default for ReindexConfig {
  fn default() -> Self {
    Self {
      lease_category: "ingestion".to_string(),
      lease_weight: 1,
      lease_ttl_secs: 300,
      lease_wait_timeout_secs: 30,
      retry_backoff_ms: 500,
      max_lease_attempts: 5,
      worker_count: 8,
    }
  }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Cluster-wide concurrency coordinator capacities, per category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
  /// Capacity units per named category.
  pub capacities: HashMap<String, u32>,
}

impl Default for CoordinatorConfig {
  fn default() -> Self {
    let mut capacities = HashMap::new();
    capacities.insert("ingestion".to_string(), 8);
    Self { capacities }
  }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Discovery scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
  /// Interval the scheduler starts each job at (default: 60s).
  pub initial_interval_secs: u64,

  /// Floor the interval shrinks to while work keeps arriving (default: 15s).
  pub min_interval_secs: u64,

  /// Ceiling the interval grows to while idle (default: 600s).
  pub max_interval_secs: u64,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      initial_interval_secs: 60,
      min_interval_secs: 15,
      max_interval_secs: 600,
    }
  }
}

// ============================================================================
// Scopes
// ============================================================================

/// One `[[scopes]]` entry; container/prefix/index names derive from the
/// short name unless spelled out in full via [`ScopeDescriptor`] rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
  pub id: String,
  /// Defaults to the id.
  pub short_name: Option<String>,
  #[serde(default = "default_scope_kind")]
  pub kind: ScopeKind,
}

fn default_scope_kind() -> ScopeKind {
  ScopeKind::DocumentLibrary
}

impl ScopeConfig {
  pub fn descriptor(&self) -> ScopeDescriptor {
    let short_name = self.short_name.clone().unwrap_or_else(|| self.id.clone());
    ScopeDescriptor::new(self.id.as_str(), short_name, self.kind)
  }
}

// ============================================================================
// Daemon
// ============================================================================

/// Daemon lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  /// Log level: off, error, warn, info, debug, trace.
  pub log_level: String,

  /// Log rotation: daily, hourly, never.
  pub log_rotation: String,
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      log_level: "info".to_string(),
      log_rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Root config
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub storage: StorageConfig,
  pub ingestion: IngestionConfig,
  pub reindex: ReindexConfig,
  pub coordinator: CoordinatorConfig,
  pub scheduler: SchedulerConfig,
  pub daemon: DaemonConfig,
  /// Orchestration scopes this deployment tracks.
  pub scopes: Vec<ScopeConfig>,
}

impl Config {
  /// Load from an explicit path, failing if the file is missing or invalid.
  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
  }

  /// Load the user config if present, otherwise defaults.
  pub fn load_or_default() -> Self {
    let path = default_config_path();
    if path.exists() {
      match Self::load(&path) {
        Ok(config) => return config,
        Err(e) => {
          tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
        }
      }
    }
    Self::default()
  }
}

/// Data directory (respects INLET_DATA_DIR for tests and containers).
pub fn default_data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("INLET_DATA_DIR") {
    return PathBuf::from(dir);
  }
  dirs::data_local_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("inlet")
}

/// User config file path.
pub fn default_config_path() -> PathBuf {
  dirs::config_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("inlet")
    .join("config.toml")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.ingestion.worker_count, 4);
    assert_eq!(config.reindex.max_lease_attempts, 5);
    assert_eq!(config.coordinator.capacities.get("ingestion"), Some(&8));
    assert!(config.scheduler.min_interval_secs < config.scheduler.max_interval_secs);
  }

  #[test]
  fn test_partial_file_overrides_only_named_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
      &path,
      r#"
[ingestion]
worker_count = 16

[scheduler]
min_interval_secs = 5
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.ingestion.worker_count, 16);
    assert_eq!(config.ingestion.stagger_delay_ms, 50); // default preserved
    assert_eq!(config.scheduler.min_interval_secs, 5);
    assert_eq!(config.scheduler.max_interval_secs, 600);
  }

  #[test]
  fn test_scope_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
      &path,
      r#"
[[scopes]]
id = "contracts"

[[scopes]]
id = "archive-2020"
short_name = "archive"
kind = "archive_import"
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.scopes.len(), 2);

    let contracts = config.scopes[0].descriptor();
    assert_eq!(contracts.short_name, "contracts");
    assert_eq!(contracts.kind, ScopeKind::DocumentLibrary);

    let archive = config.scopes[1].descriptor();
    assert_eq!(archive.source_prefix, "archive/");
    assert_eq!(archive.kind, ScopeKind::ArchiveImport);
  }

  #[test]
  fn test_invalid_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "not valid toml [[[").unwrap();
    assert!(Config::load(&path).is_err());
  }
}
