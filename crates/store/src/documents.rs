//! Document repository: the durable rows behind every ingestion run.
//!
//! The store is the single source of truth for per-file state. Orchestrators
//! never trust in-memory counters; they recompute [`RunCounts`] from here on
//! every callback. The store boundary also rejects state regressions so a
//! buggy caller cannot move a row backwards.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use inlet_core::{DocumentId, IngestedDocument, IngestionState, RunId, ScopeId};

use crate::error::{Result, StoreError};

/// Counters recomputed from durable rows for one `(scope, run)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
  pub total: usize,
  pub processed: usize,
  pub failed: usize,
}

impl RunCounts {
  /// Whether every file in the run has reached a terminal state.
  pub fn all_settled(&self) -> bool {
    self.total > 0 && self.processed + self.failed >= self.total
  }
}

/// Durable document repository.
#[async_trait]
pub trait DocumentStore: Send + Sync {
  /// Insert a new row. Fails with `Conflict` if the logical document
  /// `(scope, container, folder_path, file_name)` already exists.
  async fn insert(&self, doc: IngestedDocument) -> Result<()>;

  async fn get(&self, id: DocumentId) -> Result<Option<IngestedDocument>>;

  /// Read-modify-write update. Rejects state regressions and unknown ids.
  async fn update(&self, doc: IngestedDocument) -> Result<()>;

  /// Look up the logical document for a path within a scope.
  async fn find_by_path(&self, scope: &ScopeId, container: &str, folder_path: &str, file_name: &str)
  -> Result<Option<IngestedDocument>>;

  /// Every row in a scope, regardless of run or state.
  async fn list_for_scope(&self, scope: &ScopeId) -> Result<Vec<IngestedDocument>>;

  /// All non-terminal rows in a scope, regardless of run.
  async fn list_active(&self, scope: &ScopeId) -> Result<Vec<IngestedDocument>>;

  /// All rows bound to a specific run.
  async fn list_for_run(&self, scope: &ScopeId, run: RunId) -> Result<Vec<IngestedDocument>>;

  /// All Complete rows in a scope (reindex candidates).
  async fn list_complete(&self, scope: &ScopeId) -> Result<Vec<IngestedDocument>>;

  /// Recompute counters for a run from durable rows.
  async fn run_counts(&self, scope: &ScopeId, run: RunId) -> Result<RunCounts>;

  /// Rebind a row to a different run without touching its state.
  async fn rebind_run(&self, id: DocumentId, run: RunId) -> Result<()>;

  /// Take a durable processor claim. Returns false (without mutating) when a
  /// live claim by another owner exists. Re-claiming by the same owner
  /// refreshes the expiry.
  async fn try_claim(&self, id: DocumentId, owner: &str, ttl_secs: u64) -> Result<bool>;

  /// Release a claim if `owner` still holds it. Releasing an expired or
  /// foreign claim is a no-op.
  async fn release_claim(&self, id: DocumentId, owner: &str) -> Result<()>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
  StoreError::LockPoisoned
}

/// In-memory document store. Single-process only; backs tests and local mode.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
  rows: RwLock<HashMap<DocumentId, IngestedDocument>>,
}

impl MemoryDocumentStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.rows.read().map(|r| r.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

fn same_logical_doc(a: &IngestedDocument, scope: &ScopeId, container: &str, folder: &str, file: &str) -> bool {
  &a.orchestration_id == scope && a.container == container && a.folder_path == folder && a.file_name == file
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
  async fn insert(&self, doc: IngestedDocument) -> Result<()> {
    let mut rows = self.rows.write().map_err(poisoned)?;
    let duplicate = rows.values().any(|existing| {
      same_logical_doc(
        existing,
        &doc.orchestration_id,
        &doc.container,
        &doc.folder_path,
        &doc.file_name,
      )
    });
    if duplicate {
      return Err(StoreError::Conflict(format!(
        "document already exists: {}/{}/{}",
        doc.container, doc.folder_path, doc.file_name
      )));
    }
    rows.insert(doc.id, doc);
    Ok(())
  }

  async fn get(&self, id: DocumentId) -> Result<Option<IngestedDocument>> {
    let rows = self.rows.read().map_err(poisoned)?;
    Ok(rows.get(&id).cloned())
  }

  async fn update(&self, doc: IngestedDocument) -> Result<()> {
    let mut rows = self.rows.write().map_err(poisoned)?;
    let existing = rows.get(&doc.id).ok_or_else(|| StoreError::NotFound {
      entity: "document",
      id: doc.id.to_string(),
    })?;
    if existing.state != doc.state && !existing.state.can_transition(doc.state) {
      return Err(StoreError::InvalidTransition {
        from: existing.state,
        to: doc.state,
      });
    }
    rows.insert(doc.id, doc);
    Ok(())
  }

  async fn find_by_path(
    &self,
    scope: &ScopeId,
    container: &str,
    folder_path: &str,
    file_name: &str,
  ) -> Result<Option<IngestedDocument>> {
    let rows = self.rows.read().map_err(poisoned)?;
    Ok(
      rows
        .values()
        .find(|d| same_logical_doc(d, scope, container, folder_path, file_name))
        .cloned(),
    )
  }

  async fn list_for_scope(&self, scope: &ScopeId) -> Result<Vec<IngestedDocument>> {
    let rows = self.rows.read().map_err(poisoned)?;
    Ok(rows.values().filter(|d| &d.orchestration_id == scope).cloned().collect())
  }

  async fn list_active(&self, scope: &ScopeId) -> Result<Vec<IngestedDocument>> {
    let rows = self.rows.read().map_err(poisoned)?;
    Ok(
      rows
        .values()
        .filter(|d| &d.orchestration_id == scope && !d.state.is_terminal())
        .cloned()
        .collect(),
    )
  }

  async fn list_for_run(&self, scope: &ScopeId, run: RunId) -> Result<Vec<IngestedDocument>> {
    let rows = self.rows.read().map_err(poisoned)?;
    Ok(
      rows
        .values()
        .filter(|d| &d.orchestration_id == scope && d.run_id == run)
        .cloned()
        .collect(),
    )
  }

  async fn list_complete(&self, scope: &ScopeId) -> Result<Vec<IngestedDocument>> {
    let rows = self.rows.read().map_err(poisoned)?;
    Ok(
      rows
        .values()
        .filter(|d| &d.orchestration_id == scope && d.state == IngestionState::Complete)
        .cloned()
        .collect(),
    )
  }

  async fn run_counts(&self, scope: &ScopeId, run: RunId) -> Result<RunCounts> {
    let rows = self.rows.read().map_err(poisoned)?;
    let mut counts = RunCounts::default();
    for doc in rows.values() {
      if &doc.orchestration_id != scope || doc.run_id != run {
        continue;
      }
      counts.total += 1;
      match doc.state {
        IngestionState::Complete => counts.processed += 1,
        IngestionState::Failed => counts.failed += 1,
        _ => {}
      }
    }
    Ok(counts)
  }

  async fn rebind_run(&self, id: DocumentId, run: RunId) -> Result<()> {
    let mut rows = self.rows.write().map_err(poisoned)?;
    let doc = rows.get_mut(&id).ok_or_else(|| StoreError::NotFound {
      entity: "document",
      id: id.to_string(),
    })?;
    doc.run_id = run;
    doc.updated_at = Utc::now();
    Ok(())
  }

  async fn try_claim(&self, id: DocumentId, owner: &str, ttl_secs: u64) -> Result<bool> {
    let mut rows = self.rows.write().map_err(poisoned)?;
    let doc = rows.get_mut(&id).ok_or_else(|| StoreError::NotFound {
      entity: "document",
      id: id.to_string(),
    })?;
    let now = Utc::now();
    if doc.has_live_claim(now) && doc.claim_owner.as_deref() != Some(owner) {
      return Ok(false);
    }
    doc.claim_owner = Some(owner.to_string());
    doc.claim_expires_at = Some(now + Duration::seconds(ttl_secs as i64));
    doc.updated_at = now;
    Ok(true)
  }

  async fn release_claim(&self, id: DocumentId, owner: &str) -> Result<()> {
    let mut rows = self.rows.write().map_err(poisoned)?;
    if let Some(doc) = rows.get_mut(&id)
      && doc.claim_owner.as_deref() == Some(owner)
    {
      doc.claim_owner = None;
      doc.claim_expires_at = None;
      doc.updated_at = Utc::now();
    }
    Ok(())
  }
}
