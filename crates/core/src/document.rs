//! Per-file document rows and their ingestion state machine.
//!
//! One `IngestedDocument` row exists per discovered file per orchestration
//! scope. Within a scope, `(container, folder_path, file_name)` identifies
//! the logical document across runs; a new run rebinds the existing row
//! instead of duplicating it. Rows are never deleted, only transitioned into
//! the soft-terminal `Complete`/`Failed` states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::run::RunId;
use crate::scope::ScopeId;

/// Errors stored on a document row are truncated to this many characters.
pub const MAX_ERROR_LEN: usize = 500;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a document row (uuid v7, so roughly time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
  pub fn new() -> Self {
    Self(Uuid::now_v7())
  }
}

impl Default for DocumentId {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Display for DocumentId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

// ============================================================================
// Ingestion state machine
// ============================================================================

/// Per-file processing state.
///
/// Strictly forward-progressing except for the explicit `Failed -> Discovered`
/// reset that rediscovery applies when a failed file is still present in
/// source storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
  Discovered,
  FileCopying,
  FileCopied,
  Processing,
  Complete,
  Failed,
}

impl IngestionState {
  /// Whether a transition to `to` is legal from this state.
  pub fn can_transition(self, to: IngestionState) -> bool {
    use IngestionState::*;
    matches!(
      (self, to),
      (Discovered, FileCopying)
        | (FileCopying, FileCopied)
        | (FileCopying, Failed)
        | (FileCopied, Processing)
        | (Processing, Complete)
        | (Processing, Failed)
        // Retry-on-rediscovery reset, applied only by the orchestration.
        | (Failed, Discovered)
    )
  }

  /// Complete and Failed are soft-terminal: the row stays, only rediscovery
  /// may revive a Failed row.
  pub fn is_terminal(self) -> bool {
    matches!(self, IngestionState::Complete | IngestionState::Failed)
  }
}

impl std::fmt::Display for IngestionState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      IngestionState::Discovered => "discovered",
      IngestionState::FileCopying => "file_copying",
      IngestionState::FileCopied => "file_copied",
      IngestionState::Processing => "processing",
      IngestionState::Complete => "complete",
      IngestionState::Failed => "failed",
    };
    f.write_str(s)
  }
}

// ============================================================================
// Document row
// ============================================================================

/// Durable row for one discovered file within an orchestration scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedDocument {
  pub id: DocumentId,
  /// Scope this row belongs to (the orchestration identity).
  pub orchestration_id: ScopeId,
  /// Run that currently owns this row. Rebound on rediscovery/recovery.
  pub run_id: RunId,
  pub container: String,
  pub folder_path: String,
  pub file_name: String,
  pub state: IngestionState,

  // Vector tracking
  pub is_vector_indexed: bool,
  pub vector_indexed_at: Option<DateTime<Utc>>,
  pub vector_document_id: Option<String>,
  pub vector_chunk_count: usize,

  // Provenance
  pub original_url: String,
  pub final_url: Option<String>,
  /// Last failure message, truncated to [`MAX_ERROR_LEN`].
  pub error: Option<String>,

  // Durable processor claim. Replaces the process-local "is active" flag so
  // liveness can be judged after a crash without trusting in-memory state.
  pub claim_owner: Option<String>,
  pub claim_expires_at: Option<DateTime<Utc>>,

  pub discovered_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl IngestedDocument {
  /// Create a freshly discovered row bound to `run_id`.
  pub fn discovered(
    orchestration_id: ScopeId,
    run_id: RunId,
    container: impl Into<String>,
    folder_path: impl Into<String>,
    file_name: impl Into<String>,
    original_url: impl Into<String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      id: DocumentId::new(),
      orchestration_id,
      run_id,
      container: container.into(),
      folder_path: folder_path.into(),
      file_name: file_name.into(),
      state: IngestionState::Discovered,
      is_vector_indexed: false,
      vector_indexed_at: None,
      vector_document_id: None,
      vector_chunk_count: 0,
      original_url: original_url.into(),
      final_url: None,
      error: None,
      claim_owner: None,
      claim_expires_at: None,
      discovered_at: now,
      updated_at: now,
    }
  }

  /// Apply a state transition, rejecting anything the state machine forbids.
  pub fn transition(&mut self, to: IngestionState) -> Result<()> {
    if !self.state.can_transition(to) {
      return Err(Error::InvalidTransition { from: self.state, to });
    }
    self.state = to;
    self.updated_at = Utc::now();
    Ok(())
  }

  /// Record a failure message (bounded) and move to Failed.
  pub fn fail(&mut self, message: &str) -> Result<()> {
    self.record_error(message);
    self.transition(IngestionState::Failed)
  }

  /// Record a failure message without a state change. Reindex failures keep
  /// the row Complete; only the vector flags say the work is outstanding.
  pub fn record_error(&mut self, message: &str) {
    self.error = Some(truncate_error(message));
    self.updated_at = Utc::now();
  }

  /// Reset a Failed row for retry under a new run. Clears the error and the
  /// stale claim; the caller persists the result.
  pub fn reset_for_retry(&mut self, run_id: RunId) -> Result<()> {
    self.transition(IngestionState::Discovered)?;
    self.run_id = run_id;
    self.error = None;
    self.claim_owner = None;
    self.claim_expires_at = None;
    Ok(())
  }

  /// Clear vector-tracking fields ahead of a reindex pass so a crash mid-run
  /// leaves the row correctly marked "not yet reindexed".
  pub fn reset_vector_tracking(&mut self) {
    self.is_vector_indexed = false;
    self.vector_indexed_at = None;
    self.vector_document_id = None;
    self.vector_chunk_count = 0;
    self.updated_at = Utc::now();
  }

  /// Record a successful vector-store write.
  pub fn mark_vector_indexed(&mut self, vector_document_id: impl Into<String>, chunk_count: usize) {
    self.is_vector_indexed = true;
    self.vector_indexed_at = Some(Utc::now());
    self.vector_document_id = Some(vector_document_id.into());
    self.vector_chunk_count = chunk_count;
    self.updated_at = Utc::now();
  }

  /// Whether a processor claim is currently live.
  pub fn has_live_claim(&self, now: DateTime<Utc>) -> bool {
    match (&self.claim_owner, self.claim_expires_at) {
      (Some(_), Some(expires)) => expires > now,
      _ => false,
    }
  }

  /// Relative path of the file within its container.
  pub fn relative_path(&self) -> String {
    if self.folder_path.is_empty() {
      self.file_name.clone()
    } else {
      format!("{}/{}", self.folder_path.trim_end_matches('/'), self.file_name)
    }
  }
}

fn truncate_error(message: &str) -> String {
  if message.len() <= MAX_ERROR_LEN {
    message.to_string()
  } else {
    let mut end = MAX_ERROR_LEN;
    while !message.is_char_boundary(end) {
      end -= 1;
    }
    message[..end].to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn doc() -> IngestedDocument {
    IngestedDocument::discovered(
      ScopeId::from("contracts"),
      RunId::new(),
      "contracts-target",
      "2024/01",
      "a.pdf",
      "source://auto-import/a.pdf",
    )
  }

  #[test]
  fn test_forward_transitions() {
    let mut d = doc();
    d.transition(IngestionState::FileCopying).unwrap();
    d.transition(IngestionState::FileCopied).unwrap();
    d.transition(IngestionState::Processing).unwrap();
    d.transition(IngestionState::Complete).unwrap();
    assert!(d.state.is_terminal());
  }

  #[test]
  fn test_no_regression() {
    let mut d = doc();
    d.transition(IngestionState::FileCopying).unwrap();
    d.transition(IngestionState::FileCopied).unwrap();
    // Cannot go back to copying, cannot re-discover from a live state
    assert!(d.transition(IngestionState::FileCopying).is_err());
    assert!(d.transition(IngestionState::Discovered).is_err());
  }

  #[test]
  fn test_complete_is_hard_terminal() {
    let mut d = doc();
    d.transition(IngestionState::FileCopying).unwrap();
    d.transition(IngestionState::FileCopied).unwrap();
    d.transition(IngestionState::Processing).unwrap();
    d.transition(IngestionState::Complete).unwrap();
    assert!(d.transition(IngestionState::Discovered).is_err());
    assert!(d.transition(IngestionState::Failed).is_err());
  }

  #[test]
  fn test_failed_reset_clears_error_and_claim() {
    let mut d = doc();
    d.transition(IngestionState::FileCopying).unwrap();
    d.fail("copy blew up").unwrap();
    assert_eq!(d.state, IngestionState::Failed);
    assert!(d.error.is_some());

    let new_run = RunId::new();
    d.reset_for_retry(new_run).unwrap();
    assert_eq!(d.state, IngestionState::Discovered);
    assert_eq!(d.run_id, new_run);
    assert!(d.error.is_none());
    assert!(d.claim_owner.is_none());
  }

  #[test]
  fn test_error_truncated() {
    let mut d = doc();
    d.transition(IngestionState::FileCopying).unwrap();
    let long = "x".repeat(MAX_ERROR_LEN * 2);
    d.fail(&long).unwrap();
    assert_eq!(d.error.as_ref().unwrap().len(), MAX_ERROR_LEN);
  }

  #[test]
  fn test_live_claim() {
    let mut d = doc();
    assert!(!d.has_live_claim(Utc::now()));

    d.claim_owner = Some("proc-1".into());
    d.claim_expires_at = Some(Utc::now() + chrono::Duration::seconds(60));
    assert!(d.has_live_claim(Utc::now()));

    d.claim_expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
    assert!(!d.has_live_claim(Utc::now()));
  }

  #[test]
  fn test_relative_path() {
    let d = doc();
    assert_eq!(d.relative_path(), "2024/01/a.pdf");

    let mut root = doc();
    root.folder_path = String::new();
    assert_eq!(root.relative_path(), "a.pdf");
  }
}
