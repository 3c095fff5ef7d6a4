//! Run-level aggregate state for one orchestration scope.
//!
//! The run state machine (`NotStarted -> Running -> Completed | Failed`) is
//! distinct from the per-file state machine. Completed/Failed are
//! soft-terminal: a subsequent start transitions back to Running with fresh
//! counters (a restart of the same orchestration identity, not a new entity).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::ScopeId;

/// Only the most recent failure messages are retained on a run.
pub const MAX_RECENT_ERRORS: usize = 20;

/// Identifier for one attempt group over a scope's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
  pub fn new() -> Self {
    Self(Uuid::now_v7())
  }
}

impl Default for RunId {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Display for RunId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

/// Run-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  #[default]
  NotStarted,
  Running,
  Completed,
  Failed,
}

impl RunStatus {
  pub fn is_settled(self) -> bool {
    matches!(self, RunStatus::Completed | RunStatus::Failed)
  }
}

/// Persistent aggregate for one orchestration scope.
///
/// Counters are always recomputed from the document store rather than
/// incremented in memory, so `processed_files + failed_files <= total_files`
/// holds for every snapshot that gets persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRun {
  pub scope_id: ScopeId,
  pub status: RunStatus,
  /// Current run, if one has ever started.
  pub run_id: Option<RunId>,
  pub total_files: usize,
  pub processed_files: usize,
  pub failed_files: usize,
  /// Recent failure messages, oldest dropped past [`MAX_RECENT_ERRORS`].
  pub errors: Vec<String>,
  pub started_at: Option<DateTime<Utc>>,
  pub finished_at: Option<DateTime<Utc>>,
}

impl OrchestrationRun {
  pub fn new(scope_id: ScopeId) -> Self {
    Self {
      scope_id,
      status: RunStatus::NotStarted,
      run_id: None,
      total_files: 0,
      processed_files: 0,
      failed_files: 0,
      errors: Vec::new(),
      started_at: None,
      finished_at: None,
    }
  }

  /// Begin a new run: Running status, fresh counters, cleared errors.
  pub fn begin(&mut self, run_id: RunId) {
    self.status = RunStatus::Running;
    self.run_id = Some(run_id);
    self.total_files = 0;
    self.processed_files = 0;
    self.failed_files = 0;
    self.errors.clear();
    self.started_at = Some(Utc::now());
    self.finished_at = None;
  }

  /// Overwrite counters with values recomputed from durable storage.
  pub fn set_counts(&mut self, total: usize, processed: usize, failed: usize) {
    debug_assert!(processed + failed <= total, "counter invariant violated");
    self.total_files = total;
    self.processed_files = processed;
    self.failed_files = failed;
  }

  /// Whether every file for the run has resolved.
  pub fn all_files_settled(&self) -> bool {
    self.total_files > 0 && self.processed_files + self.failed_files >= self.total_files
  }

  /// Append a failure message, trimming to the recent-errors bound.
  pub fn push_error(&mut self, message: impl Into<String>) {
    self.errors.push(message.into());
    if self.errors.len() > MAX_RECENT_ERRORS {
      let excess = self.errors.len() - MAX_RECENT_ERRORS;
      self.errors.drain(..excess);
    }
  }

  /// Finalize the run: Failed if any file failed, Completed otherwise.
  pub fn finalize(&mut self) {
    self.status = if self.failed_files > 0 {
      RunStatus::Failed
    } else {
      RunStatus::Completed
    };
    self.finished_at = Some(Utc::now());
  }

  /// Clear counters and errors after finalization so the same orchestration
  /// identity can host a later run without stale totals.
  pub fn reset_counters(&mut self) {
    self.total_files = 0;
    self.processed_files = 0;
    self.failed_files = 0;
    self.errors.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_begin_resets_everything() {
    let mut run = OrchestrationRun::new(ScopeId::from("s"));
    run.set_counts(5, 3, 2);
    run.push_error("old");
    run.finalize();
    assert_eq!(run.status, RunStatus::Failed);

    run.begin(RunId::new());
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.total_files, 0);
    assert!(run.errors.is_empty());
    assert!(run.finished_at.is_none());
  }

  #[test]
  fn test_all_files_settled_requires_nonzero_total() {
    let mut run = OrchestrationRun::new(ScopeId::from("s"));
    assert!(!run.all_files_settled());
    run.set_counts(0, 0, 0);
    assert!(!run.all_files_settled());
    run.set_counts(2, 1, 0);
    assert!(!run.all_files_settled());
    run.set_counts(2, 1, 1);
    assert!(run.all_files_settled());
  }

  #[test]
  fn test_finalize_failed_if_any_failures() {
    let mut run = OrchestrationRun::new(ScopeId::from("s"));
    run.begin(RunId::new());
    run.set_counts(3, 2, 1);
    run.finalize();
    assert_eq!(run.status, RunStatus::Failed);

    let mut ok = OrchestrationRun::new(ScopeId::from("s"));
    ok.begin(RunId::new());
    ok.set_counts(3, 3, 0);
    ok.finalize();
    assert_eq!(ok.status, RunStatus::Completed);
  }

  #[test]
  fn test_errors_bounded() {
    let mut run = OrchestrationRun::new(ScopeId::from("s"));
    for i in 0..(MAX_RECENT_ERRORS + 10) {
      run.push_error(format!("error {i}"));
    }
    assert_eq!(run.errors.len(), MAX_RECENT_ERRORS);
    // Oldest entries dropped, newest kept
    assert_eq!(run.errors.last().unwrap(), &format!("error {}", MAX_RECENT_ERRORS + 9));
  }
}
