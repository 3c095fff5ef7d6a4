//! Messages understood by an ingestion orchestrator actor.

use inlet_core::{DocumentId, OrchestrationRun};
use tokio::sync::oneshot;

/// A message sent to an [`crate::IngestionOrchestrator`].
#[derive(Debug)]
pub enum OrchestratorMessage {
  /// Run one discovery-and-dispatch pass over the scope.
  Start {
    /// Optional reply with the pass outcome; callers that only trigger
    /// (scheduler) pass None.
    reply: Option<oneshot::Sender<StartOutcome>>,
  },
  /// A file processor finished its document successfully.
  FileCompleted { document: DocumentId },
  /// A file processor failed its document.
  FileFailed { document: DocumentId, reason: String },
  /// Snapshot of the current run aggregate.
  GetState { reply: oneshot::Sender<OrchestrationRun> },
  /// Stop the actor. In-flight file work runs to completion; only new
  /// dispatch stops.
  Shutdown,
}

/// Outcome of one `Start` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
  /// A new run began; `dispatched` documents were handed to processors.
  Started { dispatched: usize },
  /// The previous run is still busy; the call was an idempotent no-op.
  AlreadyRunning,
  /// A stale Running run with nothing left was finalized instead.
  Finalized,
  /// Scope resolution failed; the run is marked Failed.
  Failed { reason: String },
}
