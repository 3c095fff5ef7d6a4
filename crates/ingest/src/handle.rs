//! Cheap-to-clone handle for talking to an orchestrator actor.

use inlet_core::OrchestrationRun;
use tokio::sync::{mpsc, oneshot};

use crate::message::{OrchestratorMessage, StartOutcome};

/// Error when sending to an orchestrator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("orchestrator has shut down")]
  ActorGone,
}

/// Handle to one scope's orchestrator actor.
#[derive(Clone, Debug)]
pub struct OrchestratorHandle {
  pub tx: mpsc::Sender<OrchestratorMessage>,
}

impl OrchestratorHandle {
  pub fn new(tx: mpsc::Sender<OrchestratorMessage>) -> Self {
    Self { tx }
  }

  /// Fire-and-forget start (the scheduler path).
  pub async fn start(&self) -> Result<(), SendError> {
    self
      .tx
      .send(OrchestratorMessage::Start { reply: None })
      .await
      .map_err(|_| SendError::ActorGone)
  }

  /// Start a pass and wait for its outcome.
  pub async fn start_and_wait(&self) -> Result<StartOutcome, SendError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .tx
      .send(OrchestratorMessage::Start { reply: Some(reply_tx) })
      .await
      .map_err(|_| SendError::ActorGone)?;
    reply_rx.await.map_err(|_| SendError::ActorGone)
  }

  pub async fn file_completed(&self, document: inlet_core::DocumentId) -> Result<(), SendError> {
    self
      .tx
      .send(OrchestratorMessage::FileCompleted { document })
      .await
      .map_err(|_| SendError::ActorGone)
  }

  pub async fn file_failed(&self, document: inlet_core::DocumentId, reason: String) -> Result<(), SendError> {
    self
      .tx
      .send(OrchestratorMessage::FileFailed { document, reason })
      .await
      .map_err(|_| SendError::ActorGone)
  }

  /// Snapshot of the run aggregate.
  pub async fn state(&self) -> Result<OrchestrationRun, SendError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .tx
      .send(OrchestratorMessage::GetState { reply: reply_tx })
      .await
      .map_err(|_| SendError::ActorGone)?;
    reply_rx.await.map_err(|_| SendError::ActorGone)
  }

  pub async fn shutdown(&self) -> Result<(), SendError> {
    self
      .tx
      .send(OrchestratorMessage::Shutdown)
      .await
      .map_err(|_| SendError::ActorGone)
  }
}
