//! Per-scope ingestion orchestrator actor.
//!
//! One actor instance drives one orchestration scope from file discovery
//! through run completion. The actor owns the run aggregate; everything
//! else (documents, counters) lives in the stores and is recomputed rather
//! than trusted from memory. File processors run as spawned tasks under a
//! local semaphore and report back through the actor's own mailbox, so
//! completion callbacks interleave with new start requests without locking.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use inlet_core::{
  DocumentId, IngestedDocument, IngestionConfig, IngestionState, OrchestrationRun, RunId, RunStatus, ScopeId,
};
use store::{DocumentStore, ObjectStorage, RunStore, ScopeResolver};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vector::{DocumentPipeline, VectorStore};

use crate::error::Result;
use crate::handle::OrchestratorHandle;
use crate::message::{OrchestratorMessage, StartOutcome};
use crate::notify::{NotificationEvent, NotificationSink};
use crate::processor::{FileProcessor, ProcessOutcome};

/// Shared collaborators every orchestrator (and the router) needs.
pub struct OrchestratorContext {
  pub documents: Arc<dyn DocumentStore>,
  pub runs: Arc<dyn RunStore>,
  pub storage: Arc<dyn ObjectStorage>,
  pub resolver: Arc<dyn ScopeResolver>,
  pub pipeline: Arc<dyn DocumentPipeline>,
  pub vectors: Arc<dyn VectorStore>,
  pub notifier: Arc<dyn NotificationSink>,
}

/// Actor driving one scope.
pub struct IngestionOrchestrator {
  scope_id: ScopeId,
  ctx: Arc<OrchestratorContext>,
  config: IngestionConfig,
  processor: Arc<FileProcessor>,
  /// Local fan-out throttle, owned exclusively by this orchestration.
  semaphore: Arc<Semaphore>,
  /// Run aggregate, loaded lazily from the run store.
  run: Option<OrchestrationRun>,
  /// Sender side of our own mailbox, cloned into processor continuations.
  self_tx: mpsc::Sender<OrchestratorMessage>,
  rx: mpsc::Receiver<OrchestratorMessage>,
  cancel: CancellationToken,
}

impl IngestionOrchestrator {
  /// Spawn the actor and return a handle to it.
  pub fn spawn(
    scope_id: ScopeId,
    ctx: Arc<OrchestratorContext>,
    config: IngestionConfig,
    cancel: CancellationToken,
  ) -> OrchestratorHandle {
    let (tx, rx) = mpsc::channel(64);
    let processor = Arc::new(FileProcessor::new(
      ctx.documents.clone(),
      ctx.storage.clone(),
      ctx.pipeline.clone(),
      config.claim_ttl_secs,
    ));
    let actor = Self {
      scope_id,
      semaphore: Arc::new(Semaphore::new(config.worker_count)),
      config,
      processor,
      ctx,
      run: None,
      self_tx: tx.clone(),
      rx,
      cancel,
    };
    tokio::spawn(actor.run());
    OrchestratorHandle::new(tx)
  }

  async fn run(mut self) {
    info!(scope = %self.scope_id, "ingestion orchestrator started");

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!(scope = %self.scope_id, "ingestion orchestrator shutting down (cancelled)");
          break;
        }

        msg = self.rx.recv() => {
          match msg {
            Some(OrchestratorMessage::Start { reply }) => {
              let outcome = self.handle_start().await;
              if let Some(reply) = reply {
                let _ = reply.send(outcome);
              }
            }
            Some(OrchestratorMessage::FileCompleted { document }) => {
              if let Err(e) = self.handle_file_settled(document, None).await {
                error!(scope = %self.scope_id, document = %document, error = %e, "completion callback failed");
              }
            }
            Some(OrchestratorMessage::FileFailed { document, reason }) => {
              if let Err(e) = self.handle_file_settled(document, Some(reason)).await {
                error!(scope = %self.scope_id, document = %document, error = %e, "failure callback failed");
              }
            }
            Some(OrchestratorMessage::GetState { reply }) => {
              let snapshot = match self.load_run().await {
                Ok(run) => run,
                Err(e) => {
                  error!(scope = %self.scope_id, error = %e, "failed to load run state");
                  OrchestrationRun::new(self.scope_id.clone())
                }
              };
              let _ = reply.send(snapshot);
            }
            Some(OrchestratorMessage::Shutdown) | None => {
              info!(scope = %self.scope_id, "ingestion orchestrator shutting down (requested)");
              break;
            }
          }
        }
      }
    }
  }

  /// Current run aggregate, loading it on first touch.
  async fn load_run(&mut self) -> Result<OrchestrationRun> {
    if let Some(run) = &self.run {
      return Ok(run.clone());
    }
    let run = self
      .ctx
      .runs
      .load(&self.scope_id)
      .await?
      .unwrap_or_else(|| OrchestrationRun::new(self.scope_id.clone()));
    self.run = Some(run.clone());
    Ok(run)
  }

  async fn handle_start(&mut self) -> StartOutcome {
    match self.start_pass().await {
      Ok(outcome) => outcome,
      Err(e) => {
        error!(scope = %self.scope_id, error = %e, "start pass failed");
        StartOutcome::Failed { reason: e.to_string() }
      }
    }
  }

  /// One full discovery-and-dispatch pass over the scope.
  async fn start_pass(&mut self) -> Result<StartOutcome> {
    let run_id = RunId::new();
    let mut run = self.load_run().await?;

    // Recover orphaned work: non-terminal rows whose claim has lapsed
    // belonged to a run that died; bind them to the new run. A row is only
    // orphaned once it has sat untouched for a full claim TTL, so rows a
    // live dispatch inserted but has not claimed yet are left alone.
    let active = self.ctx.documents.list_active(&self.scope_id).await?;
    let now = Utc::now();
    let grace = chrono::Duration::seconds(self.config.claim_ttl_secs as i64);
    let mut recovered = 0usize;
    for doc in &active {
      if !doc.has_live_claim(now) && now - doc.updated_at > grace {
        self.ctx.documents.rebind_run(doc.id, run_id).await?;
        recovered += 1;
      }
    }
    if recovered > 0 {
      info!(scope = %self.scope_id, recovered, "rebound orphaned documents to new run");
    }

    if run.status == RunStatus::Running {
      if active.is_empty() && run.total_files > 0 {
        // A stale Running run with nothing left in flight: settle it now.
        if let Some(current) = run.run_id {
          let counts = self.ctx.documents.run_counts(&self.scope_id, current).await?;
          run.set_counts(counts.total, counts.processed, counts.failed);
        }
        self.finalize(&mut run).await?;
        self.run = Some(run);
        return Ok(StartOutcome::Finalized);
      }
      if !active.is_empty() && recovered == 0 {
        // Every non-terminal document is actively claimed; nothing to do.
        debug!(scope = %self.scope_id, in_flight = active.len(), "start is a no-op, run already in progress");
        self.run = Some(run);
        return Ok(StartOutcome::AlreadyRunning);
      }
    }

    // Scope resolution failure is run-fatal: no retry without operator
    // intervention.
    let descriptor = match self.ctx.resolver.resolve(&self.scope_id).await {
      Ok(descriptor) => descriptor,
      Err(e) => {
        let reason = format!("scope resolution failed: {e}");
        error!(scope = %self.scope_id, reason = %reason, "run failed");
        run.push_error(&reason);
        run.status = RunStatus::Failed;
        run.finished_at = Some(Utc::now());
        self.ctx.runs.save(run.clone()).await?;
        self
          .ctx
          .notifier
          .publish(NotificationEvent::Failed {
            run_id,
            scope: self.scope_id.to_string(),
            reason: reason.clone(),
          })
          .await;
        self.run = Some(run);
        return Ok(StartOutcome::Failed { reason });
      }
    };

    // Discovery pass over source storage.
    let entries = self
      .ctx
      .storage
      .list(&descriptor.source_container, &descriptor.source_prefix)
      .await?;
    for entry in entries {
      let (folder, file) = split_key(&entry.key);
      let existing = self
        .ctx
        .documents
        .find_by_path(&self.scope_id, &descriptor.source_container, folder, file)
        .await?;
      match existing {
        None => {
          let doc = IngestedDocument::discovered(
            self.scope_id.clone(),
            run_id,
            descriptor.source_container.clone(),
            folder,
            file,
            format!("{}/{}", descriptor.source_container, entry.key),
          );
          debug!(scope = %self.scope_id, key = %entry.key, "discovered new file");
          self.ctx.documents.insert(doc).await?;
        }
        Some(mut doc) if doc.state == IngestionState::Failed => {
          // Retry-on-rediscovery: the file is still there, try again.
          doc.reset_for_retry(run_id)?;
          self.ctx.documents.update(doc).await?;
          debug!(scope = %self.scope_id, key = %entry.key, "reset failed file for retry");
        }
        Some(doc) if doc.state == IngestionState::Complete => {
          // Already processed: clear the stale source blob, leave the row.
          self.ctx.storage.delete(&descriptor.source_container, &entry.key).await?;
          debug!(scope = %self.scope_id, key = %entry.key, document = %doc.id, "deleted source of completed file");
        }
        Some(_) => {}
      }
    }

    // Persist Running with counters recomputed from the store, then fan
    // out without blocking the mailbox.
    run.begin(run_id);
    let counts = self.ctx.documents.run_counts(&self.scope_id, run_id).await?;
    run.set_counts(counts.total, counts.processed, counts.failed);
    self.ctx.runs.save(run.clone()).await?;
    self
      .ctx
      .notifier
      .publish(NotificationEvent::Started {
        run_id,
        scope: self.scope_id.to_string(),
        total: run.total_files,
      })
      .await;
    self.run = Some(run.clone());

    let pending: Vec<IngestedDocument> = self
      .ctx
      .documents
      .list_for_run(&self.scope_id, run_id)
      .await?
      .into_iter()
      .filter(|d| !d.state.is_terminal())
      .collect();
    let dispatched = pending.len();

    self.fan_out(pending, descriptor);
    info!(scope = %self.scope_id, run = %run_id, dispatched, "ingestion pass dispatched");
    Ok(StartOutcome::Started { dispatched })
  }

  /// Dispatch processors for every pending document, bounded by the local
  /// worker semaphore, each start staggered by a fixed delay. Slots free
  /// when the processor task finishes, not when dispatch moves on.
  fn fan_out(&self, pending: Vec<IngestedDocument>, descriptor: inlet_core::ScopeDescriptor) {
    let semaphore = self.semaphore.clone();
    let processor = self.processor.clone();
    let handle = OrchestratorHandle::new(self.self_tx.clone());
    let stagger = Duration::from_millis(self.config.stagger_delay_ms);
    let cancel = self.cancel.clone();

    tokio::spawn(async move {
      for doc in pending {
        // A stop only prevents new dispatch; in-flight work finishes.
        if cancel.is_cancelled() {
          break;
        }
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
          break;
        };
        tokio::time::sleep(stagger).await;

        let processor = processor.clone();
        let handle = handle.clone();
        let descriptor = descriptor.clone();
        tokio::spawn(async move {
          let _permit = permit;
          let id = doc.id;
          match processor.process(id, &descriptor).await {
            Ok(ProcessOutcome::Completed) => {
              let _ = handle.file_completed(id).await;
            }
            Ok(ProcessOutcome::Failed { reason }) => {
              let _ = handle.file_failed(id, reason).await;
            }
            Ok(ProcessOutcome::AlreadyActive | ProcessOutcome::Skipped) => {}
            Err(e) => {
              warn!(document = %id, error = %e, "processor errored");
              let _ = handle.file_failed(id, e.to_string()).await;
            }
          }
        });
      }
    });
  }

  /// Completion/failure callback: recompute counters from the store and
  /// finalize once everything has settled.
  async fn handle_file_settled(&mut self, document: DocumentId, failure: Option<String>) -> Result<()> {
    let mut run = self.load_run().await?;
    if let Some(reason) = failure {
      warn!(scope = %self.scope_id, document = %document, reason = %reason, "file failed");
      run.push_error(format!("{document}: {reason}"));
    }

    let Some(run_id) = run.run_id else {
      // Callback for a run this actor no longer tracks; counters were
      // already settled.
      return Ok(());
    };

    let counts = self.ctx.documents.run_counts(&self.scope_id, run_id).await?;
    run.set_counts(counts.total, counts.processed, counts.failed);
    self.ctx.runs.save(run.clone()).await?;
    self
      .ctx
      .notifier
      .publish(NotificationEvent::Progress {
        run_id,
        scope: self.scope_id.to_string(),
        processed: run.processed_files,
        failed: run.failed_files,
        total: run.total_files,
      })
      .await;

    if run.status == RunStatus::Running && run.all_files_settled() {
      self.finalize(&mut run).await?;
    }
    self.run = Some(run);
    Ok(())
  }

  /// Settle the run: Completed, or Failed if any file failed. Counters are
  /// cleared afterwards so the same orchestration identity can host the
  /// next run without stale totals.
  async fn finalize(&self, run: &mut OrchestrationRun) -> Result<()> {
    run.finalize();
    self.ctx.runs.save(run.clone()).await?;
    info!(
      scope = %self.scope_id,
      status = ?run.status,
      processed = run.processed_files,
      failed = run.failed_files,
      total = run.total_files,
      "run finalized"
    );
    self
      .ctx
      .notifier
      .publish(NotificationEvent::Completed {
        run_id: run.run_id.unwrap_or_default(),
        scope: self.scope_id.to_string(),
        processed: run.processed_files,
        failed: run.failed_files,
        total: run.total_files,
        success: run.status == RunStatus::Completed,
      })
      .await;
    run.reset_counters();
    self.ctx.runs.save(run.clone()).await?;
    Ok(())
  }
}

/// Split a listing key into `(folder_path, file_name)`.
fn split_key(key: &str) -> (&str, &str) {
  match key.rsplit_once('/') {
    Some((folder, file)) => (folder, file),
    None => ("", key),
  }
}
