//! Reindex orchestration: full vector-index rebuild for a scope's
//! already-ingested documents.
//!
//! Mirrors the ingestion orchestrator with three deliberate differences:
//! only Complete documents are eligible, the target index is cleared
//! wholesale before any per-document work (a rebuild, not a diff), and
//! progress lives in atomic counters rather than being recomputed from the
//! store on every callback. Reindex runs are large; recomputing counts per
//! settlement would hammer the store for no consistency gain. State and
//! progress sit behind separate async mutexes so a status check never
//! contends with the high-frequency counter path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use inlet_core::{IngestedDocument, ReindexConfig, RunId, RunStatus, ScopeDescriptor, ScopeId};
use store::{DocumentStore, ObjectStorage};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use vector::{DocumentPipeline, VectorStore};

use crate::coordinator::{ConcurrencyCoordinator, CoordinatorError};
use crate::error::{IngestError, Result};
use crate::notify::{NotificationEvent, NotificationSink};
use crate::orchestrator::OrchestratorContext;
use crate::processor::ProcessOutcome;

/// Result of a finished reindex run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexSummary {
  pub run_id: RunId,
  pub total: usize,
  pub processed: usize,
  pub failed: usize,
  pub success: bool,
}

/// Outcome of a `start` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexOutcome {
  /// A run was already in progress; the call was a no-op.
  AlreadyRunning,
  Finished(ReindexSummary),
}

/// Point-in-time snapshot of the current or most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexStatus {
  pub status: RunStatus,
  pub run_id: Option<RunId>,
  pub processed: usize,
  pub failed: usize,
  pub total: usize,
}

#[derive(Debug)]
struct ReindexState {
  status: RunStatus,
  run_id: Option<RunId>,
}

#[derive(Debug, Default)]
struct ReindexProgress {
  total: AtomicUsize,
  processed: AtomicUsize,
  failed: AtomicUsize,
  /// Serializes counter-read + progress-event emission.
  gate: Mutex<()>,
}

/// Drives one scope's reindex runs. Shared as `Arc<Self>`.
pub struct ReindexOrchestrator {
  scope_id: ScopeId,
  ctx: Arc<OrchestratorContext>,
  processor: Arc<ReindexProcessor>,
  config: ReindexConfig,
  state: Mutex<ReindexState>,
  progress: ReindexProgress,
}

impl ReindexOrchestrator {
  pub fn new(
    scope_id: ScopeId,
    ctx: Arc<OrchestratorContext>,
    coordinator: Arc<ConcurrencyCoordinator>,
    config: ReindexConfig,
  ) -> Arc<Self> {
    let processor = Arc::new(ReindexProcessor::new(
      ctx.documents.clone(),
      ctx.storage.clone(),
      ctx.pipeline.clone(),
      coordinator,
      config.clone(),
    ));
    Arc::new(Self {
      scope_id,
      ctx,
      processor,
      config,
      state: Mutex::new(ReindexState {
        status: RunStatus::NotStarted,
        run_id: None,
      }),
      progress: ReindexProgress::default(),
    })
  }

  /// Run a full rebuild of the scope's vector index, driving every eligible
  /// document to settlement before returning.
  pub async fn start(self: &Arc<Self>) -> Result<ReindexOutcome> {
    let descriptor = self.ctx.resolver.resolve(&self.scope_id).await?;
    if !descriptor.kind.supports_vector_reindex() {
      return Err(IngestError::UnsupportedScope {
        scope: self.scope_id.to_string(),
      });
    }

    let run_id = RunId::new();
    {
      let mut state = self.state.lock().await;
      if state.status == RunStatus::Running {
        debug!(scope = %self.scope_id, run = ?state.run_id, "reindex already running, skipping");
        return Ok(ReindexOutcome::AlreadyRunning);
      }
      state.status = RunStatus::Running;
      state.run_id = Some(run_id);
    }

    let eligible = self.ctx.documents.list_complete(&self.scope_id).await?;
    let total = eligible.len();
    self.progress.total.store(total, Ordering::SeqCst);
    self.progress.processed.store(0, Ordering::SeqCst);
    self.progress.failed.store(0, Ordering::SeqCst);

    // Full rebuild: the old index contents go before any document is
    // touched, so a crash cannot leave a mix of old and new embeddings.
    self
      .ctx
      .vectors
      .ensure_index(&descriptor.target_index, self.ctx.pipeline.dimensions())
      .await?;
    self.ctx.vectors.clear_index(&descriptor.target_index).await?;
    info!(scope = %self.scope_id, run = %run_id, total, "reindex started, index cleared");

    self
      .ctx
      .notifier
      .publish(NotificationEvent::Started {
        run_id,
        scope: self.scope_id.to_string(),
        total,
      })
      .await;

    if total > 0 {
      let semaphore = Arc::new(Semaphore::new(self.config.worker_count));
      let mut tasks = JoinSet::new();
      for doc in eligible {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
          break;
        };
        let this = self.clone();
        let descriptor = descriptor.clone();
        tasks.spawn(async move {
          let _permit = permit;
          let failed = match this.processor.process(doc, &descriptor).await {
            Ok(ProcessOutcome::Failed { .. }) => true,
            Ok(_) => false,
            Err(e) => {
              error!(scope = %this.scope_id, error = %e, "reindex processor errored");
              true
            }
          };
          this.settle_one(run_id, failed).await;
        });
      }
      while tasks.join_next().await.is_some() {}
    }

    let processed = self.progress.processed.load(Ordering::SeqCst);
    let failed = self.progress.failed.load(Ordering::SeqCst);
    let success = failed == 0;
    {
      let mut state = self.state.lock().await;
      state.status = if success { RunStatus::Completed } else { RunStatus::Failed };
    }
    info!(scope = %self.scope_id, run = %run_id, processed, failed, total, success, "reindex finished");
    self
      .ctx
      .notifier
      .publish(NotificationEvent::Completed {
        run_id,
        scope: self.scope_id.to_string(),
        processed,
        failed,
        total,
        success,
      })
      .await;

    Ok(ReindexOutcome::Finished(ReindexSummary {
      run_id,
      total,
      processed,
      failed,
      success,
    }))
  }

  /// Count one settled document and emit a progress event. The gate keeps
  /// the counter snapshot and the event it feeds consistent with each
  /// other without touching the state mutex.
  async fn settle_one(&self, run_id: RunId, failed: bool) {
    let _gate = self.progress.gate.lock().await;
    if failed {
      self.progress.failed.fetch_add(1, Ordering::SeqCst);
    } else {
      self.progress.processed.fetch_add(1, Ordering::SeqCst);
    }
    self
      .ctx
      .notifier
      .publish(NotificationEvent::Progress {
        run_id,
        scope: self.scope_id.to_string(),
        processed: self.progress.processed.load(Ordering::SeqCst),
        failed: self.progress.failed.load(Ordering::SeqCst),
        total: self.progress.total.load(Ordering::SeqCst),
      })
      .await;
  }

  /// Snapshot of run status and counters.
  pub async fn status(&self) -> ReindexStatus {
    let state = self.state.lock().await;
    ReindexStatus {
      status: state.status,
      run_id: state.run_id,
      processed: self.progress.processed.load(Ordering::SeqCst),
      failed: self.progress.failed.load(Ordering::SeqCst),
      total: self.progress.total.load(Ordering::SeqCst),
    }
  }
}

// ============================================================================
// Per-document reindex processor
// ============================================================================

/// Re-embeds one Complete document into the freshly cleared index, gated by
/// a cluster-wide lease. Lease timeouts retry with a fixed backoff up to a
/// bounded attempt count, then the document counts as failed.
pub struct ReindexProcessor {
  documents: Arc<dyn DocumentStore>,
  storage: Arc<dyn ObjectStorage>,
  pipeline: Arc<dyn DocumentPipeline>,
  coordinator: Arc<ConcurrencyCoordinator>,
  config: ReindexConfig,
  owner_id: String,
}

impl ReindexProcessor {
  pub fn new(
    documents: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    pipeline: Arc<dyn DocumentPipeline>,
    coordinator: Arc<ConcurrencyCoordinator>,
    config: ReindexConfig,
  ) -> Self {
    Self {
      documents,
      storage,
      pipeline,
      coordinator,
      config,
      owner_id: format!("reindex-{}", uuid::Uuid::new_v4()),
    }
  }

  pub async fn process(&self, doc: IngestedDocument, scope: &ScopeDescriptor) -> Result<ProcessOutcome> {
    if !self
      .documents
      .try_claim(doc.id, &self.owner_id, self.config.lease_ttl_secs)
      .await?
    {
      debug!(document = %doc.id, "document already claimed, skipping reindex");
      return Ok(ProcessOutcome::AlreadyActive);
    }

    let lease = match self.acquire_with_retry(&doc).await {
      Ok(lease) => lease,
      Err(reason) => {
        let outcome = self.fail(doc.clone(), reason).await;
        self.documents.release_claim(doc.id, &self.owner_id).await?;
        return outcome;
      }
    };

    let outcome = self.rebuild(doc.clone(), scope).await;
    self.coordinator.release(lease.id);
    self.documents.release_claim(doc.id, &self.owner_id).await?;
    outcome
  }

  /// Bounded lease-acquisition loop. Timeouts are retryable; anything else
  /// (or exhausting the attempts) fails the document.
  async fn acquire_with_retry(&self, doc: &IngestedDocument) -> std::result::Result<crate::coordinator::Lease, String> {
    let wait = Duration::from_secs(self.config.lease_wait_timeout_secs);
    let ttl = Duration::from_secs(self.config.lease_ttl_secs);
    let backoff = Duration::from_millis(self.config.retry_backoff_ms);

    for attempt in 1..=self.config.max_lease_attempts {
      match self
        .coordinator
        .acquire(
          &self.config.lease_category,
          &self.owner_id,
          self.config.lease_weight,
          wait,
          ttl,
        )
        .await
      {
        Ok(lease) => return Ok(lease),
        Err(CoordinatorError::Timeout { .. }) => {
          warn!(
            document = %doc.id,
            attempt,
            max = self.config.max_lease_attempts,
            "lease acquisition timed out"
          );
          if attempt < self.config.max_lease_attempts {
            tokio::time::sleep(backoff).await;
          }
        }
        Err(e) => return Err(e.to_string()),
      }
    }
    Err(format!(
      "lease acquisition exhausted {} attempts",
      self.config.max_lease_attempts
    ))
  }

  async fn rebuild(&self, mut doc: IngestedDocument, scope: &ScopeDescriptor) -> Result<ProcessOutcome> {
    // Flags drop before the work so a crash leaves the row honestly
    // marked "not yet reindexed".
    doc.reset_vector_tracking();
    self.documents.update(doc.clone()).await?;

    let Some(final_url) = doc.final_url.clone() else {
      return self.fail(doc, "no copied blob recorded for document".to_string()).await;
    };
    let Some((container, key)) = final_url.split_once('/') else {
      return self.fail(doc, format!("malformed blob url: {final_url}")).await;
    };

    let bytes = match self.storage.read(container, key).await {
      Ok(bytes) => bytes,
      Err(e) => return self.fail(doc, format!("read failed: {e}")).await,
    };

    match self
      .pipeline
      .index_document(&scope.target_index, &doc.relative_path(), &bytes)
      .await
    {
      Ok(indexed) => {
        doc.mark_vector_indexed(indexed.vector_document_id, indexed.chunk_count);
        self.documents.update(doc).await?;
        Ok(ProcessOutcome::Completed)
      }
      Err(e) => self.fail(doc, format!("pipeline failed: {e}")).await,
    }
  }

  /// Reindex failures keep the row Complete; only the error field and the
  /// cleared vector flags record the outcome.
  async fn fail(&self, mut doc: IngestedDocument, reason: String) -> Result<ProcessOutcome> {
    warn!(document = %doc.id, reason = %reason, "reindex failed for document");
    doc.record_error(&reason);
    self.documents.update(doc).await?;
    Ok(ProcessOutcome::Failed { reason })
  }
}
