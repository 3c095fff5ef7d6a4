//! Per-file processor: owns one document's journey from raw blob to
//! embedded content.
//!
//! Every state transition is persisted before the work it gates, so a crash
//! between a transition write and the work completing is recovered by
//! re-entry: Discovered/FileCopying resume the copy, FileCopied/Processing
//! skip straight to the pipeline. A durable claim (owner + expiry) rejects
//! a second concurrent start for the same document.

use std::sync::Arc;

use chrono::Utc;
use inlet_core::{DocumentId, IngestionState, ScopeDescriptor};
use store::{DocumentStore, ObjectStorage, StoreError};
use tracing::{debug, warn};
use vector::DocumentPipeline;

use crate::error::Result;

/// Outcome of one `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
  /// Document reached Complete.
  Completed,
  /// Document reached Failed; the reason is also persisted on the row.
  Failed { reason: String },
  /// Another processor holds a live claim; nothing was done.
  AlreadyActive,
  /// The document was already terminal when dispatched; nothing was done.
  Skipped,
}

/// Drives one document at a time. One instance per orchestration is fine;
/// the claim, not the instance, is what serializes work per document.
pub struct FileProcessor {
  documents: Arc<dyn DocumentStore>,
  storage: Arc<dyn ObjectStorage>,
  pipeline: Arc<dyn DocumentPipeline>,
  /// Claim owner id, unique per processor instance.
  owner_id: String,
  claim_ttl_secs: u64,
}

impl FileProcessor {
  pub fn new(
    documents: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    pipeline: Arc<dyn DocumentPipeline>,
    claim_ttl_secs: u64,
  ) -> Self {
    Self {
      documents,
      storage,
      pipeline,
      owner_id: format!("proc-{}", uuid::Uuid::new_v4()),
      claim_ttl_secs,
    }
  }

  pub fn owner_id(&self) -> &str {
    &self.owner_id
  }

  /// Process one document to a terminal state, taking the durable claim
  /// first. Per-file failures come back as `ProcessOutcome::Failed`, not
  /// `Err`; `Err` means the store itself misbehaved.
  pub async fn process(&self, id: DocumentId, scope: &ScopeDescriptor) -> Result<ProcessOutcome> {
    let Some(doc) = self.documents.get(id).await? else {
      return Err(
        StoreError::NotFound {
          entity: "document",
          id: id.to_string(),
        }
        .into(),
      );
    };

    if doc.state.is_terminal() {
      debug!(document = %id, state = %doc.state, "skipping terminal document");
      return Ok(ProcessOutcome::Skipped);
    }

    if !self.documents.try_claim(id, &self.owner_id, self.claim_ttl_secs).await? {
      debug!(document = %id, "document already claimed");
      return Ok(ProcessOutcome::AlreadyActive);
    }

    let outcome = self.run(doc, scope).await;
    self.documents.release_claim(id, &self.owner_id).await?;
    outcome
  }

  async fn run(&self, mut doc: inlet_core::IngestedDocument, scope: &ScopeDescriptor) -> Result<ProcessOutcome> {
    // Copy phase, skipped when a previous attempt already got past it.
    if matches!(doc.state, IngestionState::Discovered | IngestionState::FileCopying) {
      if doc.state == IngestionState::Discovered {
        doc.transition(IngestionState::FileCopying)?;
        self.documents.update(doc.clone()).await?;
      }

      let source_key = doc.relative_path();
      // The full relative path goes into the key: two folders holding the
      // same file name must land on distinct blobs.
      let target_key = format!("{}/{}", Utc::now().format("%Y/%m/%d"), source_key);

      if let Err(e) = self
        .storage
        .copy(&doc.container, &source_key, &scope.target_container, &target_key)
        .await
      {
        return self.fail(doc, format!("copy failed: {e}")).await;
      }
      // Move semantics: the staging copy is gone once the canonical one
      // exists. A failed delete is left for rediscovery cleanup.
      if let Err(e) = self.storage.delete(&doc.container, &source_key).await {
        warn!(document = %doc.id, error = %e, "failed to delete source object after copy");
      }

      doc.final_url = Some(format!("{}/{}", scope.target_container, target_key));
      doc.transition(IngestionState::FileCopied)?;
      self.documents.update(doc.clone()).await?;
    }

    if doc.state == IngestionState::FileCopied {
      doc.transition(IngestionState::Processing)?;
      self.documents.update(doc.clone()).await?;
    }

    // Processing phase. Resuming a crashed Processing attempt re-runs the
    // pipeline; upserts replace, so that is idempotent.
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
        doc.transition(IngestionState::Complete)?;
        self.documents.update(doc.clone()).await?;
        debug!(document = %doc.id, chunks = doc.vector_chunk_count, "document complete");
        Ok(ProcessOutcome::Completed)
      }
      Err(e) => self.fail(doc, format!("pipeline failed: {e}")).await,
    }
  }

  async fn fail(&self, mut doc: inlet_core::IngestedDocument, reason: String) -> Result<ProcessOutcome> {
    warn!(document = %doc.id, reason = %reason, "document failed");
    doc.fail(&reason)?;
    self.documents.update(doc).await?;
    Ok(ProcessOutcome::Failed { reason })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use inlet_core::{IngestedDocument, RunId, ScopeId, ScopeKind};
  use store::{MemoryDocumentStore, MemoryStorage};
  use vector::{EmbeddingPipeline, HashEmbedder, MemoryVectorStore, VectorStore};

  struct Fixture {
    documents: Arc<MemoryDocumentStore>,
    storage: Arc<MemoryStorage>,
    vectors: Arc<MemoryVectorStore>,
    scope: ScopeDescriptor,
    processor: FileProcessor,
  }

  fn fixture() -> Fixture {
    let documents = Arc::new(MemoryDocumentStore::new());
    let storage = Arc::new(MemoryStorage::new());
    let vectors = Arc::new(MemoryVectorStore::new());
    let pipeline = Arc::new(EmbeddingPipeline::new(Arc::new(HashEmbedder::new(8)), vectors.clone()));
    let processor = FileProcessor::new(documents.clone(), storage.clone(), pipeline, 60);
    Fixture {
      documents,
      storage,
      vectors,
      scope: ScopeDescriptor::new("contracts", "contracts", ScopeKind::DocumentLibrary),
      processor,
    }
  }

  fn discovered(scope: &ScopeDescriptor, file: &str) -> IngestedDocument {
    IngestedDocument::discovered(
      scope.id.clone(),
      RunId::new(),
      scope.source_container.clone(),
      "contracts",
      file,
      format!("{}/contracts/{file}", scope.source_container),
    )
  }

  #[tokio::test]
  async fn test_happy_path_moves_blob_and_indexes() {
    let f = fixture();
    let doc = discovered(&f.scope, "a.txt");
    let id = doc.id;
    f.storage
      .put(&f.scope.source_container, "contracts/a.txt", b"the quick brown fox")
      .await
      .unwrap();
    f.documents.insert(doc).await.unwrap();

    let outcome = f.processor.process(id, &f.scope).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Completed);

    let stored = f.documents.get(id).await.unwrap().unwrap();
    assert_eq!(stored.state, IngestionState::Complete);
    assert!(stored.is_vector_indexed);
    assert!(stored.vector_chunk_count > 0);
    assert!(stored.claim_owner.is_none());

    // Source blob moved out of staging
    assert!(
      !f.storage
        .exists(&f.scope.source_container, "contracts/a.txt")
        .await
        .unwrap()
    );
    assert!(f.vectors.count(&f.scope.target_index).await.unwrap() > 0);
  }

  #[tokio::test]
  async fn test_same_file_name_in_different_folders_keeps_both_blobs() {
    let f = fixture();
    let mut alpha = discovered(&f.scope, "report.txt");
    alpha.folder_path = "contracts/alpha".to_string();
    let mut beta = discovered(&f.scope, "report.txt");
    beta.folder_path = "contracts/beta".to_string();
    let (alpha_id, beta_id) = (alpha.id, beta.id);

    f.storage
      .put(&f.scope.source_container, "contracts/alpha/report.txt", b"ALPHA BODY")
      .await
      .unwrap();
    f.storage
      .put(&f.scope.source_container, "contracts/beta/report.txt", b"BETA BODY")
      .await
      .unwrap();
    f.documents.insert(alpha).await.unwrap();
    f.documents.insert(beta).await.unwrap();

    assert_eq!(f.processor.process(alpha_id, &f.scope).await.unwrap(), ProcessOutcome::Completed);
    assert_eq!(f.processor.process(beta_id, &f.scope).await.unwrap(), ProcessOutcome::Completed);

    let alpha_url = f.documents.get(alpha_id).await.unwrap().unwrap().final_url.unwrap();
    let beta_url = f.documents.get(beta_id).await.unwrap().unwrap().final_url.unwrap();
    assert_ne!(alpha_url, beta_url);

    // Both bodies survived the copy intact
    let (container, key) = alpha_url.split_once('/').unwrap();
    assert_eq!(f.storage.read(container, key).await.unwrap(), b"ALPHA BODY");
    let (container, key) = beta_url.split_once('/').unwrap();
    assert_eq!(f.storage.read(container, key).await.unwrap(), b"BETA BODY");
  }

  #[tokio::test]
  async fn test_copy_failure_marks_failed() {
    let f = fixture();
    // No source blob: the copy cannot succeed
    let doc = discovered(&f.scope, "missing.txt");
    let id = doc.id;
    f.documents.insert(doc).await.unwrap();

    let outcome = f.processor.process(id, &f.scope).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Failed { .. }));

    let stored = f.documents.get(id).await.unwrap().unwrap();
    assert_eq!(stored.state, IngestionState::Failed);
    assert!(stored.error.as_ref().unwrap().contains("copy failed"));
  }

  #[tokio::test]
  async fn test_live_claim_rejects_second_start() {
    let f = fixture();
    let doc = discovered(&f.scope, "a.txt");
    let id = doc.id;
    f.documents.insert(doc).await.unwrap();
    f.documents.try_claim(id, "someone-else", 60).await.unwrap();

    let outcome = f.processor.process(id, &f.scope).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::AlreadyActive);
    // Untouched
    let stored = f.documents.get(id).await.unwrap().unwrap();
    assert_eq!(stored.state, IngestionState::Discovered);
  }

  #[tokio::test]
  async fn test_resume_after_copy_skips_copy() {
    let f = fixture();
    let mut doc = discovered(&f.scope, "a.txt");
    let id = doc.id;
    // Simulate a crash after the copy step: blob is in the target
    // container, row says FileCopied, staging is already empty.
    f.storage
      .put(&f.scope.target_container, "2026/08/30/a.txt", b"already copied body")
      .await
      .unwrap();
    doc.transition(IngestionState::FileCopying).unwrap();
    doc.final_url = Some(format!("{}/2026/08/30/a.txt", f.scope.target_container));
    doc.transition(IngestionState::FileCopied).unwrap();
    f.documents.insert(doc).await.unwrap();

    let outcome = f.processor.process(id, &f.scope).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Completed);
  }

  #[tokio::test]
  async fn test_terminal_document_is_skipped() {
    let f = fixture();
    let mut doc = discovered(&f.scope, "a.txt");
    let id = doc.id;
    doc.transition(IngestionState::FileCopying).unwrap();
    doc.fail("earlier failure").unwrap();
    f.documents.insert(doc).await.unwrap();

    let outcome = f.processor.process(id, &f.scope).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Skipped);
  }
}
