//! Reindex orchestration tests: full index rebuilds over Complete rows.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use ingest::{ConcurrencyCoordinator, IngestError, ReindexOrchestrator, ReindexOutcome};
use inlet_core::{IngestionState, RunStatus, ScopeKind};
use store::DocumentStore;
use vector::{VectorRecord, VectorStore};

fn coordinator() -> Arc<ConcurrencyCoordinator> {
  Arc::new(ConcurrencyCoordinator::new(coordinator_config()))
}

#[tokio::test]
async fn test_reindex_rebuilds_index_from_scratch() {
  let env = env();
  let a = insert_settled(&env, "a.txt", IngestionState::Complete).await;
  let b = insert_settled(&env, "b.txt", IngestionState::Complete).await;

  // Stale embeddings from a previous model sit in the index
  env.vectors.ensure_index(&env.scope.target_index, 8).await.unwrap();
  env
    .vectors
    .upsert(
      &env.scope.target_index,
      vec![VectorRecord {
        vector_document_id: "stale".to_string(),
        chunk_index: 0,
        text: "old embedding".to_string(),
        embedding: vec![0.0; 8],
      }],
    )
    .await
    .unwrap();

  let orchestrator = ReindexOrchestrator::new(env.scope.id.clone(), env.ctx.clone(), coordinator(), reindex_config());
  let outcome = orchestrator.start().await.unwrap();

  let ReindexOutcome::Finished(summary) = outcome else {
    panic!("expected a finished run");
  };
  assert_eq!((summary.total, summary.processed, summary.failed), (2, 2, 0));
  assert!(summary.success);

  // Stale content is gone; both rows are freshly indexed
  assert_eq!(env.vectors.document_chunks(&env.scope.target_index, "stale").unwrap(), 0);
  for id in [a.id, b.id] {
    let row = env.documents.get(id).await.unwrap().unwrap();
    assert_eq!(row.state, IngestionState::Complete);
    assert!(row.is_vector_indexed);
    assert!(row.vector_chunk_count > 0);
  }
}

#[tokio::test]
async fn test_reindex_rejects_unsupported_scope_kind() {
  let env = build_env(ScopeKind::ArchiveImport, true);
  insert_settled(&env, "a.txt", IngestionState::Complete).await;

  let orchestrator = ReindexOrchestrator::new(env.scope.id.clone(), env.ctx.clone(), coordinator(), reindex_config());
  let err = orchestrator.start().await.unwrap_err();
  assert!(matches!(err, IngestError::UnsupportedScope { .. }));

  // Nothing touched
  let row = env.documents.list_complete(&env.scope.id).await.unwrap().remove(0);
  assert!(row.error.is_none());
}

#[tokio::test]
async fn test_reindex_failure_keeps_row_complete_but_unindexed() {
  let env = env();
  insert_settled(&env, "good.txt", IngestionState::Complete).await;
  let poisoned = insert_settled(&env, "poison.txt", IngestionState::Complete).await;

  let orchestrator = ReindexOrchestrator::new(env.scope.id.clone(), env.ctx.clone(), coordinator(), reindex_config());
  let ReindexOutcome::Finished(summary) = orchestrator.start().await.unwrap() else {
    panic!("expected a finished run");
  };
  assert_eq!((summary.processed, summary.failed), (1, 1));
  assert!(!summary.success);

  let row = env.documents.get(poisoned.id).await.unwrap().unwrap();
  // Still Complete as an ingestion outcome; the vector flags say the
  // reindex never landed
  assert_eq!(row.state, IngestionState::Complete);
  assert!(!row.is_vector_indexed);
  assert_eq!(row.vector_chunk_count, 0);
  assert!(row.error.as_ref().unwrap().contains("pipeline failed"));
}

#[tokio::test]
async fn test_status_reflects_the_finished_run() {
  let env = env();
  insert_settled(&env, "a.txt", IngestionState::Complete).await;

  let orchestrator = ReindexOrchestrator::new(env.scope.id.clone(), env.ctx.clone(), coordinator(), reindex_config());
  let before = orchestrator.status().await;
  assert_eq!(before.status, RunStatus::NotStarted);
  assert!(before.run_id.is_none());

  let ReindexOutcome::Finished(summary) = orchestrator.start().await.unwrap() else {
    panic!("expected a finished run");
  };

  let after = orchestrator.status().await;
  assert_eq!(after.status, RunStatus::Completed);
  assert_eq!(after.run_id, Some(summary.run_id));
  assert_eq!((after.processed, after.failed, after.total), (1, 0, 1));
}

#[tokio::test]
async fn test_reindex_empty_scope_finishes_immediately() {
  let env = env();
  let orchestrator = ReindexOrchestrator::new(env.scope.id.clone(), env.ctx.clone(), coordinator(), reindex_config());
  let ReindexOutcome::Finished(summary) = orchestrator.start().await.unwrap() else {
    panic!("expected a finished run");
  };
  assert_eq!(summary.total, 0);
  assert!(summary.success);
}

#[tokio::test]
async fn test_lease_exhaustion_fails_the_document() {
  let env = env();
  insert_settled(&env, "a.txt", IngestionState::Complete).await;

  // Saturate the category so every acquisition attempt times out
  let mut capacities = coordinator_config();
  capacities.capacities.insert("ingestion".to_string(), 1);
  let coordinator = Arc::new(ConcurrencyCoordinator::new(capacities));
  coordinator
    .acquire("ingestion", "hog", 1, Duration::from_secs(1), Duration::from_secs(600))
    .await
    .unwrap();

  let mut config = reindex_config();
  config.lease_wait_timeout_secs = 0;
  config.max_lease_attempts = 2;

  let orchestrator = ReindexOrchestrator::new(env.scope.id.clone(), env.ctx.clone(), coordinator, config);
  let ReindexOutcome::Finished(summary) = orchestrator.start().await.unwrap() else {
    panic!("expected a finished run");
  };
  assert_eq!((summary.processed, summary.failed), (0, 1));

  let row = env.documents.list_complete(&env.scope.id).await.unwrap().remove(0);
  assert!(row.error.as_ref().unwrap().contains("lease acquisition exhausted"));
}
