//! Shared fixtures for ingestion/reindex integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ingest::{MemorySink, NotificationEvent, OrchestratorContext};
use inlet_core::{
  CoordinatorConfig, IngestedDocument, IngestionConfig, IngestionState, ReindexConfig, RunId, ScopeDescriptor,
  ScopeKind,
};
use store::{DocumentStore, MemoryDocumentStore, MemoryRunStore, MemoryStorage, ObjectStorage, StaticScopeResolver};
use vector::{DocumentPipeline, EmbeddingPipeline, HashEmbedder, IndexedDocument, MemoryVectorStore, VectorError};

pub struct TestEnv {
  pub documents: Arc<MemoryDocumentStore>,
  pub runs: Arc<MemoryRunStore>,
  pub storage: Arc<MemoryStorage>,
  pub vectors: Arc<MemoryVectorStore>,
  pub sink: Arc<MemorySink>,
  pub scope: ScopeDescriptor,
  pub ctx: Arc<OrchestratorContext>,
}

/// Delegates to a real pipeline but fails any document whose source key
/// contains "poison".
pub struct PoisonPipeline {
  inner: EmbeddingPipeline,
}

#[async_trait]
impl DocumentPipeline for PoisonPipeline {
  fn dimensions(&self) -> usize {
    self.inner.dimensions()
  }

  async fn index_document(
    &self,
    index: &str,
    source_key: &str,
    bytes: &[u8],
  ) -> Result<IndexedDocument, VectorError> {
    if source_key.contains("poison") {
      return Err(VectorError::Embedding("poisoned document".to_string()));
    }
    self.inner.index_document(index, source_key, bytes).await
  }
}

pub fn build_env(kind: ScopeKind, known_scope: bool) -> TestEnv {
  let documents = Arc::new(MemoryDocumentStore::new());
  let runs = Arc::new(MemoryRunStore::new());
  let storage = Arc::new(MemoryStorage::new());
  let vectors = Arc::new(MemoryVectorStore::new());
  let sink = Arc::new(MemorySink::new());
  let scope = ScopeDescriptor::new("contracts", "contracts", kind);

  let resolver = if known_scope {
    Arc::new(StaticScopeResolver::new([scope.clone()]))
  } else {
    Arc::new(StaticScopeResolver::new([]))
  };
  let pipeline = Arc::new(PoisonPipeline {
    inner: EmbeddingPipeline::new(Arc::new(HashEmbedder::new(8)), vectors.clone()),
  });

  let ctx = Arc::new(OrchestratorContext {
    documents: documents.clone(),
    runs: runs.clone(),
    storage: storage.clone(),
    resolver,
    pipeline,
    vectors: vectors.clone(),
    notifier: sink.clone(),
  });

  TestEnv {
    documents,
    runs,
    storage,
    vectors,
    sink,
    scope,
    ctx,
  }
}

pub fn env() -> TestEnv {
  build_env(ScopeKind::DocumentLibrary, true)
}

pub fn ingestion_config() -> IngestionConfig {
  IngestionConfig {
    worker_count: 4,
    stagger_delay_ms: 0,
    claim_ttl_secs: 60,
  }
}

pub fn reindex_config() -> ReindexConfig {
  ReindexConfig {
    lease_category: "ingestion".to_string(),
    lease_weight: 1,
    lease_ttl_secs: 60,
    lease_wait_timeout_secs: 1,
    retry_backoff_ms: 10,
    max_lease_attempts: 2,
    worker_count: 4,
  }
}

pub fn coordinator_config() -> CoordinatorConfig {
  CoordinatorConfig::default()
}

/// Put a file in the scope's source container.
pub async fn put_source(env: &TestEnv, name: &str, bytes: &[u8]) {
  env
    .storage
    .put(&env.scope.source_container, &format!("contracts/{name}"), bytes)
    .await
    .unwrap();
}

/// Insert a row already in a given terminal state, with its blob in the
/// target container when the state implies the copy happened.
pub async fn insert_settled(env: &TestEnv, name: &str, state: IngestionState) -> IngestedDocument {
  let mut doc = IngestedDocument::discovered(
    env.scope.id.clone(),
    RunId::new(),
    env.scope.source_container.clone(),
    "contracts",
    name,
    format!("{}/contracts/{name}", env.scope.source_container),
  );
  match state {
    IngestionState::Failed => {
      doc.transition(IngestionState::FileCopying).unwrap();
      doc.fail("previous run failed").unwrap();
    }
    IngestionState::Complete => {
      let target_key = format!("2026/08/01/{name}");
      env
        .storage
        .put(&env.scope.target_container, &target_key, format!("body of {name}").as_bytes())
        .await
        .unwrap();
      doc.final_url = Some(format!("{}/{target_key}", env.scope.target_container));
      doc.transition(IngestionState::FileCopying).unwrap();
      doc.transition(IngestionState::FileCopied).unwrap();
      doc.transition(IngestionState::Processing).unwrap();
      doc.transition(IngestionState::Complete).unwrap();
    }
    other => panic!("unsupported fixture state: {other}"),
  }
  env.documents.insert(doc.clone()).await.unwrap();
  doc
}

/// Poll until the sink holds a Completed event, returning it.
pub async fn wait_for_completed(env: &TestEnv) -> NotificationEvent {
  let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
  loop {
    if let Some(event) = env.sink.completed_events().into_iter().next() {
      return event;
    }
    assert!(tokio::time::Instant::now() < deadline, "run did not complete in time");
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
}
